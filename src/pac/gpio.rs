//! Subset of the STM32F4 GPIO port block used for the CAN pin mux.
//!
//! The two-bit-per-pin registers are exposed as plain words; callers shift
//! the [`vals`] encodings into place.

use super::common::{R, RW, Reg};

#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Gpio {
    ptr: *mut u8,
}

unsafe impl Send for Gpio {}
unsafe impl Sync for Gpio {}

impl Gpio {
    /// Caller must supply a GPIO port base address.
    #[inline(always)]
    pub const unsafe fn from_ptr(ptr: *mut ()) -> Self {
        Self { ptr: ptr as _ }
    }

    /// Port mode register, two bits per pin.
    #[inline(always)]
    pub const fn moder(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0000) as _) }
    }

    /// Output type register, one bit per pin (set = open-drain).
    #[inline(always)]
    pub const fn otyper(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0004) as _) }
    }

    /// Output speed register, two bits per pin.
    #[inline(always)]
    pub const fn ospeedr(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0008) as _) }
    }

    /// Pull-up/pull-down register, two bits per pin.
    #[inline(always)]
    pub const fn pupdr(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x000C) as _) }
    }

    /// Input data register.
    #[inline(always)]
    pub const fn idr(self) -> Reg<u32, R> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0010) as _) }
    }

    /// Alternate function register: `n` = 0 covers pins 0..=7, `n` = 1 pins
    /// 8..=15, four bits per pin.
    #[inline(always)]
    pub const fn afr(self, n: usize) -> Reg<u32, RW> {
        assert!(n < 2);
        unsafe { Reg::from_ptr(self.ptr.add(0x0020 + 4 * n) as _) }
    }
}

pub mod vals {
    /// MODER field encoding.
    #[derive(Copy, Clone, PartialEq, Eq)]
    #[repr(u8)]
    pub enum Moder {
        Input = 0b00,
        Output = 0b01,
        Alternate = 0b10,
        Analog = 0b11,
    }

    /// OSPEEDR field encoding.
    #[derive(Copy, Clone, PartialEq, Eq)]
    #[repr(u8)]
    pub enum Ospeedr {
        Low = 0b00,
        Medium = 0b01,
        High = 0b10,
        VeryHigh = 0b11,
    }

    /// PUPDR field encoding.
    #[derive(Copy, Clone, PartialEq, Eq)]
    #[repr(u8)]
    pub enum Pupdr {
        Floating = 0b00,
        PullUp = 0b01,
        PullDown = 0b10,
    }
}
