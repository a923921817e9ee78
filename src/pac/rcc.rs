//! Subset of the STM32F4 reset and clock control block: just the bits the
//! CAN bring-up touches.

use super::common::{RW, Reg};
use bitfield_struct::bitfield;

#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Rcc {
    ptr: *mut u8,
}

unsafe impl Send for Rcc {}
unsafe impl Sync for Rcc {}

impl Rcc {
    /// Caller must supply the RCC base address.
    #[inline(always)]
    pub const unsafe fn from_ptr(ptr: *mut ()) -> Self {
        Self { ptr: ptr as _ }
    }

    /// APB1 peripheral reset register.
    #[inline(always)]
    pub const fn apb1rstr(self) -> Reg<regs::Apb1rstr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0020) as _) }
    }

    /// AHB1 peripheral clock enable register.
    #[inline(always)]
    pub const fn ahb1enr(self) -> Reg<regs::Ahb1enr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0030) as _) }
    }

    /// APB1 peripheral clock enable register.
    #[inline(always)]
    pub const fn apb1enr(self) -> Reg<regs::Apb1enr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0040) as _) }
    }
}

pub mod regs {
    use super::bitfield;

    /// AHB1 peripheral clock enable register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Ahb1enr {
        /// GPIOA clock enable.
        #[bits(1)]
        pub gpioaen: bool,
        /// GPIOB clock enable.
        #[bits(1)]
        pub gpioben: bool,
        #[bits(30)]
        _reserved0: u32,
    }

    /// APB1 peripheral clock enable register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Apb1enr {
        #[bits(25)]
        _reserved0: u32,
        /// CAN1 clock enable.
        #[bits(1)]
        pub can1en: bool,
        /// CAN2 clock enable.
        #[bits(1)]
        pub can2en: bool,
        #[bits(5)]
        _reserved1: u8,
    }

    /// APB1 peripheral reset register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Apb1rstr {
        #[bits(25)]
        _reserved0: u32,
        /// CAN1 reset.
        #[bits(1)]
        pub can1rst: bool,
        /// CAN2 reset.
        #[bits(1)]
        pub can2rst: bool,
        #[bits(5)]
        _reserved1: u8,
    }
}
