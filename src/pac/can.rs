//! bxCAN controller register block.
//!
//! Hand-written against the STM32F4 reference manual (RM0090 rev 19,
//! chapter 32). Only the single-instance view is modelled: the filter
//! registers live at their CAN1 (master) offsets.

use super::common::{R, RW, Reg};
use bitfield_struct::bitfield;

/// Basic extended CAN interface.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Can {
    ptr: *mut u8,
}

unsafe impl Send for Can {}
unsafe impl Sync for Can {}

impl Can {
    /// Caller must supply the base address of a bxCAN register block.
    #[inline(always)]
    pub const unsafe fn from_ptr(ptr: *mut ()) -> Self {
        Self { ptr: ptr as _ }
    }

    #[inline(always)]
    pub const fn as_ptr(&self) -> *mut () {
        self.ptr as _
    }

    /// Master control register.
    #[inline(always)]
    pub const fn mcr(self) -> Reg<regs::Mcr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0000) as _) }
    }

    /// Master status register.
    #[inline(always)]
    pub const fn msr(self) -> Reg<regs::Msr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0004) as _) }
    }

    /// Transmit status register.
    #[inline(always)]
    pub const fn tsr(self) -> Reg<regs::Tsr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0008) as _) }
    }

    /// Receive FIFO 0/1 register.
    #[inline(always)]
    pub const fn rfr(self, n: usize) -> Reg<regs::Rfr, RW> {
        assert!(n < 2);
        unsafe { Reg::from_ptr(self.ptr.add(0x000C + 4 * n) as _) }
    }

    /// Interrupt enable register.
    #[inline(always)]
    pub const fn ier(self) -> Reg<regs::Ier, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0014) as _) }
    }

    /// Error status register.
    #[inline(always)]
    pub const fn esr(self) -> Reg<regs::Esr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0018) as _) }
    }

    /// Bit timing register.
    #[inline(always)]
    pub const fn btr(self) -> Reg<regs::Btr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x001C) as _) }
    }

    /// Transmit mailbox 0..=2.
    #[inline(always)]
    pub const fn tx(self, n: usize) -> Tx {
        assert!(n < 3);
        unsafe {
            Tx {
                ptr: self.ptr.add(0x0180 + 0x10 * n),
            }
        }
    }

    /// Receive FIFO 0/1 output mailbox.
    #[inline(always)]
    pub const fn rx(self, n: usize) -> Rx {
        assert!(n < 2);
        unsafe {
            Rx {
                ptr: self.ptr.add(0x01B0 + 0x10 * n),
            }
        }
    }

    /// Filter master register.
    #[inline(always)]
    pub const fn fmr(self) -> Reg<regs::Fmr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0200) as _) }
    }

    /// Filter mode register, one bit per bank (0 = mask, 1 = list).
    #[inline(always)]
    pub const fn fm1r(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0204) as _) }
    }

    /// Filter scale register, one bit per bank (0 = dual 16-bit, 1 = single
    /// 32-bit).
    #[inline(always)]
    pub const fn fs1r(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x020C) as _) }
    }

    /// Filter FIFO assignment register, one bit per bank.
    #[inline(always)]
    pub const fn ffa1r(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0214) as _) }
    }

    /// Filter activation register, one bit per bank.
    #[inline(always)]
    pub const fn fa1r(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x021C) as _) }
    }

    /// Filter bank 0..=27.
    #[inline(always)]
    pub const fn fb(self, n: usize) -> Fb {
        assert!(n < 28);
        unsafe {
            Fb {
                ptr: self.ptr.add(0x0240 + 8 * n),
            }
        }
    }
}

/// One transmit mailbox.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Tx {
    ptr: *mut u8,
}

unsafe impl Send for Tx {}
unsafe impl Sync for Tx {}

impl Tx {
    /// TX mailbox identifier register.
    #[inline(always)]
    pub const fn tir(self) -> Reg<regs::Tir, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0000) as _) }
    }

    /// TX mailbox data length control and time stamp register.
    #[inline(always)]
    pub const fn tdtr(self) -> Reg<regs::Tdtr, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0004) as _) }
    }

    /// TX mailbox data low register, bytes 0..=3.
    #[inline(always)]
    pub const fn tdlr(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0008) as _) }
    }

    /// TX mailbox data high register, bytes 4..=7.
    #[inline(always)]
    pub const fn tdhr(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x000C) as _) }
    }
}

/// One receive FIFO output mailbox. Read-only; releasing goes through
/// [`regs::Rfr`].
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Rx {
    ptr: *mut u8,
}

unsafe impl Send for Rx {}
unsafe impl Sync for Rx {}

impl Rx {
    /// RX FIFO mailbox identifier register.
    #[inline(always)]
    pub const fn rir(self) -> Reg<regs::Rir, R> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0000) as _) }
    }

    /// RX FIFO mailbox data length control and time stamp register.
    #[inline(always)]
    pub const fn rdtr(self) -> Reg<regs::Rdtr, R> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0004) as _) }
    }

    /// RX FIFO mailbox data low register, bytes 0..=3.
    #[inline(always)]
    pub const fn rdlr(self) -> Reg<u32, R> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0008) as _) }
    }

    /// RX FIFO mailbox data high register, bytes 4..=7.
    #[inline(always)]
    pub const fn rdhr(self) -> Reg<u32, R> {
        unsafe { Reg::from_ptr(self.ptr.add(0x000C) as _) }
    }
}

/// One filter bank: identifier and mask (or two identifiers in list mode).
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Fb {
    ptr: *mut u8,
}

unsafe impl Send for Fb {}
unsafe impl Sync for Fb {}

impl Fb {
    /// Filter bank register 1 (identifier).
    #[inline(always)]
    pub const fn fr1(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0000) as _) }
    }

    /// Filter bank register 2 (mask in mask mode).
    #[inline(always)]
    pub const fn fr2(self) -> Reg<u32, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(0x0004) as _) }
    }
}

pub mod regs {
    use super::bitfield;

    /// Master control register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Mcr {
        /// Initialization request.
        #[bits(1)]
        pub inrq: bool,
        /// Sleep mode request. Set out of reset; cleared to wake the
        /// peripheral.
        #[bits(1)]
        pub sleep: bool,
        /// Transmit FIFO priority: drain mailboxes in request order instead
        /// of identifier priority.
        #[bits(1)]
        pub txfp: bool,
        /// Receive FIFO locked mode: a full FIFO discards incoming frames
        /// instead of overwriting the newest pending one.
        #[bits(1)]
        pub rflm: bool,
        /// No automatic retransmission.
        #[bits(1)]
        pub nart: bool,
        /// Automatic wakeup on bus activity.
        #[bits(1)]
        pub awum: bool,
        /// Automatic bus-off recovery.
        #[bits(1)]
        pub abom: bool,
        /// Time triggered communication mode.
        #[bits(1)]
        pub ttcm: bool,
        #[bits(7)]
        _reserved0: u8,
        /// Software master reset.
        #[bits(1)]
        pub reset: bool,
        /// Debug freeze.
        #[bits(1)]
        pub dbf: bool,
        #[bits(15)]
        _reserved1: u16,
    }

    /// Master status register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Msr {
        /// Initialization acknowledge.
        #[bits(1)]
        pub inak: bool,
        /// Sleep acknowledge.
        #[bits(1)]
        pub slak: bool,
        /// Error interrupt pending. Cleared by writing 1.
        #[bits(1)]
        pub erri: bool,
        /// Wakeup interrupt pending. Cleared by writing 1.
        #[bits(1)]
        pub wkui: bool,
        /// Sleep acknowledge interrupt pending. Cleared by writing 1.
        #[bits(1)]
        pub slaki: bool,
        #[bits(3)]
        _reserved0: u8,
        /// Transmitting.
        #[bits(1)]
        pub txm: bool,
        /// Receiving.
        #[bits(1)]
        pub rxm: bool,
        /// Last sample point value.
        #[bits(1)]
        pub samp: bool,
        /// RX pin level.
        #[bits(1)]
        pub rx: bool,
        #[bits(20)]
        _reserved1: u32,
    }

    /// Transmit status register. The per-mailbox flags are cleared by
    /// writing 1.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Tsr {
        /// Request completed, mailbox 0.
        #[bits(1)]
        pub rqcp0: bool,
        /// Transmission OK, mailbox 0.
        #[bits(1)]
        pub txok0: bool,
        /// Arbitration lost, mailbox 0.
        #[bits(1)]
        pub alst0: bool,
        /// Transmission error, mailbox 0.
        #[bits(1)]
        pub terr0: bool,
        #[bits(3)]
        _reserved0: u8,
        /// Abort request, mailbox 0.
        #[bits(1)]
        pub abrq0: bool,
        /// Request completed, mailbox 1.
        #[bits(1)]
        pub rqcp1: bool,
        /// Transmission OK, mailbox 1.
        #[bits(1)]
        pub txok1: bool,
        /// Arbitration lost, mailbox 1.
        #[bits(1)]
        pub alst1: bool,
        /// Transmission error, mailbox 1.
        #[bits(1)]
        pub terr1: bool,
        #[bits(3)]
        _reserved1: u8,
        /// Abort request, mailbox 1.
        #[bits(1)]
        pub abrq1: bool,
        /// Request completed, mailbox 2.
        #[bits(1)]
        pub rqcp2: bool,
        /// Transmission OK, mailbox 2.
        #[bits(1)]
        pub txok2: bool,
        /// Arbitration lost, mailbox 2.
        #[bits(1)]
        pub alst2: bool,
        /// Transmission error, mailbox 2.
        #[bits(1)]
        pub terr2: bool,
        #[bits(3)]
        _reserved2: u8,
        /// Abort request, mailbox 2.
        #[bits(1)]
        pub abrq2: bool,
        /// Lowest-priority free mailbox number. Points at a free mailbox
        /// whenever at least one TME bit is set.
        #[bits(2)]
        pub code: u8,
        /// Mailbox 0 empty.
        #[bits(1)]
        pub tme0: bool,
        /// Mailbox 1 empty.
        #[bits(1)]
        pub tme1: bool,
        /// Mailbox 2 empty.
        #[bits(1)]
        pub tme2: bool,
        /// Mailbox 0 has lowest priority of the pending requests.
        #[bits(1)]
        pub low0: bool,
        /// Mailbox 1 has lowest priority of the pending requests.
        #[bits(1)]
        pub low1: bool,
        /// Mailbox 2 has lowest priority of the pending requests.
        #[bits(1)]
        pub low2: bool,
    }

    /// Receive FIFO register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Rfr {
        /// FIFO fill level: number of pending frames, 0..=3.
        #[bits(2)]
        pub fmp: u8,
        #[bits(1)]
        _reserved0: u8,
        /// FIFO full. Cleared by writing 1.
        #[bits(1)]
        pub full: bool,
        /// FIFO overrun. Cleared by writing 1.
        #[bits(1)]
        pub fovr: bool,
        /// Release output mailbox: pops the frame at the FIFO output and
        /// decrements the fill level.
        #[bits(1)]
        pub rfom: bool,
        #[bits(26)]
        _reserved1: u32,
    }

    /// Interrupt enable register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Ier {
        /// Transmit mailbox empty.
        #[bits(1)]
        pub tmeie: bool,
        /// FIFO 0 message pending.
        #[bits(1)]
        pub fmpie0: bool,
        /// FIFO 0 full.
        #[bits(1)]
        pub ffie0: bool,
        /// FIFO 0 overrun.
        #[bits(1)]
        pub fovie0: bool,
        /// FIFO 1 message pending.
        #[bits(1)]
        pub fmpie1: bool,
        /// FIFO 1 full.
        #[bits(1)]
        pub ffie1: bool,
        /// FIFO 1 overrun.
        #[bits(1)]
        pub fovie1: bool,
        #[bits(1)]
        _reserved0: u8,
        /// Error warning.
        #[bits(1)]
        pub ewgie: bool,
        /// Error passive.
        #[bits(1)]
        pub epvie: bool,
        /// Bus-off.
        #[bits(1)]
        pub bofie: bool,
        /// Last error code.
        #[bits(1)]
        pub lecie: bool,
        #[bits(3)]
        _reserved1: u8,
        /// Error.
        #[bits(1)]
        pub errie: bool,
        /// Wakeup.
        #[bits(1)]
        pub wkuie: bool,
        /// Sleep acknowledge.
        #[bits(1)]
        pub slkie: bool,
        #[bits(14)]
        _reserved2: u16,
    }

    /// Error status register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Esr {
        /// Error warning flag.
        #[bits(1)]
        pub ewgf: bool,
        /// Error passive flag.
        #[bits(1)]
        pub epvf: bool,
        /// Bus-off flag.
        #[bits(1)]
        pub boff: bool,
        #[bits(1)]
        _reserved0: u8,
        /// Last error code.
        #[bits(3)]
        pub lec: u8,
        #[bits(9)]
        _reserved1: u16,
        /// Transmit error counter.
        #[bits(8)]
        pub tec: u8,
        /// Receive error counter.
        #[bits(8)]
        pub rec: u8,
    }

    /// Bit timing register. Timing fields hold value − 1.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Btr {
        /// Baud rate prescaler.
        #[bits(10)]
        pub brp: u16,
        #[bits(6)]
        _reserved0: u8,
        /// Time segment 1.
        #[bits(4)]
        pub ts1: u8,
        /// Time segment 2.
        #[bits(3)]
        pub ts2: u8,
        #[bits(1)]
        _reserved1: u8,
        /// Resynchronization jump width.
        #[bits(2)]
        pub sjw: u8,
        #[bits(4)]
        _reserved2: u8,
        /// Loopback mode.
        #[bits(1)]
        pub lbkm: bool,
        /// Silent mode.
        #[bits(1)]
        pub silm: bool,
    }

    /// TX mailbox identifier register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Tir {
        /// Transmit mailbox request.
        #[bits(1)]
        pub txrq: bool,
        /// Remote transmission request.
        #[bits(1)]
        pub rtr: bool,
        /// Identifier extension.
        #[bits(1)]
        pub ide: bool,
        /// Extended identifier low bits; unused for standard frames.
        #[bits(18)]
        pub exid: u32,
        /// Standard identifier.
        #[bits(11)]
        pub stid: u16,
    }

    /// TX mailbox data length control and time stamp register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Tdtr {
        /// Data length code.
        #[bits(4)]
        pub dlc: u8,
        #[bits(4)]
        _reserved0: u8,
        /// Transmit global time (time triggered mode).
        #[bits(1)]
        pub tgt: bool,
        #[bits(7)]
        _reserved1: u8,
        /// Message time stamp.
        #[bits(16)]
        pub time: u16,
    }

    /// RX FIFO mailbox identifier register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Rir {
        #[bits(1)]
        _reserved0: u8,
        /// Remote transmission request.
        #[bits(1)]
        pub rtr: bool,
        /// Identifier extension.
        #[bits(1)]
        pub ide: bool,
        /// Extended identifier.
        #[bits(18)]
        pub exid: u32,
        /// Standard identifier.
        #[bits(11)]
        pub stid: u16,
    }

    /// RX FIFO mailbox data length control and time stamp register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Rdtr {
        /// Data length code.
        #[bits(4)]
        pub dlc: u8,
        #[bits(4)]
        _reserved0: u8,
        /// Filter match index.
        #[bits(8)]
        pub fmi: u8,
        /// Message time stamp.
        #[bits(16)]
        pub time: u16,
    }

    /// Filter master register.
    #[bitfield(u32, debug = false, defmt = cfg(feature = "defmt"))]
    pub struct Fmr {
        /// Filter init mode: filters can only be written while set.
        #[bits(1)]
        pub finit: bool,
        #[bits(7)]
        _reserved0: u8,
        /// First bank assigned to the slave (CAN2) instance.
        #[bits(6)]
        pub can2sb: u8,
        #[bits(18)]
        _reserved1: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::regs;

    #[test]
    fn btr_field_placement() {
        let btr = regs::Btr::new()
            .with_brp(15)
            .with_ts1(14)
            .with_ts2(5)
            .with_sjw(0);
        assert_eq!(btr.into_bits(), 0x005E_000F);

        let silent_loopback = regs::Btr::from_bits(btr.into_bits())
            .with_lbkm(true)
            .with_silm(true);
        assert_eq!(silent_loopback.into_bits(), 0xC05E_000F);
    }

    #[test]
    fn tir_encodes_a_standard_identifier() {
        let tir = regs::Tir::new().with_stid(0x1AB).with_txrq(true);
        assert_eq!(tir.into_bits(), (0x1AB << 21) | 1);
        assert!(!tir.ide());
        assert!(!tir.rtr());
    }

    #[test]
    fn tsr_code_and_tme_bits() {
        // All mailboxes empty after reset: TME0..=2 set, CODE = 0.
        let tsr = regs::Tsr::from_bits(0x1C00_0000);
        assert!(tsr.tme0() && tsr.tme1() && tsr.tme2());
        assert_eq!(tsr.code(), 0);

        // Mailboxes 0 and 1 pending: only TME2 remains, CODE points at 2.
        let tsr = regs::Tsr::from_bits(0x1000_0000 | (2 << 24));
        assert!(!tsr.tme0() && !tsr.tme1() && tsr.tme2());
        assert_eq!(tsr.code(), 2);
    }

    #[test]
    fn rfr_flags() {
        let rfr = regs::Rfr::from_bits(0b11_1011);
        assert_eq!(rfr.fmp(), 3);
        assert!(rfr.full());
        assert!(rfr.fovr());
        assert!(rfr.rfom());
    }
}
