//! Controller configuration: bit timing, feature flags, acceptance filtering.

use crate::frame::{Frame, StandardId};
use core::num::{NonZeroU8, NonZeroU16};

/// Number of filter banks available to the instance.
pub const FILTER_BANK_COUNT: u8 = 28;

// Identifier layout inside a 32-bit filter/mailbox register.
const STANDARD_ID_SHIFT: u32 = 21;
const IDE_BIT: u32 = 1 << 2;
const RTR_BIT: u32 = 1 << 1;

/// Configures the bit timings.
///
/// You can use <http://www.bittiming.can-wiki.info/> to calculate these
/// parameters. Enter the clock rate of the peripheral bus the controller is
/// attached to (APB1, *not* the CPU clock speed), leave the sample point at
/// the default 87.5%, and copy the prescaler and segment values from the
/// table row for the desired bit rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NominalBitTiming {
    /// Value by which the peripheral clock is divided for generating the bit
    /// time quanta. The bit time is built up from a multiple of this quanta.
    /// Valid values are 1 to 1024.
    pub prescaler: NonZeroU16,
    /// Time segment before the sample point. Valid values are 1 to 16.
    pub seg1: NonZeroU8,
    /// Time segment after the sample point. Valid values are 1 to 8.
    pub seg2: NonZeroU8,
    /// Synchronization jump width. Valid values are 1 to 4.
    pub sync_jump_width: NonZeroU8,
}

impl NominalBitTiming {
    // Hardware encoding: each field holds value − 1.
    #[inline]
    pub(crate) const fn brp(&self) -> u16 {
        (self.prescaler.get() - 1) & 0x3FF
    }
    #[inline]
    pub(crate) const fn ts1(&self) -> u8 {
        (self.seg1.get() - 1) & 0xF
    }
    #[inline]
    pub(crate) const fn ts2(&self) -> u8 {
        (self.seg2.get() - 1) & 0x7
    }
    #[inline]
    pub(crate) const fn sjw(&self) -> u8 {
        (self.sync_jump_width.get() - 1) & 0x3
    }

    /// Checks every parameter against the ranges the hardware can encode.
    #[inline]
    pub const fn validate(&self) -> bool {
        self.prescaler.get() <= 1024
            && self.seg1.get() <= 16
            && self.seg2.get() <= 8
            && self.sync_jump_width.get() <= 4
    }

    /// The timing portion of the bit-timing register image, mode bits left
    /// clear.
    #[inline]
    pub const fn register_value(&self) -> u32 {
        self.brp() as u32
            | (self.ts1() as u32) << 16
            | (self.ts2() as u32) << 20
            | (self.sjw() as u32) << 24
    }

    /// Resulting bit rate for a given peripheral clock, in bit/s.
    #[inline]
    pub const fn bit_rate(&self, pclk_hz: u32) -> u32 {
        let quanta = 1 + self.seg1.get() as u32 + self.seg2.get() as u32;
        pclk_hz / (self.prescaler.get() as u32 * quanta)
    }
}

impl Default for NominalBitTiming {
    /// 125 kbit/s from a 45 MHz APB1 clock, sample point at 72.7%.
    /// Corresponds to a bit-timing register value of 0x005E_000F.
    #[inline]
    fn default() -> Self {
        Self {
            prescaler: NonZeroU16::new(16).unwrap(),
            seg1: NonZeroU8::new(15).unwrap(),
            seg2: NonZeroU8::new(6).unwrap(),
            sync_jump_width: NonZeroU8::new(1).unwrap(),
        }
    }
}

/// Test and listen modes of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanMode {
    /// Transmit and receive on the bus.
    Normal,
    /// Receive only; the transmit pin stays recessive.
    Silent,
    /// Transmitted frames loop back into the receiver and also reach the bus.
    Loopback,
    /// Loopback with the transmit pin held recessive; fully bus-neutral.
    SilentLoopback,
}

impl CanMode {
    /// `(lbkm, silm)` bits for the bit-timing register.
    #[inline]
    pub(crate) const fn bits(self) -> (bool, bool) {
        match self {
            CanMode::Normal => (false, false),
            CanMode::Silent => (false, true),
            CanMode::Loopback => (true, false),
            CanMode::SilentLoopback => (true, true),
        }
    }
}

/// Receive FIFO selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifo {
    Fifo0,
    Fifo1,
}

impl RxFifo {
    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            RxFifo::Fifo0 => 0,
            RxFifo::Fifo1 => 1,
        }
    }
}

/// Controller feature flags, applied while the peripheral is held in
/// initialization mode.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanConfig {
    /// Enables or disables automatic retransmission of messages.
    ///
    /// If this is enabled, the peripheral will automatically try to
    /// retransmit each frame until it wins arbitration and is acknowledged.
    /// Otherwise it will try only once to send each frame.
    ///
    /// Automatic retransmission is enabled by default.
    pub automatic_retransmission: bool,
    /// Time-triggered communication mode. Disabled by default.
    pub time_triggered_mode: bool,
    /// Leave bus-off automatically once 128 occurrences of 11 recessive bits
    /// have been monitored. Disabled by default.
    pub automatic_bus_off_recovery: bool,
    /// Wake up automatically on bus activity. Disabled by default.
    pub automatic_wakeup: bool,
    /// Lock the receive FIFO against overwrite when full: new frames are
    /// discarded instead of replacing the newest pending one. Disabled by
    /// default.
    pub receive_fifo_locked: bool,
    /// Drain the transmit mailboxes in request order rather than identifier
    /// priority. Disabled by default.
    pub transmit_fifo_priority: bool,
    /// Bus mode. `Normal` by default.
    pub mode: CanMode,
    /// How long to busy-wait on the initialization and start handshakes
    /// before reporting the peripheral unresponsive.
    pub timeout_iterations: u32,
}

impl CanConfig {
    /// Enables or disables automatic retransmission. See
    /// [`CanConfig::automatic_retransmission`].
    #[inline]
    pub const fn set_automatic_retransmission(mut self, enabled: bool) -> Self {
        self.automatic_retransmission = enabled;
        self
    }

    /// Enables or disables time-triggered communication mode.
    #[inline]
    pub const fn set_time_triggered_mode(mut self, enabled: bool) -> Self {
        self.time_triggered_mode = enabled;
        self
    }

    /// Enables or disables automatic bus-off recovery.
    #[inline]
    pub const fn set_automatic_bus_off_recovery(mut self, enabled: bool) -> Self {
        self.automatic_bus_off_recovery = enabled;
        self
    }

    /// Enables or disables automatic wakeup on bus activity.
    #[inline]
    pub const fn set_automatic_wakeup(mut self, enabled: bool) -> Self {
        self.automatic_wakeup = enabled;
        self
    }

    /// Locks or unlocks the receive FIFO against overwrite when full.
    #[inline]
    pub const fn set_receive_fifo_locked(mut self, locked: bool) -> Self {
        self.receive_fifo_locked = locked;
        self
    }

    /// Selects request-order transmit draining instead of identifier
    /// priority.
    #[inline]
    pub const fn set_transmit_fifo_priority(mut self, enabled: bool) -> Self {
        self.transmit_fifo_priority = enabled;
        self
    }

    /// Sets the bus mode.
    #[inline]
    pub const fn set_mode(mut self, mode: CanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the handshake busy-wait budget.
    #[inline]
    pub const fn set_timeout_iterations(mut self, iterations: u32) -> Self {
        self.timeout_iterations = iterations;
        self
    }
}

impl Default for CanConfig {
    #[inline]
    fn default() -> Self {
        Self {
            automatic_retransmission: true,
            time_triggered_mode: false,
            automatic_bus_off_recovery: false,
            automatic_wakeup: false,
            receive_fifo_locked: false,
            transmit_fifo_priority: false,
            mode: CanMode::Normal,
            timeout_iterations: 1_000_000,
        }
    }
}

/// One acceptance filter bank in 32-bit identifier-mask mode.
///
/// `id` and `mask` hold raw register images laid out as
/// `STID[31:21] EXID[20:3] IDE RTR 0`. A frame is accepted when its image
/// matches `id` on every bit set in `mask`; an all-zero mask therefore
/// accepts every frame on the bus.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcceptanceFilter {
    /// Filter bank index, 0 to [`FILTER_BANK_COUNT`] − 1.
    pub bank: u8,
    /// Identifier image to match against.
    pub id: u32,
    /// Bits of `id` that must match.
    pub mask: u32,
    /// Receive FIFO the bank routes accepted frames into.
    pub fifo: RxFifo,
    /// Whether the bank is active.
    pub enabled: bool,
}

impl AcceptanceFilter {
    /// A wide-open filter: bank 0, all-zero mask, routed to FIFO 0. Every
    /// identifier on the bus is accepted.
    #[inline]
    pub const fn accept_all() -> Self {
        Self {
            bank: 0,
            id: 0,
            mask: 0,
            fifo: RxFifo::Fifo0,
            enabled: true,
        }
    }

    /// Accepts standard-identifier data and remote frames whose identifier
    /// matches `id` on the bits set in `mask`. The IDE bit participates in
    /// the comparison, so extended frames never pass.
    #[inline]
    pub fn standard(id: StandardId, mask: u16) -> Self {
        Self {
            bank: 0,
            id: (id.as_raw() as u32) << STANDARD_ID_SHIFT,
            mask: ((mask as u32 & 0x7FF) << STANDARD_ID_SHIFT) | IDE_BIT,
            fifo: RxFifo::Fifo0,
            enabled: true,
        }
    }

    /// Moves the filter to a different bank.
    #[inline]
    pub const fn set_bank(mut self, bank: u8) -> Self {
        self.bank = bank;
        self
    }

    /// Routes accepted frames to the given FIFO.
    #[inline]
    pub const fn set_fifo(mut self, fifo: RxFifo) -> Self {
        self.fifo = fifo;
        self
    }

    #[inline]
    pub(crate) const fn is_valid(&self) -> bool {
        self.bank < FILTER_BANK_COUNT
    }

    /// The matching rule the silicon applies: compare the frame's register
    /// image against `id` on the bits set in `mask`.
    #[inline]
    pub fn matches(&self, frame: &Frame) -> bool {
        self.enabled && (frame_image(frame) ^ self.id) & self.mask == 0
    }
}

/// Register image of a standard-identifier frame, as the filter comparator
/// sees it.
fn frame_image(frame: &Frame) -> u32 {
    let rtr = if frame.is_remote() { RTR_BIT } else { 0 };
    ((frame.id().as_raw() as u32) << STANDARD_ID_SHIFT) | rtr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(prescaler: u16, seg1: u8, seg2: u8, sjw: u8) -> NominalBitTiming {
        NominalBitTiming {
            prescaler: NonZeroU16::new(prescaler).unwrap(),
            seg1: NonZeroU8::new(seg1).unwrap(),
            seg2: NonZeroU8::new(seg2).unwrap(),
            sync_jump_width: NonZeroU8::new(sjw).unwrap(),
        }
    }

    #[test]
    fn default_timing_register_image() {
        assert_eq!(NominalBitTiming::default().register_value(), 0x005E_000F);
    }

    #[test]
    fn timing_validation_ranges() {
        assert!(NominalBitTiming::default().validate());
        assert!(timing(1024, 16, 8, 4).validate());
        assert!(!timing(1025, 16, 8, 4).validate());
        assert!(!timing(16, 17, 6, 1).validate());
        assert!(!timing(16, 15, 9, 1).validate());
        assert!(!timing(16, 15, 6, 5).validate());
    }

    #[test]
    fn bit_rate_from_apb1_clock() {
        // 45 MHz / (16 * (1 + 15 + 6)) = 127841 bit/s with integer division.
        assert_eq!(NominalBitTiming::default().bit_rate(45_000_000), 127_841);
        // 36 MHz / (18 * (1 + 13 + 2)) = 125 kbit/s exactly.
        assert_eq!(timing(18, 13, 2, 1).bit_rate(36_000_000), 125_000);
    }

    #[test]
    fn open_filter_accepts_any_identifier() {
        let filter = AcceptanceFilter::accept_all();
        for raw in [0x000, 0x1AB, 0x7FF] {
            let frame = Frame::new(StandardId::new(raw).unwrap(), &[]).unwrap();
            assert!(filter.matches(&frame), "id {raw:#x} should pass");
        }
    }

    #[test]
    fn standard_filter_honours_mask() {
        let id = StandardId::new(0x1AB).unwrap();
        let exact = AcceptanceFilter::standard(id, 0x7FF);
        assert!(exact.matches(&Frame::new(id, &[1]).unwrap()));
        let other = StandardId::new(0x1AA).unwrap();
        assert!(!exact.matches(&Frame::new(other, &[1]).unwrap()));

        // Masking out the low three bits groups 0x1A8..=0x1AF together.
        let group = AcceptanceFilter::standard(id, 0x7F8);
        assert!(group.matches(&Frame::new(other, &[]).unwrap()));
        let outside = StandardId::new(0x1B0).unwrap();
        assert!(!group.matches(&Frame::new(outside, &[]).unwrap()));
    }

    #[test]
    fn disabled_filter_rejects_everything() {
        let mut filter = AcceptanceFilter::accept_all();
        filter.enabled = false;
        let frame = Frame::new(StandardId::new(0x1AB).unwrap(), &[]).unwrap();
        assert!(!filter.matches(&frame));
    }
}
