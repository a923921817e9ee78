//! Portable transceiver core: owns the peripheral, tracks traffic, and
//! exposes the send / poll-receive surface the application loop drives.

use crate::beacon;
use crate::config::{AcceptanceFilter, CanConfig, NominalBitTiming};
use crate::frame::Frame;
use crate::peripheral::CanPeripheral;
use crate::{InitError, TxError};

/// Frames moved since initialization. Both counters only ever increase and
/// wrap at the integer boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrafficCounters {
    /// Frames accepted into a transmit mailbox.
    pub sent: u32,
    /// Frames drained from the receive queue.
    pub received: u32,
}

/// A started CAN node bound to one peripheral instance.
///
/// Construction goes through [`Transceiver::initialize`], which consumes the
/// peripheral and runs the one-way bring-up sequence; there is no shutdown or
/// re-initialization path. All receive work happens in [`poll_receive`]
/// calls from the application loop; nothing here blocks.
///
/// [`poll_receive`]: Transceiver::poll_receive
pub struct Transceiver<P: CanPeripheral> {
    can: P,
    counters: TrafficCounters,
    last_sent: Option<Frame>,
    last_received: Option<Frame>,
}

impl<P: CanPeripheral> Transceiver<P> {
    /// Applies bit timing and feature flags, installs the acceptance filter,
    /// and starts the controller.
    ///
    /// Any error is fatal for this peripheral: it is consumed either way and
    /// no half-initialized transceiver is observable.
    pub fn initialize(
        mut can: P,
        timing: NominalBitTiming,
        config: CanConfig,
        filter: AcceptanceFilter,
    ) -> Result<Self, InitError> {
        can.configure(&timing, &config)?;
        can.apply_filter(&filter)?;
        can.start()?;
        Ok(Self {
            can,
            counters: TrafficCounters::default(),
            last_sent: None,
            last_received: None,
        })
    }

    /// Queues a beacon frame carrying `payload` on [`beacon::BEACON_ID`].
    ///
    /// The payload bytes are taken as-is; their layout is a contract between
    /// sender and receiver, not enforced here. Fails fast with
    /// [`TxError::MailboxesFull`] when all mailboxes are busy (the caller may
    /// simply retry on a later cycle) and with [`TxError::InvalidLength`]
    /// when `payload` exceeds 8 bytes.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), TxError> {
        let frame = Frame::new(beacon::BEACON_ID, payload).ok_or(TxError::InvalidLength)?;
        self.transmit_frame(&frame)
    }

    /// Encodes `celsius` per the beacon wire format and sends it.
    pub fn send_temperature(&mut self, celsius: f32) -> Result<(), TxError> {
        self.send(&beacon::encode_temperature(celsius))
    }

    /// Drains at most one frame from the receive queue.
    ///
    /// Returns `None` when the queue is empty; polling an idle bus any
    /// number of times changes no state. A queue that reports frames but
    /// fails to produce one is treated as a transient glitch: the poll is
    /// skipped with no error and no sticky state, and the next call starts
    /// fresh.
    pub fn poll_receive(&mut self) -> Option<Frame> {
        if self.can.rx_pending() == 0 {
            return None;
        }
        let frame = self.can.read_rx()?;
        self.counters.received = self.counters.received.wrapping_add(1);
        self.last_received = Some(frame);
        Some(frame)
    }

    /// Snapshot of the traffic counters.
    pub fn counters(&self) -> TrafficCounters {
        self.counters
    }

    /// The most recently transmitted frame, if any.
    pub fn last_sent(&self) -> Option<&Frame> {
        self.last_sent.as_ref()
    }

    /// The most recently received frame, if any.
    pub fn last_received(&self) -> Option<&Frame> {
        self.last_received.as_ref()
    }

    /// Direct access to the backing peripheral, for diagnostics.
    pub fn peripheral(&self) -> &P {
        &self.can
    }

    /// Mutable access to the backing peripheral, for diagnostics and test
    /// harnesses.
    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.can
    }

    fn transmit_frame(&mut self, frame: &Frame) -> Result<(), TxError> {
        self.can.transmit(frame)?;
        self.counters.sent = self.counters.sent.wrapping_add(1);
        self.last_sent = Some(*frame);
        Ok(())
    }

    #[cfg(test)]
    fn counters_mut(&mut self) -> &mut TrafficCounters {
        &mut self.counters
    }
}

impl<P: CanPeripheral> embedded_can::nb::Can for Transceiver<P> {
    type Frame = Frame;
    type Error = TxError;

    /// Pass-through transmission of an arbitrary standard-identifier frame.
    /// Mailbox saturation maps to [`nb::Error::WouldBlock`]; nothing is ever
    /// dequeued to make room, so the replaced-frame slot is always `None`.
    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        match self.transmit_frame(frame) {
            Ok(()) => Ok(None),
            Err(TxError::MailboxesFull) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        self.poll_receive().ok_or(nb::Error::WouldBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StandardId;
    use crate::sim::SimCan;

    fn started() -> Transceiver<SimCan> {
        Transceiver::initialize(
            SimCan::new(),
            NominalBitTiming::default(),
            CanConfig::default(),
            AcceptanceFilter::accept_all(),
        )
        .unwrap()
    }

    #[test]
    fn send_uses_the_beacon_identifier() {
        let mut node = started();
        node.send(&[0xC3, 0x01, 0x02]).unwrap();
        let sent = node.last_sent().unwrap();
        assert_eq!(sent.id(), beacon::BEACON_ID);
        assert_eq!(sent.data(), &[0xC3, 0x01, 0x02]);
        assert_eq!(node.counters().sent, 1);
    }

    #[test]
    fn oversized_payload_is_rejected_before_the_peripheral() {
        let mut node = started();
        assert_eq!(node.send(&[0; 9]), Err(TxError::InvalidLength));
        assert_eq!(node.counters().sent, 0);
        assert!(node.peripheral().sent_frames().is_empty());
    }

    #[test]
    fn counters_wrap_at_the_integer_boundary() {
        let mut node = started();
        node.counters_mut().sent = u32::MAX;
        node.send(&[]).unwrap();
        assert_eq!(node.counters().sent, 0);
    }

    #[test]
    fn nb_adapter_maps_saturation_to_would_block() {
        use embedded_can::nb::Can;

        let mut node = started();
        node.peripheral_mut().occupy_mailboxes(3);
        let frame = Frame::new(StandardId::new(0x300).unwrap(), &[1]).unwrap();
        assert_eq!(node.transmit(&frame), Err(nb::Error::WouldBlock));
        assert_eq!(node.receive(), Err(nb::Error::WouldBlock));

        node.peripheral_mut().release_mailboxes();
        assert_eq!(node.transmit(&frame), Ok(None));
        assert_eq!(node.counters().sent, 1);
    }
}
