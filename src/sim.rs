//! In-memory stand-in for the CAN controller.
//!
//! `SimCan` implements [`CanPeripheral`] with the same observable behaviour
//! as the hardware backend: three transmit mailboxes, a three-deep receive
//! FIFO behind the acceptance filter, and the same lifecycle ordering rules.
//! Test harnesses script the awkward situations that are hard to provoke on
//! a real bus, such as saturated mailboxes and transient read glitches.

use crate::config::{AcceptanceFilter, CanConfig, NominalBitTiming};
use crate::frame::{Frame, StandardId};
use crate::peripheral::CanPeripheral;
use crate::{InitError, TxError};

const TX_MAILBOX_COUNT: usize = 3;
const RX_FIFO_DEPTH: usize = 3;
const TX_LOG_DEPTH: usize = 8;

const EMPTY_FRAME: Frame = match Frame::new_remote(StandardId::ZERO, 0) {
    Some(frame) => frame,
    None => unreachable!(),
};

/// Simulated CAN controller for host tests.
#[derive(Debug)]
pub struct SimCan {
    timing: Option<NominalBitTiming>,
    config: Option<CanConfig>,
    filter: Option<AcceptanceFilter>,
    started: bool,
    parked: [bool; TX_MAILBOX_COUNT],
    tx_log: [Frame; TX_LOG_DEPTH],
    tx_len: usize,
    rx_fifo: [Frame; RX_FIFO_DEPTH],
    rx_len: usize,
    failing_reads: u8,
}

impl SimCan {
    pub const fn new() -> Self {
        Self {
            timing: None,
            config: None,
            filter: None,
            started: false,
            parked: [false; TX_MAILBOX_COUNT],
            tx_log: [EMPTY_FRAME; TX_LOG_DEPTH],
            tx_len: 0,
            rx_fifo: [EMPTY_FRAME; RX_FIFO_DEPTH],
            rx_len: 0,
            failing_reads: 0,
        }
    }

    /// Presents `frame` to the controller as bus traffic.
    ///
    /// The frame passes through the installed acceptance filter and, if
    /// accepted, enters the receive FIFO. Returns whether the frame was
    /// stored. A full unlocked FIFO overwrites its newest pending entry, as
    /// the hardware does; a locked FIFO discards the incoming frame.
    pub fn inject(&mut self, frame: Frame) -> bool {
        if !self.started {
            return false;
        }
        let accepted = match &self.filter {
            Some(filter) => filter.matches(&frame),
            None => false,
        };
        if !accepted {
            return false;
        }
        if self.rx_len == RX_FIFO_DEPTH {
            let locked = self.config.is_some_and(|c| c.receive_fifo_locked);
            if locked {
                return false;
            }
            self.rx_fifo[RX_FIFO_DEPTH - 1] = frame;
            return true;
        }
        self.rx_fifo[self.rx_len] = frame;
        self.rx_len += 1;
        true
    }

    /// Parks the first `count` transmit mailboxes busy, so that transmit
    /// attempts see a (partially) saturated peripheral.
    pub fn occupy_mailboxes(&mut self, count: usize) {
        for (idx, slot) in self.parked.iter_mut().enumerate() {
            *slot = idx < count;
        }
    }

    /// Frees every parked mailbox.
    pub fn release_mailboxes(&mut self) {
        self.parked = [false; TX_MAILBOX_COUNT];
    }

    /// Arms `count` transient read failures: the fill level stays truthful
    /// but the next `count` reads come back empty-handed.
    pub fn fail_next_read(&mut self, count: u8) {
        self.failing_reads = count;
    }

    /// Frames that completed transmission, oldest first. Only the most
    /// recent eight are kept.
    pub fn sent_frames(&self) -> &[Frame] {
        &self.tx_log[..self.tx_len]
    }

    pub fn timing(&self) -> Option<NominalBitTiming> {
        self.timing
    }

    pub fn config(&self) -> Option<CanConfig> {
        self.config
    }

    pub fn filter(&self) -> Option<AcceptanceFilter> {
        self.filter
    }

    pub fn started(&self) -> bool {
        self.started
    }

    fn log_transmit(&mut self, frame: Frame) {
        if self.tx_len == TX_LOG_DEPTH {
            self.tx_log.copy_within(1.., 0);
            self.tx_len -= 1;
        }
        self.tx_log[self.tx_len] = frame;
        self.tx_len += 1;
    }
}

impl Default for SimCan {
    fn default() -> Self {
        Self::new()
    }
}

impl CanPeripheral for SimCan {
    fn configure(
        &mut self,
        timing: &NominalBitTiming,
        config: &CanConfig,
    ) -> Result<(), InitError> {
        if !timing.validate() {
            return Err(InitError::InvalidBitTiming);
        }
        self.timing = Some(*timing);
        self.config = Some(*config);
        Ok(())
    }

    fn apply_filter(&mut self, filter: &AcceptanceFilter) -> Result<(), InitError> {
        if !filter.is_valid() {
            return Err(InitError::InvalidFilter);
        }
        self.filter = Some(*filter);
        Ok(())
    }

    fn start(&mut self) -> Result<(), InitError> {
        if self.timing.is_none() {
            return Err(InitError::NotConfigured);
        }
        self.started = true;
        Ok(())
    }

    fn transmit(&mut self, frame: &Frame) -> Result<(), TxError> {
        // Lowest-index free mailbox wins; the simulated bus accepts every
        // frame instantly, so unparked mailboxes never stay busy.
        let free = self.parked.iter().position(|parked| !parked);
        match free {
            Some(_) => {
                self.log_transmit(*frame);
                Ok(())
            }
            None => Err(TxError::MailboxesFull),
        }
    }

    fn rx_pending(&self) -> u8 {
        self.rx_len as u8
    }

    fn read_rx(&mut self) -> Option<Frame> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return None;
        }
        if self.rx_len == 0 {
            return None;
        }
        let frame = self.rx_fifo[0];
        self.rx_fifo.copy_within(1.., 0);
        self.rx_len -= 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_sim() -> SimCan {
        let mut sim = SimCan::new();
        sim.configure(&NominalBitTiming::default(), &CanConfig::default())
            .unwrap();
        sim.apply_filter(&AcceptanceFilter::accept_all()).unwrap();
        sim.start().unwrap();
        sim
    }

    fn frame(raw_id: u16, data: &[u8]) -> Frame {
        Frame::new(StandardId::new(raw_id).unwrap(), data).unwrap()
    }

    #[test]
    fn fifo_preserves_arrival_order() {
        let mut sim = started_sim();
        assert!(sim.inject(frame(0x100, &[1])));
        assert!(sim.inject(frame(0x200, &[2])));
        assert_eq!(sim.rx_pending(), 2);
        assert_eq!(sim.read_rx().unwrap().data(), &[1]);
        assert_eq!(sim.read_rx().unwrap().data(), &[2]);
        assert_eq!(sim.rx_pending(), 0);
    }

    #[test]
    fn unlocked_fifo_overwrites_newest_on_overrun() {
        let mut sim = started_sim();
        for n in 1..=4u8 {
            assert!(sim.inject(frame(0x100, &[n])));
        }
        assert_eq!(sim.rx_pending(), 3);
        assert_eq!(sim.read_rx().unwrap().data(), &[1]);
        assert_eq!(sim.read_rx().unwrap().data(), &[2]);
        assert_eq!(sim.read_rx().unwrap().data(), &[4]);
    }

    #[test]
    fn locked_fifo_discards_incoming_on_overrun() {
        let mut sim = SimCan::new();
        let config = CanConfig::default().set_receive_fifo_locked(true);
        sim.configure(&NominalBitTiming::default(), &config).unwrap();
        sim.apply_filter(&AcceptanceFilter::accept_all()).unwrap();
        sim.start().unwrap();

        for n in 1..=3u8 {
            assert!(sim.inject(frame(0x100, &[n])));
        }
        assert!(!sim.inject(frame(0x100, &[4])));
        assert_eq!(sim.read_rx().unwrap().data(), &[1]);
        assert_eq!(sim.read_rx().unwrap().data(), &[2]);
        assert_eq!(sim.read_rx().unwrap().data(), &[3]);
    }

    #[test]
    fn nothing_is_received_before_start() {
        let mut sim = SimCan::new();
        sim.configure(&NominalBitTiming::default(), &CanConfig::default())
            .unwrap();
        sim.apply_filter(&AcceptanceFilter::accept_all()).unwrap();
        assert!(!sim.inject(frame(0x100, &[])));
        assert_eq!(sim.start(), Ok(()));
        assert!(sim.inject(frame(0x100, &[])));
    }

    #[test]
    fn armed_read_failures_expire() {
        let mut sim = started_sim();
        sim.inject(frame(0x100, &[7]));
        sim.fail_next_read(2);
        assert_eq!(sim.rx_pending(), 1);
        assert_eq!(sim.read_rx(), None);
        assert_eq!(sim.read_rx(), None);
        assert_eq!(sim.read_rx().unwrap().data(), &[7]);
    }
}
