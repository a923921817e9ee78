//! Capability trait implemented by anything that can act as the CAN
//! peripheral: the memory-mapped controller on the target, or the in-memory
//! simulator on the host.
//!
//! The [`Transceiver`](crate::Transceiver) owns exactly one implementation
//! and drives it through the one-way lifecycle `configure` → `apply_filter`
//! → `start`; the data-path methods are only reachable afterwards.

use crate::config::{AcceptanceFilter, CanConfig, NominalBitTiming};
use crate::frame::Frame;
use crate::{InitError, TxError};

pub trait CanPeripheral {
    /// Brings the controller into initialization mode and applies bit timing
    /// and feature flags. Out-of-range timing parameters are rejected with
    /// [`InitError::InvalidBitTiming`] before anything is written.
    fn configure(&mut self, timing: &NominalBitTiming, config: &CanConfig)
    -> Result<(), InitError>;

    /// Programs one acceptance filter bank. Must be called after `configure`
    /// and before `start`.
    fn apply_filter(&mut self, filter: &AcceptanceFilter) -> Result<(), InitError>;

    /// Leaves initialization mode and joins the bus. After this the filter
    /// configuration is frozen.
    fn start(&mut self) -> Result<(), InitError>;

    /// Claims a free transmit mailbox and queues `frame`, returning
    /// immediately. [`TxError::MailboxesFull`] means every mailbox is busy;
    /// nothing was queued and nothing blocked.
    fn transmit(&mut self, frame: &Frame) -> Result<(), TxError>;

    /// Number of frames waiting in the receive queue. Free of side effects.
    fn rx_pending(&self) -> u8;

    /// Pops at most one frame from the receive queue. `None` with a non-zero
    /// [`rx_pending`](Self::rx_pending) is a transient inconsistency; callers
    /// skip the poll and retry on the next cycle.
    fn read_rx(&mut self) -> Option<Frame>;
}
