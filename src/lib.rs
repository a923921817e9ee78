//! Polled classic-CAN transceiver node.
//!
//! The crate is split at the [`CanPeripheral`] capability trait: above it,
//! [`Transceiver`] implements the node logic (one-way initialization, fail-fast
//! transmit on a fixed beacon identifier, one-frame-per-poll receive, wrapping
//! traffic counters); below it sit two interchangeable backends, the in-memory
//! [`SimCan`] driving the host test suite and, behind the `f4` feature, the
//! register-level [`bxcan::BxCan`] backend for CAN1 on an STM32F4.
//!
//! Nothing in the data path blocks: `send` reports saturated mailboxes instead
//! of waiting and `poll_receive` returns immediately on an empty queue, so the
//! whole surface can be driven from a single cooperative loop.

#![no_std]

pub mod beacon;
pub mod config;
pub mod frame;
pub mod peripheral;
pub mod sim;
pub mod transceiver;

pub mod pac;
pub(crate) mod util;

#[cfg(feature = "f4")]
pub mod bxcan;

pub use config::{AcceptanceFilter, CanConfig, CanMode, NominalBitTiming, RxFifo};
pub use frame::{Frame, StandardId};
pub use peripheral::CanPeripheral;
pub use sim::SimCan;
pub use transceiver::{TrafficCounters, Transceiver};

#[cfg(feature = "f4")]
pub use bxcan::BxCan;

/// Fatal initialization failure. There is no software fallback bus and no
/// re-init path, so callers treat any of these as the end of normal operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// A bit-timing parameter is outside the range the hardware can encode.
    InvalidBitTiming,
    /// The acceptance filter names a bank the instance does not have.
    InvalidFilter,
    /// The peripheral did not acknowledge an init-mode handshake within the
    /// configured busy-wait budget.
    Timeout,
    /// The take-once peripheral handle was already claimed.
    PeripheralTaken,
    /// `start` was requested before the controller was configured.
    NotConfigured,
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidBitTiming => write!(f, "bit-timing parameter out of range"),
            Self::InvalidFilter => write!(f, "acceptance filter bank out of range"),
            Self::Timeout => write!(f, "peripheral not responding"),
            Self::PeripheralTaken => write!(f, "peripheral already taken"),
            Self::NotConfigured => write!(f, "start requested before configuration"),
        }
    }
}

/// Transmit failure. `MailboxesFull` is transient: nothing was queued and the
/// caller may simply retry on a later loop cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// Every hardware transmit mailbox is occupied.
    MailboxesFull,
    /// The payload exceeds the 8 bytes a classic CAN frame can carry.
    InvalidLength,
}

impl core::fmt::Display for TxError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MailboxesFull => write!(f, "all transmit mailboxes are busy"),
            Self::InvalidLength => write!(f, "payload exceeds 8 bytes"),
        }
    }
}

impl embedded_can::Error for TxError {
    fn kind(&self) -> embedded_can::ErrorKind {
        match self {
            Self::MailboxesFull | Self::InvalidLength => embedded_can::ErrorKind::Other,
        }
    }
}
