//! Classic CAN frame value type.
//!
//! Frames are plain values: building one performs no hardware access, so the
//! portable core and the host tests can construct and compare them freely.

use embedded_can::Id;
pub use embedded_can::StandardId;

/// One classic CAN frame with an 11-bit identifier.
///
/// Payload length is 0..=8 bytes; constructors reject anything longer.
/// Remote frames carry a DLC but no payload bytes.
#[derive(Debug, Copy, Clone)]
pub struct Frame {
    id: StandardId,
    data: [u8; 8],
    len: u8,
    remote: bool,
}

impl Frame {
    /// Creates a data frame. Returns `None` if `data` exceeds 8 bytes.
    pub fn new(id: StandardId, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut bytes = [0; 8];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            data: bytes,
            len: data.len() as u8,
            remote: false,
        })
    }

    /// Creates a remote frame requesting `dlc` bytes. Returns `None` if
    /// `dlc` exceeds 8.
    pub const fn new_remote(id: StandardId, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id,
            data: [0; 8],
            len: dlc as u8,
            remote: true,
        })
    }

    /// The 11-bit identifier.
    pub const fn id(&self) -> StandardId {
        self.id
    }

    /// The payload bytes. Empty for remote frames.
    pub fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..self.len as usize]
        }
    }

    /// Data length code, 0..=8.
    pub const fn dlc(&self) -> usize {
        self.len as usize
    }

    pub const fn is_remote(&self) -> bool {
        self.remote
    }

    pub const fn is_data(&self) -> bool {
        !self.remote
    }
}

/// Compares identifier, frame kind, and the visible payload; padding bytes
/// beyond the DLC do not participate.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.remote == other.remote
            && self.len == other.len
            && self.data() == other.data()
    }
}

impl Eq for Frame {}

#[cfg(feature = "defmt")]
impl defmt::Format for Frame {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Frame {{ id: {=u16:#x}, dlc: {=u8}, remote: {=bool} }}",
            self.id.as_raw(),
            self.len,
            self.remote,
        );
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => Frame::new(id, data),
            // 29-bit identifiers are outside this controller configuration.
            Id::Extended(_) => None,
        }
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => Frame::new_remote(id, dlc),
            Id::Extended(_) => None,
        }
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        Id::Standard(self.id)
    }

    fn dlc(&self) -> usize {
        self.len as usize
    }

    fn data(&self) -> &[u8] {
        Frame::data(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_lengths() {
        let id = StandardId::new(0x123).unwrap();
        for len in 0..=8 {
            let payload = [0xA5; 8];
            let frame = Frame::new(id, &payload[..len]).unwrap();
            assert_eq!(frame.dlc(), len);
            assert_eq!(frame.data(), &payload[..len]);
            assert!(frame.is_data());
        }
        assert!(Frame::new(id, &[0; 9]).is_none());
    }

    #[test]
    fn remote_frame_has_no_data() {
        let id = StandardId::new(0x7FF).unwrap();
        let frame = Frame::new_remote(id, 4).unwrap();
        assert!(frame.is_remote());
        assert_eq!(frame.dlc(), 4);
        assert_eq!(frame.data(), &[]);
        assert!(Frame::new_remote(id, 9).is_none());
    }

    #[test]
    fn equality_ignores_padding() {
        let id = StandardId::new(0x1AB).unwrap();
        let a = Frame::new(id, &[1, 2, 3]).unwrap();
        let b = Frame::new(id, &[1, 2, 3, 0, 0]).unwrap();
        assert_eq!(a, Frame::new(id, &[1, 2, 3]).unwrap());
        // Same bytes, different DLC: distinct frames.
        assert_ne!(a, b);
    }

    #[test]
    fn extended_ids_are_rejected() {
        use embedded_can::{ExtendedId, Frame as _};
        let id = ExtendedId::new(0x1FFF_FFFF).unwrap();
        assert!(<Frame as embedded_can::Frame>::new(id, &[0]).is_none());
    }
}
