//! Status frame codec
//!
//! The sensor board reports its state as a 2-byte frame: the status byte
//! followed by its bitwise complement. Bit layout (LSB first): door0,
//! door1, cover0, cover1, main supply, ignition; bits 6-7 reserved.
//! Level convention: 0 = opened/off, 1 = closed/on.

/// Frame parity check: the second byte must be the complement of the first.
pub fn validate(status: u8, inv: u8) -> bool {
    status ^ inv == 0xFF
}

/// One validated status byte with bitmask field access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot(u8);

impl StatusSnapshot {
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    /// Level of one field: true = closed/on, false = opened/off.
    pub fn is_set(self, field: StatusField) -> bool {
        self.0 & field.mask() != 0
    }

    /// Changed-bit mask against another snapshot, reserved bits stripped.
    pub fn changed_fields(self, other: StatusSnapshot) -> u8 {
        (self.0 ^ other.0) & StatusField::MEANINGFUL_MASK
    }
}

/// The six meaningful status bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    Door0,
    Door1,
    Cover0,
    Cover1,
    MainSupply,
    Ignition,
}

impl StatusField {
    pub const ALL: [StatusField; 6] = [
        StatusField::Door0,
        StatusField::Door1,
        StatusField::Cover0,
        StatusField::Cover1,
        StatusField::MainSupply,
        StatusField::Ignition,
    ];

    /// Union of all meaningful bits (bits 6-7 reserved).
    pub const MEANINGFUL_MASK: u8 = 0x3F;

    fn bit(self) -> u8 {
        match self {
            StatusField::Door0 => 0,
            StatusField::Door1 => 1,
            StatusField::Cover0 => 2,
            StatusField::Cover1 => 3,
            StatusField::MainSupply => 4,
            StatusField::Ignition => 5,
        }
    }

    pub fn mask(self) -> u8 {
        1 << self.bit()
    }

    /// Door index for the two door bits, `None` otherwise.
    pub fn door_index(self) -> Option<usize> {
        match self {
            StatusField::Door0 => Some(0),
            StatusField::Door1 => Some(1),
            _ => None,
        }
    }

    /// Field for a door index.
    pub fn for_door(door: usize) -> Option<StatusField> {
        match door {
            0 => Some(StatusField::Door0),
            1 => Some(StatusField::Door1),
            _ => None,
        }
    }

    /// Audit-trail wording for a level of this field.
    pub fn describe(self, closed_or_on: bool) -> &'static str {
        match (self, closed_or_on) {
            (StatusField::Door0, false) => "Door 0 open",
            (StatusField::Door0, true) => "Door 0 closed",
            (StatusField::Door1, false) => "Door 1 open",
            (StatusField::Door1, true) => "Door 1 closed",
            (StatusField::Cover0, false) => "Cover 0 open",
            (StatusField::Cover0, true) => "Cover 0 closed",
            (StatusField::Cover1, false) => "Cover 1 open",
            (StatusField::Cover1, true) => "Cover 1 closed",
            (StatusField::MainSupply, false) => "Main supply OFF",
            (StatusField::MainSupply, true) => "Main supply ON",
            (StatusField::Ignition, false) => "Ignition OFF",
            (StatusField::Ignition, true) => "Ignition ON",
        }
    }
}

/// Result of feeding one byte to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// First byte of a frame stored, waiting for the complement
    Incomplete,
    /// A valid frame completed
    Decoded(StatusSnapshot),
    /// Complement check failed; both bytes discarded
    Rejected { status: u8, inv: u8 },
}

/// Two-phase frame decoder.
///
/// Resync on a bad pair simply restarts pairing at the next byte. If the
/// physical layer drops exactly one byte the pairing shifts by one, and a
/// shifted pair still passes the check whenever the stream happens to
/// contain a byte followed by its complement (1 in 256 per drop). The
/// device sends no sentinel byte, so this blind spot cannot be closed at
/// this layer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Option<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one received byte.
    pub fn feed(&mut self, byte: u8) -> FrameEvent {
        match self.pending.take() {
            None => {
                self.pending = Some(byte);
                FrameEvent::Incomplete
            }
            Some(status) => {
                if validate(status, byte) {
                    FrameEvent::Decoded(StatusSnapshot::from_byte(status))
                } else {
                    FrameEvent::Rejected { status, inv: byte }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complement_pairs_validate_for_every_status() {
        for status in 0u8..=255 {
            assert!(validate(status, !status), "status {status:#04x}");
        }
    }

    #[test]
    fn non_complement_pairs_are_rejected() {
        for status in 0u8..=255 {
            for inv in 0u8..=255 {
                if inv != !status {
                    assert!(!validate(status, inv), "{status:#04x}/{inv:#04x}");
                }
            }
        }
    }

    #[test]
    fn decoder_emits_snapshot_on_valid_pair() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(0x03), FrameEvent::Incomplete);
        assert_eq!(
            decoder.feed(0xFC),
            FrameEvent::Decoded(StatusSnapshot::from_byte(0x03))
        );
    }

    #[test]
    fn decoder_rejects_and_resyncs() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(0x03), FrameEvent::Incomplete);
        assert_eq!(
            decoder.feed(0x00),
            FrameEvent::Rejected {
                status: 0x03,
                inv: 0x00
            }
        );
        // Back to no-pending: the next two bytes form a fresh frame
        assert_eq!(decoder.feed(0x3F), FrameEvent::Incomplete);
        assert_eq!(
            decoder.feed(0xC0),
            FrameEvent::Decoded(StatusSnapshot::from_byte(0x3F))
        );
    }

    #[test]
    fn field_masks_cover_low_six_bits() {
        let mut mask = 0u8;
        for field in StatusField::ALL {
            mask |= field.mask();
        }
        assert_eq!(mask, StatusField::MEANINGFUL_MASK);
    }

    #[test]
    fn reserved_bits_never_count_as_changes() {
        let a = StatusSnapshot::from_byte(0x00);
        let b = StatusSnapshot::from_byte(0xC0); // both reserved bits flipped
        assert_eq!(a.changed_fields(b), 0);
    }

    #[test]
    fn snapshot_levels_follow_bit_layout() {
        let snap = StatusSnapshot::from_byte(0b0001_0101);
        assert!(snap.is_set(StatusField::Door0));
        assert!(!snap.is_set(StatusField::Door1));
        assert!(snap.is_set(StatusField::Cover0));
        assert!(!snap.is_set(StatusField::Cover1));
        assert!(snap.is_set(StatusField::MainSupply));
        assert!(!snap.is_set(StatusField::Ignition));
    }
}
