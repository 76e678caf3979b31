//! Touch controller register maps and report decoding

use super::TouchBounds;

/// Register-model controller (2.71").
pub mod register_model {
    /// Number of fingers on the panel, 1 byte.
    pub const FINGER_COUNT: u8 = 0x10;
    /// First finger report, [`REPORT_LEN`] bytes.
    pub const REPORT: u8 = 0x11;
    /// Controller configuration including the coordinate bounds.
    pub const CONFIG: u8 = 0x20;

    /// Length of a finger report.
    pub const REPORT_LEN: usize = 5;
    /// Length of the configuration block.
    pub const CONFIG_LEN: usize = 10;
    /// Report status bit: finger down.
    pub const STATUS_TOUCH: u8 = 0x80;
    /// Largest finger count the controller reports.
    pub const MAX_FINGERS: u8 = 2;

    /// Reset pulse: high, low, high, in milliseconds.
    pub const RESET_MS: [u32; 3] = [100, 100, 100];
}

/// Interrupt-model controller (3.70").
pub mod interrupt_model {
    /// Start of the report block.
    pub const REPORT: u8 = 0x00;
    /// Header plus one finger.
    pub const REPORT_LEN: usize = 3 + 6;
    /// Touch id reported when the slot holds no finger.
    pub const INVALID_ID: u8 = 0x0F;
    /// Settling time between the interrupt and the report read.
    pub const REPORT_DELAY_MS: u32 = 10;

    /// Reset pulse: high, low, high, in milliseconds.
    pub const RESET_MS: [u32; 3] = [10, 10, 1000];
}

/// Decoded register-model finger report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterReport {
    /// Finger still down.
    pub touching: bool,
    /// Raw X.
    pub x: u16,
    /// Raw Y.
    pub y: u16,
}

/// `status, x_hi, x_lo, y_hi, y_lo`
pub fn decode_register_report(report: [u8; register_model::REPORT_LEN]) -> RegisterReport {
    let [status, x_hi, x_lo, y_hi, y_lo] = report;
    RegisterReport {
        touching: status & register_model::STATUS_TOUCH != 0,
        x: u16::from_be_bytes([x_hi, x_lo]),
        y: u16::from_be_bytes([y_hi, y_lo]),
    }
}

/// Bounds are little-endian words at the start of the configuration block.
pub fn decode_bounds(config: [u8; register_model::CONFIG_LEN]) -> TouchBounds {
    let [x_lo, x_hi, y_lo, y_hi, ..] = config;
    TouchBounds {
        x_max: u16::from_le_bytes([x_lo, x_hi]),
        y_max: u16::from_le_bytes([y_lo, y_hi]),
    }
}

/// First finger slot of an interrupt-model report, `None` when the slot is
/// empty.
///
/// Slot layout after the 3-byte header: `event|x_hi, x_lo, id|y_hi, y_lo`.
pub fn decode_interrupt_report(report: [u8; interrupt_model::REPORT_LEN]) -> Option<(u16, u16)> {
    let [_, _, _, x_hi, x_lo, id_y_hi, y_lo, _, _] = report;
    if id_y_hi >> 4 >= interrupt_model::INVALID_ID {
        return None;
    }
    let x = u16::from_be_bytes([x_hi & 0x0F, x_lo]);
    let y = u16::from_be_bytes([id_y_hi & 0x0F, y_lo]);
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_report() {
        let report = decode_register_report([0x80, 0x00, 0x57, 0x01, 0x02]);
        assert!(report.touching);
        assert_eq!((report.x, report.y), (0x57, 0x0102));
        assert!(!decode_register_report([0x00, 0, 1, 0, 2]).touching);
    }

    #[test]
    fn test_bounds_little_endian() {
        let bounds = decode_bounds([0xAF, 0x00, 0x07, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(bounds, TouchBounds { x_max: 175, y_max: 263 });
    }

    #[test]
    fn test_interrupt_report() {
        let report = [0, 0, 1, 0x41, 0x20, 0x01, 0x9F, 0, 0];
        assert_eq!(decode_interrupt_report(report), Some((0x120, 0x19F)));
        let empty = [0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0];
        assert_eq!(decode_interrupt_report(empty), None);
    }
}
