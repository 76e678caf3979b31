//! OTP calibration layouts
//!
//! Each panel either carries its PSR / VCOM calibration in the COG's
//! one-time-programmable memory or has none at all and runs from a fixed
//! preset. Layouts are plain data; the reader in the driver crate walks them
//! with one generic routine.
//!
//! All offsets are relative to the first byte after the dummy byte of an OTP
//! read, and field offsets are relative to the start of the validated bank.

/// Opcode that starts a sequential OTP read.
pub const OTP_READ_COMMAND: u8 = 0xA2;

/// Sentinel at the start of a valid OTP bank.
pub const OTP_BANK_MARKER: u8 = 0xA5;

/// Longest DC/DC soft-start table a layout may describe.
pub const SOFT_START_MAX: usize = 128;

/// Which of the two redundant OTP banks holds the calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bank {
    /// First bank, marker at `bank_offsets[0]`.
    Primary,
    /// Second bank, marker at `bank_offsets[1]`.
    Secondary,
}

impl Bank {
    /// Index into [`OtpLayout::bank_offsets`].
    pub const fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

/// A contiguous run of bytes inside a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OtpField {
    /// Offset from the bank marker.
    pub offset: u16,
    /// Number of bytes.
    pub len: u16,
}

impl OtpField {
    /// Offset one past the last byte of the field.
    pub const fn end(self) -> u16 {
        self.offset.saturating_add(self.len)
    }
}

/// Where calibration bytes live inside the OTP of one SKU.
///
/// Fields must be listed in ascending offset order: the reader streams the
/// memory once and never seeks backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OtpLayout {
    /// Absolute offsets of the primary and secondary bank markers.
    pub bank_offsets: [u16; 2],
    /// Two PSR bytes.
    pub psr: OtpField,
    /// One VCOM / data-interval byte.
    pub vcom: OtpField,
    /// DC/DC soft-start micro-op table, medium family only.
    pub soft_start: Option<OtpField>,
}

impl OtpLayout {
    /// `true` when fields are ascending, non-overlapping and the soft-start
    /// table fits [`SOFT_START_MAX`].
    pub const fn is_well_formed(&self) -> bool {
        let banks_ordered = self.bank_offsets[0] < self.bank_offsets[1];
        let psr_ok = self.psr.len == 2;
        let vcom_ok = self.vcom.len == 1 && self.vcom.offset >= self.psr.end();
        let soft_start_ok = match self.soft_start {
            Some(field) => {
                field.offset >= self.vcom.end() && field.len as usize <= SOFT_START_MAX
            }
            None => true,
        };
        banks_ordered && psr_ok && vcom_ok && soft_start_ok
    }
}

/// Origin of a panel's calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OtpSource {
    /// SKU without OTP; valid by construction.
    Preset {
        /// PSR0 / PSR1.
        psr: [u8; 2],
        /// VCOM / data-interval byte used in fast mode.
        vcom: u8,
    },
    /// Calibration read from the COG's OTP memory.
    Memory(OtpLayout),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> OtpLayout {
        OtpLayout {
            bank_offsets: [0x0000, 0x0400],
            psr: OtpField {
                offset: 0x00B1,
                len: 2,
            },
            vcom: OtpField {
                offset: 0x00B3,
                len: 1,
            },
            soft_start: Some(OtpField {
                offset: 0x00C0,
                len: 64,
            }),
        }
    }

    #[test]
    fn test_well_formed_layout() {
        assert!(layout().is_well_formed());
    }

    #[test]
    fn test_overlapping_fields_rejected() {
        let mut bad = layout();
        bad.vcom.offset = 0x00B2;
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn test_oversized_soft_start_rejected() {
        let mut bad = layout();
        bad.soft_start = Some(OtpField {
            offset: 0x00C0,
            len: 129,
        });
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn test_bank_index() {
        assert_eq!(Bank::Primary.index(), 0);
        assert_eq!(Bank::Secondary.index(), 1);
    }
}
