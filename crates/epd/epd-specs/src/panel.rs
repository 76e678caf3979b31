//! Panel descriptor types
//!
//! A panel identifier packs three codes into one integer:
//!
//! ```text
//!  23      16 15       8 7        0
//! +----------+----------+----------+
//! | features |   size   |  driver  |
//! +----------+----------+----------+
//! ```
//!
//! Every other component reads the decoded [`PanelDescriptor`] instead of
//! re-deriving family or geometry from the raw number.

use crate::otp::OtpSource;

/// Feature bits carried in the top byte of a panel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Features(u8);

impl Features {
    /// No optional feature.
    pub const NONE: Self = Self(0x00);
    /// Embedded fast update.
    pub const FAST: Self = Self(0x01);
    /// Capacitive touch controller fitted.
    pub const TOUCH: Self = Self(0x02);
    /// Board-specific extra feature.
    pub const OTHER: Self = Self(0x04);
    /// Wide operating temperature film.
    pub const WIDE_TEMPERATURE: Self = Self(0x08);
    /// Additional red colour plane.
    pub const RED: Self = Self(0x10);

    /// Wrap raw feature bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw feature bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Combine two feature sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `true` when every bit of `other` is present.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for Features {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Electrophoretic film class.
///
/// Decides which update modes are valid and over which temperature band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Film {
    /// CS series: global update only.
    Normal,
    /// PS series: embedded fast update over a narrow band.
    Fast,
    /// KS series: fast update and wide temperature range.
    Wide,
}

impl Film {
    /// Film class implied by a feature set.
    pub const fn from_features(features: Features) -> Self {
        if features.contains(Features::FAST.union(Features::WIDE_TEMPERATURE)) {
            Self::Wide
        } else if features.contains(Features::FAST) {
            Self::Fast
        } else {
            Self::Normal
        }
    }

    /// Series letter as printed on the panel label.
    pub const fn series(self) -> &'static str {
        match self {
            Self::Normal => "CS",
            Self::Fast => "PS",
            Self::Wide => "KS",
        }
    }
}

/// Controller family.
///
/// Determines reset timing and whether the DC/DC soft-start table runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    /// Short reset pulses, PSR-only calibration.
    Small,
    /// Long reset pulses, OTP soft-start table.
    Medium,
}

/// Touch controller protocol fitted to a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchModel {
    /// Explicit "finger count" and "report" register reads; bounds are
    /// read back from the controller.
    Register {
        /// 7-bit I2C address.
        address: u8,
    },
    /// A dedicated interrupt line signals finger-down; the report is only
    /// read while it is asserted.
    Interrupt {
        /// 7-bit I2C address.
        address: u8,
        /// Largest raw X coordinate.
        x_max: u16,
        /// Largest raw Y coordinate.
        y_max: u16,
    },
}

impl TouchModel {
    /// I2C address of the touch controller.
    pub const fn address(self) -> u8 {
        match self {
            Self::Register { address } | Self::Interrupt { address, .. } => address,
        }
    }
}

/// Immutable description of one supported panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PanelDescriptor {
    /// Human readable name, e.g. `2.71" PS touch`.
    pub name: &'static str,
    /// Packed identifier.
    pub id: u32,
    /// Size code (`0x27` = 2.71", `0x37` = 3.70").
    pub size_code: u8,
    /// COG driver code.
    pub driver_code: u8,
    /// Feature bits.
    pub features: Features,
    /// Film class.
    pub film: Film,
    /// Controller family.
    pub family: Family,
    /// Native short side in pixels (portrait width).
    pub width: u16,
    /// Native long side in pixels (portrait height).
    pub height: u16,
    /// Diagonal in hundredths of an inch.
    pub diagonal: u16,
    /// Fast update needs the extra data-interval register write.
    pub extra_data_interval: bool,
    /// Where the PSR / VCOM calibration comes from.
    pub otp: OtpSource,
    /// Touch controller, when fitted.
    pub touch: Option<TouchModel>,
}

impl PanelDescriptor {
    /// Size and driver codes as one word, e.g. `0x2709`.
    pub const fn size_type(&self) -> u16 {
        u16::from_be_bytes([self.size_code, self.driver_code])
    }

    /// `true` when the panel carries every bit of `feature`.
    pub const fn has_feature(&self, feature: Features) -> bool {
        self.features.contains(feature)
    }

    /// Bytes in one physical row (one line of the long axis).
    pub const fn row_bytes(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Bytes in one colour plane.
    pub const fn frame_bytes(&self) -> usize {
        self.row_bytes().saturating_mul(self.height as usize)
    }

    /// Diagonal split into whole inches and hundredths.
    pub const fn diagonal_parts(&self) -> (u16, u16) {
        (self.diagonal / 100, self.diagonal % 100)
    }
}

/// Identifier not present in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnsupportedPanel(pub u32);

impl core::fmt::Display for UnsupportedPanel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Unsupported panel 0x{:06x}", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnsupportedPanel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_film_from_features() {
        assert_eq!(Film::from_features(Features::TOUCH), Film::Normal);
        assert_eq!(
            Film::from_features(Features::FAST | Features::TOUCH),
            Film::Fast
        );
        assert_eq!(
            Film::from_features(Features::FAST | Features::TOUCH | Features::WIDE_TEMPERATURE),
            Film::Wide
        );
        // Wide temperature without fast update is still a normal film
        assert_eq!(
            Film::from_features(Features::WIDE_TEMPERATURE),
            Film::Normal
        );
    }

    #[test]
    fn test_features_contains() {
        let features = Features::FAST | Features::TOUCH;
        assert!(features.contains(Features::FAST));
        assert!(features.contains(Features::TOUCH));
        assert!(!features.contains(Features::RED));
        assert!(features.contains(Features::NONE));
        assert_eq!(features.bits(), 0x03);
    }

    #[test]
    fn test_touch_address() {
        assert_eq!(TouchModel::Register { address: 0x41 }.address(), 0x41);
        let interrupt = TouchModel::Interrupt {
            address: 0x38,
            x_max: 239,
            y_max: 415,
        };
        assert_eq!(interrupt.address(), 0x38);
    }

    #[test]
    fn test_unsupported_display() {
        assert_eq!(
            UnsupportedPanel(0x0a_2709).to_string(),
            "Unsupported panel 0x0a2709"
        );
    }
}
