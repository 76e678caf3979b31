//! Controller family tables and register map

use epd_specs::Family;

/// COG register indices. Both families share one map.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Panel setting (PSR), 2 data bytes. Also soft reset with [`SOFT_RESET`].
    PanelSetting = 0x00,
    /// Turn the DC/DC converter off, no data.
    PowerOff = 0x02,
    /// Turn the DC/DC converter on, no data.
    PowerOn = 0x04,
    /// Previous frame plane, one frame of data.
    PreviousFrame = 0x10,
    /// Start the refresh, no data.
    Refresh = 0x12,
    /// Next frame plane, one frame of data.
    NextFrame = 0x13,
    /// VCOM and data interval, 1 data byte.
    DataInterval = 0x50,
    /// Activate the temperature written to [`Register::Temperature`].
    ActivateTemperature = 0xE0,
    /// Input temperature, 1 data byte (two's complement °C).
    Temperature = 0xE5,
}

/// Data byte that turns a write to [`Register::PanelSetting`] into a soft
/// reset.
pub const SOFT_RESET: u8 = 0x0E;

/// Data byte for [`Register::ActivateTemperature`].
pub const ACTIVATE_TEMPERATURE: u8 = 0x02;

/// Temperature byte flag selecting the fast waveform.
pub const FAST_TEMPERATURE: u8 = 0x40;

/// PSR flags selecting the fast waveform.
pub const FAST_PSR: [u8; 2] = [0x10, 0x02];

/// Second data interval write on panels that need it in fast mode.
pub const FAST_DATA_INTERVAL: u8 = 0x27;

/// Per-family sequencing differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CogProfile {
    /// Reset pulse: wait, RST high, wait, RST low, wait, RST high, wait,
    /// release, wait. All in milliseconds.
    pub reset_ms: [u32; 5],
    /// Run the OTP soft-start table between power-on and refresh.
    pub soft_start: bool,
}

impl CogProfile {
    /// Small family: short reset, no soft-start.
    pub const SMALL: Self = Self {
        reset_ms: [5, 5, 10, 5, 5],
        soft_start: false,
    };

    /// Medium family: long reset, soft-start table.
    pub const MEDIUM: Self = Self {
        reset_ms: [200, 20, 200, 50, 5],
        soft_start: true,
    };

    /// Profile of a controller family.
    pub const fn for_family(family: Family) -> Self {
        match family {
            Family::Small => Self::SMALL,
            Family::Medium => Self::MEDIUM,
        }
    }

    /// Total reset duration.
    pub fn reset_total_ms(&self) -> u32 {
        self.reset_ms.iter().fold(0u32, |acc, ms| acc.saturating_add(*ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_profiles() {
        assert_eq!(CogProfile::for_family(Family::Small).reset_ms, [5, 5, 10, 5, 5]);
        assert_eq!(CogProfile::for_family(Family::Small).reset_total_ms(), 30);
        assert!(CogProfile::for_family(Family::Medium).soft_start);
        assert_eq!(CogProfile::MEDIUM.reset_total_ms(), 475);
    }

    #[test]
    fn test_soft_start_follows_registry_layout() {
        for panel in epd_specs::PANELS {
            let has_table = matches!(
                panel.otp,
                epd_specs::OtpSource::Memory(epd_specs::OtpLayout {
                    soft_start: Some(_),
                    ..
                })
            );
            assert_eq!(CogProfile::for_family(panel.family).soft_start, has_table, "{}", panel.name);
        }
    }

    #[test]
    fn test_register_values() {
        assert_eq!(Register::PanelSetting as u8, 0x00);
        assert_eq!(Register::Temperature as u8, 0xE5);
        assert_eq!(Register::NextFrame as u8, 0x13);
    }
}
