//! Display abstraction layer

pub use epd_specs::UpdateMode;

use epd_specs::PanelDescriptor;

/// Capability interface of a COG panel protocol.
///
/// One update cycle is `reset → initial → send_image → update → power_off`,
/// always in that order. Implementations refuse out-of-order calls with
/// [`DisplayError::InvalidState`].
pub trait CogProtocol {
    /// Panel this protocol instance drives.
    fn panel(&self) -> &'static PanelDescriptor;

    /// Load the panel calibration (OTP read or preset). Idempotent; runs
    /// implicitly on the first [`initial`](CogProtocol::initial).
    fn calibrate(&mut self) -> Result<(), DisplayError>;

    /// `true` once the calibration has been validated.
    fn is_calibrated(&self) -> bool;

    /// Pulse the hardware reset line.
    fn reset(&mut self) -> Result<(), DisplayError>;

    /// Soft reset, temperature, PSR and mode-specific registers.
    fn initial(&mut self, mode: UpdateMode, temperature_c: i8) -> Result<(), DisplayError>;

    /// Transfer the frame and commit `next` into `previous`.
    ///
    /// `previous` holds the reference frame for a fast update and equals
    /// `next` byte for byte when this returns `Ok`.
    fn send_image(
        &mut self,
        mode: UpdateMode,
        next: &[u8],
        previous: &mut [u8],
    ) -> Result<(), DisplayError>;

    /// Power on and refresh the panel.
    fn update(&mut self, mode: UpdateMode) -> Result<(), DisplayError>;

    /// Turn the DC/DC converter off.
    fn power_off(&mut self) -> Result<(), DisplayError>;

    /// Blocking delay on the protocol's timebase.
    fn wait_ms(&mut self, ms: u32);
}

/// Display errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// SPI communication error.
    Communication,
    /// GPIO operation error.
    Gpio,
    /// BUSY line did not return to ready within the configured bound.
    Timeout,
    /// Operation called out of sequence, or before `begin`.
    InvalidState,
    /// Frame buffer length does not match the panel.
    InvalidBuffer,
    /// Panel identifier not in the registry.
    UnsupportedPanel(u32),
    /// Screen and COG protocol were built for different panels.
    PanelMismatch {
        /// Panel the screen was asked for.
        screen: u32,
        /// Panel the COG protocol drives.
        cog: u32,
    },
    /// OTP bank marker missing in both banks.
    OtpCheckFailed,
    /// OTP layout or soft-start table malformed.
    OtpFormat,
    /// I2C error talking to the touch controller.
    Touch,
}

impl DisplayError {
    /// Conditions under which the panel must not be driven again.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPanel(_)
                | Self::PanelMismatch { .. }
                | Self::OtpCheckFailed
                | Self::OtpFormat
        )
    }
}

impl From<epd_specs::UnsupportedPanel> for DisplayError {
    fn from(err: epd_specs::UnsupportedPanel) -> Self {
        Self::UnsupportedPanel(err.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DisplayError {}

impl core::fmt::Display for DisplayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Communication => write!(f, "SPI communication error"),
            Self::Gpio => write!(f, "GPIO error"),
            Self::Timeout => write!(f, "Busy line timeout"),
            Self::InvalidState => write!(f, "Invalid display state"),
            Self::InvalidBuffer => write!(f, "Invalid buffer size"),
            Self::UnsupportedPanel(id) => write!(f, "Unsupported panel 0x{id:06x}"),
            Self::PanelMismatch { screen, cog } => {
                write!(f, "Screen panel 0x{screen:06x} driven by COG for 0x{cog:06x}")
            }
            Self::OtpCheckFailed => write!(f, "OTP check failed"),
            Self::OtpFormat => write!(f, "Malformed OTP data"),
            Self::Touch => write!(f, "Touch controller I2C error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(DisplayError::UnsupportedPanel(0x01_2709).is_fatal());
        assert!(DisplayError::OtpCheckFailed.is_fatal());
        assert!(DisplayError::OtpFormat.is_fatal());
        assert!(DisplayError::PanelMismatch { screen: 0x01_2709, cog: 0x01_370c }.is_fatal());
        assert!(!DisplayError::Timeout.is_fatal());
        assert!(!DisplayError::Communication.is_fatal());
    }

    #[test]
    fn test_from_unsupported_panel() {
        let err: DisplayError = epd_specs::UnsupportedPanel(0x0a_2709).into();
        assert_eq!(err, DisplayError::UnsupportedPanel(0x0a_2709));
        assert_eq!(err.to_string(), "Unsupported panel 0x0a2709");
    }
}
