//! Peripheral abstraction layer
//!
//! `embedded-hal` covers 4-wire SPI, I2C, GPIO and delays. The COG also
//! speaks a 3-wire, half-duplex variant on the same SCK/data lines to read
//! its OTP memory; [`ThreeWireSpi`] is the seam for that.

/// Half-duplex 3-wire SPI used only for OTP reads.
///
/// The bus is shared with the 4-wire `embedded_hal::spi::SpiDevice` used
/// for normal traffic. Callers must bracket every use with [`enter`] and
/// [`exit`] and never interleave the two protocols.
///
/// [`enter`]: ThreeWireSpi::enter
/// [`exit`]: ThreeWireSpi::exit
pub trait ThreeWireSpi {
    /// Error type
    type Error: core::fmt::Debug;

    /// Reconfigure the shared lines for 3-wire operation.
    fn enter(&mut self) -> Result<(), Self::Error>;

    /// Restore the shared lines to 4-wire operation.
    fn exit(&mut self) -> Result<(), Self::Error>;

    /// Drive the panel chip-select (`true` = asserted, i.e. low).
    fn select(&mut self, selected: bool) -> Result<(), Self::Error>;

    /// Clock one byte out, MSB first.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Clock one byte in, MSB first.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    /// Read and discard `count` bytes.
    fn skip(&mut self, count: usize) -> Result<(), Self::Error> {
        for _ in 0..count {
            self.read_byte()?;
        }
        Ok(())
    }
}

/// Placeholder 3-wire bus for panels whose calibration is a fixed preset.
///
/// Every operation fails; the driver never touches it for those panels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unwired;

/// Error returned by every [`Unwired`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnwiredError;

impl ThreeWireSpi for Unwired {
    type Error = UnwiredError;

    fn enter(&mut self) -> Result<(), Self::Error> {
        Err(UnwiredError)
    }

    fn exit(&mut self) -> Result<(), Self::Error> {
        Err(UnwiredError)
    }

    fn select(&mut self, _selected: bool) -> Result<(), Self::Error> {
        Err(UnwiredError)
    }

    fn write_byte(&mut self, _byte: u8) -> Result<(), Self::Error> {
        Err(UnwiredError)
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        Err(UnwiredError)
    }
}

/// SPI configuration
///
/// Informational: the board layer builds its `SpiDevice` from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// SPI mode (CPOL, CPHA)
    pub mode: SpiMode,
    /// Bit order
    pub bit_order: BitOrder,
}

impl SpiConfig {
    /// COG link: 4 MHz, mode 0, MSB first.
    pub const COG: Self = Self {
        frequency: 4_000_000,
        mode: SpiMode::Mode0,
        bit_order: BitOrder::MsbFirst,
    };
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::COG
    }
}

/// SPI modes (CPOL, CPHA)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

/// Bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cog_spi_config() {
        let config = SpiConfig::default();
        assert_eq!(config.frequency, 4_000_000);
        assert_eq!(config.mode, SpiMode::Mode0);
        assert_eq!(config.bit_order, BitOrder::MsbFirst);
    }

    #[test]
    fn test_unwired_refuses_everything() {
        let mut bus = Unwired;
        assert_eq!(bus.enter(), Err(UnwiredError));
        assert_eq!(bus.read_byte(), Err(UnwiredError));
        assert_eq!(bus.skip(3), Err(UnwiredError));
        // Zero-length skip never touches the bus
        assert_eq!(bus.skip(0), Ok(()));
    }
}
