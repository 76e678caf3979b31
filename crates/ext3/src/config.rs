//! Driver configuration
//!
//! Timing knobs for the COG and touch links. The defaults reproduce the
//! panel vendor's reference timing; boards only change them when their
//! wiring or clocking demands it.

use platform::SpiConfig;

/// Driver timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ext3Config {
    /// Delay between two reads of the BUSY line.
    pub busy_poll_ms: u32,
    /// Give up with `DisplayError::Timeout` after this many polls.
    /// `None` waits forever.
    pub busy_timeout_polls: Option<u32>,
    /// SPI settings the board must apply to the panel `SpiDevice`.
    pub spi: SpiConfig,
    /// Chip-select to first clock and last clock to chip-release guard,
    /// for index/data transfers.
    pub command_guard_us: u32,
    /// Settling time between the OTP read opcode and the first data byte.
    pub otp_settle_ms: u32,
    /// Delay before every touch controller poll.
    pub touch_poll_ms: u32,
}

impl Ext3Config {
    /// Reference timing: 32 ms busy polling without timeout, 4 MHz SPI,
    /// 50 µs guard, 10 ms OTP settle, 10 ms touch poll.
    pub const DEFAULT: Self = Self {
        busy_poll_ms: 32,
        busy_timeout_polls: None,
        spi: SpiConfig::COG,
        command_guard_us: 50,
        otp_settle_ms: 10,
        touch_poll_ms: 10,
    };

    /// Bound the busy wait to `polls` reads of the BUSY line.
    #[must_use]
    pub const fn with_busy_timeout(mut self, polls: u32) -> Self {
        self.busy_timeout_polls = Some(polls);
        self
    }

    /// Change the busy polling period.
    #[must_use]
    pub const fn with_busy_poll_ms(mut self, ms: u32) -> Self {
        self.busy_poll_ms = ms;
        self
    }

    /// Change the SPI settings reported to the board layer.
    #[must_use]
    pub const fn with_spi(mut self, spi: SpiConfig) -> Self {
        self.spi = spi;
        self
    }

    /// Change the index/data guard delay.
    #[must_use]
    pub const fn with_command_guard_us(mut self, us: u32) -> Self {
        self.command_guard_us = us;
        self
    }

    /// Change the touch poll delay.
    #[must_use]
    pub const fn with_touch_poll_ms(mut self, ms: u32) -> Self {
        self.touch_poll_ms = ms;
        self
    }

    /// Busy wait bound in milliseconds, `None` when unbounded.
    pub const fn busy_timeout_ms(&self) -> Option<u32> {
        match self.busy_timeout_polls {
            Some(polls) => Some(polls.saturating_mul(self.busy_poll_ms)),
            None => None,
        }
    }
}

impl Default for Ext3Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let config = Ext3Config::default();
        assert_eq!(config.busy_poll_ms, 32);
        assert_eq!(config.busy_timeout_polls, None);
        assert_eq!(config.spi.frequency, 4_000_000);
        assert_eq!(config.command_guard_us, 50);
        assert_eq!(config.otp_settle_ms, 10);
        assert_eq!(config.touch_poll_ms, 10);
        assert_eq!(config.busy_timeout_ms(), None);
    }

    #[test]
    fn test_builders() {
        let config = Ext3Config::DEFAULT
            .with_busy_timeout(100)
            .with_busy_poll_ms(10)
            .with_command_guard_us(0);
        assert_eq!(config.busy_timeout_ms(), Some(1000));
        assert_eq!(config.command_guard_us, 0);
    }
}
