//! COG sequencer
//!
//! Drives one panel update over 4-wire SPI:
//!
//! ```text
//! reset → initial(mode, °C) → send_image(mode) → update(mode) → power_off
//! ```
//!
//! # Wiring
//!
//! | Signal | Direction      | Notes                                   |
//! |--------|----------------|-----------------------------------------|
//! | SCK    | Host → Display | 4 MHz, mode 0, MSB first                |
//! | MOSI   | Host ↔ Display | Turned around for OTP reads (3-wire)    |
//! | CS     | Host → Display | Managed by `SpiDevice`                  |
//! | DC     | Host → Display | Low = index, high = data                |
//! | RST    | Host → Display | Active low                              |
//! | BUSY   | Display → Host | Low = busy, high = ready                |
//!
//! Each step checks the [`CogState`] left by the previous one and refuses
//! to run out of order. Calibration (OTP read or preset) happens once, on
//! the first `initial` or an explicit [`CogProtocol::calibrate`]; a fatal
//! calibration failure poisons the sequencer for good.

pub mod profile;
pub mod soft_start;

use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{Operation, SpiDevice};

use epd_specs::{Features, OtpSource, PanelDescriptor};
use platform::{CogProtocol, DisplayError, ThreeWireSpi, Unwired, UpdateMode};

use crate::config::Ext3Config;
use crate::otp::{self, OtpCalibration};

pub use profile::{CogProfile, Register};
use profile::{ACTIVATE_TEMPERATURE, FAST_DATA_INTERVAL, FAST_PSR, FAST_TEMPERATURE, SOFT_RESET};
pub use soft_start::{SoftStartOp, SoftStartOps, StepDelay};

/// Zero bytes streamed in place of a reference frame.
static BLANK_CHUNK: [u8; 64] = [0x00; 64];

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Position in the update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CogState {
    /// Never reset since construction.
    Off,
    /// Hardware reset done, ready for `initial`.
    Reset,
    /// Registers configured for one update mode.
    Initialized,
    /// Both frame planes transferred.
    ImageLoaded,
    /// DC/DC on, refresh started or finished.
    Refreshing,
    /// DC/DC off; a new cycle starts with `reset`.
    PoweredOff,
}

/// Panel control lines.
pub struct CogPins<DC, RST, BUSY> {
    /// Data / command select.
    pub dc: DC,
    /// Reset, active low.
    pub rst: RST,
    /// Busy, low while the COG works.
    pub busy: BUSY,
}

// ---------------------------------------------------------------------------
// Driver struct
// ---------------------------------------------------------------------------

/// COG sequencer for one panel.
///
/// Generic over:
/// - `SPI`: blocking [`SpiDevice`] that owns the panel chip-select.
/// - `DC`, `RST`: [`OutputPin`]s.
/// - `BUSY`: [`InputPin`].
/// - `OTP`: [`ThreeWireSpi`] on the same lines, only for panels whose
///   calibration lives in OTP. [`Unwired`] otherwise.
/// - `DELAY`: [`DelayNs`].
pub struct Cog<SPI, DC, RST, BUSY, OTP, DELAY> {
    spi: SPI,
    dc: DC,
    rst: RST,
    busy: BUSY,
    otp: OTP,
    delay: DELAY,
    panel: &'static PanelDescriptor,
    profile: CogProfile,
    config: Ext3Config,
    calibration: Option<OtpCalibration>,
    fault: Option<DisplayError>,
    state: CogState,
}

impl<SPI, DC, RST, BUSY, DELAY> Cog<SPI, DC, RST, BUSY, Unwired, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    /// Create a sequencer without an OTP bus.
    ///
    /// Enough for panels with a preset calibration; attach a bus with
    /// [`Cog::with_otp_bus`] for the others.
    pub fn new(
        panel: &'static PanelDescriptor,
        spi: SPI,
        pins: CogPins<DC, RST, BUSY>,
        delay: DELAY,
    ) -> Self {
        Self {
            spi,
            dc: pins.dc,
            rst: pins.rst,
            busy: pins.busy,
            otp: Unwired,
            delay,
            panel,
            profile: CogProfile::for_family(panel.family),
            config: Ext3Config::DEFAULT,
            calibration: None,
            fault: None,
            state: CogState::Off,
        }
    }
}

impl<SPI, DC, RST, BUSY, OTP, DELAY> Cog<SPI, DC, RST, BUSY, OTP, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    OTP: ThreeWireSpi,
    DELAY: DelayNs,
{
    /// Attach the 3-wire bus used to read OTP calibration.
    pub fn with_otp_bus<B: ThreeWireSpi>(self, otp: B) -> Cog<SPI, DC, RST, BUSY, B, DELAY> {
        Cog {
            spi: self.spi,
            dc: self.dc,
            rst: self.rst,
            busy: self.busy,
            otp,
            delay: self.delay,
            panel: self.panel,
            profile: self.profile,
            config: self.config,
            calibration: self.calibration,
            fault: self.fault,
            state: self.state,
        }
    }

    /// Replace the timing configuration.
    #[must_use]
    pub fn with_config(mut self, config: Ext3Config) -> Self {
        self.config = config;
        self
    }

    /// Give the bus, pins, OTP bus and delay back.
    pub fn release(self) -> (SPI, CogPins<DC, RST, BUSY>, OTP, DELAY) {
        let pins = CogPins {
            dc: self.dc,
            rst: self.rst,
            busy: self.busy,
        };
        (self.spi, pins, self.otp, self.delay)
    }

    /// Current position in the update cycle.
    pub fn state(&self) -> CogState {
        self.state
    }

    /// Loaded calibration, once [`CogProtocol::calibrate`] succeeded.
    pub fn calibration(&self) -> Option<&OtpCalibration> {
        self.calibration.as_ref()
    }

    /// Fatal calibration error that disabled the sequencer.
    pub fn fault(&self) -> Option<DisplayError> {
        self.fault
    }

    // -----------------------------------------------------------------------
    // Low-level SPI
    // -----------------------------------------------------------------------

    /// Single index byte, no data phase, no guard.
    fn send_command(&mut self, register: Register) -> Result<(), DisplayError> {
        #[cfg(feature = "defmt")]
        defmt::debug!("COG command {}", register);
        self.dc.set_low().map_err(|_| DisplayError::Gpio)?;
        self.spi
            .write(&[register as u8])
            .map_err(|_| DisplayError::Communication)
    }

    /// Index phase then data phase, each in its own chip-select window
    /// with the guard delay around the transfer.
    fn send_index_data(&mut self, index: u8, data: &[u8]) -> Result<(), DisplayError> {
        let guard_ns = self.config.command_guard_us.saturating_mul(1000);

        self.dc.set_low().map_err(|_| DisplayError::Gpio)?;
        self.spi
            .transaction(&mut [
                Operation::DelayNs(guard_ns),
                Operation::Write(&[index]),
                Operation::DelayNs(guard_ns),
            ])
            .map_err(|_| DisplayError::Communication)?;

        self.dc.set_high().map_err(|_| DisplayError::Gpio)?;
        self.spi
            .transaction(&mut [
                Operation::DelayNs(guard_ns),
                Operation::Write(data),
                Operation::DelayNs(guard_ns),
            ])
            .map_err(|_| DisplayError::Communication)
    }

    fn write_register(&mut self, register: Register, data: &[u8]) -> Result<(), DisplayError> {
        self.send_index_data(register as u8, data)
    }

    /// `len` zero bytes into `register`, streamed from [`BLANK_CHUNK`] in a
    /// single data window.
    fn send_blank(&mut self, register: Register, len: usize) -> Result<(), DisplayError> {
        let guard_ns = self.config.command_guard_us.saturating_mul(1000);

        self.dc.set_low().map_err(|_| DisplayError::Gpio)?;
        self.spi
            .transaction(&mut [
                Operation::DelayNs(guard_ns),
                Operation::Write(&[register as u8]),
                Operation::DelayNs(guard_ns),
            ])
            .map_err(|_| DisplayError::Communication)?;

        let mut ops = Vec::with_capacity(len.div_ceil(BLANK_CHUNK.len()).saturating_add(2));
        ops.push(Operation::DelayNs(guard_ns));
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(BLANK_CHUNK.len());
            ops.push(Operation::Write(BLANK_CHUNK.get(..chunk).unwrap_or(BLANK_CHUNK.as_slice())));
            remaining = remaining.saturating_sub(chunk);
        }
        ops.push(Operation::DelayNs(guard_ns));

        self.dc.set_high().map_err(|_| DisplayError::Gpio)?;
        self.spi
            .transaction(&mut ops)
            .map_err(|_| DisplayError::Communication)
    }

    // -----------------------------------------------------------------------
    // Timing
    // -----------------------------------------------------------------------

    /// Poll BUSY until the COG reports ready.
    ///
    /// The line is sampled before the first delay, so a ready COG costs no
    /// wait at all. Unbounded unless `busy_timeout_polls` is set.
    fn wait_busy(&mut self) -> Result<(), DisplayError> {
        let mut polls = 0u32;
        loop {
            if self.busy.is_high().map_err(|_| DisplayError::Gpio)? {
                #[cfg(feature = "defmt")]
                defmt::trace!("BUSY released after {} polls", polls);
                return Ok(());
            }
            if self
                .config
                .busy_timeout_polls
                .is_some_and(|limit| polls >= limit)
            {
                #[cfg(feature = "defmt")]
                defmt::warn!("BUSY stuck low after {} polls", polls);
                return Err(DisplayError::Timeout);
            }
            self.delay.delay_ms(self.config.busy_poll_ms);
            polls = polls.saturating_add(1);
        }
    }

    /// Family reset pulse: wait, high, wait, low, wait, high, wait, wait.
    fn hardware_reset(&mut self) -> Result<(), DisplayError> {
        let [settle, high, low, recover, release] = self.profile.reset_ms;
        self.delay.delay_ms(settle);
        self.rst.set_high().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(high);
        self.rst.set_low().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(low);
        self.rst.set_high().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(recover);
        // Chip-select is already idle between SpiDevice transactions.
        self.delay.delay_ms(release);
        Ok(())
    }

    fn expect_state(&self, allowed: &[CogState]) -> Result<(), DisplayError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("COG step refused in state {}", self.state);
            Err(DisplayError::InvalidState)
        }
    }

    /// `true` when `mode` runs the fast waveform on this panel.
    fn is_fast(&self, mode: UpdateMode) -> bool {
        mode == UpdateMode::Fast && self.panel.has_feature(Features::FAST)
    }

    fn loaded_calibration(&self) -> Result<&OtpCalibration, DisplayError> {
        self.calibration.as_ref().ok_or(DisplayError::InvalidState)
    }

    fn load_calibration(&mut self) -> Result<OtpCalibration, DisplayError> {
        match self.panel.otp {
            OtpSource::Preset { psr, vcom } => Ok(OtpCalibration::preset(psr, vcom)),
            OtpSource::Memory(layout) => {
                self.hardware_reset()?;
                let read = otp::read_calibration(
                    &mut self.otp,
                    &mut self.dc,
                    &mut self.delay,
                    &layout,
                    self.config.otp_settle_ms,
                );
                // Leave the COG in the state `initial` expects, even after
                // a failed read. A read error outranks a reset error.
                let reset = self.hardware_reset();
                self.state = CogState::Reset;
                let calibration = read?;
                reset?;
                Ok(calibration)
            }
        }
    }

    /// Execute the OTP soft-start table.
    fn run_soft_start(&mut self) -> Result<(), DisplayError> {
        let table = self.loaded_calibration()?.soft_start.clone();
        for op in SoftStartOps::new(&table) {
            let op = op?;
            for _ in 0..op.repeat {
                self.send_index_data(op.register, op.data)?;
                self.delay.delay_us(op.delay.as_us());
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CogProtocol
// ---------------------------------------------------------------------------

impl<SPI, DC, RST, BUSY, OTP, DELAY> CogProtocol for Cog<SPI, DC, RST, BUSY, OTP, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    OTP: ThreeWireSpi,
    DELAY: DelayNs,
{
    fn panel(&self) -> &'static PanelDescriptor {
        self.panel
    }

    fn calibrate(&mut self) -> Result<(), DisplayError> {
        if let Some(err) = self.fault {
            return Err(err);
        }
        if self.calibration.is_some() {
            return Ok(());
        }

        match self.load_calibration() {
            Ok(calibration) => {
                #[cfg(feature = "defmt")]
                defmt::info!("{} calibrated", self.panel.name);
                self.calibration = Some(calibration);
                Ok(())
            }
            Err(err) => {
                if err.is_fatal() {
                    #[cfg(feature = "defmt")]
                    defmt::error!("{}: calibration failed, panel disabled: {}", self.panel.name, err);
                    self.fault = Some(err);
                }
                Err(err)
            }
        }
    }

    fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    fn reset(&mut self) -> Result<(), DisplayError> {
        self.hardware_reset()?;
        self.state = CogState::Reset;
        Ok(())
    }

    fn initial(&mut self, mode: UpdateMode, temperature_c: i8) -> Result<(), DisplayError> {
        self.calibrate()?;
        self.expect_state(&[CogState::Reset])?;
        if mode == UpdateMode::None {
            return Err(DisplayError::InvalidState);
        }

        let fast = self.is_fast(mode);
        let calibration = self.loaded_calibration()?;
        let [psr0, psr1] = calibration.psr;
        let vcom = calibration.vcom;

        #[cfg(feature = "defmt")]
        defmt::debug!("COG initial: {} at {}°C", mode, temperature_c);

        // Two's complement on the wire.
        let mut temperature = u8::from_ne_bytes(temperature_c.to_ne_bytes());
        let mut psr = [psr0, psr1];
        if fast {
            temperature |= FAST_TEMPERATURE;
            let [fast0, fast1] = FAST_PSR;
            psr = [psr0 | fast0, psr1 | fast1];
        }

        self.write_register(Register::PanelSetting, &[SOFT_RESET])?;
        self.wait_busy()?;

        self.write_register(Register::Temperature, &[temperature])?;
        self.write_register(Register::ActivateTemperature, &[ACTIVATE_TEMPERATURE])?;
        self.write_register(Register::PanelSetting, &psr)?;

        if fast {
            self.write_register(Register::DataInterval, &[vcom])?;
            if self.panel.extra_data_interval {
                self.write_register(Register::DataInterval, &[FAST_DATA_INTERVAL])?;
            }
        }

        self.state = CogState::Initialized;
        Ok(())
    }

    fn send_image(
        &mut self,
        mode: UpdateMode,
        next: &[u8],
        previous: &mut [u8],
    ) -> Result<(), DisplayError> {
        self.expect_state(&[CogState::Initialized])?;
        let frame = self.panel.frame_bytes();
        if next.len() != frame || previous.len() != frame {
            return Err(DisplayError::InvalidBuffer);
        }

        if self.is_fast(mode) {
            self.write_register(Register::PreviousFrame, previous)?;
        } else {
            // Global update: no reference frame
            self.send_blank(Register::PreviousFrame, frame)?;
        }
        self.write_register(Register::NextFrame, next)?;
        previous.copy_from_slice(next);

        self.state = CogState::ImageLoaded;
        Ok(())
    }

    fn update(&mut self, mode: UpdateMode) -> Result<(), DisplayError> {
        self.expect_state(&[CogState::ImageLoaded])?;
        self.state = CogState::Refreshing;

        if self.is_fast(mode) && self.panel.extra_data_interval {
            let vcom = self.loaded_calibration()?.vcom;
            self.write_register(Register::DataInterval, &[vcom])?;
        }

        self.send_command(Register::PowerOn)?;
        self.wait_busy()?;

        if self.profile.soft_start {
            self.run_soft_start()?;
        }

        self.send_command(Register::Refresh)?;
        self.wait_busy()
    }

    fn power_off(&mut self) -> Result<(), DisplayError> {
        self.expect_state(&[
            CogState::Initialized,
            CogState::ImageLoaded,
            CogState::Refreshing,
        ])?;
        self.send_command(Register::PowerOff)?;
        self.wait_busy()?;
        self.state = CogState::PoweredOff;
        Ok(())
    }

    fn wait_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};
    use embedded_hal_mock::eh1::MockError;
    use epd_specs::panels::{EPD_271_CS_TOUCH, EPD_271_PS_TOUCH, EPD_370_PS_TOUCH};
    use epd_specs::OTP_BANK_MARKER;
    use platform::mocks::MockOtp;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    type TestCog<OTP = Unwired> = Cog<SpiMock<u8>, PinMock, PinMock, PinMock, OTP, NoopDelay>;

    const GUARD_NS: u32 = 50_000;

    /// SPI expectations of one index/data transfer.
    fn index_data(index: u8, data: &[u8]) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::delay(GUARD_NS),
            SpiTransaction::write_vec(vec![index]),
            SpiTransaction::delay(GUARD_NS),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::delay(GUARD_NS),
            SpiTransaction::write_vec(data.to_vec()),
            SpiTransaction::delay(GUARD_NS),
            SpiTransaction::transaction_end(),
        ]
    }

    /// SPI expectations of a blank reference frame: the index window, then
    /// one data window carrying `len` zeros in 64-byte writes.
    fn blank_data(index: u8, len: usize) -> Vec<SpiTransaction<u8>> {
        let mut txns = vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::delay(GUARD_NS),
            SpiTransaction::write_vec(vec![index]),
            SpiTransaction::delay(GUARD_NS),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::delay(GUARD_NS),
        ];
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(64);
            txns.push(SpiTransaction::write_vec(vec![0x00; chunk]));
            remaining -= chunk;
        }
        txns.push(SpiTransaction::delay(GUARD_NS));
        txns.push(SpiTransaction::transaction_end());
        txns
    }

    /// SPI device that accepts every transaction but the `fail_at`-th
    /// (1-based).
    struct FlakySpi {
        transactions: usize,
        fail_at: usize,
    }

    impl embedded_hal::spi::ErrorType for FlakySpi {
        type Error = embedded_hal::spi::ErrorKind;
    }

    impl SpiDevice for FlakySpi {
        fn transaction(&mut self, _ops: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
            self.transactions += 1;
            if self.transactions == self.fail_at {
                Err(embedded_hal::spi::ErrorKind::Other)
            } else {
                Ok(())
            }
        }
    }

    /// SPI expectations of one bare command.
    fn command(register: Register) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![register as u8]),
            SpiTransaction::transaction_end(),
        ]
    }

    /// DC toggles of `index_data` transfers and bare commands, in order.
    fn dc_sequence(steps: &[bool]) -> PinMock {
        let mut txns = vec![];
        for &with_data in steps {
            txns.push(PinTransaction::set(PinState::Low));
            if with_data {
                txns.push(PinTransaction::set(PinState::High));
            }
        }
        PinMock::new(&txns)
    }

    /// RST expectations of `count` reset pulses.
    fn rst_resets(count: usize) -> PinMock {
        let mut txns = vec![];
        for _ in 0..count {
            txns.push(PinTransaction::set(PinState::High));
            txns.push(PinTransaction::set(PinState::Low));
            txns.push(PinTransaction::set(PinState::High));
        }
        PinMock::new(&txns)
    }

    /// BUSY that reads low `busy_polls` times then high, for each wait.
    fn busy_waits(waits: &[usize]) -> PinMock {
        let mut txns = vec![];
        for &busy_polls in waits {
            for _ in 0..busy_polls {
                txns.push(PinTransaction::get(PinState::Low));
            }
            txns.push(PinTransaction::get(PinState::High));
        }
        PinMock::new(&txns)
    }

    fn cog(panel_id: u32, spi: &[SpiTransaction<u8>], dc: PinMock, rst: PinMock, busy: PinMock) -> TestCog {
        let panel = epd_specs::lookup(panel_id).unwrap();
        Cog::new(panel, SpiMock::new(spi), CogPins { dc, rst, busy }, NoopDelay::new())
    }

    fn finish<OTP: ThreeWireSpi>(cog: TestCog<OTP>) {
        let (mut spi, mut pins, _otp, _delay) = cog.release();
        spi.done();
        pins.dc.done();
        pins.rst.done();
        pins.busy.done();
    }

    /// Factory preset of the 3.70" COG: PSR `cf 8f`, data interval `0x07`.
    const PRESET_370: ([u8; 2], u8) = ([0xCF, 0x8F], 0x07);

    /// 3.70" OTP image carrying the factory preset and one soft-start block.
    fn otp_370() -> Vec<u8> {
        let mut memory = vec![0xFF; 0x0200];
        memory[0] = OTP_BANK_MARKER;
        let ([psr0, psr1], vcom) = PRESET_370;
        memory[0xB1] = psr0;
        memory[0xB2] = psr1;
        memory[0xB3] = vcom;
        // 2 × (0x06 <- [0x17]), 5 ms
        memory[0xC0..0xC6].copy_from_slice(&[0x01, 0x02, 0x06, 0x17, 0x05, 0x00]);
        let mut stream = vec![0x00];
        stream.extend(memory);
        stream
    }

    // -----------------------------------------------------------------------
    // Test: initial register sequence
    // -----------------------------------------------------------------------

    #[test]
    fn test_initial_fast_small_panel() {
        let mut spi = vec![];
        spi.extend(index_data(0x00, &[0x0E]));
        spi.extend(index_data(0xE5, &[0x19 | 0x40]));
        spi.extend(index_data(0xE0, &[0x02]));
        spi.extend(index_data(0x00, &[0xCF | 0x10, 0x8D | 0x02]));
        spi.extend(index_data(0x50, &[0x07]));

        let mut cog = cog(
            EPD_271_PS_TOUCH,
            &spi,
            dc_sequence(&[true; 5]),
            rst_resets(1),
            busy_waits(&[2]),
        );
        cog.reset().unwrap();
        assert_eq!(cog.state(), CogState::Reset);
        cog.initial(UpdateMode::Fast, 25).unwrap();
        assert_eq!(cog.state(), CogState::Initialized);
        assert!(cog.is_calibrated());
        finish(cog);
    }

    #[test]
    fn test_initial_global_negative_temperature() {
        let mut spi = vec![];
        spi.extend(index_data(0x00, &[0x0E]));
        // -5 °C as two's complement, no fast flag
        spi.extend(index_data(0xE5, &[0xFB]));
        spi.extend(index_data(0xE0, &[0x02]));
        spi.extend(index_data(0x00, &[0xCF, 0x8D]));

        let mut cog = cog(
            EPD_271_PS_TOUCH,
            &spi,
            dc_sequence(&[true; 4]),
            rst_resets(1),
            busy_waits(&[0]),
        );
        cog.reset().unwrap();
        cog.initial(UpdateMode::Global, -5).unwrap();
        finish(cog);
    }

    #[test]
    fn test_fast_request_on_normal_film_runs_global_waveform() {
        let mut spi = vec![];
        spi.extend(index_data(0x00, &[0x0E]));
        spi.extend(index_data(0xE5, &[0x19]));
        spi.extend(index_data(0xE0, &[0x02]));
        spi.extend(index_data(0x00, &[0xCF, 0x8D]));

        let mut cog = cog(
            EPD_271_CS_TOUCH,
            &spi,
            dc_sequence(&[true; 4]),
            rst_resets(1),
            busy_waits(&[0]),
        );
        cog.reset().unwrap();
        cog.initial(UpdateMode::Fast, 25).unwrap();
        finish(cog);
    }

    // -----------------------------------------------------------------------
    // Test: full cycle
    // -----------------------------------------------------------------------

    #[test]
    fn test_fast_cycle_commits_previous() {
        let panel = epd_specs::lookup(EPD_271_PS_TOUCH).unwrap();
        let frame = panel.frame_bytes();
        let mut next = vec![0x00; frame];
        next[0] = 0x80;
        let mut previous = vec![0x00; frame];
        previous[1] = 0x01;

        let mut spi = vec![];
        spi.extend(index_data(0x00, &[0x0E]));
        spi.extend(index_data(0xE5, &[0x59]));
        spi.extend(index_data(0xE0, &[0x02]));
        spi.extend(index_data(0x00, &[0xDF, 0x8F]));
        spi.extend(index_data(0x50, &[0x07]));
        spi.extend(index_data(0x10, &previous));
        spi.extend(index_data(0x13, &next));
        spi.extend(command(Register::PowerOn));
        spi.extend(command(Register::Refresh));
        spi.extend(command(Register::PowerOff));

        let mut cog = cog(
            EPD_271_PS_TOUCH,
            &spi,
            dc_sequence(&[true, true, true, true, true, true, true, false, false, false]),
            rst_resets(1),
            busy_waits(&[0, 1, 3, 0]),
        );
        cog.reset().unwrap();
        cog.initial(UpdateMode::Fast, 25).unwrap();
        cog.send_image(UpdateMode::Fast, &next, &mut previous).unwrap();
        assert_eq!(previous, next);
        cog.update(UpdateMode::Fast).unwrap();
        cog.power_off().unwrap();
        assert_eq!(cog.state(), CogState::PoweredOff);
        finish(cog);
    }

    #[test]
    fn test_global_send_image_sends_blank_reference() {
        let panel = epd_specs::lookup(EPD_271_PS_TOUCH).unwrap();
        let frame = panel.frame_bytes();
        let next = vec![0xFF; frame];
        let mut previous = vec![0xAA; frame];

        let mut spi = vec![];
        spi.extend(index_data(0x00, &[0x0E]));
        spi.extend(index_data(0xE5, &[0x19]));
        spi.extend(index_data(0xE0, &[0x02]));
        spi.extend(index_data(0x00, &[0xCF, 0x8D]));
        spi.extend(blank_data(0x10, frame));
        spi.extend(index_data(0x13, &next));

        let mut cog = cog(
            EPD_271_PS_TOUCH,
            &spi,
            dc_sequence(&[true; 6]),
            rst_resets(1),
            busy_waits(&[0]),
        );
        cog.reset().unwrap();
        cog.initial(UpdateMode::Global, 25).unwrap();
        cog.send_image(UpdateMode::Global, &next, &mut previous).unwrap();
        assert_eq!(previous, next);
        finish(cog);
    }

    #[test]
    fn test_failed_global_transfer_keeps_previous() {
        let panel = epd_specs::lookup(EPD_271_PS_TOUCH).unwrap();
        let frame = panel.frame_bytes();
        let next = vec![0xFF; frame];
        let mut previous = vec![0xAA; frame];

        // initial(Global) takes 8 transactions; the 10th is the
        // reference-frame data window.
        let spi = FlakySpi { transactions: 0, fail_at: 10 };
        let pins = CogPins {
            dc: dc_sequence(&[true; 5]),
            rst: rst_resets(1),
            busy: busy_waits(&[0]),
        };
        let mut cog = Cog::new(panel, spi, pins, NoopDelay::new());

        cog.reset().unwrap();
        cog.initial(UpdateMode::Global, 25).unwrap();
        assert_eq!(
            cog.send_image(UpdateMode::Global, &next, &mut previous),
            Err(DisplayError::Communication)
        );
        assert!(previous.iter().all(|b| *b == 0xAA));
        assert_eq!(cog.state(), CogState::Initialized);

        let (spi, mut pins, _otp, _delay) = cog.release();
        assert_eq!(spi.transactions, 10);
        pins.dc.done();
        pins.rst.done();
        pins.busy.done();
    }

    // -----------------------------------------------------------------------
    // Test: sequencing guards
    // -----------------------------------------------------------------------

    #[test]
    fn test_out_of_order_calls_refused() {
        let mut cog = cog(EPD_271_PS_TOUCH, &[], idle(), idle(), idle());
        assert_eq!(cog.initial(UpdateMode::Fast, 25), Err(DisplayError::InvalidState));
        assert_eq!(cog.update(UpdateMode::Fast), Err(DisplayError::InvalidState));
        assert_eq!(cog.power_off(), Err(DisplayError::InvalidState));
        let mut previous = [0u8; 4];
        assert_eq!(
            cog.send_image(UpdateMode::Fast, &[0u8; 4], &mut previous),
            Err(DisplayError::InvalidState)
        );
        assert_eq!(cog.state(), CogState::Off);
        finish(cog);
    }

    #[test]
    fn test_wrong_buffer_length_refused() {
        let mut spi = vec![];
        spi.extend(index_data(0x00, &[0x0E]));
        spi.extend(index_data(0xE5, &[0x19]));
        spi.extend(index_data(0xE0, &[0x02]));
        spi.extend(index_data(0x00, &[0xCF, 0x8D]));

        let mut cog = cog(
            EPD_271_PS_TOUCH,
            &spi,
            dc_sequence(&[true; 4]),
            rst_resets(1),
            busy_waits(&[0]),
        );
        cog.reset().unwrap();
        cog.initial(UpdateMode::Global, 25).unwrap();
        let mut previous = [0u8; 16];
        assert_eq!(
            cog.send_image(UpdateMode::Global, &[0u8; 16], &mut previous),
            Err(DisplayError::InvalidBuffer)
        );
        finish(cog);
    }

    #[test]
    fn test_busy_timeout() {
        let mut spi = vec![];
        spi.extend(index_data(0x00, &[0x0E]));
        let busy = PinMock::new(&vec![PinTransaction::get(PinState::Low); 3]);

        let mut cog = cog(EPD_271_PS_TOUCH, &spi, dc_sequence(&[true]), rst_resets(1), busy)
            .with_config(Ext3Config::DEFAULT.with_busy_timeout(2));
        cog.reset().unwrap();
        assert_eq!(cog.initial(UpdateMode::Fast, 25), Err(DisplayError::Timeout));
        // Recoverable: reset is always allowed
        assert!(cog.fault().is_none());
        finish(cog);
    }

    fn idle() -> PinMock {
        PinMock::new(&[])
    }

    // -----------------------------------------------------------------------
    // Test: OTP calibration and soft-start
    // -----------------------------------------------------------------------

    #[test]
    fn test_medium_panel_calibrates_from_otp_and_runs_soft_start() {
        let panel = epd_specs::lookup(EPD_370_PS_TOUCH).unwrap();
        let frame = panel.frame_bytes();
        let next = vec![0x00; frame];
        let mut previous = vec![0x00; frame];

        let mut spi = vec![];
        spi.extend(index_data(0x00, &[0x0E]));
        spi.extend(index_data(0xE5, &[0x16 | 0x40]));
        spi.extend(index_data(0xE0, &[0x02]));
        spi.extend(index_data(0x00, &[0xDF, 0x8F]));
        spi.extend(index_data(0x50, &[0x07]));
        spi.extend(index_data(0x50, &[0x27]));
        spi.extend(index_data(0x10, &previous));
        spi.extend(index_data(0x13, &next));
        spi.extend(index_data(0x50, &[0x07]));
        spi.extend(command(Register::PowerOn));
        spi.extend(index_data(0x06, &[0x17]));
        spi.extend(index_data(0x06, &[0x17]));
        spi.extend(command(Register::Refresh));
        spi.extend(command(Register::PowerOff));

        // OTP read: DC low for the opcode, high for the data
        let mut dc_steps = vec![true];
        dc_steps.extend([true; 9]);
        dc_steps.push(false);
        dc_steps.extend([true; 2]);
        dc_steps.extend([false; 2]);

        let mut cog = cog(
            EPD_370_PS_TOUCH,
            &spi,
            dc_sequence(&dc_steps),
            rst_resets(3),
            busy_waits(&[0, 0, 0, 0]),
        )
        .with_otp_bus(MockOtp::new(otp_370()));

        cog.reset().unwrap();
        cog.initial(UpdateMode::Fast, 22).unwrap();
        let calibration = cog.calibration().unwrap();
        assert_eq!(calibration.bank, Some(epd_specs::Bank::Primary));
        let (psr, vcom) = PRESET_370;
        let preset = OtpCalibration::preset(psr, vcom);
        assert_eq!((calibration.psr, calibration.vcom), (preset.psr, preset.vcom));

        cog.send_image(UpdateMode::Fast, &next, &mut previous).unwrap();
        cog.update(UpdateMode::Fast).unwrap();
        cog.power_off().unwrap();

        let (mut spi, mut pins, otp, _delay) = cog.release();
        spi.done();
        pins.dc.done();
        pins.rst.done();
        pins.busy.done();
        assert_eq!(otp.commands(), &[0xA2]);
        assert!(!otp.is_three_wire());
    }

    #[test]
    fn test_missing_otp_marker_poisons_sequencer() {
        let mut cog = cog(EPD_370_PS_TOUCH, &[], dc_sequence(&[true]), rst_resets(2), idle())
            .with_otp_bus(MockOtp::new(vec![0x00; 0x0500]));

        assert_eq!(cog.calibrate(), Err(DisplayError::OtpCheckFailed));
        assert_eq!(cog.fault(), Some(DisplayError::OtpCheckFailed));
        // No further bus traffic: the mocks would reject it
        assert_eq!(cog.calibrate(), Err(DisplayError::OtpCheckFailed));
        assert_eq!(cog.initial(UpdateMode::Fast, 25), Err(DisplayError::OtpCheckFailed));
        assert!(!cog.is_calibrated());
        finish(cog);
    }

    #[test]
    fn test_otp_failure_latched_when_reset_after_read_fails() {
        // First pulse completes; the pulse after the read fails on its
        // first edge.
        let rst = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::High)
                .with_error(MockError::Io(std::io::ErrorKind::NotConnected)),
        ]);
        let mut cog = cog(EPD_370_PS_TOUCH, &[], dc_sequence(&[true]), rst, idle())
            .with_otp_bus(MockOtp::new(vec![0x00; 0x0500]));

        assert_eq!(cog.calibrate(), Err(DisplayError::OtpCheckFailed));
        assert_eq!(cog.fault(), Some(DisplayError::OtpCheckFailed));
        assert_eq!(cog.initial(UpdateMode::Global, 25), Err(DisplayError::OtpCheckFailed));
        finish(cog);
    }
}
