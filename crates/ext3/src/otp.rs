//! OTP calibration reader
//!
//! Streams the COG's one-time-programmable memory over the 3-wire bus and
//! extracts the PSR, VCOM and soft-start bytes described by an
//! [`OtpLayout`]. The memory is read strictly forward: bank markers and
//! fields are reached by skipping bytes, never by seeking back.
//!
//! The caller pulses the panel reset before and after a read; this module
//! only owns the bus traffic.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use epd_specs::{Bank, OtpField, OtpLayout, OTP_BANK_MARKER, OTP_READ_COMMAND, SOFT_START_MAX};
use platform::{DisplayError, ThreeWireSpi};

use crate::cog::soft_start::SoftStartOps;

/// Calibration values the COG sequencer needs, loaded once per driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCalibration {
    /// PSR0 / PSR1.
    pub psr: [u8; 2],
    /// VCOM / data interval byte for fast mode.
    pub vcom: u8,
    /// Bank the values came from, `None` for a preset.
    pub bank: Option<Bank>,
    /// DC/DC soft-start bytecode, empty when the panel has none.
    pub soft_start: heapless::Vec<u8, SOFT_START_MAX>,
}

impl OtpCalibration {
    /// Calibration of a panel without OTP.
    pub fn preset(psr: [u8; 2], vcom: u8) -> Self {
        Self {
            psr,
            vcom,
            bank: None,
            soft_start: heapless::Vec::new(),
        }
    }
}

/// Forward-only reader over an open OTP stream.
struct OtpStream<'a, OTP> {
    bus: &'a mut OTP,
    /// Offset of the next byte the bus will return.
    cursor: usize,
}

impl<OTP: ThreeWireSpi> OtpStream<'_, OTP> {
    fn seek(&mut self, offset: usize) -> Result<(), DisplayError> {
        let gap = offset.checked_sub(self.cursor).ok_or(DisplayError::OtpFormat)?;
        self.bus.skip(gap).map_err(|_| DisplayError::Communication)?;
        self.cursor = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), DisplayError> {
        for byte in buf.iter_mut() {
            *byte = self.bus.read_byte().map_err(|_| DisplayError::Communication)?;
        }
        self.cursor = self.cursor.saturating_add(buf.len());
        Ok(())
    }

    fn read_byte_at(&mut self, offset: usize) -> Result<u8, DisplayError> {
        self.seek(offset)?;
        let mut byte = [0u8];
        self.read(&mut byte)?;
        let [value] = byte;
        Ok(value)
    }

    fn read_field(&mut self, base: usize, field: OtpField, buf: &mut [u8]) -> Result<(), DisplayError> {
        let dest = buf
            .get_mut(..usize::from(field.len))
            .ok_or(DisplayError::OtpFormat)?;
        self.seek(base.saturating_add(usize::from(field.offset)))?;
        self.read(dest)
    }
}

/// Read the calibration described by `layout`.
///
/// The bus is switched back to 4-wire mode before returning, on success and
/// on failure alike.
pub fn read_calibration<OTP, DC, DELAY>(
    bus: &mut OTP,
    dc: &mut DC,
    delay: &mut DELAY,
    layout: &OtpLayout,
    settle_ms: u32,
) -> Result<OtpCalibration, DisplayError>
where
    OTP: ThreeWireSpi,
    DC: OutputPin,
    DELAY: DelayNs,
{
    if !layout.is_well_formed() {
        return Err(DisplayError::OtpFormat);
    }

    bus.enter().map_err(|_| DisplayError::Communication)?;
    let result = read_banks(bus, dc, delay, layout, settle_ms);
    let deselected = bus.select(false);
    let exited = bus.exit();

    let calibration = result?;
    deselected.map_err(|_| DisplayError::Communication)?;
    exited.map_err(|_| DisplayError::Communication)?;
    Ok(calibration)
}

fn read_banks<OTP, DC, DELAY>(
    bus: &mut OTP,
    dc: &mut DC,
    delay: &mut DELAY,
    layout: &OtpLayout,
    settle_ms: u32,
) -> Result<OtpCalibration, DisplayError>
where
    OTP: ThreeWireSpi,
    DC: OutputPin,
    DELAY: DelayNs,
{
    let comm = |_| DisplayError::Communication;

    dc.set_low().map_err(|_| DisplayError::Gpio)?;
    bus.select(true).map_err(comm)?;
    bus.write_byte(OTP_READ_COMMAND).map_err(comm)?;
    bus.select(false).map_err(comm)?;
    delay.delay_ms(settle_ms);
    dc.set_high().map_err(|_| DisplayError::Gpio)?;
    bus.select(true).map_err(comm)?;
    // Dummy byte
    bus.read_byte().map_err(comm)?;

    let mut stream = OtpStream { bus, cursor: 0 };

    let [primary, secondary] = layout.bank_offsets.map(usize::from);
    let (bank, base) = if stream.read_byte_at(primary)? == OTP_BANK_MARKER {
        (Bank::Primary, primary)
    } else if stream.read_byte_at(secondary)? == OTP_BANK_MARKER {
        (Bank::Secondary, secondary)
    } else {
        #[cfg(feature = "defmt")]
        defmt::error!("OTP check failed: no bank marker");
        return Err(DisplayError::OtpCheckFailed);
    };

    let mut psr = [0u8; 2];
    stream.read_field(base, layout.psr, &mut psr)?;
    let mut vcom = [0u8; 1];
    stream.read_field(base, layout.vcom, &mut vcom)?;
    let [vcom] = vcom;

    let mut soft_start = heapless::Vec::new();
    if let Some(field) = layout.soft_start {
        let mut table = [0u8; SOFT_START_MAX];
        stream.read_field(base, field, &mut table)?;
        let table = table
            .get(..usize::from(field.len))
            .ok_or(DisplayError::OtpFormat)?;
        SoftStartOps::validate(table)?;
        soft_start
            .extend_from_slice(table)
            .map_err(|_| DisplayError::OtpFormat)?;
    }

    #[cfg(feature = "defmt")]
    defmt::debug!(
        "OTP bank {}: psr={:x} vcom={:x} soft-start={} bytes",
        bank,
        psr,
        vcom,
        soft_start.len()
    );

    Ok(OtpCalibration {
        psr,
        vcom,
        bank: Some(bank),
        soft_start,
    })
}

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
    use platform::mocks::MockOtp;

    const LAYOUT: OtpLayout = OtpLayout {
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
            len: 16,
        }),
    };

    /// OTP image as the bus returns it: dummy byte, then memory.
    fn image(bank: usize) -> Vec<u8> {
        let mut memory = vec![0xFF; 0x0800];
        memory[bank] = OTP_BANK_MARKER;
        memory[bank + 0xB1] = 0xCF;
        memory[bank + 0xB2] = 0x8F;
        memory[bank + 0xB3] = 0x07;
        memory[bank + 0xC0..bank + 0xC6].copy_from_slice(&[0x01, 0x02, 0x06, 0x17, 0x0A, 0x00]);
        let mut stream = vec![0x00];
        stream.extend(memory);
        stream
    }

    fn dc_pin() -> PinMock {
        PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ])
    }

    #[test]
    fn test_reads_primary_bank() {
        let mut bus = MockOtp::new(image(0x0000));
        let mut dc = dc_pin();
        let cal = read_calibration(&mut bus, &mut dc, &mut NoopDelay::new(), &LAYOUT, 10).unwrap();

        assert_eq!(cal.bank, Some(Bank::Primary));
        assert_eq!(cal.psr, [0xCF, 0x8F]);
        assert_eq!(cal.vcom, 0x07);
        assert_eq!(cal.soft_start.len(), 16);
        assert_eq!(cal.soft_start[..5], [0x01, 0x02, 0x06, 0x17, 0x0A]);
        assert_eq!(bus.commands(), &[OTP_READ_COMMAND]);
        assert!(!bus.is_three_wire());
        assert!(!bus.is_selected());
        dc.done();
    }

    #[test]
    fn test_falls_back_to_secondary_bank() {
        let mut bus = MockOtp::new(image(0x0400));
        let mut dc = dc_pin();
        let cal = read_calibration(&mut bus, &mut dc, &mut NoopDelay::new(), &LAYOUT, 10).unwrap();
        assert_eq!(cal.bank, Some(Bank::Secondary));
        assert_eq!(cal.psr, [0xCF, 0x8F]);
        dc.done();
    }

    #[test]
    fn test_missing_marker_is_fatal_and_restores_bus() {
        let mut bus = MockOtp::new(vec![0x00; 0x0900]);
        let mut dc = dc_pin();
        let err = read_calibration(&mut bus, &mut dc, &mut NoopDelay::new(), &LAYOUT, 10).unwrap_err();
        assert_eq!(err, DisplayError::OtpCheckFailed);
        assert!(err.is_fatal());
        assert!(!bus.is_three_wire());
        assert_eq!(bus.mode_switches(), (1, 1));
        dc.done();
    }

    #[test]
    fn test_truncated_soft_start_rejected() {
        // Second block at 0xC5 announces 7 data bytes, the field ends 7
        // bytes later.
        let mut memory = image(0x0000);
        memory[1 + 0xC5] = 0x07;
        let mut layout = LAYOUT;
        layout.soft_start = Some(OtpField {
            offset: 0x00C0,
            len: 12,
        });
        let mut bus = MockOtp::new(memory);
        let mut dc = dc_pin();
        let err = read_calibration(&mut bus, &mut dc, &mut NoopDelay::new(), &layout, 10).unwrap_err();
        assert_eq!(err, DisplayError::OtpFormat);
        assert!(!bus.is_three_wire());
        dc.done();
    }

    #[test]
    fn test_bus_failure_maps_to_communication() {
        let mut bus = MockOtp::new(image(0x0000)).fail_reads_after(4);
        let mut dc = dc_pin();
        let err = read_calibration(&mut bus, &mut dc, &mut NoopDelay::new(), &LAYOUT, 10).unwrap_err();
        assert_eq!(err, DisplayError::Communication);
        assert!(!bus.is_three_wire());
        dc.done();
    }

    #[test]
    fn test_malformed_layout_never_touches_bus() {
        let mut bus = MockOtp::new(vec![]);
        let mut dc = PinMock::new(&[]);
        let mut layout = LAYOUT;
        layout.bank_offsets = [0x0400, 0x0000];
        let err = read_calibration(&mut bus, &mut dc, &mut NoopDelay::new(), &layout, 10).unwrap_err();
        assert_eq!(err, DisplayError::OtpFormat);
        assert_eq!(bus.mode_switches(), (0, 0));
        dc.done();
    }
}
