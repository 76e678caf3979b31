//! Screen integration tests: the facade driving the real COG sequencer over
//! mocked SPI and GPIO, plus multi-flush flows against `MockCog`.
//!
//! Run with: cargo test -p ext3 --test integration_screen

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};
use epd_specs::panels::{EPD_271_PS_TOUCH, EPD_370_KS_TOUCH};
use ext3::cog::CogPins;
use ext3::{Cog, CogState, Colour, Screen};
use platform::mocks::{CogCall, MockCog, MockOtp};
use platform::{CogProtocol, DisplayError, UpdateMode};

type MockedCog = Cog<SpiMock<u8>, PinMock, PinMock, PinMock, MockOtp, NoopDelay>;

const GUARD_NS: u32 = 50_000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Index window then data window, as the sequencer writes a register.
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

/// Bare command byte.
fn command(index: u8) -> Vec<SpiTransaction<u8>> {
    vec![
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(vec![index]),
        SpiTransaction::transaction_end(),
    ]
}

fn rst_pulses(count: usize) -> PinMock {
    let pulse = [
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
    ];
    let expectations: Vec<_> = pulse.iter().cloned().cycle().take(pulse.len() * count).collect();
    PinMock::new(&expectations)
}

/// 2.71" screen over the recording COG.
fn recording_screen() -> Screen<MockCog> {
    let panel = epd_specs::lookup(EPD_271_PS_TOUCH).unwrap();
    Screen::new(panel.id, MockCog::new(panel)).unwrap()
}

fn finish(cog: MockedCog) {
    let (mut spi, pins, _, _) = cog.release();
    let CogPins {
        mut dc,
        mut rst,
        mut busy,
    } = pins;
    spi.done();
    dc.done();
    rst.done();
    busy.done();
}

// ---------------------------------------------------------------------------
// Test: full fast update of a 2.71" panel at the wire level
// ---------------------------------------------------------------------------

#[test]
fn test_fast_flush_wire_sequence() {
    let panel = epd_specs::lookup(EPD_271_PS_TOUCH).unwrap();
    let frame = panel.frame_bytes();
    let mut next = vec![0x00; frame];
    next[0] = 0x80;

    let mut spi = vec![];
    spi.extend(index_data(0x00, &[0x0E]));
    spi.extend(index_data(0xE5, &[25 | 0x40]));
    spi.extend(index_data(0xE0, &[0x02]));
    spi.extend(index_data(0x00, &[0xCF | 0x10, 0x8D | 0x02]));
    spi.extend(index_data(0x50, &[0x07]));
    spi.extend(index_data(0x10, &vec![0x00; frame]));
    spi.extend(index_data(0x13, &next));
    spi.extend(command(0x04));
    spi.extend(command(0x12));
    spi.extend(command(0x02));

    let mut dc = vec![];
    for _ in 0..7 {
        dc.push(PinTransaction::set(PinState::Low));
        dc.push(PinTransaction::set(PinState::High));
    }
    dc.extend(vec![PinTransaction::set(PinState::Low); 3]);

    let cog = Cog::new(
        panel,
        SpiMock::new(&spi),
        CogPins {
            dc: PinMock::new(&dc),
            rst: rst_pulses(1),
            busy: PinMock::new(&vec![PinTransaction::get(PinState::High); 4]),
        },
        NoopDelay::new(),
    )
    .with_otp_bus(MockOtp::new(vec![]));

    let mut screen = Screen::new(EPD_271_PS_TOUCH, cog).unwrap();
    screen.begin().unwrap();
    screen.point(0, 0, Colour::Black);
    assert_eq!(screen.flush().unwrap(), UpdateMode::Fast);

    let buffer = screen.framebuffer().unwrap();
    assert_eq!(buffer.previous(), next.as_slice());
    assert_eq!(screen.cog().state(), CogState::PoweredOff);
    finish(screen.release());
}

// ---------------------------------------------------------------------------
// Test: an OTP check failure disables the panel for good
// ---------------------------------------------------------------------------

#[test]
fn test_missing_otp_marker_disables_panel() {
    let panel = epd_specs::lookup(EPD_370_KS_TOUCH).unwrap();
    let cog = Cog::new(
        panel,
        SpiMock::new(&[]),
        CogPins {
            dc: PinMock::new(&[
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
            ]),
            rst: rst_pulses(2),
            busy: PinMock::new(&[]),
        },
        NoopDelay::new(),
    )
    .with_otp_bus(MockOtp::new(vec![0x00; 0x0900]));

    let mut screen = Screen::new(EPD_370_KS_TOUCH, cog).unwrap();
    assert_eq!(screen.begin(), Err(DisplayError::OtpCheckFailed));
    // Second attempt fails without touching the bus again.
    assert_eq!(screen.begin(), Err(DisplayError::OtpCheckFailed));
    assert_eq!(screen.flush(), Err(DisplayError::InvalidState));

    let cog = screen.release();
    assert_eq!(cog.fault(), Some(DisplayError::OtpCheckFailed));
    assert!(!cog.is_calibrated());
    finish(cog);
}

// ---------------------------------------------------------------------------
// Test: consecutive flushes keep the differential reference in step
// ---------------------------------------------------------------------------

#[test]
fn test_previous_tracks_every_flush() {
    let mut screen = recording_screen();
    screen.begin().unwrap();

    for step in 0..4u16 {
        screen.point(step, step, Colour::Black);
        assert_eq!(screen.flush().unwrap(), UpdateMode::Fast);
        let buffer = screen.framebuffer().unwrap();
        assert_eq!(buffer.next(), buffer.previous());
    }
    assert_eq!(screen.cog().frames().len(), 4);
}

#[test]
fn test_temperature_change_between_flushes() {
    let mut screen = recording_screen();
    screen.begin().unwrap();

    screen.set_temperature_c(10);
    screen.point(5, 5, Colour::Black);
    assert_eq!(screen.flush().unwrap(), UpdateMode::None);
    assert_eq!(screen.flush_mode(UpdateMode::Global).unwrap(), UpdateMode::Global);

    screen.set_temperature_c(20);
    assert_eq!(screen.flush().unwrap(), UpdateMode::Fast);

    let initials: Vec<_> = screen
        .cog()
        .calls()
        .iter()
        .filter_map(|call| match call {
            CogCall::Initial(mode, t) => Some((*mode, *t)),
            _ => None,
        })
        .collect();
    assert_eq!(initials, [(UpdateMode::Global, 10), (UpdateMode::Fast, 20)]);
}

#[test]
fn test_begin_again_keeps_reference_frame() {
    let mut screen = recording_screen();
    screen.begin().unwrap();
    screen.clear(Colour::Black);
    screen.flush().unwrap();

    screen.begin().unwrap();
    let buffer = screen.framebuffer().unwrap();
    assert!(buffer.previous().iter().all(|b| *b == 0xFF));
    assert!(buffer.next().iter().all(|b| *b == 0x00));
    assert!(screen.cog().is_calibrated());
}
