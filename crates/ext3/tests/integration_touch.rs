//! Touch integration tests: the reader over a mocked I2C bus, mapped through
//! the screen's current orientation.
//!
//! Run with: cargo test -p ext3 --test integration_touch

#![allow(clippy::unwrap_used, clippy::expect_used)]

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use epd_specs::panels::{EPD_271_PS_TOUCH, EPD_370_PS_TOUCH};
use ext3::{Screen, TouchReader};
use platform::mocks::MockCog;
use platform::{TouchEvent, TouchInput, TouchKind};

const ADDRESS_271: u8 = 0x41;

fn reset_pulse() -> PinMock {
    PinMock::new(&[
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
    ])
}

fn register_read(register: u8, data: Vec<u8>) -> [I2cTransaction; 2] {
    [
        I2cTransaction::write(ADDRESS_271, vec![register]),
        I2cTransaction::read(ADDRESS_271, data),
    ]
}

// ---------------------------------------------------------------------------
// Test: press, move, synthesised release on a rotated 2.71" screen
// ---------------------------------------------------------------------------

#[test]
fn test_touch_gesture_in_landscape() {
    let mut i2c = vec![];
    // Bounds 175 x 263: raw coordinates equal pixels.
    i2c.extend(register_read(0x20, vec![0xAF, 0x00, 0x07, 0x01, 0, 0, 0, 0, 0, 0]));
    i2c.extend(register_read(0x10, vec![1]));
    i2c.extend(register_read(0x11, vec![0x80, 0x00, 10, 0x00, 20]));
    i2c.extend(register_read(0x10, vec![2]));
    i2c.extend(register_read(0x11, vec![0x80, 0x00, 11, 0x00, 30]));
    i2c.extend(register_read(0x10, vec![0]));
    i2c.extend(register_read(0x10, vec![0]));

    let panel = epd_specs::lookup(EPD_271_PS_TOUCH).unwrap();
    let mut touch = TouchReader::for_panel(
        panel,
        I2cMock::new(&i2c),
        reset_pulse(),
        PinMock::new(&[]),
        NoopDelay::new(),
    )
    .unwrap();
    let bounds = touch.begin().unwrap();

    let mut screen = Screen::new(EPD_271_PS_TOUCH, MockCog::new(panel)).unwrap();
    screen.begin().unwrap();
    screen.set_orientation(1);

    let events: Vec<TouchEvent> = (0..4)
        .map(|_| screen.get_touch(&mut touch, bounds).unwrap())
        .collect();

    assert_eq!(
        events,
        [
            TouchEvent::contact(TouchKind::Press, 20, 165),
            TouchEvent::contact(TouchKind::Move, 30, 164),
            TouchEvent::contact(TouchKind::Release, 30, 164),
            TouchEvent::NONE,
        ]
    );

    let (mut i2c, mut rst, mut int, _) = touch.release();
    i2c.done();
    rst.done();
    int.done();
}

// ---------------------------------------------------------------------------
// Test: interrupt-model panel ignores the bus while INT is released
// ---------------------------------------------------------------------------

#[test]
fn test_interrupt_panel_idle_never_reads() {
    let panel = epd_specs::lookup(EPD_370_PS_TOUCH).unwrap();
    let int = PinMock::new(&vec![PinTransaction::get(PinState::High); 3]);
    let mut touch = TouchReader::for_panel(panel, I2cMock::new(&[]), reset_pulse(), int, NoopDelay::new()).unwrap();
    touch.begin().unwrap();

    assert!(!touch.interrupt().unwrap());
    assert_eq!(touch.poll().unwrap(), TouchEvent::NONE);
    assert_eq!(touch.poll().unwrap(), TouchEvent::NONE);

    let (mut i2c, mut rst, mut int, _) = touch.release();
    i2c.done();
    rst.done();
    int.done();
}
