//! Capacitive touch reader
//!
//! Polls the panel's touch controller over I2C and turns raw reports into
//! press / move / release events. Two controller protocols exist:
//!
//! - **Register model** (2.71"): read the finger count, then the report.
//!   Bounds come from the controller's configuration block.
//! - **Interrupt model** (3.70"): a finger pulls INT low; only then is the
//!   report read. Bounds are fixed.
//!
//! Some controllers never report lift-off. The reader remembers the last
//! contact and synthesises exactly one RELEASE at its position when the
//! finger disappears.

pub mod registers;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::I2c;

use epd_specs::{PanelDescriptor, TouchModel};
use platform::{DisplayError, TouchEvent, TouchInput, TouchKind};

use crate::config::Ext3Config;
use registers::{interrupt_model, register_model};

/// Largest raw coordinates the controller reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchBounds {
    /// Largest raw X (short side).
    pub x_max: u16,
    /// Largest raw Y (long side).
    pub y_max: u16,
}

/// What one controller read found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Contact {
    /// Finger down at raw `(x, y)`.
    Finger(u16, u16),
    /// Explicit lift-off report, with a position when the controller sent one.
    Lifted(Option<(u16, u16)>),
    /// Nothing on the panel.
    Absent,
}

/// Touch controller driver.
///
/// `INT` is only read by the interrupt model, but both models expect the
/// line to be wired.
pub struct TouchReader<I2C, RST, INT, DELAY> {
    i2c: I2C,
    rst: RST,
    int: INT,
    delay: DELAY,
    model: TouchModel,
    bounds: TouchBounds,
    poll_ms: u32,
    /// Last contact position while a finger is down.
    pending: Option<(u16, u16)>,
}

impl<I2C, RST, INT, DELAY> TouchReader<I2C, RST, INT, DELAY>
where
    I2C: I2c,
    RST: OutputPin,
    INT: InputPin,
    DELAY: DelayNs,
{
    /// Create a reader for `model`. Call [`begin`](Self::begin) before
    /// polling.
    pub fn new(model: TouchModel, i2c: I2C, rst: RST, int: INT, delay: DELAY) -> Self {
        let bounds = match model {
            TouchModel::Interrupt { x_max, y_max, .. } => TouchBounds { x_max, y_max },
            TouchModel::Register { .. } => TouchBounds::default(),
        };
        Self {
            i2c,
            rst,
            int,
            delay,
            model,
            bounds,
            poll_ms: Ext3Config::DEFAULT.touch_poll_ms,
            pending: None,
        }
    }

    /// Create the reader fitted to `panel`.
    ///
    /// Panels without a touch controller are refused.
    pub fn for_panel(
        panel: &PanelDescriptor,
        i2c: I2C,
        rst: RST,
        int: INT,
        delay: DELAY,
    ) -> Result<Self, DisplayError> {
        let model = panel.touch.ok_or(DisplayError::UnsupportedPanel(panel.id))?;
        Ok(Self::new(model, i2c, rst, int, delay))
    }

    /// Take the poll delay from `config`.
    #[must_use]
    pub fn with_config(mut self, config: Ext3Config) -> Self {
        self.poll_ms = config.touch_poll_ms;
        self
    }

    /// Reset the controller and learn its coordinate bounds.
    pub fn begin(&mut self) -> Result<TouchBounds, DisplayError> {
        let reset_ms = match self.model {
            TouchModel::Register { .. } => register_model::RESET_MS,
            TouchModel::Interrupt { .. } => interrupt_model::RESET_MS,
        };
        let [high, low, recover] = reset_ms;
        self.rst.set_high().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(high);
        self.rst.set_low().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(low);
        self.rst.set_high().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(recover);

        if let TouchModel::Register { address } = self.model {
            let mut config = [0u8; register_model::CONFIG_LEN];
            self.write_read(address, register_model::CONFIG, &mut config)?;
            self.bounds = registers::decode_bounds(config);
        }
        self.pending = None;

        #[cfg(feature = "defmt")]
        defmt::info!("touch ready at 0x{=u8:02x}, {}", self.model.address(), self.bounds);
        Ok(self.bounds)
    }

    /// Raw coordinate bounds, valid after [`begin`](Self::begin).
    pub fn bounds(&self) -> TouchBounds {
        self.bounds
    }

    /// `true` while a contact is remembered for the next release.
    pub fn is_pressed(&self) -> bool {
        self.pending.is_some()
    }

    /// Give the bus, pins and delay back.
    pub fn release(self) -> (I2C, RST, INT, DELAY) {
        (self.i2c, self.rst, self.int, self.delay)
    }

    /// Register write followed by a separate read.
    fn write_read(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), DisplayError> {
        self.i2c
            .write(address, &[register])
            .map_err(|_| DisplayError::Touch)?;
        self.i2c.read(address, buf).map_err(|_| DisplayError::Touch)
    }

    fn read_register_model(&mut self, address: u8) -> Result<Contact, DisplayError> {
        let mut count = [0u8];
        self.write_read(address, register_model::FINGER_COUNT, &mut count)?;
        let [count] = count;
        if !(1..=register_model::MAX_FINGERS).contains(&count) {
            return Ok(Contact::Absent);
        }

        let mut report = [0u8; register_model::REPORT_LEN];
        self.write_read(address, register_model::REPORT, &mut report)?;
        let report = registers::decode_register_report(report);
        Ok(if report.touching {
            Contact::Finger(report.x, report.y)
        } else {
            Contact::Lifted(Some((report.x, report.y)))
        })
    }

    fn read_interrupt_model(&mut self, address: u8) -> Result<Contact, DisplayError> {
        if !self.interrupt()? {
            return Ok(Contact::Absent);
        }

        self.delay.delay_ms(interrupt_model::REPORT_DELAY_MS);
        let mut report = [0u8; interrupt_model::REPORT_LEN];
        self.write_read(address, interrupt_model::REPORT, &mut report)?;
        Ok(match registers::decode_interrupt_report(report) {
            Some((x, y)) => Contact::Finger(x, y),
            None => Contact::Lifted(None),
        })
    }

    /// Advance the press / move / release state machine.
    fn track(&mut self, contact: Contact) -> TouchEvent {
        match contact {
            Contact::Finger(x, y) => {
                let kind = if self.pending.is_some() {
                    TouchKind::Move
                } else {
                    TouchKind::Press
                };
                self.pending = Some((x, y));
                TouchEvent::contact(kind, x, y)
            }
            Contact::Lifted(at) => match self.pending.take() {
                Some(last) => {
                    let (x, y) = at.unwrap_or(last);
                    TouchEvent::contact(TouchKind::Release, x, y)
                }
                None => TouchEvent::NONE,
            },
            Contact::Absent => match self.pending.take() {
                Some((x, y)) => TouchEvent::contact(TouchKind::Release, x, y),
                None => TouchEvent::NONE,
            },
        }
    }
}

impl<I2C, RST, INT, DELAY> TouchInput for TouchReader<I2C, RST, INT, DELAY>
where
    I2C: I2c,
    RST: OutputPin,
    INT: InputPin,
    DELAY: DelayNs,
{
    fn poll(&mut self) -> Result<TouchEvent, DisplayError> {
        self.delay.delay_ms(self.poll_ms);
        let contact = match self.model {
            TouchModel::Register { address } => self.read_register_model(address)?,
            TouchModel::Interrupt { address, .. } => self.read_interrupt_model(address)?,
        };
        let event = self.track(contact);

        #[cfg(feature = "defmt")]
        if event.is_event() {
            defmt::trace!("touch {}", event);
        }
        Ok(event)
    }

    /// INT is active low.
    fn interrupt(&mut self) -> Result<bool, DisplayError> {
        self.int.is_low().map_err(|_| DisplayError::Gpio)
    }
}

/// Scale `value` from `0..=max` onto `0..size`.
fn scale(value: u16, max: u16, size: u16) -> u16 {
    if max == 0 || size == 0 {
        return 0;
    }
    let value = u32::from(value.min(max));
    // value <= max and size - 1 < size: the result is below size.
    #[allow(clippy::arithmetic_side_effects)]
    let scaled = value * (u32::from(size) - 1) / u32::from(max);
    u16::try_from(scaled).unwrap_or(size.saturating_sub(1))
}

/// Convert a raw touch event to logical screen coordinates.
///
/// `geometry` is the native `(short, long)` panel size. The raw X axis runs
/// along the short side, Y along the long side; the result uses the same
/// orientation convention as the frame buffer, so a touch lands on the
/// pixel drawn at the reported coordinates. Events without a contact pass
/// through unchanged.
pub fn map_to_screen(
    event: TouchEvent,
    orientation: u8,
    geometry: (u16, u16),
    bounds: TouchBounds,
) -> TouchEvent {
    if !event.is_event() {
        return event;
    }

    let (short, long) = geometry;
    let sx = scale(event.x, bounds.x_max, short);
    let sy = scale(event.y, bounds.y_max, long);

    // sx < short and sy < long after scaling.
    #[allow(clippy::arithmetic_side_effects)]
    let (x, y) = match orientation % 4 {
        1 => (sy, short - 1 - sx),
        2 => (short - 1 - sx, long - 1 - sy),
        3 => (long - 1 - sy, sx),
        _ => (sx, sy),
    };

    TouchEvent { x, y, ..event }
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
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use platform::TOUCH_PRESSURE;

    const REGISTER: TouchModel = TouchModel::Register { address: 0x41 };
    const INTERRUPT: TouchModel = TouchModel::Interrupt {
        address: 0x38,
        x_max: 239,
        y_max: 415,
    };

    type TestReader = TouchReader<I2cMock, PinMock, PinMock, NoopDelay>;

    fn reset_pins() -> PinMock {
        PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ])
    }

    fn finish(reader: TestReader) {
        let (mut i2c, mut rst, mut int, _) = reader.release();
        i2c.done();
        rst.done();
        int.done();
    }

    fn register_read(reg: u8, data: Vec<u8>) -> [I2cTransaction; 2] {
        [
            I2cTransaction::write(0x41, vec![reg]),
            I2cTransaction::read(0x41, data),
        ]
    }

    #[test]
    fn test_register_model_bounds() {
        let i2c = I2cMock::new(&register_read(0x20, vec![0xAF, 0x00, 0x07, 0x01, 0, 0, 0, 0, 0, 0]));
        let mut reader = TouchReader::new(REGISTER, i2c, reset_pins(), PinMock::new(&[]), NoopDelay::new());
        let bounds = reader.begin().unwrap();
        assert_eq!(bounds, TouchBounds { x_max: 175, y_max: 263 });
        finish(reader);
    }

    #[test]
    fn test_register_model_press_move_release() {
        let mut expectations = vec![];
        // press
        expectations.extend(register_read(0x10, vec![1]));
        expectations.extend(register_read(0x11, vec![0x80, 0, 10, 0, 20]));
        // move
        expectations.extend(register_read(0x10, vec![1]));
        expectations.extend(register_read(0x11, vec![0x80, 0, 12, 0, 22]));
        // finger gone without a release report
        expectations.extend(register_read(0x10, vec![0]));
        // idle
        expectations.extend(register_read(0x10, vec![0]));

        let mut reader = TouchReader::new(
            REGISTER,
            I2cMock::new(&expectations),
            PinMock::new(&[]),
            PinMock::new(&[]),
            NoopDelay::new(),
        );

        let press = reader.poll().unwrap();
        assert_eq!(press, TouchEvent::contact(TouchKind::Press, 10, 20));
        assert_eq!(press.z, TOUCH_PRESSURE);
        assert_eq!(reader.poll().unwrap().kind, TouchKind::Move);

        let release = reader.poll().unwrap();
        assert_eq!(release, TouchEvent::contact(TouchKind::Release, 12, 22));
        assert_eq!(reader.poll().unwrap(), TouchEvent::NONE);
        assert!(!reader.is_pressed());
        finish(reader);
    }

    #[test]
    fn test_explicit_release_reported_once() {
        let mut expectations = vec![];
        expectations.extend(register_read(0x10, vec![1]));
        expectations.extend(register_read(0x11, vec![0x80, 0, 5, 0, 6]));
        // explicit lift-off report
        expectations.extend(register_read(0x10, vec![1]));
        expectations.extend(register_read(0x11, vec![0x00, 0, 7, 0, 8]));
        // controller still lists the finger as lifted
        expectations.extend(register_read(0x10, vec![1]));
        expectations.extend(register_read(0x11, vec![0x00, 0, 7, 0, 8]));
        expectations.extend(register_read(0x10, vec![0]));

        let mut reader = TouchReader::new(
            REGISTER,
            I2cMock::new(&expectations),
            PinMock::new(&[]),
            PinMock::new(&[]),
            NoopDelay::new(),
        );

        assert_eq!(reader.poll().unwrap().kind, TouchKind::Press);
        assert_eq!(
            reader.poll().unwrap(),
            TouchEvent::contact(TouchKind::Release, 7, 8)
        );
        assert_eq!(reader.poll().unwrap(), TouchEvent::NONE);
        assert_eq!(reader.poll().unwrap(), TouchEvent::NONE);
        finish(reader);
    }

    #[test]
    fn test_interrupt_model_sequence() {
        let report = vec![0, 0, 1, 0x40, 100, 0x01, 0x2C, 0, 0];
        let i2c = I2cMock::new(&[
            I2cTransaction::write(0x38, vec![0x00]),
            I2cTransaction::read(0x38, report),
        ]);
        let int = PinMock::new(&[
            PinTransaction::get(PinState::Low),
            PinTransaction::get(PinState::High),
            PinTransaction::get(PinState::High),
        ]);
        let mut reader = TouchReader::new(INTERRUPT, i2c, reset_pins(), int, NoopDelay::new());
        assert_eq!(reader.begin().unwrap(), TouchBounds { x_max: 239, y_max: 415 });

        assert_eq!(
            reader.poll().unwrap(),
            TouchEvent::contact(TouchKind::Press, 100, 300)
        );
        assert_eq!(
            reader.poll().unwrap(),
            TouchEvent::contact(TouchKind::Release, 100, 300)
        );
        assert_eq!(reader.poll().unwrap(), TouchEvent::NONE);
        finish(reader);
    }

    #[test]
    fn test_i2c_failure_maps_to_touch_error() {
        use embedded_hal::i2c::ErrorKind;

        let i2c = I2cMock::new(&[I2cTransaction::write(0x41, vec![0x10]).with_error(ErrorKind::Other)]);
        let mut reader = TouchReader::new(REGISTER, i2c, PinMock::new(&[]), PinMock::new(&[]), NoopDelay::new());
        assert_eq!(reader.poll(), Err(DisplayError::Touch));
        finish(reader);
    }

    #[test]
    fn test_for_panel_uses_descriptor_model() {
        let panel = epd_specs::lookup(epd_specs::panels::EPD_370_KS_TOUCH).unwrap();
        let reader = TouchReader::for_panel(
            panel,
            I2cMock::new(&[]),
            PinMock::new(&[]),
            PinMock::new(&[]),
            NoopDelay::new(),
        )
        .unwrap();
        assert_eq!(reader.bounds(), TouchBounds { x_max: 239, y_max: 415 });
        finish(reader);
    }

    #[test]
    fn test_map_to_screen_orientations() {
        let bounds = TouchBounds { x_max: 175, y_max: 263 };
        let geometry = (176, 264);
        let event = TouchEvent::contact(TouchKind::Press, 10, 20);

        let at = |orientation| {
            let mapped = map_to_screen(event, orientation, geometry, bounds);
            (mapped.x, mapped.y)
        };
        assert_eq!(at(0), (10, 20));
        assert_eq!(at(1), (20, 165));
        assert_eq!(at(2), (165, 243));
        assert_eq!(at(3), (243, 10));
        assert_eq!(map_to_screen(TouchEvent::NONE, 1, geometry, bounds), TouchEvent::NONE);
    }

    #[test]
    fn test_map_to_screen_scales_and_clamps() {
        let bounds = TouchBounds { x_max: 479, y_max: 831 };
        let event = TouchEvent::contact(TouchKind::Move, 479, 2000);
        let mapped = map_to_screen(event, 0, (240, 416), bounds);
        assert_eq!((mapped.x, mapped.y), (239, 415));
        assert_eq!(mapped.kind, TouchKind::Move);
    }
}
