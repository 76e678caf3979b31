//! Driver facade
//!
//! [`Screen`] ties the registry, the frame buffer, the temperature policy
//! and a [`CogProtocol`] implementation together. It is what applications
//! draw on and flush.

use core::fmt::Write as _;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_hal::digital::OutputPin;

use epd_specs::{check_mode, fahrenheit_to_celsius, Features, PanelDescriptor, DEFAULT_TEMPERATURE_C};
use platform::config::LIBRARY_NAME_SHORT;
use platform::{CogProtocol, DisplayError, TouchEvent, TouchInput, UpdateMode};

use crate::framebuffer::{Colour, FrameBuffer};
use crate::touch::{map_to_screen, TouchBounds};

/// Pause between the two passes of [`Screen::regenerate`].
const REGENERATE_PAUSE_MS: u32 = 100;

/// Capacity of the [`Screen::who_am_i`] string.
pub const WHO_AM_I_LEN: usize = 32;

/// Feature letters shown by [`Screen::who_am_i`], in label order.
const FEATURE_LETTERS: [(Features, char); 5] = [
    (Features::FAST, 'F'),
    (Features::TOUCH, 'T'),
    (Features::OTHER, 'A'),
    (Features::WIDE_TEMPERATURE, 'W'),
    (Features::RED, 'R'),
];

/// One panel: frame buffer, temperature and COG protocol.
///
/// Drawing before [`begin`](Self::begin) is ignored and reads back white;
/// flushing before it fails with [`DisplayError::InvalidState`].
pub struct Screen<C> {
    panel: &'static PanelDescriptor,
    cog: C,
    buffer: Option<FrameBuffer>,
    temperature_c: i8,
}

impl<C: CogProtocol> Screen<C> {
    /// Resolve `panel_id` in the registry.
    ///
    /// An unknown identifier is fatal: nothing can be driven without a
    /// descriptor.
    pub fn new(panel_id: u32, cog: C) -> Result<Self, DisplayError> {
        let panel = epd_specs::lookup(panel_id).map_err(|err| {
            #[cfg(feature = "defmt")]
            defmt::error!("unsupported panel 0x{=u32:06x}", err.0);
            DisplayError::from(err)
        })?;
        Self::with_descriptor(panel, cog)
    }

    /// Use an already resolved descriptor.
    ///
    /// `cog` must drive the same panel; a mismatch is fatal, since the
    /// frame size and temperature bands would disagree with the glass.
    pub fn with_descriptor(panel: &'static PanelDescriptor, cog: C) -> Result<Self, DisplayError> {
        let driven = cog.panel();
        if driven.id != panel.id {
            #[cfg(feature = "defmt")]
            defmt::error!("panel 0x{=u32:06x} given a COG for 0x{=u32:06x}", panel.id, driven.id);
            return Err(DisplayError::PanelMismatch {
                screen: panel.id,
                cog: driven.id,
            });
        }
        Ok(Self {
            panel,
            cog,
            buffer: None,
            temperature_c: DEFAULT_TEMPERATURE_C,
        })
    }

    /// Allocate the frame buffer, load the calibration and clear to white.
    ///
    /// Calling it again keeps the buffer and its previous plane, so the next
    /// fast update still has a valid reference frame.
    pub fn begin(&mut self) -> Result<(), DisplayError> {
        self.cog.calibrate()?;
        let panel = self.panel;
        let buffer = self.buffer.get_or_insert_with(|| FrameBuffer::new(panel));
        buffer.set_orientation(0);
        buffer.invert(false);
        buffer.clear(Colour::White);

        #[cfg(feature = "defmt")]
        defmt::info!("{} ready, {} bytes per plane", panel.name, buffer.frame_bytes());
        Ok(())
    }

    /// Raise the chip-selects of the other devices sharing the bus, then
    /// [`begin`](Self::begin).
    pub fn begin_with_selects<P: OutputPin>(&mut self, selects: &mut [P]) -> Result<(), DisplayError> {
        for select in selects.iter_mut() {
            select.set_high().map_err(|_| DisplayError::Gpio)?;
        }
        self.begin()
    }

    /// Panel descriptor.
    pub fn descriptor(&self) -> &'static PanelDescriptor {
        self.panel
    }

    /// Frame buffer, once [`begin`](Self::begin) has run.
    pub fn framebuffer(&self) -> Option<&FrameBuffer> {
        self.buffer.as_ref()
    }

    /// Mutable frame buffer, once [`begin`](Self::begin) has run.
    pub fn framebuffer_mut(&mut self) -> Option<&mut FrameBuffer> {
        self.buffer.as_mut()
    }

    /// The COG protocol.
    pub fn cog(&self) -> &C {
        &self.cog
    }

    /// Give the COG protocol back.
    pub fn release(self) -> C {
        self.cog
    }

    // -- Drawing ------------------------------------------------------------

    /// Fill the next frame.
    pub fn clear(&mut self, colour: Colour) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear(colour);
        }
    }

    /// Set one pixel in logical coordinates.
    pub fn point(&mut self, x: u16, y: u16, colour: Colour) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.set_pixel(x, y, colour);
        }
    }

    /// Read one pixel in logical coordinates.
    pub fn read_pixel(&self, x: u16, y: u16) -> Colour {
        self.buffer
            .as_ref()
            .map_or(Colour::White, |buffer| buffer.pixel(x, y))
    }

    /// Select orientation `0..=3` (taken modulo 4).
    pub fn set_orientation(&mut self, orientation: u8) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.set_orientation(orientation);
        }
    }

    /// Current orientation.
    pub fn orientation(&self) -> u8 {
        self.buffer.as_ref().map_or(0, FrameBuffer::orientation)
    }

    /// Logical `(width, height)` in the current orientation.
    pub fn size(&self) -> (u16, u16) {
        match self.buffer.as_ref() {
            Some(buffer) => buffer.size(),
            None => (self.panel.width, self.panel.height),
        }
    }

    /// Swap black and white for subsequent writes.
    pub fn invert(&mut self, flag: bool) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.invert(flag);
        }
    }

    // -- Temperature --------------------------------------------------------

    /// Report the panel temperature in °C.
    pub fn set_temperature_c(&mut self, temperature_c: i8) {
        self.temperature_c = temperature_c;
    }

    /// Report the panel temperature in °F.
    pub fn set_temperature_f(&mut self, temperature_f: i16) {
        self.temperature_c = fahrenheit_to_celsius(temperature_f);
    }

    /// Temperature the next flush will use.
    pub fn temperature_c(&self) -> i8 {
        self.temperature_c
    }

    /// Mode a flush requesting `mode` would run at the current temperature.
    pub fn check_temperature_mode(&self, mode: UpdateMode) -> UpdateMode {
        check_mode(mode, self.temperature_c, self.panel.film)
    }

    // -- Update -------------------------------------------------------------

    /// Fast update when the film and temperature allow it.
    pub fn flush(&mut self) -> Result<UpdateMode, DisplayError> {
        self.flush_mode(UpdateMode::Fast)
    }

    /// Run one update cycle and return the mode actually used.
    ///
    /// [`UpdateMode::None`] means the temperature policy refused the
    /// request; the panel and both planes are left untouched.
    pub fn flush_mode(&mut self, mode: UpdateMode) -> Result<UpdateMode, DisplayError> {
        let buffer = self.buffer.as_mut().ok_or(DisplayError::InvalidState)?;

        let resolved = check_mode(mode, self.temperature_c, self.panel.film);
        if resolved == UpdateMode::None {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "{} refused at {} C on {} film",
                mode,
                self.temperature_c,
                self.panel.film.series()
            );
            return Ok(UpdateMode::None);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("flush {} at {} C", resolved, self.temperature_c);

        self.cog.reset()?;
        self.cog.initial(resolved, self.temperature_c)?;
        let (next, previous) = buffer.planes_mut();
        self.cog.send_image(resolved, next, previous)?;
        if let Err(err) = self.cog.update(resolved) {
            // DC/DC must not stay on after a failed refresh.
            let _ = self.cog.power_off();
            return Err(err);
        }
        self.cog.power_off()?;
        Ok(resolved)
    }

    /// Clear ghosting: full black then full white, with a pause after each.
    pub fn regenerate(&mut self) -> Result<(), DisplayError> {
        for colour in [Colour::Black, Colour::White] {
            self.clear(colour);
            self.flush()?;
            self.cog.wait_ms(REGENERATE_PAUSE_MS);
        }
        Ok(())
    }

    // -- Touch --------------------------------------------------------------

    /// Poll `touch` once and map the event to logical coordinates.
    pub fn get_touch<T: TouchInput>(
        &self,
        touch: &mut T,
        bounds: TouchBounds,
    ) -> Result<TouchEvent, DisplayError> {
        let event = touch.poll()?;
        Ok(self.map_touch(event, bounds))
    }

    /// Map a raw touch event to logical coordinates.
    pub fn map_touch(&self, event: TouchEvent, bounds: TouchBounds) -> TouchEvent {
        map_to_screen(
            event,
            self.orientation(),
            (self.panel.width, self.panel.height),
            bounds,
        )
    }

    // -- Identity -----------------------------------------------------------

    /// Library and panel label, e.g. `iTC 2.71" -FT`.
    pub fn who_am_i(&self) -> heapless::String<WHO_AM_I_LEN> {
        let mut label = heapless::String::new();
        let (inches, hundredths) = self.panel.diagonal_parts();
        // 32 bytes hold the longest label
        let _ = write!(label, "{LIBRARY_NAME_SHORT} {inches}.{hundredths:02}\" -");
        for (feature, letter) in FEATURE_LETTERS {
            if self.panel.has_feature(feature) {
                let _ = label.push(letter);
            }
        }
        label
    }
}

impl<C> OriginDimensions for Screen<C> {
    fn size(&self) -> Size {
        match self.buffer.as_ref() {
            Some(buffer) => OriginDimensions::size(buffer),
            None => Size::new(u32::from(self.panel.width), u32::from(self.panel.height)),
        }
    }
}

impl<C> DrawTarget for Screen<C> {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        match self.buffer.as_mut() {
            Some(buffer) => buffer.draw_iter(pixels),
            None => Ok(()),
        }
    }
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

    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use epd_specs::panels::{EPD_271_CS_TOUCH, EPD_271_KS_TOUCH, EPD_271_PS_TOUCH, EPD_370_KS_TOUCH};
    use platform::mocks::{CogCall, MockCog};
    use platform::TouchKind;

    fn mock_cog(panel_id: u32) -> MockCog {
        MockCog::new(epd_specs::lookup(panel_id).unwrap())
    }

    fn screen(panel_id: u32) -> Screen<MockCog> {
        let mut screen = Screen::new(panel_id, mock_cog(panel_id)).unwrap();
        screen.begin().unwrap();
        screen
    }

    #[test]
    fn test_unknown_panel_is_fatal() {
        let err = Screen::new(0x00_1234, mock_cog(EPD_271_PS_TOUCH)).err().unwrap();
        assert_eq!(err, DisplayError::UnsupportedPanel(0x00_1234));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cog_for_another_panel_is_refused() {
        let err = Screen::new(EPD_271_PS_TOUCH, mock_cog(EPD_370_KS_TOUCH)).err().unwrap();
        assert_eq!(
            err,
            DisplayError::PanelMismatch {
                screen: EPD_271_PS_TOUCH,
                cog: EPD_370_KS_TOUCH,
            }
        );
        assert!(err.is_fatal());

        let panel = epd_specs::lookup(EPD_271_KS_TOUCH).unwrap();
        assert!(Screen::with_descriptor(panel, mock_cog(EPD_271_CS_TOUCH)).is_err());
        assert!(Screen::with_descriptor(panel, mock_cog(EPD_271_KS_TOUCH)).is_ok());
    }

    #[test]
    fn test_flush_before_begin_is_refused() {
        let mut screen = Screen::new(EPD_271_PS_TOUCH, mock_cog(EPD_271_PS_TOUCH)).unwrap();
        screen.point(1, 1, Colour::Black);
        assert_eq!(screen.read_pixel(1, 1), Colour::White);
        assert_eq!(screen.flush(), Err(DisplayError::InvalidState));
        assert!(screen.cog().calls().is_empty());
    }

    #[test]
    fn test_fast_flush_runs_full_cycle() {
        let mut screen = screen(EPD_271_PS_TOUCH);
        screen.set_temperature_c(22);
        screen.point(0, 0, Colour::Black);

        assert_eq!(screen.flush().unwrap(), UpdateMode::Fast);
        assert_eq!(
            screen.cog().calls(),
            &[
                CogCall::Calibrate,
                CogCall::Reset,
                CogCall::Initial(UpdateMode::Fast, 22),
                CogCall::SendImage(UpdateMode::Fast),
                CogCall::Update(UpdateMode::Fast),
                CogCall::PowerOff,
            ]
        );
        let buffer = screen.framebuffer().unwrap();
        assert_eq!(buffer.next(), buffer.previous());
        assert_eq!(buffer.next()[0], 0x80);
    }

    #[test]
    fn test_refused_flush_leaves_planes() {
        let mut screen = screen(EPD_271_PS_TOUCH);
        screen.set_temperature_c(35);
        screen.point(3, 3, Colour::Black);

        assert_eq!(screen.check_temperature_mode(UpdateMode::Fast), UpdateMode::None);
        assert_eq!(screen.flush().unwrap(), UpdateMode::None);
        assert_eq!(screen.cog().calls(), &[CogCall::Calibrate]);
        let buffer = screen.framebuffer().unwrap();
        assert_ne!(buffer.next(), buffer.previous());

        assert_eq!(screen.flush_mode(UpdateMode::Global).unwrap(), UpdateMode::Global);
    }

    #[test]
    fn test_normal_film_only_global() {
        let mut screen = screen(EPD_271_CS_TOUCH);
        assert_eq!(screen.flush().unwrap(), UpdateMode::None);
        assert_eq!(screen.flush_mode(UpdateMode::Global).unwrap(), UpdateMode::Global);
    }

    #[test]
    fn test_fahrenheit_temperature() {
        let mut screen = screen(EPD_271_KS_TOUCH);
        screen.set_temperature_f(5);
        assert_eq!(screen.temperature_c(), -15);
        assert_eq!(screen.flush().unwrap(), UpdateMode::Fast);
        screen.set_temperature_f(3);
        assert_eq!(screen.flush().unwrap(), UpdateMode::None);
    }

    #[test]
    fn test_failed_update_still_powers_off() {
        let cog = mock_cog(EPD_271_PS_TOUCH).with_update_error(DisplayError::Timeout);
        let mut screen = Screen::new(EPD_271_PS_TOUCH, cog).unwrap();
        screen.begin().unwrap();
        assert_eq!(screen.flush(), Err(DisplayError::Timeout));
        assert_eq!(screen.cog().calls().last(), Some(&CogCall::PowerOff));
    }

    #[test]
    fn test_fatal_calibration_surfaces_from_begin() {
        let cog = mock_cog(EPD_370_KS_TOUCH).with_calibration_error(DisplayError::OtpCheckFailed);
        let mut screen = Screen::new(EPD_370_KS_TOUCH, cog).unwrap();
        assert_eq!(screen.begin(), Err(DisplayError::OtpCheckFailed));
        assert_eq!(screen.flush(), Err(DisplayError::InvalidState));
    }

    #[test]
    fn test_regenerate_sequence() {
        let mut screen = screen(EPD_271_PS_TOUCH);
        screen.regenerate().unwrap();

        let cog = screen.cog();
        let waits: Vec<_> = cog
            .calls()
            .iter()
            .filter(|call| matches!(call, CogCall::Wait(_)))
            .collect();
        assert_eq!(waits, [&CogCall::Wait(100), &CogCall::Wait(100)]);
        assert_eq!(cog.frames().len(), 2);
        assert!(cog.frames()[0].iter().all(|b| *b == 0xFF));
        assert!(cog.frames()[1].iter().all(|b| *b == 0x00));
    }

    #[test]
    fn test_who_am_i() {
        assert_eq!(screen(EPD_271_PS_TOUCH).who_am_i().as_str(), "iTC 2.71\" -FT");
        assert_eq!(screen(EPD_271_CS_TOUCH).who_am_i().as_str(), "iTC 2.71\" -T");
        assert_eq!(screen(EPD_370_KS_TOUCH).who_am_i().as_str(), "iTC 3.70\" -FTW");
    }

    #[test]
    fn test_begin_with_selects_raises_lines() {
        let mut selects = [
            PinMock::new(&[PinTransaction::set(PinState::High)]),
            PinMock::new(&[PinTransaction::set(PinState::High)]),
        ];
        let mut screen = Screen::new(EPD_271_PS_TOUCH, mock_cog(EPD_271_PS_TOUCH)).unwrap();
        screen.begin_with_selects(&mut selects).unwrap();
        for select in &mut selects {
            select.done();
        }
        assert!(screen.framebuffer().is_some());
    }

    #[test]
    fn test_draw_target_passthrough() {
        let mut screen = screen(EPD_271_PS_TOUCH);
        screen.set_orientation(1);
        assert_eq!(screen.size(), (264, 176));
        Rectangle::new(Point::new(10, 10), Size::new(4, 4))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut screen)
            .unwrap();
        assert_eq!(screen.read_pixel(11, 12), Colour::Black);
        assert_eq!(screen.read_pixel(14, 14), Colour::White);
    }

    #[test]
    fn test_get_touch_maps_orientation() {
        let mut screen = screen(EPD_271_PS_TOUCH);
        screen.set_orientation(2);
        let mut touch = platform::mocks::MockTouch::new();
        touch
            .add_event(TouchEvent::contact(TouchKind::Press, 0, 0))
            .unwrap();
        let bounds = TouchBounds { x_max: 175, y_max: 263 };

        let event = screen.get_touch(&mut touch, bounds).unwrap();
        assert_eq!((event.x, event.y), (175, 263));
        assert_eq!(screen.get_touch(&mut touch, bounds).unwrap(), TouchEvent::NONE);
    }
}
