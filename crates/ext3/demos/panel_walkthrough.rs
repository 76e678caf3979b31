//! Host walkthrough of the driver against the recording COG mock.
//!
//! Draws a frame on each supported panel, flushes it across a sweep of
//! temperatures and prints what the temperature policy and the sequencer
//! did.
//!
//! Run with: cargo run -p ext3 --example panel_walkthrough --features std

#![allow(clippy::print_stdout, clippy::unwrap_used, clippy::expect_used)]

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyle, Rectangle};
use epd_specs::PANELS;
use ext3::Screen;
use platform::mocks::{CogCall, MockCog};
use platform::{DisplayError, UpdateMode};

fn main() -> Result<(), DisplayError> {
    println!("{}", platform::config::library_title());

    for panel in PANELS {
        let mut screen = Screen::new(panel.id, MockCog::new(panel))?;
        screen.begin()?;
        println!("\n{} ({})", screen.who_am_i(), panel.name);

        Rectangle::new(Point::new(4, 4), Size::new(40, 20))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 2))
            .draw(&mut screen)
            .expect("infallible");
        Circle::new(Point::new(60, 60), 30)
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut screen)
            .expect("infallible");

        for temperature in [-20i8, 0, 10, 25, 40, 65] {
            screen.set_temperature_c(temperature);
            let fast = screen.flush()?;
            let global = if fast == UpdateMode::None {
                screen.flush_mode(UpdateMode::Global)?
            } else {
                UpdateMode::None
            };
            println!("  {temperature:>4} °C  fast -> {fast:?}  fallback -> {global:?}");
        }

        let refreshes = screen
            .cog()
            .calls()
            .iter()
            .filter(|call| matches!(call, CogCall::Update(_)))
            .count();
        println!("  {refreshes} refreshes, {} bytes per frame", panel.frame_bytes());
    }
    Ok(())
}
