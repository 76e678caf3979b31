//! EXT3 COG e-paper driver
//!
//! Blocking `embedded-hal` 1.0 driver for the touch-capable 2.71" and 3.70"
//! EXT3 panels. It owns the two frame buffers, reads the panel calibration
//! from the COG's OTP memory, drives the update cycle over 4-wire SPI and
//! polls the capacitive touch controller over I2C.
//!
//! # Architecture
//!
//! ```text
//! Screen (facade: begin, draw, flush, temperature)
//!    ├── FrameBuffer    next / previous planes, orientation, inversion
//!    ├── Cog            reset → initial → send_image → update → power_off
//!    │     ├── OtpCalibration   PSR / VCOM / soft-start from OTP
//!    │     └── SoftStartOps     DC/DC soft-start bytecode
//!    └── epd-specs      registry and temperature policy
//!
//! TouchReader (independent, polled by the application)
//! ```
//!
//! The [`Screen`] is generic over [`platform::CogProtocol`], so the update
//! flow can be exercised against `platform::mocks::MockCog` on the host and
//! against [`Cog`] on hardware.
//!
//! # Example
//!
//! ```no_run
//! # fn demo<C: platform::CogProtocol>(cog: C) -> Result<(), platform::DisplayError> {
//! use ext3::{Colour, Screen};
//! use epd_specs::panels::EPD_271_PS_TOUCH;
//!
//! let mut screen = Screen::new(EPD_271_PS_TOUCH, cog)?;
//! screen.begin()?;
//! screen.set_temperature_c(22);
//! screen.point(10, 10, Colour::Black);
//! let mode = screen.flush()?;
//! # let _ = mode;
//! # Ok(())
//! # }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

extern crate alloc;

pub mod cog;
pub mod config;
pub mod framebuffer;
pub mod otp;
pub mod screen;
pub mod touch;

pub use cog::{Cog, CogProfile, CogState};
pub use config::Ext3Config;
pub use framebuffer::{Colour, FrameBuffer};
pub use otp::OtpCalibration;
pub use screen::Screen;
pub use touch::{map_to_screen, TouchBounds, TouchReader};
