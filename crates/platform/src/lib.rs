//! Hardware Abstraction Layer (HAL) for the EXT3 COG driver
//!
//! This crate provides the trait seams the driver is written against where
//! `embedded-hal` has nothing to offer, plus the error type shared by every
//! layer, enabling development and testing without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application (drawing, GUI, touch handling)
//!         ↓
//! Driver (ext3 crate: Screen, COG sequencer, touch reader)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! embedded-hal implementations (board HAL)
//! ```
//!
//! # Abstractions
//!
//! - [`CogProtocol`] - One COG update cycle, reset to power-off
//! - [`ThreeWireSpi`] - Half-duplex OTP read bus
//! - [`TouchInput`] - Touch controller polling
//! - [`DisplayError`] - Errors shared by every layer
//!
//! # Features
//!
//! - `std`: Enable standard library support and the [`mocks`] module
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```no_run
//! use platform::{CogProtocol, DisplayError, UpdateMode};
//!
//! fn refresh<C: CogProtocol>(cog: &mut C, next: &[u8], previous: &mut [u8]) -> Result<(), DisplayError> {
//!     cog.reset()?;
//!     cog.initial(UpdateMode::Fast, 25)?;
//!     cog.send_image(UpdateMode::Fast, next, previous)?;
//!     cog.update(UpdateMode::Fast)?;
//!     cog.power_off()
//! }
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
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod display;
pub mod input;
pub mod mocks;
pub mod peripheral;

// Re-export main high-level traits
pub use display::{CogProtocol, DisplayError, UpdateMode};
pub use input::{TouchEvent, TouchInput, TouchKind, TOUCH_PRESSURE};

// Re-export peripheral types
pub use peripheral::{BitOrder, SpiConfig, SpiMode, ThreeWireSpi, Unwired, UnwiredError};
