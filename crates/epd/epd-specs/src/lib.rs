//! EXT3 e-paper panel specifications
//!
//! Static description of every panel the driver supports, the layout of the
//! calibration bytes inside each panel's OTP memory, and the temperature
//! envelope that decides which update mode a panel may run.
//!
//! # Features
//!
//! - **no_std compatible** - pure data and pure functions, no I/O
//! - **Panel registry** - one lookup from a packed panel identifier to a
//!   [`PanelDescriptor`]
//! - **Declarative OTP layouts** - [`OtpSource`] tables instead of per-model
//!   offset arithmetic
//! - **Temperature policy** - [`check_mode`] resolves a requested
//!   [`UpdateMode`] against the film's valid temperature band
//! - **Serde support** - optional serialization of the plain-data enums
//!
//! # Example
//!
//! ```
//! use epd_specs::{lookup, panels, check_mode, UpdateMode};
//!
//! let panel = lookup(panels::EPD_271_PS_TOUCH).unwrap();
//! assert_eq!((panel.width, panel.height), (176, 264));
//!
//! assert_eq!(check_mode(UpdateMode::Fast, 22, panel.film), UpdateMode::Fast);
//! assert_eq!(check_mode(UpdateMode::Fast, 35, panel.film), UpdateMode::None);
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod otp;
mod panel;
pub mod panels;
pub mod temperature;

pub use otp::{
    Bank, OtpField, OtpLayout, OtpSource, OTP_BANK_MARKER, OTP_READ_COMMAND, SOFT_START_MAX,
};
pub use panel::{Family, Features, Film, PanelDescriptor, TouchModel, UnsupportedPanel};
pub use panels::{lookup, PANELS};
pub use temperature::{check_mode, fahrenheit_to_celsius, UpdateMode, DEFAULT_TEMPERATURE_C};
