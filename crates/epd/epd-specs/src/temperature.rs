//! Temperature policy
//!
//! Each film class has a band inside which an update mode is safe to run.
//! Outside it the update is refused rather than run with the wrong waveform:
//!
//! | Film | Fast update   | Global update |
//! |------|---------------|---------------|
//! | CS   | never         | 0 to 50 °C    |
//! | PS   | 15 to 30 °C   | 0 to 50 °C    |
//! | KS   | -15 to 60 °C  | -15 to 60 °C  |

use core::ops::RangeInclusive;

use crate::panel::Film;

/// Temperature assumed until the application reports one.
pub const DEFAULT_TEMPERATURE_C: i8 = 25;

/// Panel update mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateMode {
    /// No update: refused or requested.
    None,
    /// Differential update against the previous frame.
    #[default]
    Fast,
    /// Full refresh without a reference frame.
    Global,
}

/// Band in which fast update is allowed, `None` when the film has no fast
/// update at all.
pub const fn fast_band(film: Film) -> Option<RangeInclusive<i8>> {
    match film {
        Film::Normal => None,
        Film::Fast => Some(15..=30),
        Film::Wide => Some(-15..=60),
    }
}

/// Band in which global update is allowed.
pub const fn global_band(film: Film) -> Option<RangeInclusive<i8>> {
    match film {
        Film::Normal | Film::Fast => Some(0..=50),
        Film::Wide => Some(-15..=60),
    }
}

/// Resolve a requested update mode against the current temperature.
///
/// Returns the requested mode when the temperature lies inside the film's
/// band for that mode, [`UpdateMode::None`] otherwise.
pub fn check_mode(requested: UpdateMode, temperature_c: i8, film: Film) -> UpdateMode {
    let band = match requested {
        UpdateMode::None => return UpdateMode::None,
        UpdateMode::Fast => fast_band(film),
        UpdateMode::Global => global_band(film),
    };

    match band {
        Some(band) if band.contains(&temperature_c) => requested,
        _ => UpdateMode::None,
    }
}

/// Convert Fahrenheit to Celsius, truncating towards zero like integer
/// division and saturating to the `i8` range.
pub fn fahrenheit_to_celsius(fahrenheit: i16) -> i8 {
    // i16 widened to i32 cannot overflow here
    #[allow(clippy::arithmetic_side_effects)]
    let celsius = (i32::from(fahrenheit) - 32) * 5 / 9;
    #[allow(clippy::cast_possible_truncation)] // clamped to i8 range above
    let clamped = celsius.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8;
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_film_boundaries() {
        assert_eq!(check_mode(UpdateMode::Fast, 14, Film::Fast), UpdateMode::None);
        assert_eq!(check_mode(UpdateMode::Fast, 15, Film::Fast), UpdateMode::Fast);
        assert_eq!(check_mode(UpdateMode::Fast, 30, Film::Fast), UpdateMode::Fast);
        assert_eq!(check_mode(UpdateMode::Fast, 31, Film::Fast), UpdateMode::None);
    }

    #[test]
    fn test_wide_film_boundaries() {
        assert_eq!(check_mode(UpdateMode::Fast, -16, Film::Wide), UpdateMode::None);
        assert_eq!(check_mode(UpdateMode::Fast, -15, Film::Wide), UpdateMode::Fast);
        assert_eq!(check_mode(UpdateMode::Fast, 60, Film::Wide), UpdateMode::Fast);
        assert_eq!(check_mode(UpdateMode::Fast, 61, Film::Wide), UpdateMode::None);
    }

    #[test]
    fn test_normal_film_never_fast() {
        for t in i8::MIN..=i8::MAX {
            assert_eq!(check_mode(UpdateMode::Fast, t, Film::Normal), UpdateMode::None);
        }
    }

    #[test]
    fn test_global_bands() {
        assert_eq!(check_mode(UpdateMode::Global, 0, Film::Normal), UpdateMode::Global);
        assert_eq!(check_mode(UpdateMode::Global, -1, Film::Normal), UpdateMode::None);
        assert_eq!(check_mode(UpdateMode::Global, 50, Film::Fast), UpdateMode::Global);
        assert_eq!(check_mode(UpdateMode::Global, 51, Film::Fast), UpdateMode::None);
        assert_eq!(check_mode(UpdateMode::Global, -15, Film::Wide), UpdateMode::Global);
        assert_eq!(check_mode(UpdateMode::Global, 61, Film::Wide), UpdateMode::None);
    }

    #[test]
    fn test_none_request_stays_none() {
        assert_eq!(check_mode(UpdateMode::None, 25, Film::Wide), UpdateMode::None);
    }

    #[test]
    fn test_fahrenheit_conversion() {
        assert_eq!(fahrenheit_to_celsius(32), 0);
        assert_eq!(fahrenheit_to_celsius(77), 25);
        assert_eq!(fahrenheit_to_celsius(212), 100);
        assert_eq!(fahrenheit_to_celsius(5), -15);
        // Truncation towards zero
        assert_eq!(fahrenheit_to_celsius(86), 30);
        assert_eq!(fahrenheit_to_celsius(87), 30);
        // Saturation
        assert_eq!(fahrenheit_to_celsius(i16::MAX), i8::MAX);
        assert_eq!(fahrenheit_to_celsius(i16::MIN), i8::MIN);
    }

    #[test]
    fn test_default_temperature_allows_fast() {
        assert_eq!(
            check_mode(UpdateMode::Fast, DEFAULT_TEMPERATURE_C, Film::Fast),
            UpdateMode::Fast
        );
    }
}
