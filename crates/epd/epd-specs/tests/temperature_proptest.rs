//! Property-based tests for the temperature policy.
//! Verifies invariants hold for ALL temperatures, not just the band edges.

use epd_specs::temperature::{fast_band, global_band};
use epd_specs::{check_mode, fahrenheit_to_celsius, Film, UpdateMode};

fn film_strategy() -> impl proptest::strategy::Strategy<Value = Film> {
    proptest::prop_oneof![
        proptest::strategy::Just(Film::Normal),
        proptest::strategy::Just(Film::Fast),
        proptest::strategy::Just(Film::Wide),
    ]
}

fn mode_strategy() -> impl proptest::strategy::Strategy<Value = UpdateMode> {
    proptest::prop_oneof![
        proptest::strategy::Just(UpdateMode::None),
        proptest::strategy::Just(UpdateMode::Fast),
        proptest::strategy::Just(UpdateMode::Global),
    ]
}

proptest::proptest! {
    /// The policy either grants the requested mode or refuses; it never
    /// swaps one update mode for another.
    #[test]
    fn resolved_mode_is_requested_or_none(
        t in i8::MIN..=i8::MAX,
        film in film_strategy(),
        mode in mode_strategy(),
    ) {
        let resolved = check_mode(mode, t, film);
        assert!(resolved == mode || resolved == UpdateMode::None,
            "{:?} at {}°C resolved to {:?}", mode, t, resolved);
    }

    /// Fast update is granted exactly inside the film's fast band.
    #[test]
    fn fast_granted_iff_inside_band(t in i8::MIN..=i8::MAX, film in film_strategy()) {
        let inside = fast_band(film).is_some_and(|band| band.contains(&t));
        assert_eq!(check_mode(UpdateMode::Fast, t, film) == UpdateMode::Fast, inside);
    }

    /// Wherever fast update is allowed, global update is allowed too.
    #[test]
    fn fast_band_inside_global_band(t in i8::MIN..=i8::MAX, film in film_strategy()) {
        if check_mode(UpdateMode::Fast, t, film) == UpdateMode::Fast {
            let global = global_band(film).is_some_and(|band| band.contains(&t));
            assert!(global, "{:?} allows fast but not global at {}°C", film, t);
        }
    }

    /// Fahrenheit conversion is monotone and never panics.
    #[test]
    fn fahrenheit_conversion_monotone(a in i16::MIN..=i16::MAX, b in i16::MIN..=i16::MAX) {
        if a <= b {
            assert!(fahrenheit_to_celsius(a) <= fahrenheit_to_celsius(b));
        }
    }
}
