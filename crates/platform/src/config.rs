//! Library configuration and constants
//!
//! Central naming values. Everything that reports the library identity
//! should reference these constants rather than hardcoding values.

/// Library name
pub const LIBRARY_NAME: &str = "EXT3 COG driver";

/// Library short name (used in the panel identity string)
pub const LIBRARY_NAME_SHORT: &str = "iTC";

/// Library version (synchronized with Cargo.toml)
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Full library title (name + version)
pub const fn library_title() -> &'static str {
    concat!("EXT3 COG driver ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_contains_version() {
        assert!(library_title().ends_with(LIBRARY_VERSION));
        assert!(library_title().starts_with(LIBRARY_NAME));
    }
}
