//! Touch input abstraction

use crate::display::DisplayError;

/// Pressure reported for a contact. The touch controllers do not measure
/// pressure, so every real contact reports the same value.
pub const TOUCH_PRESSURE: u16 = 0x16;

/// Touch input trait
pub trait TouchInput {
    /// Poll the controller once and return the resulting event.
    fn poll(&mut self) -> Result<TouchEvent, DisplayError>;

    /// `true` while the controller signals a finger on its interrupt line.
    fn interrupt(&mut self) -> Result<bool, DisplayError>;
}

/// What happened since the previous poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchKind {
    /// No contact, nothing pending.
    #[default]
    None,
    /// First contact.
    Press,
    /// Contact continues.
    Move,
    /// Contact ended.
    Release,
}

/// One touch sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchEvent {
    /// Event kind
    pub kind: TouchKind,
    /// Raw X coordinate
    pub x: u16,
    /// Raw Y coordinate
    pub y: u16,
    /// Pressure indicator, 0 when there is no contact
    pub z: u16,
}

impl TouchEvent {
    /// Nothing happened.
    pub const NONE: Self = Self {
        kind: TouchKind::None,
        x: 0,
        y: 0,
        z: 0,
    };

    /// Contact event at `(x, y)`.
    pub const fn contact(kind: TouchKind, x: u16, y: u16) -> Self {
        Self {
            kind,
            x,
            y,
            z: TOUCH_PRESSURE,
        }
    }

    /// `true` for any event other than [`TouchKind::None`].
    pub const fn is_event(&self) -> bool {
        !matches!(self.kind, TouchKind::None)
    }
}
