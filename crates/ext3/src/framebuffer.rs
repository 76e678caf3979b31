//! Frame buffer and coordinate mapper
//!
//! Two 1-bit planes of `row_bytes × long side` bytes each:
//!
//! - `next`: what the application draws into.
//! - `previous`: what the panel currently shows; the reference frame for a
//!   fast update. Only the COG sequencer writes it.
//!
//! # Physical addressing
//!
//! Rows run along the long side (V), each row packs the short side (H)
//! MSB first:
//!
//! ```text
//! byte = px * (H / 8) + py / 8
//! bit  = 7 - py % 8          (set = black)
//! ```
//!
//! # Orientation
//!
//! | Orientation | Logical size | Logical `(x, y)` → physical `(px, py)` |
//! |-------------|--------------|----------------------------------------|
//! | 0           | H × V        | `(y, x)`                               |
//! | 1           | V × H        | `(x, H-1-y)`                           |
//! | 2           | H × V        | `(V-1-y, H-1-x)`                       |
//! | 3           | V × H        | `(V-1-x, y)`                           |

use alloc::vec;
use alloc::vec::Vec;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;

use epd_specs::PanelDescriptor;

/// Grey dither rows, even then odd.
const GREY_EVEN_ROW: u8 = 0b0101_0101;
const GREY_ODD_ROW: u8 = 0b1010_1010;

/// Logical pixel colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Colour {
    /// Background.
    #[default]
    White,
    /// Ink.
    Black,
    /// 50 % checkerboard dither of black and white.
    Grey,
}

impl From<BinaryColor> for Colour {
    fn from(colour: BinaryColor) -> Self {
        match colour {
            BinaryColor::On => Self::Black,
            BinaryColor::Off => Self::White,
        }
    }
}

/// Next / previous frame planes with orientation and inversion state.
pub struct FrameBuffer {
    next: Vec<u8>,
    previous: Vec<u8>,
    /// Short side in pixels.
    short: u16,
    /// Long side in pixels.
    long: u16,
    row_bytes: usize,
    orientation: u8,
    invert: bool,
}

impl FrameBuffer {
    /// Allocate both planes for `panel`, zero filled (white).
    pub fn new(panel: &PanelDescriptor) -> Self {
        Self::with_geometry(panel.width, panel.height)
    }

    /// Allocate both planes for a `short × long` panel.
    pub fn with_geometry(short: u16, long: u16) -> Self {
        let row_bytes = usize::from(short).div_ceil(8);
        let frame_bytes = row_bytes.saturating_mul(usize::from(long));
        Self {
            next: vec![0x00; frame_bytes],
            previous: vec![0x00; frame_bytes],
            short,
            long,
            row_bytes,
            orientation: 0,
            invert: false,
        }
    }

    /// Bytes in one plane.
    pub fn frame_bytes(&self) -> usize {
        self.next.len()
    }

    /// Select one of the four orientations, taken modulo 4.
    pub fn set_orientation(&mut self, orientation: u8) {
        self.orientation = orientation % 4;
    }

    /// Current orientation, `0..=3`.
    pub fn orientation(&self) -> u8 {
        self.orientation
    }

    /// Logical `(width, height)` in the current orientation.
    pub fn size(&self) -> (u16, u16) {
        if self.orientation % 2 == 0 {
            (self.short, self.long)
        } else {
            (self.long, self.short)
        }
    }

    /// Native `(short, long)` sides.
    pub fn geometry(&self) -> (u16, u16) {
        (self.short, self.long)
    }

    /// Swap the meaning of black and white for subsequent writes.
    pub fn invert(&mut self, flag: bool) {
        self.invert = flag;
    }

    /// `true` while writes are inverted.
    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// Map logical coordinates to physical `(px, py)`, `None` when outside
    /// the logical screen.
    pub fn to_physical(&self, x: u16, y: u16) -> Option<(u16, u16)> {
        let (width, height) = self.size();
        if x >= width || y >= height {
            return None;
        }

        // Bounds checked above: every subtraction stays in 0..side.
        #[allow(clippy::arithmetic_side_effects)]
        let physical = match self.orientation {
            1 => (x, self.short - 1 - y),
            2 => (self.long - 1 - y, self.short - 1 - x),
            3 => (self.long - 1 - x, y),
            _ => (y, x),
        };
        Some(physical)
    }

    /// Byte index and bit mask of a physical pixel.
    fn bit_address(&self, px: u16, py: u16) -> (usize, u8) {
        let index = usize::from(px)
            .saturating_mul(self.row_bytes)
            .saturating_add(usize::from(py / 8));
        #[allow(clippy::arithmetic_side_effects)] // shift is below 8
        let mask = 0x80u8 >> (py % 8);
        (index, mask)
    }

    /// Write one logical pixel. Out-of-screen writes are ignored.
    pub fn set_pixel(&mut self, x: u16, y: u16, colour: Colour) {
        let Some((px, py)) = self.to_physical(x, y) else {
            return;
        };

        let colour = match colour {
            // (px + py) even
            Colour::Grey if (px ^ py) & 1 == 0 => Colour::Black,
            Colour::Grey => Colour::White,
            other => other,
        };
        let white = (colour == Colour::White) ^ self.invert;

        let (index, mask) = self.bit_address(px, py);
        if let Some(byte) = self.next.get_mut(index) {
            if white {
                *byte &= !mask;
            } else {
                *byte |= mask;
            }
        }
    }

    /// Read one logical pixel from the next plane.
    ///
    /// Returns the physical colour: inversion is not undone, and anything
    /// outside the screen reads as [`Colour::White`].
    pub fn pixel(&self, x: u16, y: u16) -> Colour {
        let Some((px, py)) = self.to_physical(x, y) else {
            return Colour::White;
        };
        let (index, mask) = self.bit_address(px, py);
        match self.next.get(index) {
            Some(byte) if byte & mask != 0 => Colour::Black,
            _ => Colour::White,
        }
    }

    /// Fill the next plane. The previous plane is left untouched.
    pub fn clear(&mut self, colour: Colour) {
        match colour {
            Colour::Grey => {
                for (row, bytes) in self.next.chunks_mut(self.row_bytes.max(1)).enumerate() {
                    let pattern = if row % 2 == 0 {
                        GREY_EVEN_ROW
                    } else {
                        GREY_ODD_ROW
                    };
                    bytes.fill(pattern);
                }
            }
            _ if (colour == Colour::White) ^ self.invert => self.next.fill(0x00),
            _ => self.next.fill(0xFF),
        }
    }

    /// Plane the application draws into.
    pub fn next(&self) -> &[u8] {
        &self.next
    }

    /// Plane currently shown by the panel.
    pub fn previous(&self) -> &[u8] {
        &self.previous
    }

    /// Both planes at once, as the COG sequencer consumes them.
    pub fn planes_mut(&mut self) -> (&[u8], &mut [u8]) {
        (&self.next, &mut self.previous)
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        let (width, height) = FrameBuffer::size(self);
        Size::new(u32::from(width), u32::from(height))
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    /// `BinaryColor::On` is black, `Off` is white.
    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, colour) in pixels {
            let (Ok(x), Ok(y)) = (u16::try_from(point.x), u16::try_from(point.y)) else {
                continue;
            };
            self.set_pixel(x, y, colour.into());
        }
        Ok(())
    }

    fn clear(&mut self, colour: Self::Color) -> Result<(), Self::Error> {
        FrameBuffer::clear(self, colour.into());
        Ok(())
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

    fn small() -> FrameBuffer {
        FrameBuffer::with_geometry(176, 264)
    }

    #[test]
    fn test_plane_size() {
        let fb = small();
        assert_eq!(fb.frame_bytes(), 22 * 264);
        assert_eq!(fb.previous().len(), fb.next().len());
        assert!(fb.next().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_size_follows_orientation() {
        let mut fb = small();
        assert_eq!(fb.size(), (176, 264));
        fb.set_orientation(1);
        assert_eq!(fb.size(), (264, 176));
        fb.set_orientation(6);
        assert_eq!(fb.orientation(), 2);
        assert_eq!(fb.size(), (176, 264));
    }

    #[test]
    fn test_orientation_corners() {
        let mut fb = small();
        assert_eq!(fb.to_physical(0, 0), Some((0, 0)));
        assert_eq!(fb.to_physical(175, 263), Some((263, 175)));

        fb.set_orientation(1);
        assert_eq!(fb.to_physical(0, 0), Some((0, 175)));
        assert_eq!(fb.to_physical(263, 175), Some((263, 0)));

        fb.set_orientation(2);
        assert_eq!(fb.to_physical(0, 0), Some((263, 175)));

        fb.set_orientation(3);
        assert_eq!(fb.to_physical(0, 0), Some((263, 0)));
        assert_eq!(fb.to_physical(263, 175), Some((0, 175)));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut fb = small();
        assert_eq!(fb.to_physical(176, 0), None);
        assert_eq!(fb.to_physical(0, 264), None);
        fb.set_orientation(1);
        assert_eq!(fb.to_physical(0, 176), None);
        assert!(fb.to_physical(263, 0).is_some());
    }

    #[test]
    fn test_bit_layout() {
        let mut fb = small();
        // (x=3, y=2) in orientation 0 is physical (2, 3): byte 2*22, bit 4
        fb.set_pixel(3, 2, Colour::Black);
        assert_eq!(fb.next()[44], 0b0001_0000);
        fb.set_pixel(3, 2, Colour::White);
        assert_eq!(fb.next()[44], 0);
    }

    #[test]
    fn test_invert_swaps_bits() {
        let mut fb = small();
        fb.invert(true);
        fb.set_pixel(0, 0, Colour::White);
        assert_eq!(fb.next()[0], 0x80);
        // Reads report the physical colour
        assert_eq!(fb.pixel(0, 0), Colour::Black);
        fb.set_pixel(0, 0, Colour::Black);
        assert_eq!(fb.pixel(0, 0), Colour::White);
    }

    #[test]
    fn test_grey_pixel_checkerboard() {
        let mut fb = small();
        fb.set_pixel(0, 0, Colour::Grey);
        fb.set_pixel(1, 0, Colour::Grey);
        assert_eq!(fb.pixel(0, 0), Colour::Black);
        assert_eq!(fb.pixel(1, 0), Colour::White);
    }

    #[test]
    fn test_clear_patterns() {
        let mut fb = small();
        fb.clear(Colour::Black);
        assert!(fb.next().iter().all(|&b| b == 0xFF));
        assert!(fb.previous().iter().all(|&b| b == 0x00));

        fb.clear(Colour::White);
        assert!(fb.next().iter().all(|&b| b == 0x00));

        fb.invert(true);
        fb.clear(Colour::White);
        assert!(fb.next().iter().all(|&b| b == 0xFF));

        fb.clear(Colour::Grey);
        assert!(fb.next()[..22].iter().all(|&b| b == 0b0101_0101));
        assert!(fb.next()[22..44].iter().all(|&b| b == 0b1010_1010));
    }

    #[test]
    fn test_out_of_bounds_read_is_white() {
        let mut fb = small();
        fb.clear(Colour::Black);
        assert_eq!(fb.pixel(500, 500), Colour::White);
        fb.set_pixel(500, 500, Colour::White);
        assert!(fb.next().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_draw_target_rectangle() {
        let mut fb = small();
        fb.set_orientation(1);
        Rectangle::new(Point::new(10, 20), Size::new(4, 3))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut fb)
            .unwrap();
        let black = fb.next().iter().map(|b| b.count_ones()).sum::<u32>();
        assert_eq!(black, 12);
        assert_eq!(fb.pixel(10, 20), Colour::Black);
        assert_eq!(fb.pixel(13, 22), Colour::Black);
        assert_eq!(fb.pixel(14, 22), Colour::White);
    }

    #[test]
    fn test_draw_target_skips_negative() {
        let mut fb = small();
        Pixel(Point::new(-1, 5), BinaryColor::On)
            .draw(&mut fb)
            .unwrap();
        assert!(fb.next().iter().all(|&b| b == 0));
        assert_eq!(OriginDimensions::size(&fb), Size::new(176, 264));
    }
}
