//! Property-based tests for the coordinate mapper.
//! Every orientation must place each logical pixel on exactly one physical
//! pixel, and touch mapping must land on the pixel drawn at the same place.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use ext3::touch::{map_to_screen, TouchBounds};
use ext3::{Colour, FrameBuffer};
use platform::{TouchEvent, TouchKind};
use proptest::prelude::*;

/// Native `(short, long)` of both panel sizes.
fn geometry_strategy() -> impl Strategy<Value = (u16, u16)> {
    prop_oneof![Just((176u16, 264u16)), Just((240u16, 416u16))]
}

fn oriented(short: u16, long: u16, orientation: u8) -> FrameBuffer {
    let mut buffer = FrameBuffer::with_geometry(short, long);
    buffer.set_orientation(orientation);
    buffer
}

/// `(short, long, orientation)` plus one logical pixel inside that screen.
fn pixel_strategy() -> impl Strategy<Value = ((u16, u16, u8), (u16, u16))> {
    (geometry_strategy(), 0u8..4).prop_flat_map(|((short, long), orientation)| {
        let (width, height) = oriented(short, long, orientation).size();
        (Just((short, long, orientation)), (0..width, 0..height))
    })
}

/// Like [`pixel_strategy`] with two logical pixels on the same screen.
fn pixel_pair_strategy() -> impl Strategy<Value = ((u16, u16, u8), (u16, u16), (u16, u16))> {
    (geometry_strategy(), 0u8..4).prop_flat_map(|((short, long), orientation)| {
        let (width, height) = oriented(short, long, orientation).size();
        (
            Just((short, long, orientation)),
            (0..width, 0..height),
            (0..width, 0..height),
        )
    })
}

proptest! {
    /// Logical coordinates inside the screen always map inside the panel.
    #[test]
    fn physical_stays_in_bounds(
        (short, long) in geometry_strategy(),
        orientation in 0u8..4,
        x in 0u16..416,
        y in 0u16..416,
    ) {
        let buffer = oriented(short, long, orientation);
        let (width, height) = buffer.size();

        match buffer.to_physical(x, y) {
            Some((px, py)) => {
                assert!(x < width && y < height);
                assert!(px < long && py < short, "({px}, {py}) outside {short}x{long}");
            }
            None => assert!(x >= width || y >= height),
        }
    }

    /// Two distinct logical pixels never share a physical pixel.
    #[test]
    fn mapping_is_injective(((short, long, orientation), a, b) in pixel_pair_strategy()) {
        let buffer = oriented(short, long, orientation);
        let pa = buffer.to_physical(a.0, a.1).unwrap();
        let pb = buffer.to_physical(b.0, b.1).unwrap();
        prop_assert_eq!(pa == pb, a == b);
    }

    /// A black pixel written in any orientation reads back from that
    /// orientation and from nowhere else.
    #[test]
    fn black_pixel_reads_back(((short, long, orientation), (x, y)) in pixel_strategy()) {
        let mut buffer = oriented(short, long, orientation);
        buffer.set_pixel(x, y, Colour::Black);

        prop_assert_eq!(buffer.pixel(x, y), Colour::Black);
        prop_assert_eq!(buffer.next().iter().map(|b| b.count_ones()).sum::<u32>(), 1);
    }

    /// A white pixel written over a black screen reads back and clears
    /// exactly one bit.
    #[test]
    fn white_pixel_reads_back_over_black(((short, long, orientation), (x, y)) in pixel_strategy()) {
        let mut buffer = oriented(short, long, orientation);
        buffer.clear(Colour::Black);
        buffer.set_pixel(x, y, Colour::White);

        prop_assert_eq!(buffer.pixel(x, y), Colour::White);
        prop_assert_eq!(buffer.next().iter().map(|b| b.count_zeros()).sum::<u32>(), 1);
    }

    /// A touch at the raw position of a physical pixel maps to the logical
    /// coordinates that draw that pixel.
    #[test]
    fn touch_lands_on_drawn_pixel(
        (short, long) in geometry_strategy(),
        orientation in 0u8..4,
        raw_x in 0u16..240,
        raw_y in 0u16..416,
    ) {
        let raw_x = raw_x % short;
        let raw_y = raw_y % long;
        // Raw range equal to the panel: scaling is the identity.
        let bounds = TouchBounds { x_max: short - 1, y_max: long - 1 };
        let event = TouchEvent::contact(TouchKind::Press, raw_x, raw_y);

        let mapped = map_to_screen(event, orientation, (short, long), bounds);
        let buffer = oriented(short, long, orientation);

        // Raw X runs along the short side (py), raw Y along the long side (px).
        assert_eq!(buffer.to_physical(mapped.x, mapped.y), Some((raw_y, raw_x)));
    }
}
