//! Supported panels
//!
//! The touch-capable 2.71" and 3.70" EXT3 panels in each film class.
//! Geometry is given in native portrait orientation: `width` is the short
//! side, `height` the long side.

use crate::otp::{OtpField, OtpLayout, OtpSource};
use crate::panel::{Family, Features, Film, PanelDescriptor, TouchModel, UnsupportedPanel};

/// Size code of the 2.71" panels.
pub const SIZE_271: u8 = 0x27;
/// Size code of the 3.70" panels.
pub const SIZE_370: u8 = 0x37;

/// I2C address of the 2.71" touch controller.
pub const TOUCH_271_ADDRESS: u8 = 0x41;
/// I2C address of the 3.70" touch controller.
pub const TOUCH_370_ADDRESS: u8 = 0x38;

const fn panel_id(features: Features, size: u8, driver: u8) -> u32 {
    u32::from_be_bytes([0, features.bits(), size, driver])
}

const CS_TOUCH: Features = Features::TOUCH;
const PS_TOUCH: Features = Features::FAST.union(Features::TOUCH);
const KS_TOUCH: Features = Features::FAST
    .union(Features::TOUCH)
    .union(Features::WIDE_TEMPERATURE);

/// 2.71" CS series with touch.
pub const EPD_271_CS_TOUCH: u32 = panel_id(CS_TOUCH, SIZE_271, 0x09);
/// 2.71" PS series (fast update) with touch.
pub const EPD_271_PS_TOUCH: u32 = panel_id(PS_TOUCH, SIZE_271, 0x09);
/// 2.71" KS series (fast update, wide temperature) with touch.
pub const EPD_271_KS_TOUCH: u32 = panel_id(KS_TOUCH, SIZE_271, 0x09);
/// 3.70" CS series with touch.
pub const EPD_370_CS_TOUCH: u32 = panel_id(CS_TOUCH, SIZE_370, 0x0C);
/// 3.70" PS series (fast update) with touch.
pub const EPD_370_PS_TOUCH: u32 = panel_id(PS_TOUCH, SIZE_370, 0x0C);
/// 3.70" KS series (fast update, wide temperature) with touch.
pub const EPD_370_KS_TOUCH: u32 = panel_id(KS_TOUCH, SIZE_370, 0x0C);

/// 2.71" panels have no OTP.
const OTP_271: OtpSource = OtpSource::Preset {
    psr: [0xCF, 0x8D],
    vcom: 0x07,
};

/// 3.70" medium-family COG: two banks 1 KiB apart, soft-start table
/// after the PSR and VCOM bytes.
const OTP_370: OtpSource = OtpSource::Memory(OtpLayout {
    bank_offsets: [0x0000, 0x0400],
    psr: OtpField {
        offset: 0x00B1,
        len: 2,
    },
    vcom: OtpField {
        offset: 0x00B3,
        len: 1,
    },
    soft_start: Some(OtpField {
        offset: 0x00C0,
        len: 128,
    }),
});

const fn panel_271(name: &'static str, features: Features) -> PanelDescriptor {
    PanelDescriptor {
        name,
        id: panel_id(features, SIZE_271, 0x09),
        size_code: SIZE_271,
        driver_code: 0x09,
        features,
        film: Film::from_features(features),
        family: Family::Small,
        width: 176,
        height: 264,
        diagonal: 271,
        extra_data_interval: false,
        otp: OTP_271,
        touch: Some(TouchModel::Register {
            address: TOUCH_271_ADDRESS,
        }),
    }
}

const fn panel_370(name: &'static str, features: Features) -> PanelDescriptor {
    PanelDescriptor {
        name,
        id: panel_id(features, SIZE_370, 0x0C),
        size_code: SIZE_370,
        driver_code: 0x0C,
        features,
        film: Film::from_features(features),
        family: Family::Medium,
        width: 240,
        height: 416,
        diagonal: 370,
        extra_data_interval: true,
        otp: OTP_370,
        touch: Some(TouchModel::Interrupt {
            address: TOUCH_370_ADDRESS,
            x_max: 239,
            y_max: 415,
        }),
    }
}

/// Every supported panel.
pub const PANELS: &[PanelDescriptor] = &[
    panel_271("2.71\" CS touch", CS_TOUCH),
    panel_271("2.71\" PS touch", PS_TOUCH),
    panel_271("2.71\" KS touch", KS_TOUCH),
    panel_370("3.70\" CS touch", CS_TOUCH),
    panel_370("3.70\" PS touch", PS_TOUCH),
    panel_370("3.70\" KS touch", KS_TOUCH),
];

/// Resolve a packed panel identifier.
pub fn lookup(id: u32) -> Result<&'static PanelDescriptor, UnsupportedPanel> {
    PANELS
        .iter()
        .find(|panel| panel.id == id)
        .ok_or(UnsupportedPanel(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_packing() {
        assert_eq!(EPD_271_PS_TOUCH, 0x03_2709);
        assert_eq!(EPD_370_PS_TOUCH, 0x03_370C);
        assert_eq!(EPD_271_KS_TOUCH, 0x0B_2709);
        assert_eq!(EPD_370_CS_TOUCH, 0x02_370C);
    }

    #[test]
    fn test_lookup_geometry_classes() {
        let small = lookup(EPD_271_PS_TOUCH).unwrap();
        assert_eq!((small.width, small.height), (176, 264));
        assert_eq!(small.family, Family::Small);
        assert_eq!(small.size_type(), 0x2709);

        let medium = lookup(EPD_370_KS_TOUCH).unwrap();
        assert_eq!((medium.width, medium.height), (240, 416));
        assert_eq!(medium.family, Family::Medium);
        assert_eq!(medium.film, Film::Wide);
    }

    #[test]
    fn test_lookup_unsupported() {
        assert_eq!(lookup(0x03_2609), Err(UnsupportedPanel(0x03_2609)));
        // Touch-less variant of a known size is not in the registry
        assert_eq!(lookup(0x01_2709), Err(UnsupportedPanel(0x01_2709)));
    }

    #[test]
    fn test_registry_identifiers_consistent() {
        for panel in PANELS {
            let [_, features, size, driver] = panel.id.to_be_bytes();
            assert_eq!(features, panel.features.bits(), "{}", panel.name);
            assert_eq!(size, panel.size_code, "{}", panel.name);
            assert_eq!(driver, panel.driver_code, "{}", panel.name);
            assert!(panel.has_feature(Features::TOUCH), "{}", panel.name);
            assert_eq!(panel.width % 8, 0, "{}", panel.name);
            assert!(panel.touch.is_some(), "{}", panel.name);
        }
    }

    #[test]
    fn test_registry_identifiers_unique() {
        for (i, a) in PANELS.iter().enumerate() {
            for b in PANELS.iter().skip(i + 1) {
                assert_ne!(a.id, b.id, "{} / {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_otp_layouts_well_formed() {
        for panel in PANELS {
            if let OtpSource::Memory(layout) = panel.otp {
                assert!(layout.is_well_formed(), "{}", panel.name);
            }
        }
    }

    #[test]
    fn test_frame_bytes() {
        let small = lookup(EPD_271_CS_TOUCH).unwrap();
        assert_eq!(small.row_bytes(), 22);
        assert_eq!(small.frame_bytes(), 22 * 264);

        let medium = lookup(EPD_370_PS_TOUCH).unwrap();
        assert_eq!(medium.row_bytes(), 30);
        assert_eq!(medium.frame_bytes(), 30 * 416);
    }

    #[test]
    fn test_extra_data_interval_only_on_370() {
        assert!(!lookup(EPD_271_PS_TOUCH).unwrap().extra_data_interval);
        assert!(lookup(EPD_370_PS_TOUCH).unwrap().extra_data_interval);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_descriptor() {
        let json = serde_json::to_string(lookup(EPD_271_PS_TOUCH).unwrap()).unwrap();
        assert!(json.contains("\"width\":176"));
        assert!(json.contains("\"film\":\"Fast\""));
    }
}
