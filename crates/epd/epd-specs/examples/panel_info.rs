//! Panel Information Example
//!
//! Lists every supported panel with its geometry, calibration source and
//! temperature envelope.
//!
//! Run with: cargo run -p epd-specs --example panel_info

use epd_specs::temperature::{fast_band, global_band};
use epd_specs::{Family, OtpSource, PanelDescriptor, TouchModel, PANELS};

fn band_label(band: Option<core::ops::RangeInclusive<i8>>) -> String {
    match band {
        Some(band) => format!("{}°C to {}°C", band.start(), band.end()),
        None => "not supported".to_string(),
    }
}

fn print_panel_info(panel: &PanelDescriptor) {
    let (inches, hundredths) = panel.diagonal_parts();

    println!("\n{}", "=".repeat(60));
    println!("Panel: {} (0x{:06x})", panel.name, panel.id);
    println!("{}", "=".repeat(60));

    println!("\nGeometry:");
    println!("  Diagonal: {}.{:02}\"", inches, hundredths);
    println!("  Resolution: {}×{} pixels", panel.width, panel.height);
    println!(
        "  Frame buffer: {} bytes per plane ({} bytes per row)",
        panel.frame_bytes(),
        panel.row_bytes()
    );
    let family = match panel.family {
        Family::Small => "small",
        Family::Medium => "medium",
    };
    println!("  Family: {}", family);

    println!("\nCalibration:");
    match panel.otp {
        OtpSource::Preset {
            psr: [psr0, psr1],
            vcom,
        } => {
            println!("  Preset PSR 0x{psr0:02x} 0x{psr1:02x}, VCOM 0x{vcom:02x}");
        }
        OtpSource::Memory(layout) => {
            let [primary, secondary] = layout.bank_offsets;
            println!("  OTP banks at 0x{primary:04x} / 0x{secondary:04x}");
            println!("  PSR at +0x{:04x}", layout.psr.offset);
            if let Some(table) = layout.soft_start {
                println!(
                    "  Soft-start table at +0x{:04x} ({} bytes)",
                    table.offset, table.len
                );
            }
        }
    }

    println!("\nTemperature ({} film):", panel.film.series());
    println!("  Fast update: {}", band_label(fast_band(panel.film)));
    println!("  Global update: {}", band_label(global_band(panel.film)));

    if let Some(touch) = panel.touch {
        let protocol = match touch {
            TouchModel::Register { .. } => "register polling",
            TouchModel::Interrupt { .. } => "interrupt line",
        };
        println!("\nTouch: I2C 0x{:02x}, {}", touch.address(), protocol);
    }
}

fn main() {
    println!("EXT3 Panel Specifications");
    println!("=========================");

    for panel in PANELS {
        print_panel_info(panel);
    }
}
