use base64::{engine::general_purpose::STANDARD, Engine as _};
use png::{BitDepth, ColorType, Encoder};
use qrcode::{Color, QrCode};

use crate::models::QrLinkError;

const MODULE_PIXELS: usize = 10;
const QUIET_ZONE_MODULES: usize = 2;

/// Renders `data` as a grayscale PNG QR code.
pub fn qr_png(data: &str) -> Result<Vec<u8>, QrLinkError> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| QrLinkError::QrImage(e.to_string()))?;
    let modules = code.to_colors();
    let width = code.width();

    let side_modules = width + 2 * QUIET_ZONE_MODULES;
    let side = side_modules * MODULE_PIXELS;
    let mut pixels = Vec::with_capacity(side * side);

    for y in 0..side {
        for x in 0..side {
            let mx = (x / MODULE_PIXELS).checked_sub(QUIET_ZONE_MODULES);
            let my = (y / MODULE_PIXELS).checked_sub(QUIET_ZONE_MODULES);
            let dark = match (mx, my) {
                (Some(mx), Some(my)) if mx < width && my < width => {
                    modules.get(my * width + mx) == Some(&Color::Dark)
                }
                _ => false,
            };
            pixels.push(if dark { 0 } else { 255 });
        }
    }

    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, side as u32, side as u32);
    encoder.set_color(ColorType::Grayscale);
    encoder.set_depth(BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| QrLinkError::QrImage(e.to_string()))?;
    writer
        .write_image_data(&pixels)
        .map_err(|e| QrLinkError::QrImage(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| QrLinkError::QrImage(e.to_string()))?;

    Ok(buffer)
}

pub fn qr_data_url(data: &str) -> Result<String, QrLinkError> {
    let png = qr_png(data)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}
