//! Pairing code rendering.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::{svg, unicode};
use qrcode::QrCode;

use crate::error::RelayError;

const QR_MIN_DIMENSION: u32 = 256;

/// Renders a pairing code as an SVG QR code wrapped in a `data:` URI.
pub fn render_pairing_image(code: &str) -> Result<String, RelayError> {
    let svg = render_qr_svg(code)?;
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg)))
}

/// Renders a pairing code with half-block characters for terminal output.
pub fn render_pairing_terminal(code: &str) -> Result<String, RelayError> {
    let qr = encode(code)?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

fn render_qr_svg(text: &str) -> Result<String, RelayError> {
    let code = encode(text)?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
        .build())
}

fn encode(text: &str) -> Result<QrCode, RelayError> {
    QrCode::new(text.as_bytes()).map_err(|err| RelayError::Pairing(format!("qr: {err}").into()))
}
