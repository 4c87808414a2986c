//! QR rendering of pickup payloads as base64 SVG `data:` URLs.

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use pickup_core::render::CodeRenderer;
use qrcode::{QrCode, render::svg};

/// Smallest edge, in pixels, of a rendered code.
const MIN_DIMENSION: u32 = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct QrSvgRenderer;

impl CodeRenderer for QrSvgRenderer {
  fn render(&self, payload: &str) -> Result<String, String> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| e.to_string())?;
    let image = code
      .render::<svg::Color<'_>>()
      .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
      .build();
    Ok(format!("data:image/svg+xml;base64,{}", B64.encode(image)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_svg_data_url() {
    let url = QrSvgRenderer
      .render(r#"{"student_id":"x","code":"abc"}"#)
      .unwrap();
    let encoded = url.strip_prefix("data:image/svg+xml;base64,").unwrap();
    let svg = String::from_utf8(B64.decode(encoded).unwrap()).unwrap();
    assert!(svg.contains("<svg"));
  }

  #[test]
  fn oversized_payload_is_an_error() {
    let huge = "x".repeat(8_000);
    assert!(QrSvgRenderer.render(&huge).is_err());
  }
}
