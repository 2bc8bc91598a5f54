//! QR rasterisation: payload text → `size × size` RGBA bitmap.
//!
//! The `qrcode` crate supplies the module matrix; pixels are sampled here so
//! the output is exactly the requested size regardless of the symbol
//! version, and so the palette can carry alpha.
//!
//! Size limits (100–500 px) are enforced by [`crate::config`], not here.

use crate::config::Palette;
use image::{Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;
use tracing::debug;

/// Why a payload could not become a bitmap.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),

    /// Every module needs at least one pixel or the code cannot be scanned.
    #[error(
        "QR code needs {needed} modules ({modules} + {margin}×2 quiet zone) but the image is only {size} px wide\n\
         Use a larger --size, a smaller --margin, or fewer columns."
    )]
    TooDense {
        modules: usize,
        margin: usize,
        needed: usize,
        size: u32,
    },
}

/// Parameters for one render call.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Output edge length in pixels.
    pub size: u32,
    /// Quiet zone in modules on each side.
    pub margin: u32,
    pub palette: Palette,
}

/// Render `payload` at error-correction level M.
///
/// Fails when the encoder cannot fit the payload into any QR version, or
/// when the symbol plus quiet zone has more modules than `size` has pixels.
pub fn render_qr(payload: &str, opts: &RenderOptions) -> Result<RgbaImage, RenderError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)?;
    let modules = code.width();
    let colors = code.to_colors();

    let margin = opts.margin as usize;
    let total = modules + 2 * margin;
    let size = opts.size.max(1);
    if total > size as usize {
        return Err(RenderError::TooDense {
            modules,
            margin,
            needed: total,
            size,
        });
    }
    let dark = Rgba(opts.palette.dark.0);
    let light = Rgba(opts.palette.light.0);

    let img = RgbaImage::from_fn(size, size, |x, y| {
        // Nearest-module sampling over the quiet-zone-padded grid.
        let mx = (x as usize * total) / size as usize;
        let my = (y as usize * total) / size as usize;
        let inside = mx >= margin && my >= margin && mx < margin + modules && my < margin + modules;
        if inside && colors[(my - margin) * modules + (mx - margin)] == Color::Dark {
            dark
        } else {
            light
        }
    });

    debug!(
        "Rendered QR: {} modules (+{} margin) → {}x{} px",
        modules, margin, size, size
    );
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rgba as Colour;

    fn opts(size: u32, margin: u32) -> RenderOptions {
        RenderOptions {
            size,
            margin,
            palette: Palette::default(),
        }
    }

    #[test]
    fn output_has_requested_size() {
        for size in [100, 200, 333, 500] {
            let img = render_qr("sku: A1 | name: Widget", &opts(size, 2)).unwrap();
            assert_eq!(img.dimensions(), (size, size));
        }
    }

    #[test]
    fn quiet_zone_is_light() {
        let img = render_qr("hello", &opts(200, 4)).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(199, 199), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn finder_pattern_corner_is_dark() {
        // Zero margin: the top-left pixel is the finder pattern's outer ring.
        let img = render_qr("hello", &opts(210, 0)).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn palette_is_applied() {
        let palette = Palette {
            dark: Colour([10, 20, 30, 255]),
            light: Colour([240, 230, 220, 255]),
        };
        let img = render_qr(
            "x",
            &RenderOptions {
                size: 120,
                margin: 0,
                palette,
            },
        )
        .unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
        assert!(img.pixels().any(|p| *p == Rgba([240, 230, 220, 255])));
    }

    #[test]
    fn oversized_payload_fails() {
        let payload = "x".repeat(4000);
        assert!(render_qr(&payload, &opts(200, 2)).is_err());
    }

    #[test]
    fn dense_payload_at_small_size_fails() {
        // ~900 bytes needs a version-20 symbol (97 modules) + 4 quiet-zone modules.
        let payload = "sku: 0123456789 | ".repeat(50);
        let err = render_qr(&payload, &opts(100, 2)).unwrap_err();
        assert!(matches!(err, RenderError::TooDense { size: 100, .. }), "got: {err}");

        // The same payload fits once every module can have a pixel.
        let img = render_qr(&payload, &opts(200, 2)).unwrap();
        assert_eq!(img.dimensions(), (200, 200));
    }

    #[test]
    fn one_pixel_per_module_reproduces_matrix() {
        let payload = "sku: 0123456789 | ".repeat(20);
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let size = (modules + 4) as u32;

        let img = render_qr(&payload, &opts(size, 2)).unwrap();
        for y in 0..modules {
            for x in 0..modules {
                let expected = if colors[y * modules + x] == Color::Dark {
                    Rgba([0, 0, 0, 255])
                } else {
                    Rgba([255, 255, 255, 255])
                };
                assert_eq!(img.get_pixel(x as u32 + 2, y as u32 + 2), &expected, "module ({x}, {y})");
            }
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = render_qr("abc", &opts(150, 2)).unwrap();
        let b = render_qr("abc", &opts(150, 2)).unwrap();
        assert_eq!(a, b);
    }
}
