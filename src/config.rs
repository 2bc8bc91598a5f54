//! Configuration types for QR batch generation and PDF export.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. Setters clamp obviously out-of-range
//! values; [`GenerationConfigBuilder::build`] rejects combinations that can
//! never produce output (a page layout with no room for a single row, an
//! unparsable colour).

use crate::error::QrBatchError;
use crate::history::HistoryStore;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest accepted QR image edge, in pixels.
pub const MIN_QR_SIZE: u32 = 100;
/// Largest accepted QR image edge, in pixels.
pub const MAX_QR_SIZE: u32 = 500;

/// Configuration for one generation run and its PDF export.
///
/// # Example
/// ```rust
/// use qrbatch::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .qr_size(300)
///     .margin(4)
///     .title("Warehouse labels")
///     .build()
///     .unwrap();
/// assert_eq!(config.qr_size, 300);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Edge length of each rendered QR image in pixels. Range: 100–500. Default: 200.
    pub qr_size: u32,

    /// Quiet-zone width around the code, in modules. Default: 2.
    pub margin: u32,

    /// Dark/light colours of the rendered code.
    pub palette: Palette,

    /// Page geometry for PDF export.
    pub layout: PageLayout,

    /// Title printed at the top of every PDF page. Default: "Generated QR Codes".
    pub title: String,

    /// Where finished batches are appended. `None` disables history.
    pub history: Option<HistoryStore>,

    /// Optional per-record progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            qr_size: 200,
            margin: 2,
            palette: Palette::default(),
            layout: PageLayout::default(),
            title: "Generated QR Codes".to_string(),
            history: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("qr_size", &self.qr_size)
            .field("margin", &self.margin)
            .field("palette", &self.palette)
            .field("layout", &self.layout)
            .field("title", &self.title)
            .field("history", &self.history.as_ref().map(|h| h.key().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
            dark: None,
            light: None,
        }
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
    dark: Option<String>,
    light: Option<String>,
}

impl fmt::Debug for GenerationConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfigBuilder")
            .field("config", &self.config)
            .field("dark", &self.dark)
            .field("light", &self.light)
            .finish()
    }
}

impl GenerationConfigBuilder {
    pub fn qr_size(mut self, px: u32) -> Self {
        self.config.qr_size = px.clamp(MIN_QR_SIZE, MAX_QR_SIZE);
        self
    }

    pub fn margin(mut self, modules: u32) -> Self {
        self.config.margin = modules.min(16);
        self
    }

    /// Dark colour as `#RRGGBB` or `#RRGGBBAA`. Parsed in [`Self::build`].
    pub fn dark_color(mut self, hex: impl Into<String>) -> Self {
        self.dark = Some(hex.into());
        self
    }

    /// Light colour as `#RRGGBB` or `#RRGGBBAA`. Parsed in [`Self::build`].
    pub fn light_color(mut self, hex: impl Into<String>) -> Self {
        self.light = Some(hex.into());
        self
    }

    pub fn palette(mut self, palette: Palette) -> Self {
        self.config.palette = palette;
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn history(mut self, store: HistoryStore) -> Self {
        self.config.history = Some(store);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<GenerationConfig, QrBatchError> {
        if let Some(hex) = self.dark.take() {
            self.config.palette.dark = Rgba::from_hex(&hex)?;
        }
        if let Some(hex) = self.light.take() {
            self.config.palette.light = Rgba::from_hex(&hex)?;
        }

        let c = &self.config;
        if !(MIN_QR_SIZE..=MAX_QR_SIZE).contains(&c.qr_size) {
            return Err(QrBatchError::InvalidConfig(format!(
                "QR size must be {MIN_QR_SIZE}–{MAX_QR_SIZE} px, got {}",
                c.qr_size
            )));
        }
        if c.palette.dark == c.palette.light {
            return Err(QrBatchError::InvalidConfig(
                "Dark and light colours must differ".into(),
            ));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

// ── Colours ──────────────────────────────────────────────────────────────

/// An 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);

    /// Parse `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> Result<Self, QrBatchError> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || QrBatchError::InvalidConfig(format!("Invalid colour '{s}': expected #RRGGBB or #RRGGBBAA"));

        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let mut out = [0u8, 0, 0, 255];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| invalid())?;
            out[i] = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Rgba(out))
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

/// The two colours a QR code is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub dark: Rgba,
    pub light: Rgba,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            dark: Rgba::BLACK,
            light: Rgba::WHITE,
        }
    }
}

// ── Page layout ──────────────────────────────────────────────────────────

/// PDF page geometry, all lengths in millimetres.
///
/// The grid is always two columns. Every page reserves the same header band,
/// so all pages hold the same number of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    /// Applied on all four sides.
    pub margin_mm: f32,
    /// Height reserved below the top margin for the title block.
    pub header_height_mm: f32,
    /// Edge length of each QR image.
    pub cell_size_mm: f32,
    /// Horizontal gap between the two columns.
    pub column_gap_mm: f32,
    /// Height of the payload text band under each image.
    pub caption_height_mm: f32,
    /// Vertical gap between one row's caption and the next row's image.
    pub row_gap_mm: f32,
    /// Caption font size in points.
    pub caption_font_pt: f32,
}

/// Number of grid columns.
pub const GRID_COLUMNS: usize = 2;

impl Default for PageLayout {
    /// A4 portrait with 60 mm codes: three rows, six entries per page.
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 20.0,
            header_height_mm: 25.0,
            cell_size_mm: 60.0,
            column_gap_mm: 30.0,
            caption_height_mm: 12.0,
            row_gap_mm: 8.0,
            caption_font_pt: 8.0,
        }
    }
}

impl PageLayout {
    /// Y offset (from the page top) where the first grid row starts.
    pub fn content_top_mm(&self) -> f32 {
        self.margin_mm + self.header_height_mm
    }

    /// Lowest Y offset any row may reach.
    pub fn printable_bottom_mm(&self) -> f32 {
        self.page_height_mm - self.margin_mm
    }

    /// Vertical extent of one row: image plus caption band.
    pub fn row_extent_mm(&self) -> f32 {
        self.cell_size_mm + self.caption_height_mm
    }

    /// Distance between the tops of two consecutive rows.
    pub fn row_pitch_mm(&self) -> f32 {
        self.row_extent_mm() + self.row_gap_mm
    }

    /// X offset of grid column `col`.
    pub fn column_x_mm(&self, col: usize) -> f32 {
        self.margin_mm + col as f32 * (self.cell_size_mm + self.column_gap_mm)
    }

    pub fn rows_per_page(&self) -> usize {
        let available = self.printable_bottom_mm() - self.content_top_mm();
        let extent = self.row_extent_mm();
        if available < extent {
            return 0;
        }
        ((available - extent) / self.row_pitch_mm()).floor() as usize + 1
    }

    pub fn entries_per_page(&self) -> usize {
        self.rows_per_page() * GRID_COLUMNS
    }

    /// Check the layout can place at least one full row inside the page.
    pub fn validate(&self) -> Result<(), QrBatchError> {
        let lengths = [
            self.page_width_mm,
            self.page_height_mm,
            self.cell_size_mm,
            self.caption_font_pt,
        ];
        if lengths.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(QrBatchError::InvalidConfig(
                "Page size, cell size and caption font must be positive".into(),
            ));
        }
        let gaps = [
            self.margin_mm,
            self.header_height_mm,
            self.column_gap_mm,
            self.caption_height_mm,
            self.row_gap_mm,
        ];
        if gaps.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(QrBatchError::InvalidConfig(
                "Margins and gaps must not be negative".into(),
            ));
        }
        let right_edge = self.column_x_mm(GRID_COLUMNS - 1) + self.cell_size_mm;
        if right_edge > self.page_width_mm - self.margin_mm {
            return Err(QrBatchError::InvalidConfig(format!(
                "Two {}mm columns do not fit across a {}mm page",
                self.cell_size_mm, self.page_width_mm
            )));
        }
        if self.rows_per_page() == 0 {
            return Err(QrBatchError::InvalidConfig(format!(
                "A {}mm row does not fit on a {}mm page",
                self.row_extent_mm(),
                self.page_height_mm
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_size_is_clamped() {
        let c = GenerationConfig::builder().qr_size(20).build().unwrap();
        assert_eq!(c.qr_size, MIN_QR_SIZE);
        let c = GenerationConfig::builder().qr_size(9000).build().unwrap();
        assert_eq!(c.qr_size, MAX_QR_SIZE);
    }

    #[test]
    fn hex_colours_parse() {
        assert_eq!(Rgba::from_hex("#000000").unwrap(), Rgba::BLACK);
        assert_eq!(Rgba::from_hex("ffffff").unwrap(), Rgba::WHITE);
        assert_eq!(Rgba::from_hex("#11223380").unwrap(), Rgba([0x11, 0x22, 0x33, 0x80]));
        assert!(Rgba::from_hex("#12345").is_err());
        assert!(Rgba::from_hex("#GG0000").is_err());
        assert_eq!(Rgba([0x11, 0x22, 0x33, 255]).to_hex(), "#112233");
    }

    #[test]
    fn invalid_colour_fails_build() {
        let err = GenerationConfig::builder()
            .dark_color("not-a-colour")
            .build()
            .unwrap_err();
        assert!(matches!(err, QrBatchError::InvalidConfig(_)));
    }

    #[test]
    fn identical_colours_rejected() {
        let err = GenerationConfig::builder()
            .dark_color("#FFFFFF")
            .build()
            .unwrap_err();
        assert!(matches!(err, QrBatchError::InvalidConfig(_)));
    }

    #[test]
    fn default_layout_fits_three_rows() {
        let layout = PageLayout::default();
        assert_eq!(layout.rows_per_page(), 3);
        assert_eq!(layout.entries_per_page(), 6);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn oversized_cells_are_rejected() {
        let layout = PageLayout {
            cell_size_mm: 250.0,
            ..PageLayout::default()
        };
        assert!(layout.validate().is_err());

        let layout = PageLayout {
            page_height_mm: 100.0,
            ..PageLayout::default()
        };
        assert_eq!(layout.rows_per_page(), 0);
        assert!(layout.validate().is_err());
    }
}
