//! PDF assembly: QR entries → a paginated two-column document.
//!
//! Every page carries the same header band (title, source file, date and a
//! page counter) so all pages have identical capacity. Images are decoded
//! from their stored data URLs, so the exporter works equally on a fresh
//! batch and on entries reloaded from history.
//!
//! printpdf measures Y from the bottom edge; the layout plan measures it from
//! the top. The conversion happens only in this file.

use crate::config::PageLayout;
use crate::error::QrBatchError;
use crate::output::{ExportMetadata, PdfExport, QrEntry};
use crate::pipeline::caption::caption_lines;
use crate::pipeline::encode::decode_data_url;
use crate::pipeline::layout::plan_layout;
use image::DynamicImage;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference,
};
use tracing::{debug, info};

/// Points → millimetres.
const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;
/// Baseline-to-baseline distance as a multiple of the font size.
const LINE_SPACING: f32 = 1.25;

const TITLE_PT: f32 = 16.0;
const META_PT: f32 = 10.0;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Build the PDF in memory. CPU-bound: call from `spawn_blocking`.
pub fn export_pdf_blocking(
    entries: &[QrEntry],
    meta: &ExportMetadata,
    layout: &PageLayout,
) -> Result<PdfExport, QrBatchError> {
    if entries.is_empty() {
        return Err(QrBatchError::export("No QR codes to export"));
    }
    layout.validate()?;

    let plan = plan_layout(entries.len(), layout);
    let page_count = plan.page_count();
    let (w, h) = (Mm(layout.page_width_mm), Mm(layout.page_height_mm));

    let (doc, first_page, first_layer) = PdfDocument::new(meta.title.as_str(), w, h, "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| QrBatchError::export(format!("font: {e}")))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| QrBatchError::export(format!("font: {e}")))?,
    };

    let caption_chars = chars_per_line(layout.cell_size_mm, layout.caption_font_pt);
    let caption_max_lines = lines_per_band(layout.caption_height_mm, layout.caption_font_pt);

    for (page_no, placements) in plan.pages.iter().enumerate() {
        let layer = if page_no == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = doc.add_page(w, h, "Layer 1");
            doc.get_page(p).get_layer(l)
        };

        draw_header(&layer, &fonts, meta, layout, page_no + 1, page_count);

        for cell in placements {
            let entry = &entries[cell.index];
            draw_image(&layer, entry, layout, cell.x_mm, cell.y_mm)?;

            let caption_top = cell.y_mm + layout.cell_size_mm;
            let line_mm = layout.caption_font_pt * PT_TO_MM * LINE_SPACING;
            for (i, line) in caption_lines(&entry.payload, caption_chars, caption_max_lines)
                .into_iter()
                .enumerate()
            {
                let baseline = caption_top + line_mm * (i as f32 + 1.0);
                layer.use_text(
                    line,
                    layout.caption_font_pt,
                    Mm(cell.x_mm),
                    Mm(layout.page_height_mm - baseline),
                    &fonts.regular,
                );
            }
        }
        debug!("PDF page {}/{}: {} entries", page_no + 1, page_count, placements.len());
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| QrBatchError::export(format!("serialise: {e}")))?;

    info!(
        "PDF built: {} entries on {} pages ({} bytes)",
        entries.len(),
        page_count,
        bytes.len()
    );
    Ok(PdfExport {
        bytes,
        page_count,
        entry_count: entries.len(),
    })
}

fn draw_header(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    meta: &ExportMetadata,
    layout: &PageLayout,
    page_no: usize,
    page_count: usize,
) {
    let top = layout.page_height_mm - layout.margin_mm;
    let x = Mm(layout.margin_mm);
    let text_width = layout.page_width_mm - 2.0 * layout.margin_mm;

    let title_mm = TITLE_PT * PT_TO_MM;
    let meta_mm = META_PT * PT_TO_MM * LINE_SPACING;

    let title = caption_lines(&meta.title, chars_per_line(text_width * 0.75, TITLE_PT), 1);
    if let Some(title) = title.into_iter().next() {
        layer.use_text(title, TITLE_PT, x, Mm(top - title_mm), &fonts.bold);
    }

    let counter = format!("Page {page_no} of {page_count}");
    let counter_width = counter.len() as f32 * META_PT * PT_TO_MM * AVG_GLYPH_WIDTH;
    layer.use_text(
        counter,
        META_PT,
        Mm(layout.page_width_mm - layout.margin_mm - counter_width),
        Mm(top - title_mm),
        &fonts.regular,
    );

    let meta_chars = chars_per_line(text_width, META_PT);
    let source = format!("Generated from: {}", meta.source_name);
    if let Some(source) = caption_lines(&source, meta_chars, 1).into_iter().next() {
        layer.use_text(source, META_PT, x, Mm(top - title_mm - meta_mm * 1.5), &fonts.regular);
    }
    let date = format!("Date: {}", meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    layer.use_text(date, META_PT, x, Mm(top - title_mm - meta_mm * 2.5), &fonts.regular);
}

fn draw_image(
    layer: &PdfLayerReference,
    entry: &QrEntry,
    layout: &PageLayout,
    x_mm: f32,
    y_top_mm: f32,
) -> Result<(), QrBatchError> {
    let decoded = decode_data_url(&entry.image_data)
        .map_err(|e| QrBatchError::export(format!("entry {}: {e}", entry.id)))?;
    // The PDF image has no alpha channel.
    let rgb8 = decoded.to_rgb8();
    let px = rgb8.width().max(1) as f32;
    let rgb = DynamicImage::ImageRgb8(rgb8);

    Image::from_dynamic_image(&rgb).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x_mm)),
            translate_y: Some(Mm(layout.page_height_mm - y_top_mm - layout.cell_size_mm)),
            dpi: Some(px * 25.4 / layout.cell_size_mm),
            ..Default::default()
        },
    );
    Ok(())
}

fn chars_per_line(width_mm: f32, font_pt: f32) -> usize {
    let glyph_mm = font_pt * PT_TO_MM * AVG_GLYPH_WIDTH;
    ((width_mm / glyph_mm).floor() as usize).max(1)
}

fn lines_per_band(height_mm: f32, font_pt: f32) -> usize {
    let line_mm = font_pt * PT_TO_MM * LINE_SPACING;
    ((height_mm / line_mm).floor() as usize).max(1)
}
