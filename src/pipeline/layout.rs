//! Grid placement: entry index → (page, column, x, y).
//!
//! Entries fill a two-column grid left to right, top to bottom. A new row
//! starts after every second entry; a new page starts once the page holds
//! [`PageLayout::rows_per_page`] rows, the most whose image plus caption
//! stays above the bottom margin. Coordinates are millimetres from the
//! page's top-left corner.

use crate::config::{PageLayout, GRID_COLUMNS};

/// Where one entry lands on its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPlacement {
    /// Index into the exported entry list.
    pub index: usize,
    /// Grid column, `0` or `1`.
    pub column: usize,
    pub x_mm: f32,
    /// Top edge of the QR image.
    pub y_mm: f32,
}

/// Placements grouped by page, in export order.
#[derive(Debug, Clone, Default)]
pub struct LayoutPlan {
    pub pages: Vec<Vec<CellPlacement>>,
}

impl LayoutPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn placement_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Place `entry_count` entries on as many pages as needed.
///
/// Pages hold [`PageLayout::entries_per_page`] entries each. The layout is
/// assumed valid (see [`PageLayout::validate`]); a layout that cannot hold
/// one row still gets one entry row per page rather than looping forever.
pub fn plan_layout(entry_count: usize, layout: &PageLayout) -> LayoutPlan {
    let mut plan = LayoutPlan::default();
    if entry_count == 0 {
        return plan;
    }

    let top = layout.content_top_mm();
    let pitch = layout.row_pitch_mm();
    let rows_per_page = layout.rows_per_page().max(1);
    let per_page = rows_per_page * GRID_COLUMNS;

    let mut page: Vec<CellPlacement> = Vec::with_capacity(per_page);
    for index in 0..entry_count {
        if index > 0 && index % per_page == 0 {
            plan.pages.push(std::mem::take(&mut page));
        }
        let column = index % GRID_COLUMNS;
        let row = (index / GRID_COLUMNS) % rows_per_page;
        page.push(CellPlacement {
            index,
            column,
            x_mm: layout.column_x_mm(column),
            y_mm: top + row as f32 * pitch,
        });
    }
    plan.pages.push(page);
    plan
}
