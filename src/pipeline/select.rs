//! Column selection: which columns go into each QR payload, and in what order.
//!
//! A selection is an ordered, duplicate-free list. Toggling a column on
//! appends it, so the payload order is the order the user picked columns in.

use serde::{Deserialize, Serialize};

/// How many leading columns are selected when a dataset is first loaded.
pub const DEFAULT_SELECTED: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    columns: Vec<String>,
}

impl ColumnSelection {
    /// The first three of `columns` (fewer if there are fewer).
    pub fn default_for(columns: &[String]) -> Self {
        Self {
            columns: columns.iter().take(DEFAULT_SELECTED).cloned().collect(),
        }
    }

    /// An explicit selection; duplicates after the first occurrence are dropped.
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sel = Self::default();
        for c in columns {
            let c = c.into();
            if !sel.contains(&c) {
                sel.columns.push(c);
            }
        }
        sel
    }

    /// Add `column` if absent, remove it if present.
    pub fn toggle(&mut self, column: &str) {
        if let Some(pos) = self.columns.iter().position(|c| c == column) {
            self.columns.remove(pos);
        } else {
            self.columns.push(column.to_string());
        }
    }

    /// Value-returning form of [`Self::toggle`].
    pub fn toggled(mut self, column: &str) -> Self {
        self.toggle(column);
        self
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Selected names that are not in `available`.
    pub fn unknown<'a>(&'a self, available: &[String]) -> Vec<&'a str> {
        self.columns
            .iter()
            .filter(|c| !available.contains(c))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_takes_first_three() {
        let sel = ColumnSelection::default_for(&cols(&["a", "b", "c", "d"]));
        assert_eq!(sel.columns(), &cols(&["a", "b", "c"])[..]);

        let sel = ColumnSelection::default_for(&cols(&["only"]));
        assert_eq!(sel.columns(), &cols(&["only"])[..]);
    }

    #[test]
    fn toggle_adds_then_removes() {
        let sel = ColumnSelection::default().toggled("x");
        assert!(sel.contains("x"));
        let sel = sel.toggled("x");
        assert!(sel.is_empty());
    }

    #[test]
    fn toggle_appends_in_pick_order() {
        let sel = ColumnSelection::default_for(&cols(&["a", "b", "c"]))
            .toggled("a")
            .toggled("a");
        assert_eq!(sel.columns(), &cols(&["b", "c", "a"])[..]);
    }

    #[test]
    fn from_columns_dedups() {
        let sel = ColumnSelection::from_columns(["a", "b", "a"]);
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn unknown_lists_missing_columns() {
        let sel = ColumnSelection::from_columns(["a", "zz"]);
        assert_eq!(sel.unknown(&cols(&["a", "b"])), vec!["zz"]);
    }
}
