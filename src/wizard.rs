//! The four-step session: upload → preview → configure → export.
//!
//! [`Wizard`] owns everything one session accumulates (the dataset, the
//! column selection, the generated entries) and only lets the step change
//! along an edge of the linear chain whose guard holds:
//!
//! | Edge                   | Guard                                   |
//! |------------------------|-----------------------------------------|
//! | Upload → Preview       | a dataset is loaded                     |
//! | Preview → Configure    | the dataset has at least one column     |
//! | Configure → Export     | non-empty selection and generated codes |
//! | any → previous step    | none                                    |
//!
//! [`Wizard::reset`] returns to `Upload` from anywhere and drops the session.

use crate::error::QrBatchError;
use crate::output::QrEntry;
use crate::pipeline::select::ColumnSelection;
use crate::record::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    Upload,
    Preview,
    Configure,
    Export,
}

impl WizardStep {
    pub fn next(self) -> Option<Self> {
        match self {
            WizardStep::Upload => Some(WizardStep::Preview),
            WizardStep::Preview => Some(WizardStep::Configure),
            WizardStep::Configure => Some(WizardStep::Export),
            WizardStep::Export => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            WizardStep::Upload => None,
            WizardStep::Preview => Some(WizardStep::Upload),
            WizardStep::Configure => Some(WizardStep::Preview),
            WizardStep::Export => Some(WizardStep::Configure),
        }
    }

    /// 1-based position, for "Step 2 of 4" style displays.
    pub fn number(self) -> usize {
        match self {
            WizardStep::Upload => 1,
            WizardStep::Preview => 2,
            WizardStep::Configure => 3,
            WizardStep::Export => 4,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WizardStep::Upload => "upload",
            WizardStep::Preview => "preview",
            WizardStep::Configure => "configure",
            WizardStep::Export => "export",
        })
    }
}

/// Session state machine.
#[derive(Debug, Clone)]
pub struct Wizard {
    step: WizardStep,
    dataset: Option<Dataset>,
    selection: ColumnSelection,
    entries: Vec<QrEntry>,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Upload,
            dataset: None,
            selection: ColumnSelection::default(),
            entries: Vec::new(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    pub fn entries(&self) -> &[QrEntry] {
        &self.entries
    }

    /// Accept a freshly ingested dataset and move to `Preview`.
    ///
    /// Only valid in `Upload`; the selection defaults to the first three
    /// columns.
    pub fn load(&mut self, dataset: Dataset) -> Result<(), QrBatchError> {
        if self.step != WizardStep::Upload {
            return Err(QrBatchError::PreconditionFailed {
                step: self.step,
                reason: "start a new file before loading another dataset".into(),
            });
        }
        self.selection = ColumnSelection::default_for(&dataset.columns);
        self.entries.clear();
        self.dataset = Some(dataset);
        self.transition(WizardStep::Preview)
    }

    /// Move one step forward if the guard holds.
    pub fn advance(&mut self) -> Result<WizardStep, QrBatchError> {
        let to = self.step.next().ok_or(QrBatchError::InvalidTransition {
            from: self.step,
            to: self.step,
        })?;
        self.transition(to)?;
        Ok(to)
    }

    /// Move one step back. Session data is kept.
    pub fn back(&mut self) -> Result<WizardStep, QrBatchError> {
        let to = self.step.previous().ok_or(QrBatchError::InvalidTransition {
            from: self.step,
            to: self.step,
        })?;
        self.transition(to)?;
        Ok(to)
    }

    /// Jump to `to`, which must be adjacent to the current step.
    pub fn go_to(&mut self, to: WizardStep) -> Result<(), QrBatchError> {
        self.transition(to)
    }

    /// Start over with a new file.
    pub fn reset(&mut self) {
        debug!("Wizard reset from {}", self.step);
        *self = Self::new();
    }

    /// Add or remove a column. Only valid in `Configure`; discards any
    /// entries generated from the previous selection.
    pub fn toggle_column(&mut self, column: &str) -> Result<(), QrBatchError> {
        self.require_configure()?;
        let known = self
            .dataset
            .as_ref()
            .is_some_and(|d| d.columns.iter().any(|c| c == column));
        if !known {
            return Err(QrBatchError::PreconditionFailed {
                step: self.step,
                reason: format!("unknown column '{column}'"),
            });
        }
        self.selection.toggle(column);
        self.entries.clear();
        Ok(())
    }

    /// Replace the whole selection. Only valid in `Configure`.
    pub fn set_selection(&mut self, selection: ColumnSelection) -> Result<(), QrBatchError> {
        self.require_configure()?;
        if let Some(dataset) = &self.dataset {
            let unknown = selection.unknown(&dataset.columns);
            if !unknown.is_empty() {
                return Err(QrBatchError::PreconditionFailed {
                    step: self.step,
                    reason: format!(
                        "unknown column(s) {}; available: {}",
                        unknown.join(", "),
                        dataset.columns.join(", ")
                    ),
                });
            }
        }
        self.selection = selection;
        self.entries.clear();
        Ok(())
    }

    /// Record the generated batch and move to `Export`.
    pub fn finish_generation(&mut self, entries: Vec<QrEntry>) -> Result<(), QrBatchError> {
        self.require_configure()?;
        let previous = std::mem::replace(&mut self.entries, entries);
        if let Err(e) = self.transition(WizardStep::Export) {
            self.entries = previous;
            return Err(e);
        }
        Ok(())
    }

    fn require_configure(&self) -> Result<(), QrBatchError> {
        if self.step != WizardStep::Configure {
            return Err(QrBatchError::PreconditionFailed {
                step: self.step,
                reason: "columns can only be changed while configuring".into(),
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: WizardStep) -> Result<(), QrBatchError> {
        let from = self.step;
        if self.step.previous() == Some(to) {
            debug!("Wizard {} → {}", from, to);
            self.step = to;
            return Ok(());
        }
        if self.step.next() != Some(to) {
            return Err(QrBatchError::InvalidTransition { from, to });
        }

        let unmet = match to {
            WizardStep::Preview if self.dataset.is_none() => Some("no dataset loaded"),
            WizardStep::Configure if !self.dataset.as_ref().is_some_and(|d| !d.columns.is_empty()) => {
                Some("the dataset has no columns")
            }
            WizardStep::Export if self.selection.is_empty() => Some("no columns selected"),
            WizardStep::Export if self.entries.is_empty() => Some("no QR codes generated yet"),
            _ => None,
        };
        if let Some(reason) = unmet {
            return Err(QrBatchError::PreconditionFailed {
                step: from,
                reason: reason.into(),
            });
        }

        debug!("Wizard {} → {}", from, to);
        self.step = to;
        Ok(())
    }
}
