//! Shared deterministic types for the automation core.
//!
//! These types define stable contracts between the row processor, the run
//! driver and the host seams. They carry no I/O and compare by value so tests
//! can assert on exact action sequences.

use std::fmt;

/// A screen coordinate in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single spreadsheet cell as produced by the loader.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// One spreadsheet row: cells keyed by column name, in column order.
///
/// The loader produces rows once; processing never mutates them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new(cells: Vec<(String, CellValue)>) -> Self {
        Self { cells }
    }

    /// Cells in their original column order.
    pub fn cells(&self) -> &[(String, CellValue)] {
        &self.cells
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// The fixed set of reference images the automation recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenReference {
    /// The main data-entry input ("Operación").
    PrimaryField,
    /// The "Validar" button.
    Validate,
    /// The "Sí" button of the confirmation prompt.
    Confirm,
    /// A benign notice that can be dismissed.
    InfoDialog,
    /// The "Aceptar" button of the benign notice.
    InfoAcknowledge,
    /// A fatal application error.
    CriticalDialog,
}

impl ScreenReference {
    pub const ALL: [ScreenReference; 6] = [
        ScreenReference::PrimaryField,
        ScreenReference::Validate,
        ScreenReference::Confirm,
        ScreenReference::InfoDialog,
        ScreenReference::InfoAcknowledge,
        ScreenReference::CriticalDialog,
    ];

    /// Operator-facing label, matching what is printed on screen where applicable.
    pub fn label(self) -> &'static str {
        match self {
            ScreenReference::PrimaryField => "Operación",
            ScreenReference::Validate => "Validar",
            ScreenReference::Confirm => "Sí",
            ScreenReference::InfoDialog => "aviso",
            ScreenReference::InfoAcknowledge => "Aceptar",
            ScreenReference::CriticalDialog => "error crítico",
        }
    }
}

/// Result of one dialog-monitor check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogStatus {
    /// No known dialog on screen.
    None,
    /// An informational dialog was found and acknowledged.
    Dismissed,
    /// A critical dialog is on screen; the run must halt.
    Critical,
}

/// Why a row (and therefore the run) stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A reference expected on screen was not found at the time of the call.
    NotFound(ScreenReference),
    /// A critical dialog was observed.
    CriticalDialog,
    /// The primary field did not reappear after confirmation within the deadline.
    ResyncTimeout { deadline_secs: u64 },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NotFound(ScreenReference::PrimaryField) => write!(
                f,
                "field '{}' not found",
                ScreenReference::PrimaryField.label()
            ),
            AbortReason::NotFound(reference) => write!(f, "'{}' not found", reference.label()),
            AbortReason::CriticalDialog => write!(f, "critical dialog detected"),
            AbortReason::ResyncTimeout { deadline_secs } => write!(
                f,
                "field '{}' did not reappear within {deadline_secs}s after confirming; \
                 the row may have been partially committed",
                ScreenReference::PrimaryField.label()
            ),
        }
    }
}

/// Outcome of advancing the row state machine by one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The row has more work to do.
    Continue,
    /// The row finished normally.
    RowDone,
    /// The row failed; the run must stop.
    Abort(AbortReason),
}
