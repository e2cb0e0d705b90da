//! Spreadsheet loader: the first worksheet of a workbook as ordered rows.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, DataType, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::core::cell::normalize;
use crate::core::types::{CellValue, Row};

/// Output format of date columns.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

const DATE_INPUTS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_INPUTS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Header names plus data rows, in sheet order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Date,
    Jump,
    Plain,
}

impl ColumnKind {
    fn of(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("fecha") {
            Self::Date
        } else if lower == "salto" {
            Self::Jump
        } else {
            Self::Plain
        }
    }
}

pub fn load_sheet(path: &Path) -> Result<Sheet> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("open workbook {}", path.display()))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook {} has no worksheets", path.display()))?;
    let range = workbook
        .worksheet_range(&first)
        .with_context(|| format!("read worksheet '{first}' of {}", path.display()))?;

    let sheet = sheet_from_rows(range.rows());
    debug!(
        sheet = %first,
        columns = sheet.columns.len(),
        rows = sheet.rows.len(),
        "loaded workbook"
    );
    Ok(sheet)
}

/// Build a [`Sheet`] from raw rows; the first row is the header.
pub fn sheet_from_rows<'a>(mut rows: impl Iterator<Item = &'a [Data]>) -> Sheet {
    let Some(header) = rows.next() else {
        return Sheet::default();
    };
    let columns = header_names(header);
    let kinds: Vec<ColumnKind> = columns.iter().map(|name| ColumnKind::of(name)).collect();

    let rows = rows
        .filter(|cells| {
            cells
                .iter()
                .take(columns.len())
                .any(|cell| !cell.is_empty())
        })
        .map(|cells| {
            let values = columns
                .iter()
                .zip(&kinds)
                .enumerate()
                .map(|(index, (name, kind))| {
                    let cell = cells.get(index).unwrap_or(&Data::Empty);
                    (name.clone(), convert(*kind, cell))
                })
                .collect();
            Row::new(values)
        })
        .collect();

    Sheet { columns, rows }
}

fn header_names(header: &[Data]) -> Vec<String> {
    let mut names: Vec<String> = header
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    while names.last().is_some_and(String::is_empty) {
        names.pop();
    }
    for (index, name) in names.iter_mut().enumerate() {
        if name.is_empty() {
            *name = format!("Unnamed: {index}");
        }
    }
    dedupe(names)
}

/// Suffix repeated names with `.1`, `.2`, ... so every column is addressable.
fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut counts: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            if taken.insert(name.clone()) {
                return name;
            }
            let count = counts.entry(name.clone()).or_insert(0);
            let unique = loop {
                *count += 1;
                let candidate = format!("{name}.{count}");
                if taken.insert(candidate.clone()) {
                    break candidate;
                }
            };
            debug!(column = %name, renamed = %unique, "duplicate header");
            unique
        })
        .collect()
}

fn convert(kind: ColumnKind, cell: &Data) -> CellValue {
    match kind {
        ColumnKind::Date => match date_text(cell) {
            Some(text) => CellValue::Text(text),
            None => CellValue::Empty,
        },
        ColumnKind::Jump => {
            let text = normalize(&plain(cell));
            if text == "nan" {
                CellValue::Text(String::new())
            } else {
                CellValue::Text(text)
            }
        }
        ColumnKind::Plain => plain(cell),
    }
}

fn plain(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        #[allow(clippy::cast_precision_loss)]
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Float(value) => CellValue::Number(*value),
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            CellValue::Text(text.clone())
        }
        Data::Bool(value) => CellValue::Text(if *value { "True" } else { "False" }.to_string()),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(moment) => CellValue::Text(moment.format(DATE_FORMAT).to_string()),
            None => CellValue::Empty,
        },
    }
}

fn date_text(cell: &Data) -> Option<String> {
    let date = match cell {
        Data::String(text) | Data::DateTimeIso(text) => parse_date(text)?,
        Data::DateTime(_) => cell.as_datetime()?.date(),
        _ => return None,
    };
    Some(date.format(DATE_FORMAT).to_string())
}

/// Parse day-first or ISO dates, with or without a time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_INPUTS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_INPUTS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|moment| moment.date())
        })
}
