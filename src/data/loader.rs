//! Source Loader Module
//! Reads the campaign CSV with Polars and concatenates workbook sheets into one table.

use crate::config::PipelineConfig;
use calamine::{open_workbook_auto, Data, Range, Reader};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to read workbook: {0}")]
    WorkbookError(#[from] calamine::Error),
    #[error("Sheet '{0}' not found in workbook")]
    SheetMissing(String),
    #[error("Duplicate column '{0}' in sheet header")]
    DuplicateHeader(String),
}

fn check_exists(path: &Path) -> Result<(), LoaderError> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Both raw tables, before any normalization.
#[derive(Debug, Clone)]
pub struct LoadedTables {
    pub campaigns: DataFrame,
    pub customers: DataFrame,
}

/// Handles loading of the campaign file and the customer workbook.
pub struct DataLoader<'a> {
    config: &'a PipelineConfig,
}

impl<'a> DataLoader<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Load both sources named by the configuration.
    pub fn load(&self) -> Result<LoadedTables, LoaderError> {
        let campaigns = Self::load_csv(
            &self.config.campaigns_path,
            self.config.separator_byte(),
        )?;
        info!(
            rows = campaigns.height(),
            columns = campaigns.width(),
            "Loaded campaign table"
        );

        let customers = Self::load_sheets(&self.config.workbook_path, &self.config.sheets)?;
        info!(
            rows = customers.height(),
            columns = customers.width(),
            sheets = self.config.sheets.len(),
            "Loaded customer table"
        );

        Ok(LoadedTables {
            campaigns,
            customers,
        })
    }

    /// Load a delimited file using Polars. The separator is taken as given.
    pub fn load_csv(path: &Path, separator: u8) -> Result<DataFrame, LoaderError> {
        check_exists(path)?;

        let df = LazyCsvReader::new(path)
            .with_separator(separator)
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .finish()?
            .collect()?;

        Ok(df)
    }

    /// Read the named sheets in order and stack them vertically.
    pub fn load_sheets(path: &Path, sheets: &[String]) -> Result<DataFrame, LoaderError> {
        check_exists(path)?;

        let mut workbook = open_workbook_auto(path)?;
        let available = workbook.sheet_names();

        let mut ranges = Vec::with_capacity(sheets.len());
        for sheet in sheets {
            if !available.iter().any(|name| name == sheet) {
                return Err(LoaderError::SheetMissing(sheet.clone()));
            }
            let range = workbook.worksheet_range(sheet)?;
            debug!(sheet = %sheet, rows = range.height(), "Read sheet");
            ranges.push(range);
        }

        Self::concat_sheets(&ranges)
    }

    /// Concatenate sheet ranges by header name, keeping every row.
    ///
    /// The first row of each range is its header. Columns missing from a
    /// sheet are null for that sheet's rows.
    pub fn concat_sheets(ranges: &[Range<Data>]) -> Result<DataFrame, LoaderError> {
        let mut columns: Vec<(String, Vec<Data>)> = Vec::new();
        let mut total_rows = 0usize;

        for range in ranges {
            let mut rows = range.rows();
            let Some(header) = rows.next() else {
                continue;
            };

            let mut positions = Vec::with_capacity(header.len());
            let mut seen: Vec<String> = Vec::with_capacity(header.len());
            for (i, cell) in header.iter().enumerate() {
                let name = render_cell(cell).unwrap_or_else(|| format!("unnamed_{}", i));
                if seen.contains(&name) {
                    return Err(LoaderError::DuplicateHeader(name));
                }
                seen.push(name.clone());

                let idx = match columns.iter().position(|(n, _)| *n == name) {
                    Some(idx) => idx,
                    None => {
                        columns.push((name, vec![Data::Empty; total_rows]));
                        columns.len() - 1
                    }
                };
                positions.push(idx);
            }

            let mut sheet_rows = 0usize;
            for row in rows {
                for (cell, &idx) in row.iter().zip(positions.iter()) {
                    columns[idx].1.push(cell.clone());
                }
                sheet_rows += 1;
                // Short rows and columns from earlier sheets are padded.
                for (_, cells) in columns.iter_mut() {
                    cells.resize(total_rows + sheet_rows, Data::Empty);
                }
            }
            total_rows += sheet_rows;
        }

        let columns: Vec<Column> = columns
            .iter()
            .map(|(name, cells)| build_column(name, cells))
            .collect();

        Ok(DataFrame::new(columns)?)
    }
}

fn is_null_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

fn integral(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        Some(value as i64)
    } else {
        None
    }
}

/// Text form of a cell, used for headers and text columns.
fn render_cell(cell: &Data) -> Option<String> {
    if is_null_cell(cell) {
        return None;
    }
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time() == chrono::NaiveTime::MIN => {
                Some(ts.format("%Y-%m-%d").to_string())
            }
            Some(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Some(cell.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Build a typed column from raw cells: Int64, then Float64, else String.
fn build_column(name: &str, cells: &[Data]) -> Column {
    let values = cells.iter().filter(|c| !is_null_cell(c));

    let all_integral = values.clone().all(|c| match c {
        Data::Int(_) => true,
        Data::Float(f) => integral(*f).is_some(),
        _ => false,
    });
    if all_integral {
        let ints: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Data::Int(i) => Some(*i),
                Data::Float(f) => integral(*f),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), ints);
    }

    let all_numeric = values.clone().all(|c| matches!(c, Data::Int(_) | Data::Float(_)));
    if all_numeric {
        let floats: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                Data::Int(i) => Some(*i as f64),
                Data::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), floats);
    }

    let text: Vec<Option<String>> = cells.iter().map(render_cell).collect();
    Column::new(name.into(), text)
}
