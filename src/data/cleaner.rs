//! Cleaning Module
//! Decimal normalization, recoding, imputation and derived features.
//!
//! Every step takes the table by reference and returns a new one, so each
//! stage boundary can be checked on its own.

use super::is_numeric_dtype;
use crate::stats::StatsCalculator;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Cannot parse '{value}' in column '{column}'")]
    ParseFailure { column: String, value: String },
    #[error("Column '{0}' has no values to impute from")]
    EmptyColumn(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

impl CleanError {
    fn parse(column: &str, value: impl Into<String>) -> Self {
        CleanError::ParseFailure {
            column: column.to_string(),
            value: value.into(),
        }
    }
}

/// Columns stored with a decimal comma in the sources.
pub const DECIMAL_COMMA_COLUMNS: [&str; 6] = [
    "emp.var.rate",
    "cons.price.idx",
    "cons.conf.idx",
    "euribor3m",
    "income",
    "nr.employed",
];

pub const TARGET_COLUMN: &str = "y";
pub const BINARY_COLUMNS: [&str; 3] = ["default", "housing", "loan"];
pub const MEDIAN_COLUMNS: [&str; 2] = ["age", "income"];
pub const MODE_COLUMNS: [&str; 3] = ["job", "marital", "education"];
pub const DATE_COLUMN: &str = "dt_customer";
pub const PDAYS_COLUMN: &str = "pdays";

pub const TENURE_COLUMN: &str = "Antiguedad_Dias";
pub const CONTACTED_COLUMN: &str = "contactado_previamente";
pub const PDAYS_CLEAN_COLUMN: &str = "pdays_limpio";

/// `pdays` value meaning the customer was never contacted before.
pub const NEVER_CONTACTED: i64 = 999;

/// Columns re-coerced to Float64 right before correlation.
const RENORMALIZED_COLUMNS: [&str; 2] = ["income", "nr.employed"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Output of the cleaning stage.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub df: DataFrame,
    /// Non-zero null counts observed right before imputation.
    pub nulls_before_imputation: Vec<(String, usize)>,
}

pub struct Cleaner;

impl Cleaner {
    /// Run every cleaning step in order.
    pub fn clean(df: &DataFrame) -> Result<CleanedTable, CleanError> {
        info!("Starting data cleaning and transformation");
        Self::require_columns(df)?;

        let df = Self::normalize_decimals(df)?;
        let df = Self::recode_target(&df)?;
        let df = Self::recode_binaries(&df)?;

        let nulls_before_imputation = null_counts(&df);
        debug!(?nulls_before_imputation, "Null counts before imputation");

        let df = Self::impute_medians(&df)?;
        let df = Self::impute_modes(&df)?;
        let df = Self::fill_binaries(&df)?;
        let df = Self::parse_dates(&df)?;
        let df = Self::add_tenure(&df)?;
        let df = Self::add_contact_features(&df)?;
        let df = Self::renormalize_numeric(&df)?;

        info!(
            rows = df.height(),
            columns = df.width(),
            "Cleaning and transformation finished"
        );
        Ok(CleanedTable {
            df,
            nulls_before_imputation,
        })
    }

    /// Fail with the list of absent columns the cleaner needs.
    pub fn require_columns(df: &DataFrame) -> Result<(), CleanError> {
        let required = DECIMAL_COMMA_COLUMNS
            .into_iter()
            .chain(BINARY_COLUMNS)
            .chain(MEDIAN_COLUMNS)
            .chain(MODE_COLUMNS)
            .chain([TARGET_COLUMN, DATE_COLUMN, PDAYS_COLUMN]);

        let mut missing: Vec<String> = Vec::new();
        for name in required {
            if df.column(name).is_err() && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CleanError::MissingColumns(missing))
        }
    }

    /// Strip quotes, turn decimal commas into points and parse as Float64.
    pub fn normalize_decimals(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let columns: Vec<Column> = DECIMAL_COMMA_COLUMNS
            .par_iter()
            .map(|name| normalize_decimal_column(df.column(name)?))
            .collect::<Result<Vec<_>, CleanError>>()?;

        let mut result = df.clone();
        for column in columns {
            result.with_column(column)?;
        }
        debug!("Normalized decimal-comma columns");
        Ok(result)
    }

    /// Map `y` to 1/0. Any other value becomes null.
    pub fn recode_target(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let coded: Vec<Option<i64>> = text_values(df.column(TARGET_COLUMN)?)?
            .iter()
            .map(|v| match v.as_deref() {
                Some("yes") => Some(1),
                Some("no") => Some(0),
                _ => None,
            })
            .collect();

        let mut result = df.clone();
        result.with_column(Column::new(TARGET_COLUMN.into(), coded))?;
        Ok(result)
    }

    /// Map binary flags to 1/0, leaving `unknown` and anything else null.
    pub fn recode_binaries(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let mut result = df.clone();
        for name in BINARY_COLUMNS {
            let coded: Vec<Option<f64>> = text_values(df.column(name)?)?
                .iter()
                .map(|v| v.as_deref().and_then(binary_code))
                .collect();
            result.with_column(Column::new(name.into(), coded))?;
        }
        Ok(result)
    }

    /// Fill `age` and `income` nulls with the column median.
    pub fn impute_medians(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let mut result = df.clone();
        for name in MEDIAN_COLUMNS {
            let values = float_values(df.column(name)?)?;
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            let median = StatsCalculator::median(&present)
                .ok_or_else(|| CleanError::EmptyColumn(name.to_string()))?;
            debug!(column = name, median, "Median imputation");

            let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(median)).collect();
            result.with_column(Column::new(name.into(), filled))?;
        }
        Ok(result)
    }

    /// Fill categorical nulls with the most frequent value.
    pub fn impute_modes(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let mut result = df.clone();
        for name in MODE_COLUMNS {
            let values = text_values(df.column(name)?)?;
            let mode = most_frequent(&values)
                .ok_or_else(|| CleanError::EmptyColumn(name.to_string()))?;
            debug!(column = name, mode = %mode, "Mode imputation");

            let filled: Vec<String> = values
                .into_iter()
                .map(|v| v.unwrap_or_else(|| mode.clone()))
                .collect();
            result.with_column(Column::new(name.into(), filled))?;
        }
        Ok(result)
    }

    /// Fill remaining binary nulls with 0 and store as Int64.
    pub fn fill_binaries(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let mut result = df.clone();
        for name in BINARY_COLUMNS {
            let filled: Vec<i64> = float_values(df.column(name)?)?
                .iter()
                .map(|v| v.map(|x| x as i64).unwrap_or(0))
                .collect();
            result.with_column(Column::new(name.into(), filled))?;
        }
        Ok(result)
    }

    /// Parse `dt_customer` into millisecond timestamps. Null and empty
    /// values stay null; text in an unknown format fails the run.
    pub fn parse_dates(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let millis: Vec<Option<i64>> = text_values(df.column(DATE_COLUMN)?)?
            .iter()
            .map(|v| match v.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(raw) => parse_timestamp(raw)
                    .map(|ts| Some(ts.and_utc().timestamp_millis()))
                    .ok_or_else(|| CleanError::parse(DATE_COLUMN, raw)),
            })
            .collect::<Result<_, CleanError>>()?;

        let dates = Column::new(DATE_COLUMN.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        let mut result = df.clone();
        result.with_column(dates)?;
        Ok(result)
    }

    /// Whole days between each enrollment and the latest one, rounded down.
    /// Rows without an enrollment date get a null tenure.
    pub fn add_tenure(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let millis: Vec<Option<i64>> = df
            .column(DATE_COLUMN)?
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .collect();
        let latest = millis.iter().flatten().max().copied();

        let tenure: Vec<Option<i64>> = millis
            .iter()
            .map(|t| match (latest, t) {
                (Some(latest), Some(t)) => Some((latest - t).div_euclid(MILLIS_PER_DAY)),
                _ => None,
            })
            .collect();

        let mut result = df.clone();
        result.with_column(Column::new(TENURE_COLUMN.into(), tenure))?;
        Ok(result)
    }

    /// Prior-contact flag and `pdays` with the 999 sentinel nulled.
    pub fn add_contact_features(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let pdays: Vec<Option<i64>> = df
            .column(PDAYS_COLUMN)?
            .as_materialized_series()
            .strict_cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .collect();

        let contacted: Vec<i64> = pdays
            .iter()
            .map(|p| if *p == Some(NEVER_CONTACTED) { 0 } else { 1 })
            .collect();
        let cleaned: Vec<Option<i64>> = pdays
            .iter()
            .map(|p| p.filter(|&v| v != NEVER_CONTACTED))
            .collect();

        let mut result = df.clone();
        result.with_column(Column::new(CONTACTED_COLUMN.into(), contacted))?;
        result.with_column(Column::new(PDAYS_CLEAN_COLUMN.into(), cleaned))?;
        Ok(result)
    }

    /// Guarantee `income` and `nr.employed` are Float64 for correlation.
    pub fn renormalize_numeric(df: &DataFrame) -> Result<DataFrame, CleanError> {
        let mut result = df.clone();
        for name in RENORMALIZED_COLUMNS {
            let column = normalize_decimal_column(df.column(name)?)?;
            result.with_column(column)?;
        }
        Ok(result)
    }
}

/// Per-column null counts, only for columns that have nulls.
pub fn null_counts(df: &DataFrame) -> Vec<(String, usize)> {
    df.get_columns()
        .iter()
        .filter(|c| c.null_count() > 0)
        .map(|c| (c.name().to_string(), c.null_count()))
        .collect()
}

/// Column values as optional strings, whatever the source dtype.
fn text_values(column: &Column) -> Result<Vec<Option<String>>, CleanError> {
    let text = column.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Column values as optional floats. Non-numeric text fails the run.
fn float_values(column: &Column) -> Result<Vec<Option<f64>>, CleanError> {
    let floats = column
        .as_materialized_series()
        .strict_cast(&DataType::Float64)?;
    Ok(floats.f64()?.into_iter().collect())
}

fn normalize_decimal_column(column: &Column) -> Result<Column, CleanError> {
    let name = column.name().to_string();
    if is_numeric_dtype(column.dtype()) {
        return Ok(column.cast(&DataType::Float64)?);
    }

    let parsed: Vec<Option<f64>> = text_values(column)?
        .iter()
        .map(|v| match v {
            None => Ok(None),
            Some(raw) => parse_decimal(raw).map_err(|_| CleanError::parse(&name, raw.as_str())),
        })
        .collect::<Result<_, CleanError>>()?;

    Ok(Column::new(name.into(), parsed))
}

/// Parse a decimal-comma or decimal-point number. Empty and NaN are null.
pub fn parse_decimal(raw: &str) -> Result<Option<f64>, std::num::ParseFloatError> {
    let cleaned = raw.replace('"', "").replace(',', ".");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(None);
    }
    let value: f64 = cleaned.parse()?;
    Ok(value.is_finite().then_some(value))
}

fn binary_code(raw: &str) -> Option<f64> {
    match raw.trim().to_lowercase().as_str() {
        "yes" => Some(1.0),
        "no" => Some(0.0),
        "unknown" | "" | "nan" => None,
        other => other
            .parse::<f64>()
            .ok()
            .filter(|v| *v == 0.0 || *v == 1.0),
    }
}

/// Most frequent value; ties go to the smallest value.
fn most_frequent(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Timestamp of a date or date-time string. Dates fall at midnight.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}
