//! Statistics Calculator Module
//! Handles descriptive stats, subscription rates and Pearson correlations.

use crate::data::{TARGET_COLUMN, TENURE_COLUMN};
use crate::stats::{AnalysisReport, ColumnSummary, Correlation, CorrelationMatrix, GroupRate};
use polars::prelude::*;
use rayon::prelude::*;
use statrs::statistics::Statistics;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Target column 'y' has {rows} missing value(s)")]
    MissingTarget { rows: usize },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Columns summarized in the descriptive statistics table.
pub const DESCRIBE_COLUMNS: [&str; 6] = ["age", "income", "duration", "campaign", "euribor3m", "y"];

/// Columns of the correlation matrix. `y` comes first.
pub const CORRELATION_COLUMNS: [&str; 8] = [
    "y",
    "age",
    "income",
    "duration",
    "campaign",
    "euribor3m",
    "nr.employed",
    TENURE_COLUMN,
];

/// Number of occupations kept in the ranking.
pub const TOP_JOBS: usize = 5;

/// Handles statistical calculations with multi-threading support.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute the whole report over the cleaned table.
    pub fn analyze(df: &DataFrame) -> Result<AnalysisReport, StatsError> {
        info!("Starting descriptive analysis");
        let target = Self::target_values(df)?;

        let summaries = Self::describe(df, &DESCRIBE_COLUMNS)?;
        let subscription_rate_pct = Self::mean(&target) * 100.0;

        let rate_by_marital = Self::group_rates(df, "marital")?;
        let mut top_jobs = Self::group_rates(df, "job")?;
        top_jobs.truncate(TOP_JOBS);

        let correlation = Self::correlation_matrix(df, &CORRELATION_COLUMNS)?;
        let target_correlations = correlation.against(TARGET_COLUMN);
        debug!(pairs = target_correlations.len(), "Correlation ranking ready");

        Ok(AnalysisReport {
            rows: df.height(),
            columns: df.width(),
            summaries,
            subscription_rate_pct,
            rate_by_marital,
            top_jobs,
            correlation,
            target_correlations,
        })
    }

    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(column: &str, values: &[f64]) -> ColumnSummary {
        let n = values.len();
        if n == 0 {
            return ColumnSummary {
                column: column.to_string(),
                ..ColumnSummary::default()
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let mean = Self::mean(values);
        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            f64::NAN
        };

        ColumnSummary {
            column: column.to_string(),
            count: n,
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            q25: Self::percentile(&sorted, 25.0),
            median: Self::percentile(&sorted, 50.0),
            q75: Self::percentile(&sorted, 75.0),
            max: sorted[n - 1],
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Median of unsorted values, `None` when empty.
    pub fn median(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        Some(Self::percentile(&sorted, 50.0))
    }

    fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Column as optional floats. Text that is not a number fails the run.
    pub fn numeric_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, StatsError> {
        let series = df
            .column(column)?
            .as_materialized_series()
            .strict_cast(&DataType::Float64)?;
        Ok(series.f64()?.into_iter().collect())
    }

    /// Values of `y`. A null target is an analysis error.
    pub fn target_values(df: &DataFrame) -> Result<Vec<f64>, StatsError> {
        let values = Self::numeric_values(df, TARGET_COLUMN)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            return Err(StatsError::MissingTarget { rows: missing });
        }
        Ok(values.into_iter().flatten().collect())
    }

    /// Summaries for several columns in parallel, in the given order.
    pub fn describe(df: &DataFrame, columns: &[&str]) -> Result<Vec<ColumnSummary>, StatsError> {
        columns
            .par_iter()
            .map(|name| -> Result<ColumnSummary, StatsError> {
                let values: Vec<f64> = Self::numeric_values(df, name)?
                    .into_iter()
                    .flatten()
                    .collect();
                Ok(Self::compute_descriptive_stats(name, &values))
            })
            .collect()
    }

    /// Mean of `y` per group, highest first. Ties keep group name order.
    pub fn group_rates(df: &DataFrame, group_col: &str) -> Result<Vec<GroupRate>, StatsError> {
        let target = Self::target_values(df)?;
        let groups = df.column(group_col)?.cast(&DataType::String)?;

        let mut acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for (group, y) in groups.str()?.into_iter().zip(target) {
            if let Some(group) = group {
                let entry = acc.entry(group.to_string()).or_insert((0.0, 0));
                entry.0 += y;
                entry.1 += 1;
            }
        }

        let mut rates: Vec<GroupRate> = acc
            .into_iter()
            .map(|(group, (sum, count))| GroupRate {
                group,
                rate: sum / count as f64,
                count,
            })
            .collect();
        rates.sort_by(|a, b| descending_nan_last(a.rate, b.rate));
        Ok(rates)
    }

    /// Pearson coefficient over rows where both values are present.
    pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
        let (a, b): (Vec<f64>, Vec<f64>) = xs
            .iter()
            .zip(ys)
            .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
            .unzip();
        if a.len() < 2 {
            return f64::NAN;
        }

        let denom = a.iter().std_dev() * b.iter().std_dev();
        if denom == 0.0 || denom.is_nan() {
            return f64::NAN;
        }
        a.iter().covariance(b.iter()) / denom
    }

    /// Pairwise Pearson matrix, rows computed in parallel.
    pub fn correlation_matrix(
        df: &DataFrame,
        columns: &[&str],
    ) -> Result<CorrelationMatrix, StatsError> {
        let data: Vec<Vec<Option<f64>>> = columns
            .iter()
            .map(|name| Self::numeric_values(df, name))
            .collect::<Result<_, StatsError>>()?;

        let values: Vec<Vec<f64>> = (0..data.len())
            .into_par_iter()
            .map(|i| {
                (0..data.len())
                    .map(|j| {
                        if i == j && data[i].iter().flatten().count() >= 2 {
                            1.0
                        } else {
                            Self::pearson(&data[i], &data[j])
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(CorrelationMatrix {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            values,
        })
    }
}

/// Descending order with NaN placed last.
pub(crate) fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

impl CorrelationMatrix {
    /// Correlations of every other column against `target`, highest first.
    pub fn against(&self, target: &str) -> Vec<Correlation> {
        let Some(row) = self.columns.iter().position(|c| c == target) else {
            return Vec::new();
        };

        let mut ranking: Vec<Correlation> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != row)
            .map(|(i, column)| Correlation {
                column: column.clone(),
                coefficient: self.values[row][i],
            })
            .collect();
        ranking.sort_by(|a, b| descending_nan_last(a.coefficient, b.coefficient));
        ranking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cleaned_sample;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_descriptive_stats_match_pandas_describe() {
        let s = StatsCalculator::compute_descriptive_stats("x", &[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(s.count, 4);
        assert!(approx(s.mean, 2.5));
        assert!(approx(s.std, (5.0f64 / 3.0).sqrt()));
        assert_eq!(s.min, 1.0);
        assert!(approx(s.q25, 1.75));
        assert!(approx(s.median, 2.5));
        assert!(approx(s.q75, 3.25));
        assert_eq!(s.max, 4.0);
    }

    #[test]
    fn test_descriptive_stats_empty_and_single() {
        let empty = StatsCalculator::compute_descriptive_stats("x", &[]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());

        let single = StatsCalculator::compute_descriptive_stats("x", &[7.0]);
        assert_eq!(single.median, 7.0);
        assert!(single.std.is_nan());
    }

    #[test]
    fn test_median() {
        assert_eq!(StatsCalculator::median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(StatsCalculator::median(&[4.0, 1.0]), Some(2.5));
        assert_eq!(StatsCalculator::median(&[]), None);
    }

    #[test]
    fn test_pearson() {
        let xs = vec![Some(1.0), Some(2.0), Some(3.0), None];
        let ys = vec![Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        assert!(approx(StatsCalculator::pearson(&xs, &ys), 1.0));

        let neg = vec![Some(3.0), Some(2.0), Some(1.0), Some(0.0)];
        assert!(approx(StatsCalculator::pearson(&xs, &neg), -1.0));

        let flat = vec![Some(1.0), Some(1.0), Some(1.0), Some(1.0)];
        assert!(StatsCalculator::pearson(&xs, &flat).is_nan());
    }

    #[test]
    fn test_marital_rates_one_row_per_category_descending() {
        let df = cleaned_sample();
        let rates = StatsCalculator::group_rates(&df, "marital").unwrap();

        let groups: Vec<&str> = rates.iter().map(|r| r.group.as_str()).collect();
        // married: ids 1, 3 (imputed), 4 -> y = 1, 0, 1
        assert_eq!(groups, vec!["married", "divorced", "single"]);
        assert!(approx(rates[0].rate, 2.0 / 3.0));
        assert_eq!(rates[0].count, 3);
        assert!(rates.iter().all(|r| (0.0..=1.0).contains(&r.rate)));
        assert!(rates.windows(2).all(|w| w[0].rate >= w[1].rate));
    }

    #[test]
    fn test_missing_target_is_analysis_error() {
        let df = DataFrame::new(vec![
            Column::new("y".into(), vec![Some(1i64), None, Some(0)]),
            Column::new("marital".into(), vec!["a", "b", "c"]),
        ])
        .unwrap();

        let err = StatsCalculator::group_rates(&df, "marital").unwrap_err();
        assert!(matches!(err, StatsError::MissingTarget { rows: 1 }));
    }

    #[test]
    fn test_correlation_ranking_excludes_target() {
        let df = cleaned_sample();
        let matrix = StatsCalculator::correlation_matrix(&df, &CORRELATION_COLUMNS).unwrap();
        assert_eq!(matrix.values.len(), CORRELATION_COLUMNS.len());
        assert_eq!(matrix.values[0][0], 1.0);

        let ranking = matrix.against("y");
        assert_eq!(ranking.len(), CORRELATION_COLUMNS.len() - 1);
        assert!(ranking.iter().all(|c| c.column != "y"));
        let finite: Vec<f64> = ranking
            .iter()
            .map(|c| c.coefficient)
            .filter(|c| !c.is_nan())
            .collect();
        assert!(finite.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_analyze_report() {
        let df = cleaned_sample();
        let report = StatsCalculator::analyze(&df).unwrap();

        assert_eq!(report.rows, 5);
        assert!(approx(report.subscription_rate_pct, 40.0));
        let names: Vec<&str> = report.summaries.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(names, DESCRIBE_COLUMNS.to_vec());
        assert!(report.top_jobs.len() <= TOP_JOBS);
    }

    #[test]
    fn test_descending_nan_last() {
        let mut values = vec![0.2, f64::NAN, 0.9, -0.4];
        values.sort_by(|a, b| descending_nan_last(*a, *b));
        assert_eq!(values[..3], [0.9, 0.2, -0.4]);
        assert!(values[3].is_nan());
    }
}
