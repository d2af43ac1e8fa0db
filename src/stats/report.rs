//! Analysis report types and their console rendering.

use serde::Serialize;
use std::fmt;

/// Summary of one numeric column, in the layout of a `describe()` row.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl Default for ColumnSummary {
    fn default() -> Self {
        Self {
            column: String::new(),
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            q25: f64::NAN,
            median: f64::NAN,
            q75: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Subscription rate (mean of `y`) within one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRate {
    pub group: String,
    pub rate: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub column: String,
    pub coefficient: f64,
}

/// Square Pearson matrix; `values[i][j]` pairs `columns[i]` with `columns[j]`.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

/// Everything the analysis stage reports.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub rows: usize,
    pub columns: usize,
    pub summaries: Vec<ColumnSummary>,
    pub subscription_rate_pct: f64,
    pub rate_by_marital: Vec<GroupRate>,
    pub top_jobs: Vec<GroupRate>,
    pub correlation: CorrelationMatrix,
    pub target_correlations: Vec<Correlation>,
}

fn write_rates(f: &mut fmt::Formatter<'_>, rates: &[GroupRate]) -> fmt::Result {
    let width = rates.iter().map(|r| r.group.len()).max().unwrap_or(0);
    for r in rates {
        writeln!(f, "  {:<width$}  {:.6}  (n={})", r.group, r.rate, r.count)?;
    }
    Ok(())
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statistical summary (key numeric columns):")?;
        writeln!(
            f,
            "{:<10} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for s in &self.summaries {
            writeln!(
                f,
                "{:<10} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                s.column, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
            )?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Global subscription rate (y=1): {:.2}%",
            self.subscription_rate_pct
        )?;

        writeln!(f)?;
        writeln!(f, "Subscription rate by marital status:")?;
        write_rates(f, &self.rate_by_marital)?;

        writeln!(f)?;
        writeln!(f, "Subscription rate by occupation (top {}):", self.top_jobs.len())?;
        write_rates(f, &self.top_jobs)?;

        writeln!(f)?;
        writeln!(f, "Pearson correlation with subscription ('y'):")?;
        let width = self
            .target_correlations
            .iter()
            .map(|c| c.column.len())
            .max()
            .unwrap_or(0);
        for c in &self.target_correlations {
            writeln!(f, "  {:<width$}  {:>9.6}", c.column, c.coefficient)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> AnalysisReport {
        AnalysisReport {
            rows: 3,
            columns: 2,
            summaries: vec![ColumnSummary {
                column: "age".into(),
                count: 3,
                mean: 40.0,
                std: 1.0,
                min: 39.0,
                q25: 39.5,
                median: 40.0,
                q75: 40.5,
                max: 41.0,
            }],
            subscription_rate_pct: 33.3333,
            rate_by_marital: vec![GroupRate {
                group: "single".into(),
                rate: 0.5,
                count: 2,
            }],
            top_jobs: vec![],
            correlation: CorrelationMatrix {
                columns: vec!["y".into(), "age".into()],
                values: vec![vec![1.0, f64::NAN], vec![f64::NAN, 1.0]],
            },
            target_correlations: vec![Correlation {
                column: "age".into(),
                coefficient: f64::NAN,
            }],
        }
    }

    #[test]
    fn test_display_sections() {
        let text = report().to_string();
        assert!(text.contains("Global subscription rate (y=1): 33.33%"));
        assert!(text.contains("single"));
        assert!(text.contains("Pearson correlation"));
    }

    #[test]
    fn test_json_serializes_nan_as_null() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["rows"], 3);
        assert!(json["target_correlations"][0]["coefficient"].is_null());
    }
}
