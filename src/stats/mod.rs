//! Stats module - Descriptive statistics and correlations

mod calculator;
mod report;

pub use calculator::{StatsCalculator, StatsError};
pub use report::{AnalysisReport, ColumnSummary, Correlation, CorrelationMatrix, GroupRate};
