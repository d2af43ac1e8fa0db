//! Analysis Pipeline
//! Runs load, join, clean, analyze and render strictly in that order.

use crate::charts::{ChartData, ChartError, StaticChartRenderer};
use crate::config::PipelineConfig;
use crate::data::{
    null_counts, CleanError, CleanedTable, Cleaner, DataLoader, JoinError, Joiner, LoadedTables,
    LoaderError,
};
use crate::stats::{AnalysisReport, StatsCalculator, StatsError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Failure of any stage. Every error ends the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoaderError),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    Analysis(#[from] StatsError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error("Cannot write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot open {path} in the default viewer: {source}")]
    Viewer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type Result<T> = std::result::Result<T, PipelineError>;

const RULE_WIDTH: usize = 50;

/// What a finished run produced.
#[derive(Debug)]
pub struct PipelineOutput {
    pub report: AnalysisReport,
    pub charts: Vec<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<PipelineOutput> {
        let tables = DataLoader::new(&self.config).load()?;
        let (cleaned, report) = Self::process(&tables)?;

        if let Some(path) = &self.config.report_json {
            Self::write_report(&report, path)?;
        }

        let chart_data = ChartData::from_table(&cleaned.df)?;
        let charts = StaticChartRenderer::render_all(&chart_data, &self.config.output_dir)?;
        if self.config.show_charts {
            for path in &charts {
                open::that(path).map_err(|source| PipelineError::Viewer {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        Ok(PipelineOutput { report, charts })
    }

    /// Join, clean and analyze already loaded tables, printing each report.
    pub fn process(tables: &LoadedTables) -> Result<(CleanedTable, AnalysisReport)> {
        let joined = Joiner::join(&tables.campaigns, &tables.customers)?;
        let (rows, columns) = joined.shape();
        println!("Combined table shape (rows, columns): ({}, {})", rows, columns);
        println!("{}", "-".repeat(RULE_WIDTH));

        let cleaned = Cleaner::clean(&joined)?;
        println!("Null counts before imputation:");
        if cleaned.nulls_before_imputation.is_empty() {
            println!("  (none)");
        }
        for (column, count) in &cleaned.nulls_before_imputation {
            println!("  {:<20} {}", column, count);
        }
        let remaining: usize = null_counts(&cleaned.df).iter().map(|(_, n)| n).sum();
        info!(remaining_nulls = remaining, "Cleaned table ready");
        println!("{}", "-".repeat(RULE_WIDTH));

        let report = StatsCalculator::analyze(&cleaned.df)?;
        println!("{}", report);
        println!("{}", "-".repeat(RULE_WIDTH));

        Ok((cleaned, report))
    }

    fn write_report(report: &AnalysisReport, path: &Path) -> Result<()> {
        let report_error = |source: std::io::Error| PipelineError::Report {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(report).map_err(|e| report_error(e.into()))?;
        std::fs::write(path, json).map_err(report_error)?;
        info!(path = %path.display(), "Wrote JSON report");
        Ok(())
    }
}
