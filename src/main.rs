//! Campaign EDA - Bank Marketing Campaign Exploratory Analysis
//!
//! Loads the campaign file and the customer workbook, cleans the joined
//! table, prints descriptive statistics and renders three static charts.

mod charts;
mod config;
mod data;
mod pipeline;
mod stats;

use anyhow::{Context, Result};
use clap::Parser;
use config::PipelineConfig;
use pipeline::Pipeline;
use std::path::PathBuf;
use tracing::info;

/// Exploratory analysis of a bank marketing campaign dataset.
#[derive(Parser, Debug)]
#[command(name = "campaign_eda", version, about)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Campaign CSV file
    #[arg(long)]
    campaigns: Option<PathBuf>,

    /// Customer workbook
    #[arg(long)]
    workbook: Option<PathBuf>,

    /// Workbook sheets to concatenate, in order
    #[arg(long, value_delimiter = ',')]
    sheets: Option<Vec<String>>,

    /// Directory for the rendered charts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also write the analysis report as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Open the rendered charts in the default viewer
    #[arg(long)]
    show: bool,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Defaults, then the config file, then command line flags.
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(path) = self.campaigns {
            config.campaigns_path = path;
        }
        if let Some(path) = self.workbook {
            config.workbook_path = path;
        }
        if let Some(sheets) = self.sheets {
            config.sheets = sheets;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if self.report_json.is_some() {
            config.report_json = self.report_json;
        }
        config.show_charts |= self.show;

        config.validate()?;
        Ok(config)
    }
}

/// Initialize the tracing subscriber. Logs go to stderr so stdout only
/// carries the reports.
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = args.into_config()?;
    info!(
        campaigns = %config.campaigns_path.display(),
        workbook = %config.workbook_path.display(),
        sheets = ?config.sheets,
        "Starting analysis"
    );

    let output = Pipeline::new(config)
        .run()
        .context("campaign analysis failed")?;

    info!(charts = output.charts.len(), "Analysis complete");
    for path in &output.charts {
        println!("Chart written: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "campaign_eda",
            "--campaigns",
            "data/bank.csv",
            "--sheets",
            "2013,2014",
            "--show",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.campaigns_path, PathBuf::from("data/bank.csv"));
        assert_eq!(config.sheets, vec!["2013", "2014"]);
        assert!(config.show_charts);
        assert_eq!(
            config.workbook_path,
            PipelineConfig::default().workbook_path
        );
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args =
            Args::try_parse_from(["campaign_eda", "--config", "no/such/config.json"]).unwrap();
        assert!(args.into_config().is_err());
    }
}
