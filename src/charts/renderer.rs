//! Static Chart Renderer
//! Writes the three analysis charts as PNG files with plotters.
//!
//! Charts:
//! 1. Subscription rate by occupation (bar chart, rotated labels)
//! 2. Subscription rate vs. campaign contacts (line) over group sizes
//!    (bars, secondary axis), x clipped to [0, 15]
//! 3. Income distribution by subscription (box plot), y clipped to the
//!    95th income percentile

use crate::charts::series::{CampaignPoint, ChartData, IncomeSplit, CAMPAIGN_AXIS_MAX};
use crate::stats::GroupRate;
use plotters::prelude::*;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to draw {path}: {message}")]
    Draw { path: PathBuf, message: String },
}

pub const JOB_CHART_FILE: &str = "subscription_by_job.png";
pub const CAMPAIGN_CHART_FILE: &str = "campaign_contacts.png";
pub const INCOME_CHART_FILE: &str = "income_by_subscription.png";

const CHART_SIZE: (u32, u32) = (1200, 700);
const BOX_CHART_SIZE: (u32, u32) = (1000, 600);

// Colors
const LINE_BLUE: RGBColor = RGBColor(31, 119, 180);
const BAR_RED: RGBColor = RGBColor(214, 39, 40);
const SALMON: RGBColor = RGBColor(250, 128, 114);
const LIGHT_GREEN: RGBColor = RGBColor(144, 238, 144);

const PALETTE: [RGBColor; 10] = [
    RGBColor(68, 1, 84),
    RGBColor(72, 40, 120),
    RGBColor(62, 74, 137),
    RGBColor(49, 104, 142),
    RGBColor(38, 130, 142),
    RGBColor(31, 158, 137),
    RGBColor(53, 183, 121),
    RGBColor(109, 205, 89),
    RGBColor(180, 222, 44),
    RGBColor(253, 231, 37),
];

type DrawResult = Result<(), Box<dyn StdError>>;

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render every chart into `output_dir`, returning the written paths.
    pub fn render_all(data: &ChartData, output_dir: &Path) -> Result<Vec<PathBuf>, ChartError> {
        std::fs::create_dir_all(output_dir).map_err(|source| ChartError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let job_path = output_dir.join(JOB_CHART_FILE);
        Self::render_job_rates(&data.job_rates, &job_path)?;

        let campaign_path = output_dir.join(CAMPAIGN_CHART_FILE);
        Self::render_campaign_effect(&data.campaign, &campaign_path)?;

        let income_path = output_dir.join(INCOME_CHART_FILE);
        Self::render_income_boxplot(&data.income, &income_path)?;

        let paths = vec![job_path, campaign_path, income_path];
        info!(count = paths.len(), dir = %output_dir.display(), "Charts rendered");
        Ok(paths)
    }

    pub fn render_job_rates(rates: &[GroupRate], path: &Path) -> Result<(), ChartError> {
        Self::draw_job_rates(rates, path).map_err(|e| chart_error(path, e))
    }

    pub fn render_campaign_effect(points: &[CampaignPoint], path: &Path) -> Result<(), ChartError> {
        Self::draw_campaign_effect(points, path).map_err(|e| chart_error(path, e))
    }

    pub fn render_income_boxplot(split: &IncomeSplit, path: &Path) -> Result<(), ChartError> {
        Self::draw_income_boxplot(split, path).map_err(|e| chart_error(path, e))
    }

    fn draw_job_rates(rates: &[GroupRate], path: &Path) -> DrawResult {
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let labels: Vec<String> = rates.iter().map(|r| r.group.clone()).collect();
        let y_max = rates.iter().map(|r| r.rate).fold(0.0, f64::max).max(0.01) * 1.1;

        let mut chart = ChartBuilder::on(&root)
            .caption("Subscription rate by occupation", ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(130)
            .y_label_area_size(70)
            .build_cartesian_2d((0..labels.len().max(1)).into_segmented(), 0.0..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("Occupation")
            .y_desc("Subscription rate (mean of y)")
            .x_labels(labels.len().max(1))
            .x_label_formatter(&|v: &SegmentValue<usize>| match v {
                SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .x_label_style(
                ("sans-serif", 14)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .draw()?;

        chart.draw_series(rates.iter().enumerate().map(|(i, r)| {
            let color = PALETTE[i * PALETTE.len() / rates.len().max(1) % PALETTE.len()];
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), r.rate)],
                color.filled(),
            );
            bar.set_margin(0, 0, 6, 6);
            bar
        }))?;

        root.present()?;
        Ok(())
    }

    fn draw_campaign_effect(points: &[CampaignPoint], path: &Path) -> DrawResult {
        let visible: Vec<&CampaignPoint> = points
            .iter()
            .filter(|p| (0.0..=CAMPAIGN_AXIS_MAX).contains(&(p.contacts as f64)))
            .collect();
        let rate_max = visible.iter().map(|p| p.rate).fold(0.0, f64::max).max(0.01) * 1.15;
        let count_max = visible
            .iter()
            .map(|p| p.count as f64)
            .fold(0.0, f64::max)
            .max(1.0)
            * 1.15;

        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                "Subscription rate vs. campaign contact frequency",
                ("sans-serif", 24),
            )
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .right_y_label_area_size(80)
            .build_cartesian_2d(0.0..CAMPAIGN_AXIS_MAX, 0.0..rate_max)?
            .set_secondary_coord(0.0..CAMPAIGN_AXIS_MAX, 0.0..count_max);

        chart
            .configure_mesh()
            .x_desc("Number of contacts in the campaign")
            .y_desc("Subscription rate")
            .y_label_style(("sans-serif", 14).into_font().color(&LINE_BLUE))
            .draw()?;
        chart
            .configure_secondary_axes()
            .y_desc("Contacted customers")
            .label_style(("sans-serif", 14).into_font().color(&BAR_RED))
            .draw()?;

        chart.draw_secondary_series(visible.iter().map(|p| {
            let x = p.contacts as f64;
            Rectangle::new(
                [(x - 0.4, 0.0), (x + 0.4, p.count as f64)],
                BAR_RED.mix(0.3).filled(),
            )
        }))?;

        chart.draw_series(LineSeries::new(
            visible.iter().map(|p| (p.contacts as f64, p.rate)),
            LINE_BLUE.stroke_width(2),
        ))?;
        chart.draw_series(
            visible
                .iter()
                .map(|p| Circle::new((p.contacts as f64, p.rate), 5, LINE_BLUE.filled())),
        )?;

        root.present()?;
        Ok(())
    }

    fn draw_income_boxplot(split: &IncomeSplit, path: &Path) -> DrawResult {
        let ceiling = if split.ceiling.is_finite() && split.ceiling > 0.0 {
            split.ceiling
        } else {
            1.0
        };

        let root = BitMapBackend::new(path, BOX_CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Income distribution by subscription", ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d((0..2usize).into_segmented(), 0.0f32..ceiling as f32)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("Subscription (0: No, 1: Yes)")
            .y_desc("Annual income")
            .x_labels(2)
            .x_label_formatter(&|v: &SegmentValue<usize>| match v {
                SegmentValue::CenterOf(i) => i.to_string(),
                _ => String::new(),
            })
            .draw()?;

        let groups = [(&split.not_subscribed, SALMON), (&split.subscribed, LIGHT_GREEN)];
        for (i, (values, color)) in groups.into_iter().enumerate() {
            if values.is_empty() {
                continue;
            }
            // Values above the ceiling are drawn at the ceiling.
            let capped: Vec<f64> = values.iter().map(|v| v.min(ceiling)).collect();
            let quartiles = Quartiles::new(capped.as_slice());
            chart.draw_series(std::iter::once(
                Boxplot::new_vertical(SegmentValue::CenterOf(i), &quartiles)
                    .width(120)
                    .whisker_width(0.5)
                    .style(color.stroke_width(2)),
            ))?;
        }

        root.present()?;
        Ok(())
    }
}

fn chart_error(path: &Path, err: Box<dyn StdError>) -> ChartError {
    ChartError::Draw {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_chart_data() -> ChartData {
        ChartData {
            job_rates: vec![
                GroupRate {
                    group: "admin.".to_string(),
                    rate: 0.3,
                    count: 10,
                },
                GroupRate {
                    group: "technician".to_string(),
                    rate: 0.1,
                    count: 8,
                },
            ],
            campaign: vec![
                CampaignPoint {
                    contacts: 1,
                    rate: 0.2,
                    count: 150,
                },
                CampaignPoint {
                    contacts: 2,
                    rate: 0.12,
                    count: 120,
                },
            ],
            income: IncomeSplit {
                not_subscribed: vec![30000.0, 42000.0, 51000.0, 90000.0],
                subscribed: vec![38000.0, 47000.0, 60000.0],
                ceiling: 80000.0,
            },
        }
    }

    #[test]
    fn test_render_all_fails_when_output_dir_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let data = ChartData {
            job_rates: vec![],
            campaign: vec![],
            income: IncomeSplit::default(),
        };

        let err = StaticChartRenderer::render_all(&data, &file.path().join("charts")).unwrap_err();
        assert!(matches!(err, ChartError::OutputDir { .. }));
    }

    #[test]
    #[ignore = "needs a system sans-serif font"]
    fn test_render_all_writes_three_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("charts");

        let paths = StaticChartRenderer::render_all(&small_chart_data(), &out).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![JOB_CHART_FILE, CAMPAIGN_CHART_FILE, INCOME_CHART_FILE]);

        for path in &paths {
            let bytes = std::fs::read(path).unwrap();
            assert!(bytes.starts_with(b"\x89PNG"), "{}", path.display());
        }
    }
}
