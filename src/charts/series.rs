//! Chart Series Module
//! Aggregates the cleaned table into the data behind each chart.

use crate::stats::{GroupRate, StatsCalculator, StatsError};
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Contact counts with this many observations or fewer are left out.
pub const MIN_GROUP_SIZE: usize = 100;

/// Upper bound of the contact-count axis.
pub const CAMPAIGN_AXIS_MAX: f64 = 15.0;

/// Percentile of `income` used as the box plot ceiling.
pub const INCOME_CEILING_PERCENTILE: f64 = 95.0;

/// Subscription rate and sample size for one `campaign` value.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignPoint {
    pub contacts: i64,
    pub rate: f64,
    pub count: usize,
}

/// `income` split by subscription outcome.
#[derive(Debug, Clone, Default)]
pub struct IncomeSplit {
    pub not_subscribed: Vec<f64>,
    pub subscribed: Vec<f64>,
    /// 95th percentile of every income value.
    pub ceiling: f64,
}

/// Everything the three charts need, computed once.
#[derive(Debug, Clone)]
pub struct ChartData {
    pub job_rates: Vec<GroupRate>,
    pub campaign: Vec<CampaignPoint>,
    pub income: IncomeSplit,
}

impl ChartData {
    pub fn from_table(df: &DataFrame) -> Result<Self, StatsError> {
        Ok(Self {
            job_rates: Self::job_rates(df)?,
            campaign: Self::campaign_points(df)?,
            income: Self::income_split(df)?,
        })
    }

    /// Mean `y` per occupation, in occupation name order.
    pub fn job_rates(df: &DataFrame) -> Result<Vec<GroupRate>, StatsError> {
        let mut rates = StatsCalculator::group_rates(df, "job")?;
        rates.sort_by(|a, b| a.group.cmp(&b.group));
        Ok(rates)
    }

    /// Mean `y` and group size per contact count, only for groups above
    /// `MIN_GROUP_SIZE`.
    pub fn campaign_points(df: &DataFrame) -> Result<Vec<CampaignPoint>, StatsError> {
        let target = StatsCalculator::target_values(df)?;
        let contacts = StatsCalculator::numeric_values(df, "campaign")?;

        let mut acc: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        for (c, y) in contacts.iter().zip(target) {
            if let Some(c) = c {
                let entry = acc.entry(*c as i64).or_insert((0.0, 0));
                entry.0 += y;
                entry.1 += 1;
            }
        }

        Ok(acc
            .into_iter()
            .filter(|(_, (_, count))| *count > MIN_GROUP_SIZE)
            .map(|(contacts, (sum, count))| CampaignPoint {
                contacts,
                rate: sum / count as f64,
                count,
            })
            .collect())
    }

    pub fn income_split(df: &DataFrame) -> Result<IncomeSplit, StatsError> {
        let target = StatsCalculator::target_values(df)?;
        let income = StatsCalculator::numeric_values(df, "income")?;

        let mut split = IncomeSplit::default();
        for (value, y) in income.iter().zip(target) {
            let Some(value) = value else { continue };
            if y == 1.0 {
                split.subscribed.push(*value);
            } else {
                split.not_subscribed.push(*value);
            }
        }

        let mut all: Vec<f64> = income.into_iter().flatten().collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        split.ceiling = StatsCalculator::percentile(&all, INCOME_CEILING_PERCENTILE);
        Ok(split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cleaned_sample;

    fn campaign_table(groups: &[(i64, usize, usize)]) -> DataFrame {
        let mut campaign = Vec::new();
        let mut y = Vec::new();
        for &(contacts, total, subscribed) in groups {
            for i in 0..total {
                campaign.push(contacts);
                y.push(if i < subscribed { 1i64 } else { 0 });
            }
        }
        DataFrame::new(vec![
            Column::new("campaign".into(), campaign),
            Column::new("y".into(), y),
        ])
        .unwrap()
    }

    #[test]
    fn test_campaign_points_drop_small_groups() {
        let df = campaign_table(&[(1, 200, 50), (2, 101, 10), (3, 100, 90), (20, 150, 0)]);
        let points = ChartData::campaign_points(&df).unwrap();

        let contacts: Vec<i64> = points.iter().map(|p| p.contacts).collect();
        assert_eq!(contacts, vec![1, 2, 20]);
        assert_eq!(points[0].count, 200);
        assert!((points[0].rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_job_rates_cover_every_occupation() {
        let df = cleaned_sample();
        let rates = ChartData::job_rates(&df).unwrap();
        let jobs: Vec<&str> = rates.iter().map(|r| r.group.as_str()).collect();
        assert_eq!(jobs, vec!["admin.", "technician"]);
    }

    #[test]
    fn test_income_split_by_target() {
        let df = cleaned_sample();
        let split = ChartData::income_split(&df).unwrap();

        assert_eq!(split.subscribed.len(), 2);
        assert_eq!(split.not_subscribed.len(), 3);
        let max = split
            .subscribed
            .iter()
            .chain(split.not_subscribed.iter())
            .fold(f64::MIN, |a, &b| a.max(b));
        assert!(split.ceiling <= max);
        assert!(split.ceiling > 0.0);
    }
}
