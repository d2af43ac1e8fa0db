//! Charts module - Chart data preparation and static rendering

mod renderer;
mod series;

pub use renderer::{ChartError, StaticChartRenderer};
pub use series::ChartData;
