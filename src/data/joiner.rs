//! Join Module
//! Normalizes customer column names and inner-joins both tables on `id_`.

use super::{is_integer_dtype, is_numeric_dtype};
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Join key 'id_' missing from {table} table")]
    KeyMissing { table: &'static str },
    #[error("Column names collide after normalization: '{0}'")]
    NameCollision(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Shared identifier of both tables.
pub const JOIN_KEY: &str = "id_";

pub struct Joiner;

impl Joiner {
    /// Lowercase and trim every column name, then rename `id` to `id_`.
    pub fn normalize_customer_columns(df: &DataFrame) -> Result<DataFrame, JoinError> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| {
                let name = s.trim().to_lowercase();
                if name == "id" {
                    JOIN_KEY.to_string()
                } else {
                    name
                }
            })
            .collect();

        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(JoinError::NameCollision(name.clone()));
            }
        }

        let mut result = df.clone();
        result.set_column_names(names.iter().map(|s| s.as_str()))?;
        Ok(result)
    }

    /// Inner join on `id_`. Rows without a match on either side are dropped.
    pub fn join(campaigns: &DataFrame, customers: &DataFrame) -> Result<DataFrame, JoinError> {
        let customers = Self::normalize_customer_columns(customers)?;

        let left_key = campaigns
            .column(JOIN_KEY)
            .map_err(|_| JoinError::KeyMissing { table: "campaign" })?;
        let right_key = customers
            .column(JOIN_KEY)
            .map_err(|_| JoinError::KeyMissing { table: "customer" })?;

        let key_type = Self::common_key_type(left_key.dtype(), right_key.dtype());
        debug!(?key_type, "Join key type");
        let left_cast = left_key.cast(&key_type)?;
        let right_cast = right_key.cast(&key_type)?;

        let mut left = campaigns.clone();
        let mut right = customers.clone();
        left.with_column(left_cast)?;
        right.with_column(right_cast)?;

        let joined = left
            .lazy()
            .join(
                right.lazy(),
                [col(JOIN_KEY)],
                [col(JOIN_KEY)],
                JoinArgs::new(JoinType::Inner),
            )
            .collect()?;

        info!(
            rows = joined.height(),
            columns = joined.width(),
            "Joined campaign and customer tables"
        );
        Ok(joined)
    }

    /// Type both keys are coerced to before joining.
    pub fn common_key_type(left: &DataType, right: &DataType) -> DataType {
        if left == right {
            left.clone()
        } else if is_integer_dtype(left) && is_integer_dtype(right) {
            DataType::Int64
        } else if is_numeric_dtype(left) && is_numeric_dtype(right) {
            DataType::Float64
        } else {
            DataType::String
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaigns(ids: Vec<i64>) -> DataFrame {
        let y: Vec<&str> = ids.iter().map(|_| "no").collect();
        DataFrame::new(vec![
            Column::new("id_".into(), ids),
            Column::new("y".into(), y),
        ])
        .unwrap()
    }

    fn key_values(df: &DataFrame) -> Vec<i64> {
        let mut ids: Vec<i64> = df
            .column(JOIN_KEY)
            .unwrap()
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_normalize_renames_id_and_lowercases() {
        let df = DataFrame::new(vec![
            Column::new(" ID ".into(), vec![1i64]),
            Column::new("Income".into(), vec![10.0]),
        ])
        .unwrap();

        let normalized = Joiner::normalize_customer_columns(&df).unwrap();
        let names: Vec<String> = normalized
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["id_", "income"]);
    }

    #[test]
    fn test_normalize_rejects_collisions() {
        let df = DataFrame::new(vec![
            Column::new("Age".into(), vec![1i64]),
            Column::new("age ".into(), vec![2i64]),
        ])
        .unwrap();

        let err = Joiner::normalize_customer_columns(&df).unwrap_err();
        assert!(matches!(err, JoinError::NameCollision(c) if c == "age"));
    }

    #[test]
    fn test_inner_join_keeps_overlap_only() {
        let left = campaigns(vec![1, 2, 3]);
        let right = DataFrame::new(vec![
            Column::new("ID".into(), vec![2i64, 3, 4]),
            Column::new("Job".into(), vec!["admin.", "services", "retired"]),
        ])
        .unwrap();

        let joined = Joiner::join(&left, &right).unwrap();
        assert_eq!(joined.height(), 2);
        assert_eq!(key_values(&joined), vec![2, 3]);
        assert!(joined.column("job").is_ok());
    }

    #[test]
    fn test_join_coerces_mismatched_numeric_keys() {
        let left = campaigns(vec![1, 2]);
        let right = DataFrame::new(vec![
            Column::new("id".into(), vec![2.0f64, 5.0]),
            Column::new("age".into(), vec![30i64, 40]),
        ])
        .unwrap();

        let joined = Joiner::join(&left, &right).unwrap();
        assert_eq!(key_values(&joined), vec![2]);
    }

    #[test]
    fn test_missing_key_fails_loudly() {
        let left = campaigns(vec![1]);
        let right = DataFrame::new(vec![Column::new("customer".into(), vec![1i64])]).unwrap();

        let err = Joiner::join(&left, &right).unwrap_err();
        assert!(matches!(
            err,
            JoinError::KeyMissing { table: "customer" }
        ));

        let left = DataFrame::new(vec![Column::new("id".into(), vec![1i64])]).unwrap();
        let right = DataFrame::new(vec![Column::new("id".into(), vec![1i64])]).unwrap();
        let err = Joiner::join(&left, &right).unwrap_err();
        assert!(matches!(
            err,
            JoinError::KeyMissing { table: "campaign" }
        ));
    }

    #[test]
    fn test_common_key_type() {
        assert_eq!(
            Joiner::common_key_type(&DataType::Int32, &DataType::Int64),
            DataType::Int64
        );
        assert_eq!(
            Joiner::common_key_type(&DataType::Int64, &DataType::Float64),
            DataType::Float64
        );
        assert_eq!(
            Joiner::common_key_type(&DataType::Int64, &DataType::String),
            DataType::String
        );
    }
}
