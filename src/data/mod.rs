//! Data module - Loading, joining and cleaning

mod cleaner;
mod joiner;
mod loader;

pub use cleaner::{
    null_counts, CleanError, CleanedTable, Cleaner, TARGET_COLUMN, TENURE_COLUMN,
};
pub use joiner::{JoinError, Joiner, JOIN_KEY};
pub use loader::{DataLoader, LoadedTables, LoaderError};

#[cfg(test)]
pub(crate) use cleaner::tests::cleaned_sample;

use polars::prelude::DataType;

pub(crate) fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}
