/// Data layer: table types, loading and descriptive summaries.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → TabularDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ TabularDataset │  named, equal-length columns
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ summary   │  describe / dtypes / missing counts
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod summary;

pub use model::{Column, ColumnType, ShapeError, TabularDataset, Value};
