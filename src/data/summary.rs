use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{Column, ColumnType, TabularDataset, Value};

// ---------------------------------------------------------------------------
// Per-column descriptive statistics
// ---------------------------------------------------------------------------

/// `describe()`-style statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: ColumnType,
    /// Non-null cells.
    pub count: usize,
    pub missing: usize,
    pub unique: usize,
    pub numeric: Option<NumericStats>,
    /// Most frequent non-null value with its frequency.
    pub top: Option<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1); zero for a single value.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Summary of every column, in column order.
pub fn describe(dataset: &TabularDataset) -> Vec<ColumnSummary> {
    dataset.columns().iter().map(summarize_column).collect()
}

/// `(column, dtype)` pairs.
pub fn dtypes(dataset: &TabularDataset) -> Vec<(String, ColumnType)> {
    dataset
        .columns()
        .iter()
        .map(|c| (c.name.clone(), c.column_type()))
        .collect()
}

/// `(column, null count)` pairs.
pub fn missing_counts(dataset: &TabularDataset) -> Vec<(String, usize)> {
    dataset
        .columns()
        .iter()
        .map(|c| (c.name.clone(), c.null_count()))
        .collect()
}

pub fn summarize_column(column: &Column) -> ColumnSummary {
    let dtype = column.column_type();
    let missing = column.null_count();

    let mut freq: BTreeMap<&Value, usize> = BTreeMap::new();
    for v in column.values.iter().filter(|v| !v.is_null()) {
        *freq.entry(v).or_default() += 1;
    }
    // Ties resolve to the smallest value so the result is stable.
    let top = freq
        .iter()
        .fold(None::<(&Value, usize)>, |best, (v, &n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((v, n)),
        })
        .map(|(v, n)| (v.to_string(), n));

    let numeric = if dtype.is_numeric() {
        numeric_stats(column.as_f64().into_iter().flatten())
    } else {
        None
    };

    ColumnSummary {
        name: column.name.clone(),
        dtype,
        count: column.len() - missing,
        missing,
        unique: freq.len(),
        numeric,
        top,
    }
}

pub fn numeric_stats(values: impl Iterator<Item = f64>) -> Option<NumericStats> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    Some(NumericStats {
        mean,
        std: var.sqrt(),
        min: values.iter().cloned().fold(f64::INFINITY, f64::min),
        max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_column_statistics() {
        let col = Column::new(
            "x",
            vec![Value::Integer(1), Value::Integer(3), Value::Null, Value::Integer(3)],
        );
        let s = summarize_column(&col);
        assert_eq!(s.count, 3);
        assert_eq!(s.missing, 1);
        assert_eq!(s.unique, 2);
        assert_eq!(s.top, Some(("3".to_string(), 2)));
        let stats = s.numeric.unwrap();
        assert!((stats.mean - 7.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn text_column_has_no_numeric_stats() {
        let col = Column::new("t", vec![Value::String("a".into()), Value::String("b".into())]);
        let s = summarize_column(&col);
        assert_eq!(s.dtype, ColumnType::Text);
        assert!(s.numeric.is_none());
        assert_eq!(s.top, Some(("a".to_string(), 1)));
    }
}
