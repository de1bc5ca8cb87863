use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Value – a single cell of a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common DataFrame dtypes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so values can be grouped in BTreeSet / BTreeMap --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl Value {
    /// Interpret the value as an `f64` when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) if v.is_finite() => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or a float that is NaN or infinite.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => !v.is_finite(),
            _ => false,
        }
    }

    /// Parse a raw text cell, guessing the narrowest type. Common NA spellings
    /// and NaN read as null.
    pub fn guess(s: &str) -> Value {
        if s.is_empty() || NA_TOKENS.contains(&s) {
            return Value::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_nan() {
                return Value::Null;
            }
            return Value::Float(f);
        }
        if s == "true" || s == "false" {
            return Value::Bool(s == "true");
        }
        Value::String(s.to_string())
    }
}

const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-NaN", "-nan", "<NA>", "N/A", "NA", "NULL", "NaN", "None",
    "n/a", "nan", "null",
];

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Inferred dtype of a column, in the spirit of `DataFrame.dtypes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Bool,
    Text,
    /// Mixed value kinds that are not all numeric.
    Mixed,
    /// Every value is null.
    Empty,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Integer => "int64",
            ColumnType::Float => "float64",
            ColumnType::Bool => "bool",
            ColumnType::Text => "object",
            ColumnType::Mixed => "mixed",
            ColumnType::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// A named sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Infer the column dtype from its non-null values.
    pub fn column_type(&self) -> ColumnType {
        let mut seen = ColumnType::Empty;
        for v in self.values.iter().filter(|v| !v.is_null()) {
            let kind = match v {
                Value::Integer(_) => ColumnType::Integer,
                Value::Float(_) => ColumnType::Float,
                Value::Bool(_) => ColumnType::Bool,
                Value::String(_) => ColumnType::Text,
                Value::Null => continue,
            };
            seen = match (seen, kind) {
                (ColumnType::Empty, k) => k,
                (a, b) if a == b => a,
                (a, b) if a.is_numeric() && b.is_numeric() => ColumnType::Float,
                _ => return ColumnType::Mixed,
            };
        }
        seen
    }

    /// Numeric view of the column; non-numeric cells become `None`.
    pub fn as_f64(&self) -> Vec<Option<f64>> {
        self.values.iter().map(Value::as_f64).collect()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub fn unique_values(&self) -> BTreeSet<&Value> {
        self.values.iter().filter(|v| !v.is_null()).collect()
    }
}

// ---------------------------------------------------------------------------
// TabularDataset – named, ordered collection of equal-length columns
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// In-memory table. Column names are unique and every column has the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularDataset {
    name: String,
    columns: Vec<Column>,
    n_rows: usize,
}

impl TabularDataset {
    /// Build a dataset, checking the column invariants.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, ShapeError> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        let mut names = BTreeSet::new();
        for col in &columns {
            if !names.insert(col.name.as_str()) {
                return Err(ShapeError::DuplicateColumn(col.name.clone()));
            }
            if col.len() != n_rows {
                return Err(ShapeError::RaggedColumn {
                    column: col.name.clone(),
                    expected: n_rows,
                    actual: col.len(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            columns,
            n_rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same content under a different name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0 || self.columns.is_empty()
    }

    /// A new dataset holding the first `n` rows.
    pub fn head(&self, n: usize) -> TabularDataset {
        let take = n.min(self.n_rows);
        TabularDataset {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values[..take].to_vec()))
                .collect(),
            n_rows: take,
        }
    }

    /// A new dataset with `column` appended. A same-named column is replaced.
    pub fn with_column(&self, column: Column) -> Result<TabularDataset, ShapeError> {
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| c.name != column.name)
            .cloned()
            .collect();
        columns.push(column);
        TabularDataset::new(self.name.clone(), columns)
    }

    /// Cells of row `idx` in column order.
    pub fn row(&self, idx: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[idx]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(name: &str, v: &[i64]) -> Column {
        Column::new(name, v.iter().map(|&i| Value::Integer(i)).collect())
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = TabularDataset::new("d", vec![ints("a", &[1]), ints("a", &[2])]).unwrap_err();
        assert_eq!(err, ShapeError::DuplicateColumn("a".into()));
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = TabularDataset::new("d", vec![ints("a", &[1, 2]), ints("b", &[2])]).unwrap_err();
        assert!(matches!(err, ShapeError::RaggedColumn { actual: 1, expected: 2, .. }));
    }

    #[test]
    fn with_column_leaves_original_untouched() {
        let ds = TabularDataset::new("d", vec![ints("a", &[1, 2])]).unwrap();
        let extended = ds.with_column(ints("b", &[3, 4])).unwrap();
        assert_eq!(ds.n_cols(), 1);
        assert_eq!(extended.column_names(), vec!["a", "b"]);
        assert!(ds.with_column(ints("c", &[1])).is_err());
    }

    #[test]
    fn infers_column_types() {
        let mixed_numeric =
            Column::new("x", vec![Value::Integer(1), Value::Float(2.5), Value::Null]);
        assert_eq!(mixed_numeric.column_type(), ColumnType::Float);
        let text = Column::new("t", vec![Value::String("a".into()), Value::Integer(1)]);
        assert_eq!(text.column_type(), ColumnType::Mixed);
        assert_eq!(Column::new("n", vec![Value::Null]).column_type(), ColumnType::Empty);
    }

    #[test]
    fn guesses_cell_types() {
        assert_eq!(Value::guess("42"), Value::Integer(42));
        assert_eq!(Value::guess("4.5"), Value::Float(4.5));
        assert_eq!(Value::guess("true"), Value::Bool(true));
        assert_eq!(Value::guess(""), Value::Null);
        assert_eq!(Value::guess("yes"), Value::String("yes".into()));
        assert_eq!(Value::guess("NaN"), Value::Null);
        assert_eq!(Value::guess("NA"), Value::Null);
        assert_eq!(Value::guess("-nan"), Value::Null);
        assert!(Value::guess("inf").is_missing());
        assert!(!Value::Integer(0).is_missing());
    }

    #[test]
    fn head_truncates_rows() {
        let ds = TabularDataset::new("d", vec![ints("a", &[1, 2, 3])]).unwrap();
        assert_eq!(ds.head(2).n_rows(), 2);
        assert_eq!(ds.head(10).n_rows(), 3);
    }
}
