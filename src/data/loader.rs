use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, TabularDataset, Value};

/// File extensions accepted by [`load_file`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "json", "parquet", "pq"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a tabular dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row followed by records
/// * `.json`    – `[{ "col": value, ... }, ...]` (records orientation)
/// * `.parquet` – flat columns of primitive types
///
/// The dataset is named after the file name.
pub fn load_file(path: &Path) -> Result<TabularDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let columns = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset")
        .to_string();
    TabularDataset::new(name, columns)
        .with_context(|| format!("invalid table in {}", path.display()))
}

/// Write a dataset as CSV with a header row.
pub fn write_csv(dataset: &TabularDataset, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(dataset.column_names())
        .context("writing CSV header")?;
    for idx in 0..dataset.n_rows() {
        let row: Vec<String> = dataset.row(idx).iter().map(|v| v.to_string()).collect();
        writer
            .write_record(&row)
            .with_context(|| format!("writing CSV row {idx}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Vec<Column>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut columns: Vec<Column> = headers
        .iter()
        .map(|h| Column::new(h.clone(), Vec::new()))
        .collect();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "CSV row {row_no}: expected {} fields, found {}",
                headers.len(),
                record.len()
            );
        }
        for (col, raw) in columns.iter_mut().zip(record.iter()) {
            col.values.push(Value::guess(raw.trim()));
        }
    }

    Ok(columns)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records orientation (`df.to_json(orient='records')`). Keys missing from a
/// record become nulls; column order follows first appearance.
fn load_json(path: &Path) -> Result<Vec<Column>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut columns: Vec<Column> = Vec::new();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        for key in obj.keys() {
            if !columns.iter().any(|c| &c.name == key) {
                // Back-fill rows seen before this key first appeared.
                columns.push(Column::new(key.clone(), vec![Value::Null; i]));
            }
        }
        for col in columns.iter_mut() {
            let value = obj.get(&col.name).map(json_to_value).unwrap_or(Value::Null);
            col.values.push(value);
        }
    }

    Ok(columns)
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat primitive columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Vec<Column>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;

    let mut columns: Vec<Column> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| Column::new(f.name().clone(), Vec::new()))
        .collect();

    let reader = builder.build().context("building parquet reader")?;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, col) in columns.iter_mut().enumerate() {
            let array = batch.column(col_idx);
            for row in 0..batch.num_rows() {
                col.values.push(extract_value(array, row));
            }
        }
    }

    Ok(columns)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => match any.downcast_ref::<StringArray>() {
            Some(s) => Value::String(s.value(row).to_string()),
            None => Value::Null,
        },
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(Value::Null, |arr| Value::Integer(arr.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Value::Null, |arr| Value::Integer(arr.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(Value::Null, |arr| Value::Float(arr.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(Value::Null, |arr| Value::Float(arr.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(Value::Null, |arr| Value::Bool(arr.value(row))),
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tabflow-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn loads_csv_with_typed_columns() {
        let path = scratch("people.csv");
        std::fs::write(&path, "age,income,churn\n34,5000.5,yes\n51,,no\n").unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.name(), "people.csv");
        assert_eq!(ds.column_names(), vec!["age", "income", "churn"]);
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.column("income").unwrap().values[1], Value::Null);
        assert_eq!(ds.column("age").unwrap().values[0], Value::Integer(34));
    }

    #[test]
    fn loads_json_records_with_missing_keys() {
        let path = scratch("records.json");
        std::fs::write(&path, r#"[{"a": 1}, {"a": 2, "b": "x"}]"#).unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.column_names(), vec!["a", "b"]);
        assert_eq!(ds.column("b").unwrap().values, vec![Value::Null, Value::String("x".into())]);
    }

    #[test]
    fn csv_round_trips_through_writer() {
        let path = scratch("written.csv");
        let ds = TabularDataset::new(
            "w",
            vec![
                Column::new("x", vec![Value::Integer(1), Value::Null]),
                Column::new("y", vec![Value::String("a".into()), Value::Float(0.5)]),
            ],
        )
        .unwrap();
        write_csv(&ds, &path).unwrap();

        let back = load_file(&path).unwrap();
        assert_eq!(back.columns(), ds.columns());
    }

    #[test]
    fn rejects_unknown_extension() {
        let path = scratch("sheet.xlsx");
        std::fs::write(&path, "irrelevant").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }
}
