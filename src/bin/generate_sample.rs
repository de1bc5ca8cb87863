use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use tabflow::data::{loader, Column, TabularDataset, Value};
use tabflow::rng::SimpleRng;

/// Write demo datasets for every task type.
#[derive(Debug, Parser)]
struct Args {
    /// Output directory
    #[arg(default_value = "data")]
    out: PathBuf,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 300)]
    rows: usize,
}

/// Customers with a churn flag. Churn is more likely for short tenure and
/// high monthly charges.
struct Customers {
    age: Vec<i64>,
    income: Vec<f64>,
    tenure: Vec<i64>,
    charges: Vec<f64>,
    plan: Vec<String>,
    churn: Vec<String>,
}

fn customers(rows: usize, rng: &mut SimpleRng) -> Customers {
    let plans = ["basic", "standard", "premium"];
    let mut c = Customers {
        age: Vec::with_capacity(rows),
        income: Vec::with_capacity(rows),
        tenure: Vec::with_capacity(rows),
        charges: Vec::with_capacity(rows),
        plan: Vec::with_capacity(rows),
        churn: Vec::with_capacity(rows),
    };
    for _ in 0..rows {
        let age = rng.gauss(42.0, 12.0).clamp(18.0, 85.0).round() as i64;
        let income = rng.gauss(52_000.0, 15_000.0).max(8_000.0).round();
        let tenure = rng.below(72) as i64 + 1;
        let plan = rng.below(plans.len());
        let charges = (25.0 + 30.0 * plan as f64 + rng.gauss(0.0, 8.0)).max(10.0);

        let risk = 1.5 - 0.06 * tenure as f64 + 0.03 * (charges - 55.0) + rng.gauss(0.0, 0.8);
        c.age.push(age);
        c.income.push(income);
        c.tenure.push(tenure);
        c.charges.push((charges * 100.0).round() / 100.0);
        c.plan.push(plans[plan].to_string());
        c.churn.push(if risk > 0.0 { "yes" } else { "no" }.to_string());
    }
    c
}

/// Houses with a price driven by size, rooms and age.
struct Houses {
    sqft: Vec<f64>,
    rooms: Vec<i64>,
    age: Vec<i64>,
    price: Vec<f64>,
}

fn houses(rows: usize, rng: &mut SimpleRng) -> Houses {
    let mut h = Houses {
        sqft: Vec::with_capacity(rows),
        rooms: Vec::with_capacity(rows),
        age: Vec::with_capacity(rows),
        price: Vec::with_capacity(rows),
    };
    for _ in 0..rows {
        let sqft = rng.gauss(1_800.0, 500.0).max(400.0).round();
        let rooms = (sqft / 450.0).round().max(1.0) as i64;
        let age = rng.below(80) as i64;
        let price = 40_000.0 + 120.0 * sqft + 8_000.0 * rooms as f64 - 600.0 * age as f64
            + rng.gauss(0.0, 15_000.0);
        h.sqft.push(sqft);
        h.rooms.push(rooms);
        h.age.push(age);
        h.price.push(price.round());
    }
    h
}

fn write_parquet(schema: Schema, columns: Vec<ArrayRef>, path: &Path) -> Result<()> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|&v| Value::Integer(v)).collect()
}

fn floats(values: &[f64]) -> Vec<Value> {
    values.iter().map(|&v| Value::Float(v)).collect()
}

fn strings(values: &[String]) -> Vec<Value> {
    values.iter().map(|v| Value::String(v.clone())).collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let mut rng = SimpleRng::new(args.seed);

    // ---- churn (classification) ----
    let c = customers(args.rows, &mut rng);
    let churn = TabularDataset::new(
        "churn.csv",
        vec![
            Column::new("age", ints(&c.age)),
            Column::new("income", floats(&c.income)),
            Column::new("tenure", ints(&c.tenure)),
            Column::new("monthly_charges", floats(&c.charges)),
            Column::new("plan", strings(&c.plan)),
            Column::new("churn", strings(&c.churn)),
        ],
    )?;
    loader::write_csv(&churn, &args.out.join("churn.csv"))?;
    write_parquet(
        Schema::new(vec![
            Field::new("age", DataType::Int64, false),
            Field::new("income", DataType::Float64, false),
            Field::new("tenure", DataType::Int64, false),
            Field::new("monthly_charges", DataType::Float64, false),
            Field::new("plan", DataType::Utf8, false),
            Field::new("churn", DataType::Utf8, false),
        ]),
        vec![
            Arc::new(Int64Array::from(c.age.clone())),
            Arc::new(Float64Array::from(c.income.clone())),
            Arc::new(Int64Array::from(c.tenure.clone())),
            Arc::new(Float64Array::from(c.charges.clone())),
            Arc::new(StringArray::from(c.plan.clone())),
            Arc::new(StringArray::from(c.churn.clone())),
        ],
        &args.out.join("churn.parquet"),
    )?;

    // New customers to score: same features, no label.
    let fresh = customers(args.rows / 5, &mut rng);
    let to_score = TabularDataset::new(
        "churn_new.csv",
        vec![
            Column::new("age", ints(&fresh.age)),
            Column::new("income", floats(&fresh.income)),
            Column::new("tenure", ints(&fresh.tenure)),
            Column::new("monthly_charges", floats(&fresh.charges)),
            Column::new("plan", strings(&fresh.plan)),
        ],
    )?;
    loader::write_csv(&to_score, &args.out.join("churn_new.csv"))?;

    // ---- housing (regression) ----
    let h = houses(args.rows, &mut rng);
    let housing = TabularDataset::new(
        "housing.csv",
        vec![
            Column::new("sqft", floats(&h.sqft)),
            Column::new("rooms", ints(&h.rooms)),
            Column::new("age", ints(&h.age)),
            Column::new("price", floats(&h.price)),
        ],
    )?;
    loader::write_csv(&housing, &args.out.join("housing.csv"))?;
    write_parquet(
        Schema::new(vec![
            Field::new("sqft", DataType::Float64, false),
            Field::new("rooms", DataType::Int64, false),
            Field::new("age", DataType::Int64, false),
            Field::new("price", DataType::Float64, false),
        ]),
        vec![
            Arc::new(Float64Array::from(h.sqft)),
            Arc::new(Int64Array::from(h.rooms)),
            Arc::new(Int64Array::from(h.age)),
            Arc::new(Float64Array::from(h.price)),
        ],
        &args.out.join("housing.parquet"),
    )?;

    println!(
        "Wrote churn ({} rows), churn_new ({} rows) and housing ({} rows) to {}",
        churn.n_rows(),
        to_score.n_rows(),
        housing.n_rows(),
        args.out.display()
    );
    Ok(())
}
