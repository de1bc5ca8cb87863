//! Command-line front-end. Each subcommand runs one short session against the
//! orchestrator and prints what the stage produced.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::{Args, Parser, Subcommand};

use crate::adapters;
use crate::config::Settings;
use crate::data::{loader, TabularDataset};
use crate::error::PortError;
use crate::ports::Leaderboard;
use crate::task::TaskType;
use crate::workflow::Orchestrator;

/// Rows printed when previewing a table.
const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Parser)]
#[command(
    name = "tabflow",
    version,
    about = "Tabular ML workflow: download, profile, edit, train, predict"
)]
pub struct Cli {
    /// JSON settings file (defaults to $TABFLOW_CONFIG, then built-in defaults)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download a dataset ("owner/name") from the registry into the data directory
    Download {
        #[arg(value_name = "DATASET")]
        dataset: String,
    },
    /// Write a profile report for a dataset file
    Profile {
        #[arg(value_name = "FILE")]
        file: String,
    },
    /// Launch the interactive editor on a dataset file and return immediately
    Edit {
        #[arg(value_name = "FILE")]
        file: String,
    },
    /// Search for the best model and persist it
    Train(TrainArgs),
    /// Score new data with the persisted model of a task type
    Predict {
        #[arg(value_name = "FILE")]
        file: String,
        #[arg(value_parser = parse_task)]
        task: TaskType,
    },
}

#[derive(Debug, Args)]
struct TrainArgs {
    #[arg(value_name = "FILE")]
    file: String,
    /// Column to predict (ignored for clustering)
    #[arg(value_name = "TARGET")]
    target: String,
    #[arg(value_parser = parse_task)]
    task: TaskType,
    /// Render this evaluation plot after training
    #[arg(long, value_name = "KIND")]
    plot: Option<String>,
    /// Number of clusters (clustering only)
    #[arg(long, value_name = "N")]
    clusters: Option<usize>,
}

fn parse_task(s: &str) -> Result<TaskType, String> {
    s.parse().map_err(|e: PortError| e.to_string())
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref())?;
        let mut session = Orchestrator::new(adapters::default_ports(&settings), &settings);

        match self.command {
            Command::Download { dataset } => {
                for file in session.download(&dataset)? {
                    println!("{}", file.display());
                }
            }
            Command::Profile { file } => {
                session.load_dataset(&file)?;
                let report = session.profile()?;
                println!("profile report: {}", report.path.display());
            }
            Command::Edit { file } => {
                session.load_dataset(&file)?;
                let handle = session.edit()?;
                println!("editor: {}", handle.locator);
                println!("working copy: {}", handle.working_copy.display());
            }
            Command::Train(args) => train(&mut session, args)?,
            Command::Predict { file, task } => {
                let scored = session.score_file(task, &file)?;
                let out = settings.data_dir.join(predictions_file_name(scored.name()));
                loader::write_csv(&scored, &out)?;
                println!("{}", render(&scored.head(PREVIEW_ROWS)));
                println!("predictions written to {}", out.display());
            }
        }
        Ok(())
    }
}

fn train(session: &mut Orchestrator, args: TrainArgs) -> Result<()> {
    session.load_dataset(&args.file)?;
    session.configure(args.task, Some(&args.target), args.clusters)?;
    let outcome = session.train_with_plot(args.plot.as_deref())?;

    println!("{}", leaderboard_table(&outcome.leaderboard));
    if let Some(assigned) = &outcome.assignments {
        println!("{}", render(&assigned.head(PREVIEW_ROWS)));
    }
    if let Some(image) = &outcome.plot {
        println!("{} plot: {}", image.plot, image.path.display());
    }
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    println!("model saved as '{}'", outcome.artifact_name);
    Ok(())
}

fn predictions_file_name(dataset: &str) -> String {
    let stem = std::path::Path::new(dataset)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scored");
    format!("{stem}_predictions.csv")
}

fn leaderboard_table(board: &Leaderboard) -> String {
    let mut columns = vec![(
        "Model".to_string(),
        board.rows.iter().map(|r| Some(r.model.clone())).collect::<Vec<_>>(),
    )];
    for (i, metric) in board.metrics.iter().enumerate() {
        let cells = board
            .rows
            .iter()
            .map(|r| r.scores.get(i).map(|s| format!("{s:.4}")))
            .collect();
        columns.push((metric.clone(), cells));
    }
    pretty(columns)
}

/// Format a dataset the way arrow pretty-prints record batches.
pub fn render(dataset: &TabularDataset) -> String {
    let columns = dataset
        .columns()
        .iter()
        .map(|c| {
            let cells = c
                .values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect();
            (c.name.clone(), cells)
        })
        .collect();
    pretty(columns)
}

fn pretty(columns: Vec<(String, Vec<Option<String>>)>) -> String {
    match string_batch(columns) {
        Ok(batch) => match arrow::util::pretty::pretty_format_batches(&[batch]) {
            Ok(table) => table.to_string(),
            Err(e) => format!("<table unavailable: {e}>"),
        },
        Err(e) => format!("<table unavailable: {e:#}>"),
    }
}

fn string_batch(columns: Vec<(String, Vec<Option<String>>)>) -> Result<RecordBatch> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, _)| Field::new(name, DataType::Utf8, true))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|(_, cells)| Arc::new(StringArray::from(cells)) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context("building preview table")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Value};
    use crate::ports::LeaderboardRow;

    #[test]
    fn parses_train_with_options() {
        let cli = Cli::try_parse_from([
            "tabflow", "train", "churn.csv", "churn", "classification", "--plot", "auc",
        ])
        .unwrap();
        match cli.command {
            Command::Train(args) => {
                assert_eq!(args.file, "churn.csv");
                assert_eq!(args.target, "churn");
                assert_eq!(args.task, TaskType::Classification);
                assert_eq!(args.plot.as_deref(), Some("auc"));
                assert_eq!(args.clusters, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_task() {
        let err = Cli::try_parse_from(["tabflow", "predict", "new.csv", "ranking"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn task_names_parse_case_insensitively() {
        let cli = Cli::try_parse_from(["tabflow", "predict", "new.csv", "Regression"]).unwrap();
        match cli.command {
            Command::Predict { task, .. } => assert_eq!(task, TaskType::Regression),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn renders_tables() {
        let ds = TabularDataset::new(
            "t.csv",
            vec![
                Column::new("a", vec![Value::Integer(1), Value::Null]),
                Column::new("b", vec![Value::String("x".into()), Value::String("y".into())]),
            ],
        )
        .unwrap();
        let text = render(&ds);
        assert!(text.contains("| a "));
        assert!(text.contains("| x "));

        let board = Leaderboard {
            metrics: vec!["Accuracy".into()],
            rows: vec![LeaderboardRow { model: "Majority Class".into(), scores: vec![0.5] }],
        };
        assert!(leaderboard_table(&board).contains("0.5000"));
    }

    #[test]
    fn prediction_output_named_after_input() {
        assert_eq!(predictions_file_name("new_customers.csv"), "new_customers_predictions.csv");
    }
}
