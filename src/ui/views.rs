use std::sync::Arc;

use eframe::egui::{self, Grid, RichText, ScrollArea, Ui};

use crate::data::summary;
use crate::data::TabularDataset;
use crate::ports::Leaderboard;

use super::state::DashboardState;

const PREVIEW_ROWS: usize = 20;

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render data, summaries and training results in the central panel.
pub fn central(ui: &mut Ui, state: &DashboardState) {
    let Some(dataset) = state.session.dataset() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to begin  (File → Open training data…)");
        });
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            if state.eda.preview {
                section(ui, "Preview", |ui| table(ui, "preview", &dataset.head(PREVIEW_ROWS)));
            }
            if state.eda.describe {
                section(ui, "Descriptive statistics", |ui| describe(ui, state));
            }
            if state.eda.dtypes {
                section(ui, "Column types", |ui| {
                    pairs(ui, "dtypes", ("column", "dtype"), summary::dtypes(dataset))
                });
            }
            if state.eda.missing {
                section(ui, "Missing values", |ui| {
                    pairs(ui, "missing", ("column", "missing"), summary::missing_counts(dataset))
                });
            }

            if let Some(outcome) = &state.outcome {
                section(ui, &format!("Leaderboard ({})", outcome.task), |ui| {
                    leaderboard(ui, &outcome.leaderboard)
                });
                if let Some(assigned) = &outcome.assignments {
                    section(ui, "Cluster assignments", |ui| {
                        table(ui, "assignments", &assigned.head(PREVIEW_ROWS))
                    });
                }
                for warning in &outcome.warnings {
                    ui.label(RichText::new(format!("warning: {warning}")).italics());
                }
            }

            if let Some(image) = &state.plot_image {
                section(ui, &format!("Plot: {}", image.plot), |ui| {
                    let bytes = egui::load::Bytes::Shared(Arc::clone(&image.bytes));
                    ui.add(
                        egui::Image::from_bytes(image.uri.clone(), bytes)
                            .max_width(ui.available_width())
                            .shrink_to_fit(),
                    );
                });
            }

            if let Some(scored) = &state.predictions {
                section(ui, "Predictions", |ui| {
                    table(ui, "predictions", &scored.head(PREVIEW_ROWS))
                });
            }
        });
}

fn section(ui: &mut Ui, title: &str, body: impl FnOnce(&mut Ui)) {
    ui.add_space(6.0);
    ui.strong(title);
    ui.separator();
    body(ui);
}

// ---------------------------------------------------------------------------
// Grids
// ---------------------------------------------------------------------------

fn table(ui: &mut Ui, id: &str, dataset: &TabularDataset) {
    ScrollArea::horizontal().id_salt(id).show(ui, |ui: &mut Ui| {
        Grid::new(id).striped(true).show(ui, |ui: &mut Ui| {
            for name in dataset.column_names() {
                ui.strong(name);
            }
            ui.end_row();
            for row in 0..dataset.n_rows() {
                for value in dataset.row(row) {
                    ui.label(value.to_string());
                }
                ui.end_row();
            }
        });
    });
}

fn describe(ui: &mut Ui, state: &DashboardState) {
    let fmt = |v: Option<f64>| v.map(|x| format!("{x:.3}")).unwrap_or_default();
    Grid::new("describe").striped(true).show(ui, |ui: &mut Ui| {
        let headers = [
            "column", "dtype", "count", "missing", "unique", "mean", "std", "min", "max", "top",
        ];
        for header in headers {
            ui.strong(header);
        }
        ui.end_row();
        for s in &state.summaries {
            ui.label(&s.name);
            ui.label(s.dtype.to_string());
            ui.label(s.count.to_string());
            ui.label(s.missing.to_string());
            ui.label(s.unique.to_string());
            let stats = s.numeric.as_ref();
            ui.label(fmt(stats.map(|n| n.mean)));
            ui.label(fmt(stats.map(|n| n.std)));
            ui.label(fmt(stats.map(|n| n.min)));
            ui.label(fmt(stats.map(|n| n.max)));
            ui.label(
                s.top
                    .as_ref()
                    .map(|(v, n)| format!("{v} ({n})"))
                    .unwrap_or_default(),
            );
            ui.end_row();
        }
    });
}

fn pairs<V: ToString>(ui: &mut Ui, id: &str, headers: (&str, &str), rows: Vec<(String, V)>) {
    Grid::new(id).striped(true).show(ui, |ui: &mut Ui| {
        ui.strong(headers.0);
        ui.strong(headers.1);
        ui.end_row();
        for (name, value) in rows {
            ui.label(name);
            ui.label(value.to_string());
            ui.end_row();
        }
    });
}

fn leaderboard(ui: &mut Ui, board: &Leaderboard) {
    Grid::new("leaderboard").striped(true).show(ui, |ui: &mut Ui| {
        ui.strong("Model");
        for metric in &board.metrics {
            ui.strong(metric);
        }
        ui.end_row();
        for (i, row) in board.rows.iter().enumerate() {
            let name = RichText::new(&row.model);
            ui.label(if i == 0 { name.strong() } else { name });
            for score in &row.scores {
                ui.label(format!("{score:.4}"));
            }
            ui.end_row();
        }
    });
}
