use eframe::egui::{self, Color32, RichText, Ui};

use crate::data::loader::SUPPORTED_EXTENSIONS;
use crate::task::TaskType;
use crate::workflow::SessionState;

use super::state::DashboardState;

/// Something the user asked for this frame; applied after the panel is drawn.
enum Action {
    Train,
    Plot(&'static str),
    Predict,
}

// ---------------------------------------------------------------------------
// Left side panel – training, evaluation and scoring controls
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut DashboardState) {
    let mut action = None;

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Explore");
            ui.separator();
            ui.checkbox(&mut state.eda.preview, "Preview");
            ui.checkbox(&mut state.eda.describe, "Descriptive statistics");
            ui.checkbox(&mut state.eda.dtypes, "Column types");
            ui.checkbox(&mut state.eda.missing, "Missing values");

            ui.add_space(8.0);
            ui.heading("Train");
            ui.separator();
            training_controls(ui, state, &mut action);

            if let Some(trained) = state.session.trained_model() {
                let task = trained.task;
                ui.add_space(8.0);
                ui.heading("Evaluate");
                ui.separator();
                ui.horizontal_wrapped(|ui: &mut Ui| {
                    for &plot in task.allowed_plots() {
                        let current = state.plot_image.as_ref().is_some_and(|p| p.plot == plot);
                        if ui.selectable_label(current, plot).clicked() {
                            action = Some(Action::Plot(plot));
                        }
                    }
                });
            }

            ui.add_space(8.0);
            ui.heading("Predict");
            ui.separator();
            scoring_controls(ui, state, &mut action);
        });

    match action {
        Some(Action::Train) => state.train(),
        Some(Action::Plot(plot)) => state.show_plot(plot),
        Some(Action::Predict) => state.predict(),
        None => {}
    }
}

/// Scoring works with the model trained in this session or the one persisted
/// for the selected task by an earlier run.
fn scoring_controls(ui: &mut Ui, state: &mut DashboardState, action: &mut Option<Action>) {
    egui::ComboBox::from_id_salt("score_task")
        .selected_text(state.task.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for task in TaskType::ALL.into_iter().filter(|t| t.rules().supports_predict) {
                if ui.selectable_label(state.task == task, task.as_str()).clicked() {
                    state.set_task(task);
                }
            }
        });
    if !state.task.rules().supports_predict {
        ui.label(format!("{} models cannot score new data.", state.task));
        return;
    }
    if ui.button("Open new data…").clicked() {
        if let Some(path) = pick_data_file("Open data to score") {
            state.open_scoring(&path);
        }
    }
    let ready = state.session.state() == SessionState::ReadyForPrediction;
    if ui.add_enabled(ready, egui::Button::new("Predict")).clicked() {
        *action = Some(Action::Predict);
    }
}

fn training_controls(ui: &mut Ui, state: &mut DashboardState, action: &mut Option<Action>) {
    let columns: Vec<String> = match state.session.dataset() {
        Some(ds) => ds.column_names().into_iter().map(str::to_string).collect(),
        None => {
            ui.label("No dataset loaded.");
            return;
        }
    };

    ui.strong("Task");
    for task in TaskType::ALL {
        if ui.radio(state.task == task, task.as_str()).clicked() {
            state.set_task(task);
        }
    }

    if state.task.requires_target() {
        ui.strong("Target column");
        let selected = state.target.clone().unwrap_or_default();
        egui::ComboBox::from_id_salt("target")
            .selected_text(&selected)
            .show_ui(ui, |ui: &mut Ui| {
                for col in &columns {
                    if ui.selectable_label(selected == *col, col).clicked() {
                        state.target = Some(col.clone());
                    }
                }
            });
    } else {
        ui.strong("Clusters");
        ui.add(egui::DragValue::new(&mut state.clusters).range(2..=20));
    }

    ui.strong("Plot after training");
    let shown = state.plot.unwrap_or("none");
    egui::ComboBox::from_id_salt("train_plot")
        .selected_text(shown)
        .show_ui(ui, |ui: &mut Ui| {
            ui.selectable_value(&mut state.plot, None, "none");
            for &plot in state.task.allowed_plots() {
                ui.selectable_value(&mut state.plot, Some(plot), plot);
            }
        });

    ui.add_space(4.0);
    if ui.button("Train").clicked() {
        *action = Some(Action::Train);
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut DashboardState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open training data…").clicked() {
                ui.close_menu();
                if let Some(path) = pick_data_file("Open training data") {
                    state.open_training(&path);
                }
            }
        });

        ui.separator();

        if let Some(ds) = state.session.dataset() {
            ui.label(format!("{}: {} rows × {} columns", ds.name(), ds.n_rows(), ds.n_cols()));
            ui.separator();
        }
        ui.label(format!("state: {}", state.session.state()));

        if let Some(msg) = &state.status {
            ui.separator();
            let color = if state.status_is_error { Color32::RED } else { Color32::GRAY };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

fn pick_data_file(title: &str) -> Option<std::path::PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Supported files", SUPPORTED_EXTENSIONS)
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file()
}
