//! egui dashboard: an alternate front-end over the same orchestrator.

pub mod panels;
pub mod state;
pub mod views;

use eframe::egui;

use crate::workflow::Orchestrator;
use state::DashboardState;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct DashboardApp {
    pub state: DashboardState,
}

impl DashboardApp {
    pub fn new(session: Orchestrator, default_clusters: usize) -> Self {
        Self {
            state: DashboardState::new(session, default_clusters),
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: controls ----
        egui::SidePanel::left("control_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: data and results ----
        egui::CentralPanel::default().show(ctx, |ui| {
            views::central(ui, &self.state);
        });
    }
}
