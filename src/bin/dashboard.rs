use eframe::egui;
use tabflow::adapters;
use tabflow::config::Settings;
use tabflow::ui::DashboardApp;
use tabflow::workflow::Orchestrator;

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match Settings::load(None) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e:#}; falling back to default settings");
            Settings::default()
        }
    };
    let session = Orchestrator::new(adapters::default_ports(&settings), &settings);
    let clusters = settings.default_clusters;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "tabflow – model dashboard",
        options,
        Box::new(move |cc| {
            // Plots are shown from in-memory PNG bytes.
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(DashboardApp::new(session, clusters)))
        }),
    )
}
