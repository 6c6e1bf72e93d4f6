use drive_copy::app::DriveCopyApp;
use drive_copy::config::{self, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let Some(dirs) = config::project_dirs() else {
        return;
    };
    let logfile = tracing_appender::rolling::daily(dirs.data_local_dir().join("logs"), "log");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_env_filter(filter)
        .with_writer(logfile)
        .init();
}

fn main() -> eframe::Result<()> {
    init_logging();
    info!("starting application");

    let config = Config::load();
    let app = DriveCopyApp::new(config);
    let native_options = eframe::NativeOptions::default();
    let result = eframe::run_native(
        "Google Drive File Copy",
        native_options,
        Box::new(|_| Box::new(app)),
    );
    info!("closing application");
    result
}
