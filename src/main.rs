mod app;
mod config;
mod context;
mod controller;
mod email;
mod error;
mod recipients;

use std::path::{Path, PathBuf};

use clap::Parser;
use eframe::egui;
use log::{error, info};

use crate::app::MailingListApp;
use crate::context::AppContext;
use crate::email::{Dispatcher, SmtpConnector};
use crate::error::Error;

const WINDOW_TITLE: &str = "Mailing List Tool";
const CONFIG_FILE: &str = "config.yaml";
const LOG_FILE: &str = "simple-mailinglist.log";

/// Compose one email and send it to a mailing list.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file [default: config.yaml next to the executable]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Copied to the config path on first run [default: <config>.template]
    #[arg(long)]
    template: Option<PathBuf>,

    /// Log file [default: simple-mailinglist.log next to the executable]
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let dir = program_dir();

    let log_file = cli.log_file.unwrap_or_else(|| dir.join(LOG_FILE));
    setup_logger(&log_file, cli.verbose)?;

    let config_path = cli.config.unwrap_or_else(|| dir.join(CONFIG_FILE));
    let template_path = cli.template.unwrap_or_else(|| {
        let mut path = config_path.clone().into_os_string();
        path.push(".template");
        PathBuf::from(path)
    });

    match crate::config::bootstrap(&config_path, &template_path) {
        Ok(()) => {}
        Err(Error::ConfigMissing { path }) => {
            error!("Could not find config file {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let context = AppContext::load(&config_path, Dispatcher::new(Box::new(SmtpConnector)))?;
    let app = MailingListApp::new(context);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([620.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(WINDOW_TITLE, options, Box::new(|_cc| Ok(Box::new(app))))?;

    info!("Exiting");
    Ok(())
}

fn program_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn setup_logger(log_file: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .chain(fern::log_file(log_file)?)
        .apply()?;
    Ok(())
}
