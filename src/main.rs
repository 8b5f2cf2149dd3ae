mod agent;
mod app;
mod canvas;
mod config;
mod event;
mod theme;
mod ui;

use agent::AgentLink;
use app::CanvasApp;
use clap::Parser;
use config::CanvasConfig;
use eframe::egui;
use std::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &CanvasConfig) {
    // stdout carries the agent protocol.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CanvasConfig::parse();
    init_tracing(&config);
    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("coagent-canvas-link")
        .build()?;

    let link = runtime.block_on(async move { AgentLink::new(tx) })?;
    link.start()?;
    info!(
        widget_width = config.widget_width,
        theme_color = %config.theme_color,
        "canvas starting"
    );

    let app = CanvasApp::new(rx, link, &config);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("CoAgent Canvas")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "CoAgent Canvas",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(app))),
    )?;

    Ok(())
}
