use actix_web::{
    App, HttpServer,
    dev::ServerHandle,
    web::{self, Data},
};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use seamless_ssid::{
    api::{self, Api},
    config::AppConfig,
    meraki_client::MerakiDashboardClient,
    services::{alert::AlertProcessor, device_registry::DeviceRegistry, profile_table::ProfileTable},
};
use std::io::Write;
use tokio::signal::unix::{SignalKind, signal};

type WebhookApi = Api<MerakiDashboardClient>;

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::load().context("failed to load configuration")?;
    config.log_summary();

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let (server_handle, server_task) = run_server(&config)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
        },
        result = server_task => {
            match result {
                Ok(Ok(())) => debug!("server stopped normally"),
                Ok(Err(e)) => error!("server stopped with error: {e}"),
                Err(e) => error!("server task panicked: {e}"),
            }
        },
    };

    info!("shutting down");
    server_handle.stop(true).await;
    info!("shutdown complete");

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

fn run_server(
    config: &AppConfig,
) -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    let client = MerakiDashboardClient::new(&config.dashboard)
        .context("failed to create dashboard client")?;

    let api = Data::new(WebhookApi::new(AlertProcessor::new(
        client,
        DeviceRegistry::new(&config.paths.device_registry),
        ProfileTable::new(&config.paths.profile_table),
        config.wireless.clone(),
    )));

    let port = config.server.port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(api.clone())
            .app_data(api::json_config())
            .route("/webhook", web::post().to(WebhookApi::webhook))
            .route("/healthcheck", web::get().to(WebhookApi::healthcheck))
            .route("/version", web::get().to(WebhookApi::version))
    })
    .bind(("0.0.0.0", port))
    .with_context(|| format!("failed to bind port {port}"))?
    .disable_signals()
    .run();

    info!("listening for webhooks on port {port}");

    Ok((server.handle(), tokio::spawn(server)))
}
