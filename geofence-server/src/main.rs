use std::time::Duration;

use clap::Parser;
use geofence_server::{config::Cli, web, ServerConfig};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let config = ServerConfig::try_from(&cli)?;
    log::info!(
        "Geofence server {} ({} shards, hysteresis {}m)",
        env!("CARGO_PKG_VERSION"),
        config.shards,
        config.engine.hysteresis_meters
    );

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("Webserver", move |subsys: SubsystemHandle| {
            web::run(subsys, config)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(1000))
    .await?;

    Ok(())
}
