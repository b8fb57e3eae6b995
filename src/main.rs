/// Socialgram Server - social graph, photo and chat backend
///
/// Main server entry point. Handles:
/// - Command-line argument parsing
/// - Database initialization
/// - HTTP server startup
use actix_web::web;
use anyhow::Context;
use socialgram_server::config::Config;
use socialgram_server::{db, server};
use std::fs;
use std::process;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let config = Config::from_args();

    log::info!("Starting Socialgram Server");
    log::info!("Database: {:?}", config.database);
    log::info!("Port: {}", config.port);
    log::info!(
        "Minimum age: {}, session lifetime: {}h, strict empty lists: {}",
        config.min_age,
        config.session_ttl_hours,
        config.strict_empty_lists
    );

    // Write PID file if specified
    if let Some(pidfile) = &config.pidfile {
        let pid = process::id().to_string();
        fs::write(pidfile, pid)
            .with_context(|| format!("Failed to write PID file {:?}", pidfile))?;
        log::info!("PID file written to: {:?}", pidfile);
    }

    let db_path = config
        .database
        .to_str()
        .context("Database path is not valid UTF-8")?;
    let pool = db::create_pool(db_path).context("Failed to create database pool")?;

    log::info!("Database initialized");

    let pool_data = web::Data::new(pool);
    let settings = web::Data::new(config.service_settings());

    let bind_addr = format!("127.0.0.1:{}", config.port);
    log::info!("Starting HTTP server on {}", bind_addr);

    let http_server = server::create_http_server(pool_data, settings, &bind_addr)
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    http_server.await.context("HTTP server terminated with an error")?;
    Ok(())
}
