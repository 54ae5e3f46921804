use clap::Parser;
use colored::*;
use std::{env, net::SocketAddr};
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use clinic_server::{create_app, ClinicConfig, ClinicServer};
use database_layer::DatabasePool;
use error_common::{ClinicError, Result};

/// Clinic Engine HTTP Server
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "Scheduling, billing and clinical records API for the clinic")]
struct Args {
    /// Server bind address, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Server port, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short, long, default_value = "clinic-server.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Apply database migrations before serving
    #[arg(long, env = "CLINIC_MIGRATE")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(args.verbose)?;

    let mut config = ClinicConfig::load(Some(&args.config))?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("🏥 {}", "Starting Clinic Engine HTTP Server".bright_cyan());
    info!("📋 Version: {}", env!("CARGO_PKG_VERSION").bright_white());
    info!(
        "🕒 Clinic UTC offset: {} minutes",
        config.clinic.utc_offset_minutes.to_string().bright_white()
    );

    if args.migrate {
        info!("🗄️  {}", "Applying database migrations...".bright_cyan());
        let database = DatabasePool::new(&config.database.url, config.database.max_connections)
            .await
            .map_err(|e| ClinicError::DatabaseError(e.to_string()))?;
        database
            .migrate()
            .await
            .map_err(|e| ClinicError::DatabaseError(format!("Migration failed: {}", e)))?;
        info!("✅ {}", "Migrations applied".bright_green());
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let server = ClinicServer::new(config).await?;
    let app = create_app(server);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| ClinicError::ConfigError(format!("Invalid bind address {}:{}: {}", host, port, e)))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ClinicError::NetworkError(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("🚀 {}", format!("Clinic Engine server running on http://{}", addr).bright_green());
    info!("📋 {}", format!("Health check available at: http://{}/health", addr).bright_blue());
    info!("📋 {}", format!("API v1 available at: http://{}/api/v1", addr).bright_blue());
    info!("📖 {}", format!("Swagger UI available at: http://{}/swagger-ui", addr).bright_blue());

    axum::serve(listener, app)
        .await
        .map_err(|e| ClinicError::ServerError(format!("HTTP server error: {}", e)))?;
    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let is_development = env::var("CLINIC_ENV").unwrap_or_else(|_| "development".to_string()) == "development";
    let use_colors = env::var("NO_COLOR").is_err() && atty::is(atty::Stream::Stdout);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "clinic_server={level},billing_service={level},database_layer={level},tower_http=info,sqlx=warn,hyper=info",
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if is_development && use_colors {
        let init = registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(true),
            )
            .try_init();
        print_startup_banner();
        init
    } else {
        // Structured JSON logging for production
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init()
    };

    result.map_err(|e| ClinicError::InternalError(format!("Failed to initialize tracing: {}", e)))
}

fn print_startup_banner() {
    println!("{}", "╔══════════════════════════════════════════════════════════════╗".bright_cyan());
    println!("{}", "║                      🏥 CLINIC ENGINE                        ║".bright_cyan());
    println!("{}", "║            Dermatology and podiatry clinic backend           ║".bright_cyan());
    println!("{}", "╚══════════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}
