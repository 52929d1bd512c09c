mod config;
mod error;
mod extract;
mod routes;

use std::io;
use std::path::PathBuf;

use actix_web::{web, App, HttpResponse, HttpServer};
use clap::Parser;
use tracing::{info, warn};
use wirepool_core::InstanceManager;

use crate::config::Config;
use crate::extract::AccessList;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(distribute)]
    {
        fmt().json().with_env_filter(filter).init();
    }

    #[cfg(not(distribute))]
    {
        fmt().pretty().with_env_filter(filter).init();
    }
}

#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("GIT_VERSION"))]
#[command(about = "Hands out WireGuard client slots over HTTP")]
struct Args {
    /// Path to the configuration file (overrides WIREPOOL_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides BIND_ADDR)
    #[arg(short, long)]
    bind: Option<std::net::SocketAddr>,
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let env = Config::from_env().map_err(io::Error::other)?;
    let config_path = args.config.unwrap_or(env.config_path);
    let bind = args.bind.unwrap_or(env.bind_addr);

    let settings = wirepool_core::config::load(&config_path)
        .await
        .map_err(io::Error::other)?;
    info!(
        config = %config_path.display(),
        state_dir = %settings.state_dir.display(),
        conf_dir = %settings.conf_dir.display(),
        "starting wirepool-api"
    );

    let manager = InstanceManager::new(&settings);
    for def in &settings.instances {
        manager.ensure_instance(def).await.map_err(io::Error::other)?;
    }

    if settings.api.allowed_cidrs.is_empty() {
        warn!("api.allowed_cidrs is empty, every client request will be refused");
    }

    let manager_data = web::Data::new(manager);
    let access_data = web::Data::new(AccessList(settings.api.allowed_cidrs.clone()));

    info!(%bind, "listening");
    HttpServer::new(move || {
        App::new()
            .app_data(manager_data.clone())
            .app_data(access_data.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/health", web::get().to(health))
            .configure(routes::clients::configure)
    })
    .bind(bind)?
    .run()
    .await
}
