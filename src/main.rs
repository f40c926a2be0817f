use axum_server::tls_rustls::RustlsConfig;
use simple_merge_deploy::deploy::Deployer;
use simple_merge_deploy::error::DeployError;
use simple_merge_deploy::handlers::build_router;
use simple_merge_deploy::runner::ProcessRunner;
use simple_merge_deploy::{AppState, DeployConfig};
use std::fs;
use std::sync::Arc;
use tracing::{self, info};

const DEFAULT_CONFIG_PATH: &str = "deploy_config.toml";

/// Load and parse the configuration file
fn load_config(path: &str) -> Result<DeployConfig, DeployError> {
    let config_str = fs::read_to_string(path).map_err(|e| {
        DeployError::ConfigError(format!("Failed to read config file '{}': {}", path, e))
    })?;

    let config: DeployConfig = toml::from_str(&config_str).map_err(|e| {
        DeployError::ConfigError(format!("Failed to parse config file '{}': {}", path, e))
    })?;

    Ok(config)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("DEPLOY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config: DeployConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt::init();

    let deployer = Deployer::new(config.clone(), Arc::new(ProcessRunner));
    let state = Arc::new(AppState { config, deployer });

    let app = build_router(state.clone());
    let addr = state.config.listen_addr().to_string();
    info!("Listening on {}", addr);
    info!("Using config at {:?}", config_path);

    if state.config.use_ssl() {
        let (crt, key) = match state.config.tls_paths() {
            Ok(paths) => paths,
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        };
        let tls = RustlsConfig::from_pem_file(crt, key).await.unwrap();
        axum_server::bind_rustls(addr.parse().unwrap(), tls)
            .serve(app.into_make_service())
            .await
            .unwrap();
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    }
}
