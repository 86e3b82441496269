//! Demo order API behind the logware pipeline.
//!
//! Tokens are opened with the base64 codec, audit records go to the log
//! under the `logware::audit` target, and transaction logs are posted to
//! `--saga-url` when one is given.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::Path;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use logware_core::{TokenPolicy, User};
use logware_server::adapters::{
    HttpTransactionClient, InMemoryUserDirectory, PlaintextCrypto, StaticLocalizer,
    TracingAuditSink,
};
use logware_server::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use logware_server::network::{NetworkConfig, NetworkModule};
use logware_server::{
    BusinessError, Caller, EndpointMetadata, EndpointRegistry, LogwareConfig, LogwareLayer,
};
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "logware-server")]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, env = "LOGWARE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "LOGWARE_PORT", default_value_t = 8080)]
    port: u16,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "LOGWARE_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Deadline for a single call, answered as a business failure when missed
    #[arg(long, env = "LOGWARE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Written to every audit record
    #[arg(long, env = "LOGWARE_APPLICATION_NAME", default_value = "logware")]
    application_name: String,

    /// Environment tokens must have been issued for
    #[arg(long, env = "ENVIRONMENT", default_value = "LOCAL")]
    environment: String,

    /// Status code of every business failure response
    #[arg(long, env = "LOGWARE_FAILURE_STATUS", default_value_t = 500)]
    failure_status: u16,

    #[arg(long, env = "LOGWARE_LOCALIZATION_DOMAIN", default_value = "CCP")]
    localization_domain: String,

    #[arg(long, env = "LOGWARE_MAX_BODY_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_body_bytes: usize,

    /// Base URL of the saga service; no transaction logs are sent without it
    #[arg(long, env = "LOGWARE_SAGA_URL")]
    saga_url: Option<String>,

    #[arg(long, env = "LOGWARE_SAGA_TIMEOUT_SECS", default_value_t = 30)]
    saga_timeout_secs: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: LogLevel,

    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Extra filter directives, e.g. `tower_http=debug`
    #[arg(long, env = "LOG_FILTER")]
    log_filter: Option<String>,
}

impl Args {
    fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            format: self.log_format,
            filter_directives: self.log_filter.clone(),
            ..LogConfig::default()
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            ..NetworkConfig::default()
        }
    }

    fn logware_config(&self) -> anyhow::Result<LogwareConfig> {
        let business_failure_status = StatusCode::from_u16(self.failure_status)
            .with_context(|| format!("invalid failure status {}", self.failure_status))?;

        Ok(LogwareConfig {
            application_name: self.application_name.clone(),
            business_failure_status,
            localization_domain: self.localization_domain.clone(),
            max_body_bytes: self.max_body_bytes,
            call_timeout: Duration::from_secs(self.request_timeout_secs),
            saga_timeout: Duration::from_secs(self.saga_timeout_secs),
            token: TokenPolicy::for_environment(&self.environment),
            ..LogwareConfig::default()
        })
    }
}

async fn create_order(Caller(ctx): Caller, Json(order): Json<Value>) -> Json<Value> {
    info!(user_code = ?ctx.user_code(), "order accepted");
    Json(json!({
        "OrderId": uuid::Uuid::new_v4().to_string(),
        "RequestId": ctx.request_id(),
        "Order": order,
    }))
}

async fn get_order(Path(id): Path<String>) -> Result<Json<Value>, BusinessError> {
    if id == "0" {
        return Err(BusinessError::new("OrderNotFound").with_code("ORD-404"));
    }
    Ok(Json(json!({ "OrderId": id, "Status": "Open" })))
}

fn endpoints() -> EndpointRegistry {
    EndpointRegistry::new()
        .register(
            Method::POST,
            "/orders",
            EndpointMetadata::action("CreateOrder").context_required(),
        )
        .register(
            Method::GET,
            "/orders/{id}",
            EndpointMetadata::action("GetOrder").no_context_required(),
        )
}

fn localizer(domain: &str) -> StaticLocalizer {
    let localizer = StaticLocalizer::new();
    localizer.insert(domain, "ContextIsEmpty", "The call context header is missing.");
    localizer.insert(domain, "TokenExpired", "The session has expired.");
    localizer.insert(domain, "OrderNotFound", "The order does not exist.");
    localizer.insert(domain, "UnexpectedError", "An unexpected error occurred.");
    localizer
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_config())?;

    let config = args.logware_config()?;
    let mut module = NetworkModule::new(args.network_config());

    let directory = InMemoryUserDirectory::new();
    directory.insert(User::new("A1", 100));

    let registry = endpoints();
    if registry.is_empty() {
        warn!("no endpoints registered, every call bypasses context generation");
    } else {
        info!(endpoints = registry.len(), "endpoints registered");
    }

    let mut builder = LogwareLayer::builder(Arc::new(PlaintextCrypto))
        .localizer(Arc::new(localizer(&config.localization_domain)))
        .audit_sink(Arc::new(TracingAuditSink))
        .directory(Arc::new(directory))
        .endpoints(Arc::new(registry))
        .shutdown(module.shutdown_controller());

    if let Some(url) = &args.saga_url {
        let client = HttpTransactionClient::new(url, config.saga_timeout)?;
        info!(url = %client.url(), "transaction logs enabled");
        builder = builder.transaction_client(Arc::new(client));
    }

    let logware = builder.config(config).build();

    let api = Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(get_order));
    let router = module.build_router(api, logware);

    module.start().await?;
    module
        .serve(router, async {
            // a failing signal handler simply means no graceful stop
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
