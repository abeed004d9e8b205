//! Variant Cache - on-demand image variants cached on disk.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use variant_cache::{
    config::{Config, OptimizerKind},
    optimize::{JpegOptimizer, JpegoptimOptimizer, NoopOptimizer, OptimizeFailurePolicy, Optimizer},
    origin::HttpOrigin,
    server::{create_router, RouterConfig},
    variant::{VariantConfig, VariantService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("variant-cache v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Storage path: {}", config.storage_path.display());
    if let Some(ref temp_dir) = config.temp_dir {
        info!("  Temp dir: {}", temp_dir.display());
    }
    info!("  Upstream: {}", config.upstream);
    info!("  Fetch timeout: {}s", config.fetch_timeout);
    info!("  Extensions: {}", config.extensions().join(", "));
    info!("  Optimizer: {:?} (on failure: {:?})", config.optimizer, config.optimizer_failure);
    if let Some(ref prefix) = config.prefix {
        info!("  Prefix: {}", prefix);
    }
    if config.optimizer == OptimizerKind::None
        && config.optimizer_failure == OptimizeFailurePolicy::Fail
    {
        warn!("  --optimizer-failure=fail has no effect without an optimizer");
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.storage_path).await {
        error!(
            "Failed to create storage path {}: {}",
            config.storage_path.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let origin = match HttpOrigin::new(config.fetch_timeout()) {
        Ok(origin) => origin,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = VariantService::new(build_variant_config(&config), origin)
        .with_optimizer(build_optimizer(config.optimizer));

    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl -o out.jpg 'http://{}{}/<path>.jpg?w=320&op=t16x9'",
        addr,
        config.prefix.as_deref().unwrap_or("")
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "variant_cache=debug,tower_http=debug"
    } else {
        "variant_cache=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_variant_config(config: &Config) -> VariantConfig {
    let mut variant_config = VariantConfig::new(&config.storage_path, &config.upstream)
        .with_allowed_extensions(config.extensions())
        .with_optimize_failure(config.optimizer_failure)
        .with_max_origin_bytes(config.max_origin_bytes);

    if let Some(ref temp_dir) = config.temp_dir {
        variant_config = variant_config.with_temp_dir(temp_dir);
    }

    variant_config
}

fn build_optimizer(kind: OptimizerKind) -> Arc<dyn Optimizer> {
    match kind {
        OptimizerKind::Builtin => Arc::new(JpegOptimizer::new()),
        OptimizerKind::Jpegoptim => Arc::new(JpegoptimOptimizer::new()),
        OptimizerKind::None => Arc::new(NoopOptimizer),
    }
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref prefix) = config.prefix {
        router_config = router_config.with_prefix(prefix);
    }

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
