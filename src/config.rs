//! Configuration management.
//!
//! Settings come from command-line arguments via clap, with every option
//! also readable from a `VARIANT_`-prefixed environment variable.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use variant_cache::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `VARIANT_HOST` - Server bind address (default: 0.0.0.0)
//! - `VARIANT_PORT` - Server port (default: 8080)
//! - `VARIANT_STORAGE_PATH` - Cache root directory (required)
//! - `VARIANT_UPSTREAM` - Origin base URL (required)
//! - `VARIANT_TEMP_DIR` - Scratch directory (default: next to the cache path)
//! - `VARIANT_ALLOWED_EXTENSIONS` - Comma-separated allow-list (default: jpg,jpeg,png,webp)
//! - `VARIANT_PREFIX` - Route prefix for variant requests
//! - `VARIANT_OPTIMIZER` - `builtin`, `jpegoptim` or `none` (default: builtin)
//! - `VARIANT_OPTIMIZER_FAILURE` - `tolerate` or `fail` (default: tolerate)
//! - `VARIANT_FETCH_TIMEOUT` - Upstream timeout in seconds (default: 30)
//! - `VARIANT_MAX_ORIGIN_BYTES` - Largest accepted origin body (default: 100 MiB)
//! - `VARIANT_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)
//! - `VARIANT_CORS_ORIGINS` - Comma-separated CORS origins (default: any)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::optimize::OptimizeFailurePolicy;
use crate::origin::DEFAULT_MAX_ORIGIN_BYTES;
use crate::server::DEFAULT_CACHE_MAX_AGE;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default upstream timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default extension allow-list, as accepted on the command line.
pub const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png,webp";

/// Which optimizer to run after transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OptimizerKind {
    /// In-process JPEG re-encoding
    #[default]
    Builtin,

    /// External `jpegoptim` binary
    Jpegoptim,

    /// No optimization
    None,
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Variant Cache - on-demand image variants cached on disk.
///
/// Fetches originals from an upstream HTTP server, resizes or crops them
/// according to query parameters and serves every computed variant from a
/// local cache afterwards.
#[derive(Parser, Debug, Clone)]
#[command(name = "variant-cache")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "VARIANT_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "VARIANT_PORT")]
    pub port: u16,

    /// Path prefix for variant routes (e.g. "/images").
    #[arg(long, env = "VARIANT_PREFIX")]
    pub prefix: Option<String>,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Root directory of the variant cache.
    #[arg(long, env = "VARIANT_STORAGE_PATH")]
    pub storage_path: PathBuf,

    /// Scratch directory for downloads and transform output.
    ///
    /// If not specified, scratch files are staged next to their final path.
    #[arg(long, env = "VARIANT_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Accepted image extensions (comma-separated).
    #[arg(
        long,
        env = "VARIANT_ALLOWED_EXTENSIONS",
        value_delimiter = ',',
        default_value = DEFAULT_EXTENSIONS
    )]
    pub allowed_extensions: Vec<String>,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Base URL of the origin server; the request path is appended.
    #[arg(long, env = "VARIANT_UPSTREAM")]
    pub upstream: String,

    /// Upstream request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "VARIANT_FETCH_TIMEOUT")]
    pub fetch_timeout: u64,

    /// Largest origin body accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_ORIGIN_BYTES, env = "VARIANT_MAX_ORIGIN_BYTES")]
    pub max_origin_bytes: u64,

    // =========================================================================
    // Optimizer Configuration
    // =========================================================================
    /// Post-compression step.
    #[arg(long, value_enum, default_value_t = OptimizerKind::Builtin, env = "VARIANT_OPTIMIZER")]
    pub optimizer: OptimizerKind,

    /// What to do when the optimizer fails.
    #[arg(
        long,
        value_enum,
        default_value_t = OptimizeFailurePolicy::Tolerate,
        env = "VARIANT_OPTIMIZER_FAILURE"
    )]
    pub optimizer_failure: OptimizeFailurePolicy,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "VARIANT_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "VARIANT_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(
                "Storage path is required. Set --storage-path or VARIANT_STORAGE_PATH".to_string(),
            );
        }

        if self.upstream.trim().is_empty() {
            return Err("Upstream URL is required. Set --upstream or VARIANT_UPSTREAM".to_string());
        }

        match url::Url::parse(&self.upstream) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(format!(
                    "Upstream URL must use http or https, got {}",
                    url.scheme()
                ))
            }
            Err(e) => return Err(format!("Invalid upstream URL '{}': {}", self.upstream, e)),
        }

        if self.extensions().is_empty() {
            return Err("allowed_extensions must not be empty".to_string());
        }

        if self.fetch_timeout == 0 {
            return Err("fetch_timeout must be greater than 0".to_string());
        }

        if self.max_origin_bytes == 0 {
            return Err("max_origin_bytes must be greater than 0".to_string());
        }

        if let Some(prefix) = &self.prefix {
            if !prefix.starts_with('/') || prefix == "/" {
                return Err(format!(
                    "prefix must start with '/' and not be the root, got '{}'",
                    prefix
                ));
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upstream request timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    /// Non-blank, trimmed extensions.
    pub fn extensions(&self) -> Vec<String> {
        self.allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
