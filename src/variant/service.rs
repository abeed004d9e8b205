use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::{CacheArtifact, CacheStore, StagedFile};
use crate::error::{CacheError, TransformError, VariantError};
use crate::optimize::{JpegOptimizer, OptimizeFailurePolicy, Optimizer, Quality};
use crate::origin::{InFlightRegistry, OriginClient, OriginFetcher, DEFAULT_MAX_ORIGIN_BYTES};
use crate::request::{
    CachePath, ImageRequest, Operation, RequestNormalizer, DEFAULT_ALLOWED_EXTENSIONS,
};
use crate::transform::{ImageTransformer, TransformDispatcher, Transformer};

// =============================================================================
// Configuration
// =============================================================================

/// Explicit configuration for a [`VariantService`].
#[derive(Debug, Clone)]
pub struct VariantConfig {
    /// Root directory of the variant cache
    pub storage_root: PathBuf,

    /// Upstream base URL; the request path is appended to it
    pub upstream: String,

    /// Scratch directory for downloads and transform output.
    /// Defaults to staging next to the final cache path.
    pub temp_dir: Option<PathBuf>,

    /// Accepted file extensions, without dots
    pub allowed_extensions: Vec<String>,

    /// Behaviour when the optimizer fails
    pub optimize_failure: OptimizeFailurePolicy,

    /// Largest origin body accepted, in bytes
    pub max_origin_bytes: u64,
}

impl VariantConfig {
    pub fn new(storage_root: impl Into<PathBuf>, upstream: impl Into<String>) -> Self {
        Self {
            storage_root: storage_root.into(),
            upstream: upstream.into(),
            temp_dir: None,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            optimize_failure: OptimizeFailurePolicy::default(),
            max_origin_bytes: DEFAULT_MAX_ORIGIN_BYTES,
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_optimize_failure(mut self, policy: OptimizeFailurePolicy) -> Self {
        self.optimize_failure = policy;
        self
    }

    pub fn with_max_origin_bytes(mut self, max_bytes: u64) -> Self {
        self.max_origin_bytes = max_bytes;
        self
    }
}

// =============================================================================
// Variant Response
// =============================================================================

/// A served variant.
#[derive(Debug, Clone)]
pub struct VariantResponse {
    /// Image bytes
    pub data: Bytes,

    /// Stored provenance timestamp of the artifact
    pub last_modified: SystemTime,

    /// MIME type derived from the extension
    pub content_type: &'static str,

    /// Whether the artifact was already cached
    pub cache_hit: bool,

    /// Cache key the artifact lives under
    pub cache_path: CachePath,
}

// =============================================================================
// Variant Service
// =============================================================================

/// Orchestrates normalize → lookup → fetch → transform → optimize → publish.
///
/// # Type Parameters
///
/// * `C` - The origin client (HTTP in production, in-memory in tests)
pub struct VariantService<C: OriginClient> {
    normalizer: RequestNormalizer,
    store: CacheStore,
    fetcher: OriginFetcher<C>,
    dispatcher: Arc<TransformDispatcher>,
    optimizer: Arc<dyn Optimizer>,
    upstream: String,
    optimize_failure: OptimizeFailurePolicy,
}

impl<C: OriginClient> VariantService<C> {
    /// Create a service using the `image` backend and the builtin JPEG
    /// optimizer.
    pub fn new(config: VariantConfig, client: C) -> Self {
        let store = match &config.temp_dir {
            Some(dir) => CacheStore::new(&config.storage_root).with_temp_dir(dir),
            None => CacheStore::new(&config.storage_root),
        };

        Self {
            normalizer: RequestNormalizer::new(&config.allowed_extensions),
            store,
            fetcher: OriginFetcher::new(client).with_max_bytes(config.max_origin_bytes),
            dispatcher: Arc::new(TransformDispatcher::new(Arc::new(ImageTransformer::new()))),
            optimizer: Arc::new(JpegOptimizer::new()),
            upstream: config.upstream,
            optimize_failure: config.optimize_failure,
        }
    }

    /// Replace the image-processing backend.
    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.dispatcher = Arc::new(TransformDispatcher::new(transformer));
        self
    }

    /// Replace the optimizer.
    pub fn with_optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Share an in-flight registry with other services.
    pub fn with_in_flight(mut self, in_flight: Arc<InFlightRegistry>) -> Self {
        self.fetcher = self.fetcher.with_in_flight(in_flight);
        self
    }

    pub fn in_flight(&self) -> &Arc<InFlightRegistry> {
        self.fetcher.in_flight()
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn normalizer(&self) -> &RequestNormalizer {
        &self.normalizer
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Normalize a raw path and query, then serve the variant.
    ///
    /// # Errors
    ///
    /// [`VariantError::Validation`] for a rejected extension, before any
    /// fetch or cache write; otherwise whatever [`Self::get_variant`] returns.
    pub async fn serve(&self, path: &str, query: Option<&str>) -> Result<VariantResponse, VariantError> {
        let request = self.normalizer.normalize(path, query)?;
        self.get_variant(&request).await
    }

    /// Serve a normalized request from cache, computing it on a miss.
    ///
    /// On a miss the origin is fetched to a scratch file, transformed,
    /// optimized and published with a rename. Every scratch file is removed
    /// on every exit path; a failure leaves nothing at the cache path.
    ///
    /// # Errors
    ///
    /// - [`VariantError::Fetch`] if the origin could not be fetched, including
    ///   when another request is already fetching it
    /// - [`VariantError::Transform`] if the transform failed
    /// - [`VariantError::Optimize`] if optimization failed under
    ///   [`OptimizeFailurePolicy::Fail`]
    /// - [`VariantError::Cache`] on cache I/O failure
    pub async fn get_variant(&self, request: &ImageRequest) -> Result<VariantResponse, VariantError> {
        let key = request.cache_path();

        if let Some(cached) = self.store.load(key).await? {
            debug!(cache_path = %key, "cache hit");
            return Ok(VariantResponse {
                data: cached.data,
                last_modified: cached.artifact.modified,
                content_type: request.content_type(),
                cache_hit: true,
                cache_path: key.clone(),
            });
        }

        debug!(cache_path = %key, operation = request.operation().as_str(), "cache miss");

        let final_path = self.store.resolve(key);

        let origin = self.store.stage_scratch(&final_path, "src");
        let url = request.origin_url(&self.upstream);
        let fetched = self.fetcher.fetch(&url, origin.path()).await?;

        let output = match request.operation() {
            Operation::None => None,
            _ => Some(self.store.stage_scratch(&final_path, "out")),
        };

        let job = FinishJob {
            request: request.clone(),
            origin,
            output,
            final_path: final_path.clone(),
            modified: fetched.modified,
            dispatcher: Arc::clone(&self.dispatcher),
            optimizer: Arc::clone(&self.optimizer),
            optimize_failure: self.optimize_failure,
            store: self.store.clone(),
        };

        // The job owns every staged file from here on and runs to completion
        // even if this request is dropped.
        let (data, artifact) = tokio::spawn(job.run())
            .await
            .map_err(|e| CacheError::Io {
                path: final_path,
                message: e.to_string(),
            })??;

        info!(
            cache_path = %key,
            url = %url,
            bytes = artifact.len,
            "variant created"
        );

        Ok(VariantResponse {
            data,
            last_modified: artifact.modified,
            content_type: request.content_type(),
            cache_hit: false,
            cache_path: key.clone(),
        })
    }
}

// =============================================================================
// Finish Job
// =============================================================================

/// Transform, optimize and publish a fetched origin.
struct FinishJob {
    request: ImageRequest,
    origin: StagedFile,
    output: Option<StagedFile>,
    final_path: PathBuf,
    modified: SystemTime,
    dispatcher: Arc<TransformDispatcher>,
    optimizer: Arc<dyn Optimizer>,
    optimize_failure: OptimizeFailurePolicy,
    store: CacheStore,
}

impl FinishJob {
    async fn run(self) -> Result<(Bytes, CacheArtifact), VariantError> {
        let FinishJob {
            request,
            origin,
            output,
            final_path,
            modified,
            dispatcher,
            optimizer,
            optimize_failure,
            store,
        } = self;

        let staged = match output {
            Some(output) => transform(dispatcher, &request, &origin, output).await?,
            None => origin,
        };

        let quality = Quality::resolve(request.quality());
        if let Err(e) = optimizer.optimize(staged.path(), quality).await {
            match optimize_failure {
                OptimizeFailurePolicy::Tolerate => warn!(
                    cache_path = %request.cache_path(),
                    error = %e,
                    "optimizer failed, publishing unoptimized artifact"
                ),
                OptimizeFailurePolicy::Fail => return Err(e.into()),
            }
        }

        let data = tokio::fs::read(staged.path())
            .await
            .map_err(|e| CacheError::io(staged.path(), e))?;

        let artifact = store.publish(staged, &final_path, modified).await?;

        Ok((Bytes::from(data), artifact))
    }
}

/// Run the transform on the blocking pool, which holds the output guard
/// until the write has finished or failed.
async fn transform(
    dispatcher: Arc<TransformDispatcher>,
    request: &ImageRequest,
    source: &StagedFile,
    output: StagedFile,
) -> Result<StagedFile, TransformError> {
    let spec = request.transform_spec();
    let source = source.path().to_path_buf();

    tokio::task::spawn_blocking(move || {
        dispatcher.apply(&source, &spec, output.path())?;
        Ok::<_, TransformError>(output)
    })
    .await
    .map_err(|e| TransformError::Io(e.to_string()))?
}

// =============================================================================
// Tests
// =============================================================================
