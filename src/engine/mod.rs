//! Context injection engine
//!
//! Orchestrates a request through the pipeline
//! `INIT → LOAD_LAYERS → APPLY_INHERITANCE → FILTER → VALIDATE → CACHE → DONE`.
//! Failures of a single source degrade to empty content and a warning; only
//! request-level failures surface as [`ContextError::Injection`].

pub mod automation;
pub mod layers;
pub mod recommendations;

pub use automation::{validate_readiness, TaskInjectionRequest};
pub use recommendations::{Confidence, ContextPreview, TaskRecommendation};

use crate::collaborators::{DocumentLoader, FsDocumentLoader, TaskGatherer, TaskRouter};
use crate::config::{ContextConfig, FilterConfig, Settings};
use crate::context::cache::{BundleCache, CacheKey, CacheStats};
use crate::context::models::{
    BundleMetadata, ContextBundle, ContextLayers, FilteringReport, ValidationResult,
};
use crate::context::paths::{ContextKind, ContextPaths};
use crate::context::store::{ContextStore, ContextUpdate};
use crate::error::{ContextError, Result};
use crate::filter::RelevanceFilter;
use crate::metrics::METRICS;
use crate::validation::{ContextValidator, TOTAL_TIMING_KEY};
use chrono::Utc;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Pipeline stage of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionStage {
    Init,
    LoadLayers,
    ApplyInheritance,
    Filter,
    Validate,
    Cache,
    Done,
    Error,
    /// Task-context gathering of an automated request
    Gather,
}

impl InjectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionStage::Init => "INIT",
            InjectionStage::LoadLayers => "LOAD_LAYERS",
            InjectionStage::ApplyInheritance => "APPLY_INHERITANCE",
            InjectionStage::Filter => "FILTER",
            InjectionStage::Validate => "VALIDATE",
            InjectionStage::Cache => "CACHE",
            InjectionStage::Done => "DONE",
            InjectionStage::Error => "ERROR",
            InjectionStage::Gather => "GATHER",
        }
    }

    /// Key under which the stage duration lands in `metadata.performance`
    fn timing_key(&self) -> Option<&'static str> {
        match self {
            InjectionStage::LoadLayers => Some("loadLayers"),
            InjectionStage::ApplyInheritance => Some("applyInheritance"),
            InjectionStage::Filter => Some("filter"),
            InjectionStage::Validate => Some("validate"),
            InjectionStage::Cache => Some("cache"),
            InjectionStage::Gather => Some("gather"),
            _ => None,
        }
    }
}

impl fmt::Display for InjectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Build the request-level error for a failed stage
pub(crate) fn injection_error(
    stage: InjectionStage,
    started: Instant,
    cause: impl fmt::Display,
) -> ContextError {
    let error = ContextError::Injection {
        stage: stage.to_string(),
        elapsed_ms: started.elapsed().as_millis() as u64,
        cause: cause.to_string(),
    };
    error!(stage = %stage, "{}", error);
    error
}

/// Tracks the current stage and per-stage timings of one request
struct StageTracker {
    started: Instant,
    stage: InjectionStage,
    stage_started: Instant,
    timings: IndexMap<String, f64>,
}

impl StageTracker {
    fn new(started: Instant) -> Self {
        Self {
            started,
            stage: InjectionStage::Init,
            stage_started: started,
            timings: IndexMap::new(),
        }
    }

    fn enter(&mut self, stage: InjectionStage) {
        self.close();
        debug!(stage = %stage, "Entering stage");
        self.stage = stage;
        self.stage_started = Instant::now();
    }

    fn close(&mut self) {
        if let Some(key) = self.stage.timing_key() {
            let elapsed = elapsed_ms(self.stage_started);
            METRICS.record_stage(key, elapsed);
            self.timings.insert(key.to_string(), elapsed);
        }
    }

    fn fail(&mut self, cause: impl fmt::Display) -> ContextError {
        let error = injection_error(self.stage, self.started, cause);
        self.stage = InjectionStage::Error;
        error
    }

    fn performance(&self) -> IndexMap<String, f64> {
        let mut performance = self.timings.clone();
        performance.insert(TOTAL_TIMING_KEY.to_string(), elapsed_ms(self.started));
        performance
    }
}

/// Agent types become file names
fn is_valid_agent_type(agent_type: &str) -> bool {
    !agent_type.contains(['/', '\\']) && !agent_type.contains("..")
}

/// Composes, filters, validates and caches context bundles
pub struct ContextEngine {
    settings: Settings,
    paths: ContextPaths,
    store: ContextStore,
    loader: Arc<dyn DocumentLoader>,
    filter: RelevanceFilter,
    cache: BundleCache,
    gatherer: Option<Arc<dyn TaskGatherer>>,
    router: Option<Arc<dyn TaskRouter>>,
    config: OnceCell<ContextConfig>,
}

impl ContextEngine {
    /// Create an engine reading from `settings.project_root`
    pub fn new(settings: Settings) -> Self {
        let paths = ContextPaths::new(settings.project_root.clone());
        Self {
            store: ContextStore::new(paths.clone()),
            cache: BundleCache::new(settings.cache.ttl_ms, settings.cache.max_entries),
            paths,
            loader: Arc::new(FsDocumentLoader),
            filter: RelevanceFilter::new(),
            gatherer: None,
            router: None,
            config: OnceCell::new(),
            settings,
        }
    }

    /// Engine with default settings for a project root
    pub fn for_project(root: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Settings::for_project(root))
    }

    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_gatherer(mut self, gatherer: Arc<dyn TaskGatherer>) -> Self {
        self.gatherer = Some(gatherer);
        self
    }

    pub fn with_router(mut self, router: Arc<dyn TaskRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn paths(&self) -> &ContextPaths {
        &self.paths
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Project context configuration, read on first use.
    ///
    /// A malformed file is logged and replaced by defaults.
    pub async fn context_config(&self) -> &ContextConfig {
        self.config
            .get_or_init(|| async {
                let path = self.paths.context_config();
                match ContextConfig::load(&path).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Using default context config: {}", e);
                        ContextConfig::default()
                    }
                }
            })
            .await
    }

    /// Assemble the context bundle for an agent.
    ///
    /// With `use_cache` a live cached bundle for the same
    /// `(agent_type, spec_id, task_id)` is returned as is, and a freshly
    /// built bundle is stored.
    pub async fn inject_context(
        &self,
        agent_type: &str,
        spec_id: Option<&str>,
        task_id: Option<&str>,
        use_cache: bool,
    ) -> Result<ContextBundle> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "inject_context",
            %request_id,
            agent_type,
            spec_id = spec_id.unwrap_or("none"),
            task_id = task_id.unwrap_or("none")
        );

        let outcome = self
            .run_pipeline(request_id, agent_type, spec_id, task_id, use_cache, started)
            .instrument(span)
            .await;
        METRICS.record_injection(outcome.is_ok(), elapsed_ms(started));
        outcome
    }

    async fn run_pipeline(
        &self,
        request_id: Uuid,
        agent_type: &str,
        spec_id: Option<&str>,
        task_id: Option<&str>,
        use_cache: bool,
        started: Instant,
    ) -> Result<ContextBundle> {
        let mut tracker = StageTracker::new(started);

        let agent_type = agent_type.trim();
        if agent_type.is_empty() {
            return Err(tracker.fail("Agent type is required"));
        }
        if !is_valid_agent_type(agent_type) {
            return Err(tracker.fail(format!("Invalid agent type: {agent_type:?}")));
        }

        let caching = use_cache && self.settings.cache.enabled;
        let cache_key = CacheKey::new(agent_type, spec_id, task_id);
        if caching {
            let cached = self.cache.get(&cache_key);
            METRICS.record_cache_lookup(cached.is_some());
            if let Some(bundle) = cached {
                info!(key = %cache_key, "Returning cached context");
                return Ok(bundle);
            }
        }

        let config = self.context_config().await;

        tracker.enter(InjectionStage::LoadLayers);
        let loaded = self.load_layers(agent_type, spec_id, task_id).await;

        tracker.enter(InjectionStage::ApplyInheritance);
        let (inheritance, inheritance_warnings) = self
            .store
            .apply_inheritance(spec_id, task_id, config.inheritance.enabled)
            .await;

        tracker.enter(InjectionStage::Filter);
        let filtering = self.filter_layers(&loaded.layers, config).await;

        tracker.enter(InjectionStage::Validate);
        let mut performance = loaded.timings;
        performance.extend(tracker.performance());
        let mut bundle = ContextBundle {
            metadata: BundleMetadata {
                request_id,
                agent_type: agent_type.to_string(),
                spec_id: spec_id.map(str::to_string),
                task_id: task_id.map(str::to_string),
                injection_time: Utc::now(),
                performance,
            },
            layers: loaded.layers,
            inheritance,
            filtering,
            validation: ValidationResult::new(),
            automation: None,
        };

        let mut validation = ContextValidator::with_targets(config.performance.clone())
            .validate_injected_context(&bundle);
        validation.warnings.extend(loaded.warnings);
        validation.warnings.extend(inheritance_warnings);
        METRICS.record_validation(validation.is_valid, validation.warnings.len());
        if !validation.is_valid {
            warn!(errors = ?validation.errors, "Injected context failed validation");
        }
        bundle.validation = validation;

        if caching {
            tracker.enter(InjectionStage::Cache);
            bundle.metadata.performance.extend(tracker.performance());
            self.cache.store(cache_key, bundle.clone());
        }

        tracker.enter(InjectionStage::Done);
        bundle.metadata.performance.extend(tracker.performance());

        let total = bundle
            .metadata
            .performance
            .get(TOTAL_TIMING_KEY)
            .copied()
            .unwrap_or_default();
        if total > config.performance.target_ms {
            warn!(
                elapsed_ms = total,
                "Context injection exceeded the {}ms target", config.performance.target_ms
            );
        }
        info!(
            elapsed_ms = total,
            is_valid = bundle.validation.is_valid,
            "Injected context"
        );
        Ok(bundle)
    }

    /// Advanced filtering with fallback to the basic filter on any failure
    async fn filter_layers(&self, layers: &ContextLayers, config: &ContextConfig) -> FilteringReport {
        let agent = &layers.agent_specific;
        if !config.filtering.advanced {
            debug!("Advanced filtering disabled");
            return self.filter.basic_filter(layers, agent);
        }

        let outcome = match FilterConfig::load(&self.paths.agent_capabilities()).await {
            Ok(filter_config) => self.filter.filter_context_for_agent(layers, agent, &filter_config),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => report,
            Err(e) => {
                warn!("Advanced filtering failed, using basic filter: {}", e);
                METRICS.record_filter_fallback();
                self.filter.basic_filter(layers, agent)
            }
        }
    }

    /// Update a context document and drop cached bundles built from the old one
    pub async fn update_context(&self, kind: ContextKind, id: &str, update: ContextUpdate) -> bool {
        let updated = self.store.update_context(kind, id, update).await;
        if updated {
            self.clear_cache();
        }
        updated
    }

    /// Remove every cached bundle
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Context cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
