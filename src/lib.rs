//! Layered context composition for development agents
//!
//! The [`ContextEngine`] assembles critical, task-specific, agent-specific
//! and process context from a project's `.asd` directory, merges the
//! project → spec → task hierarchy, scores the result against the agent's
//! requirements, validates it and caches it.

pub mod collaborators;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod metrics;
pub mod validation;

pub use collaborators::{
    DocumentLoader, FsDocumentLoader, GatherRequest, TaskCandidate, TaskGatherer, TaskRouter,
};
pub use config::{ContextConfig, FilterConfig, Settings};
pub use context::{
    AgentDefinition, CacheStats, ContextBundle, ContextKind, ContextLayers, ContextUpdate,
    Document, InheritedContext, RelevanceScore, ValidationResult,
};
pub use engine::{ContextEngine, InjectionStage, TaskInjectionRequest, TaskRecommendation};
pub use error::{ContextError, Result};
pub use filter::{ContentType, RelevanceFilter};
pub use validation::{ContextValidator, SchemaType};
