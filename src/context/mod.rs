//! Context sources and the bundle model
//!
//! This module reads the project's `.asd` context tree, merges the
//! project → spec → task hierarchy and caches assembled bundles.

pub mod cache;
pub mod frontmatter;
pub mod inheritance;
pub mod models;
pub mod paths;
pub mod store;

pub use cache::{BundleCache, CacheKey, CacheStats};
pub use frontmatter::Document;
pub use inheritance::{merge_inheritance, LevelContext};
pub use models::{
    AgentDefinition, AutomationContext, BundleMetadata, ContextBundle, ContextDocument,
    ContextLayers, CriticalLayer, FilterMethod, FilteringReport, InheritedContext,
    PriorityTier, PrioritizedContent, ProcessLayer, ReadinessValidation, RelevanceScore,
    RequirementScore, TaskSpecificLayer, ValidationResult,
};
pub use paths::{ContextKind, ContextPaths};
pub use store::{ContextStore, ContextUpdate, DynamicContext, SemiDynamicContext, StaticContext};
