//! Feature manifests: which modules provide which activity types.
//!
//! A module manifest either lists its features explicitly or is itself a
//! single feature. The descriptors produced here feed
//! [`ActivityRegistry::enable_features`](crate::ActivityRegistry::enable_features).

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A module manifest as authored next to the module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleManifest {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Integer priority, kept as authored.
    pub priority: Option<String>,
    /// Comma-separated feature ids.
    pub dependencies: String,
    pub features: Vec<FeatureManifest>,
}

/// One feature entry inside a module manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureManifest {
    pub id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub dependencies: String,
}

/// A resolved feature: `(id, dependencies, priority)` plus display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub id: String,
    pub name: String,
    pub priority: i32,
    pub category: Option<String>,
    pub description: Option<String>,
    pub extension_id: String,
    pub dependencies: Vec<String>,
}

/// Mutable view of a feature while it is being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureBuildingContext {
    pub feature_id: String,
    pub feature_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub extension_id: String,
    pub priority: i32,
    pub dependencies: Vec<String>,
}

impl FeatureBuildingContext {
    fn into_descriptor(self) -> FeatureDescriptor {
        FeatureDescriptor {
            id: self.feature_id,
            name: self.feature_name,
            priority: self.priority,
            category: self.category,
            description: self.description,
            extension_id: self.extension_id,
            dependencies: self.dependencies,
        }
    }
}

/// Observer of feature construction.
pub trait FeatureBuilderEvents: Send + Sync {
    /// Called before the descriptor is created; may rewrite any field.
    fn building(&self, _context: &mut FeatureBuildingContext) {}

    /// Called with each finished descriptor.
    fn built(&self, _feature: &FeatureDescriptor) {}
}

/// Builds feature descriptors from module manifests.
#[derive(Default)]
pub struct FeaturesProvider {
    events: Vec<Box<dyn FeatureBuilderEvents>>,
}

impl std::fmt::Debug for FeaturesProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeaturesProvider")
            .field("events", &self.events.len())
            .finish()
    }
}

impl FeaturesProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer.
    pub fn with_events(mut self, events: impl FeatureBuilderEvents + 'static) -> Self {
        self.events.push(Box::new(events));
        self
    }

    /// Returns the features of `manifest`.
    ///
    /// A manifest without feature entries yields one feature named after
    /// the module itself.
    pub fn features(&self, manifest: &ModuleManifest) -> Vec<FeatureDescriptor> {
        if manifest.features.is_empty() {
            let context = FeatureBuildingContext {
                feature_id: manifest.id.clone(),
                feature_name: manifest.name.clone(),
                category: manifest.category.clone(),
                description: manifest.description.clone(),
                extension_id: manifest.id.clone(),
                priority: parse_priority(manifest.priority.as_deref()),
                dependencies: split_dependencies(&manifest.dependencies),
            };
            return vec![self.build(context)];
        }

        manifest
            .features
            .iter()
            .map(|feature| {
                let priority = feature
                    .priority
                    .as_deref()
                    .or(manifest.priority.as_deref());
                let context = FeatureBuildingContext {
                    feature_id: feature.id.clone(),
                    feature_name: feature.name.clone().unwrap_or_else(|| feature.id.clone()),
                    category: feature.category.clone().or_else(|| manifest.category.clone()),
                    description: feature
                        .description
                        .clone()
                        .or_else(|| manifest.description.clone()),
                    extension_id: manifest.id.clone(),
                    priority: parse_priority(priority),
                    dependencies: split_dependencies(&feature.dependencies),
                };
                self.build(context)
            })
            .collect()
    }

    fn build(&self, mut context: FeatureBuildingContext) -> FeatureDescriptor {
        for events in &self.events {
            events.building(&mut context);
        }
        let descriptor = context.into_descriptor();
        for events in &self.events {
            events.built(&descriptor);
        }
        debug!(
            feature_id = %descriptor.id,
            priority = descriptor.priority,
            "Feature built"
        );
        descriptor
    }
}

/// Shorthand for [`FeaturesProvider::features`] without observers.
pub fn features_from_manifest(manifest: &ModuleManifest) -> Vec<FeatureDescriptor> {
    FeaturesProvider::new().features(manifest)
}

fn split_dependencies(dependencies: &str) -> Vec<String> {
    dependencies
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_priority(priority: Option<&str>) -> i32 {
    priority.and_then(|p| p.parse().ok()).unwrap_or(0)
}
