//! Activity registry: maps activity type names to factories.

use crate::features::FeatureDescriptor;
use hataori_core::{Activity, ActivityKind};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Factory producing a fresh activity instance.
pub type ActivityFactory = Arc<dyn Fn() -> Box<dyn Activity> + Send + Sync>;

struct Registration {
    factory: ActivityFactory,
    feature_id: Option<String>,
}

/// Why an activity name could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No activity type is registered under this name.
    Unknown,
    /// The activity type belongs to a feature that is not enabled.
    FeatureDisabled { feature_id: String },
}

/// Catalog entry describing a registered activity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityDescriptor {
    pub name: String,
    pub category: String,
    pub description: String,
    pub kind: ActivityKind,
    pub feature_id: Option<String>,
}

/// Registry of activity factories.
///
/// Activities registered through [`register_for_feature`](Self::register_for_feature)
/// only resolve once their feature has been enabled; plain registrations
/// always resolve.
///
/// # Examples
///
/// ```
/// use hataori::ActivityRegistry;
/// # use hataori::prelude::*;
/// # use async_trait::async_trait;
/// # #[derive(Debug, Default)]
/// # struct Notify;
/// # #[async_trait]
/// # impl Activity for Notify {
/// #     fn name(&self) -> &str { "Notify" }
/// #     fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
/// #         outcomes(["Done"])
/// #     }
/// #     async fn execute(&self, _: &mut WorkflowContext, _: &mut ActivityContext)
/// #         -> Result<ActivityOutput, ActivityError> {
/// #         Ok(ActivityOutput::outcome("Done"))
/// #     }
/// # }
///
/// let registry = ActivityRegistry::new().register(Notify::default);
/// assert!(registry.contains("Notify"));
/// assert!(registry.resolve("Notify").is_ok());
/// ```
#[derive(Default)]
pub struct ActivityRegistry {
    registrations: HashMap<String, Registration>,
    enabled_features: HashSet<String>,
}

impl fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("activities", &self.registrations.keys().collect::<Vec<_>>())
            .field("enabled_features", &self.enabled_features)
            .finish()
    }
}

impl ActivityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an always-available activity type under the name its
    /// instances report.
    pub fn register<A, F>(self, factory: F) -> Self
    where
        A: Activity + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.insert(factory, None)
    }

    /// Registers an activity type provided by `feature_id`.
    pub fn register_for_feature<A, F>(self, feature_id: impl Into<String>, factory: F) -> Self
    where
        A: Activity + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.insert(factory, Some(feature_id.into()))
    }

    fn insert<A, F>(mut self, factory: F, feature_id: Option<String>) -> Self
    where
        A: Activity + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let name = factory().name().to_string();
        let factory: ActivityFactory = Arc::new(move || Box::new(factory()) as Box<dyn Activity>);
        self.registrations.insert(
            name,
            Registration {
                factory,
                feature_id,
            },
        );
        self
    }

    /// Enables one feature by id.
    pub fn enable_feature(mut self, feature_id: impl Into<String>) -> Self {
        self.enabled_features.insert(feature_id.into());
        self
    }

    /// Enables every feature in `features`.
    pub fn enable_features(mut self, features: &[FeatureDescriptor]) -> Self {
        self.enabled_features
            .extend(features.iter().map(|f| f.id.clone()));
        self
    }

    pub fn is_feature_enabled(&self, feature_id: &str) -> bool {
        self.enabled_features.contains(feature_id)
    }

    /// Returns `true` if a type is registered under `name`, enabled or not.
    pub fn contains(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    /// Materializes a fresh activity for `name`.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Activity>, ResolveError> {
        let registration = self.registrations.get(name).ok_or(ResolveError::Unknown)?;
        if let Some(feature_id) = &registration.feature_id {
            if !self.enabled_features.contains(feature_id) {
                return Err(ResolveError::FeatureDisabled {
                    feature_id: feature_id.clone(),
                });
            }
        }
        Ok((registration.factory)())
    }

    /// Describes every available activity type, sorted by category then name.
    pub fn descriptors(&self) -> Vec<ActivityDescriptor> {
        let mut descriptors: Vec<_> = self
            .registrations
            .iter()
            .filter(|(_, r)| {
                r.feature_id
                    .as_ref()
                    .map_or(true, |f| self.enabled_features.contains(f))
            })
            .map(|(name, r)| {
                let sample = (r.factory)();
                ActivityDescriptor {
                    name: name.clone(),
                    category: sample.category().to_string(),
                    description: sample.description().to_string(),
                    kind: sample.kind(),
                    feature_id: r.feature_id.clone(),
                }
            })
            .collect();
        descriptors.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        descriptors
    }

    /// Number of registered activity types.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
