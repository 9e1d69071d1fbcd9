//! Registry of visualization components.
//!
//! The catalog is built once at startup and shared read-only afterwards; it
//! is an explicit value handed to whoever needs it, never a global.

use crate::components;
use crate::data::Dataset;
use crate::error::{Result, VizError};
use crate::form::FormValues;
use crate::scene::Scene;
use crate::schema::{ParameterSpec, NONE_OPTION};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// Render entry point of a component.
pub trait Renderer: Send + Sync {
    fn render(&self, values: &FormValues, data: &Dataset) -> anyhow::Result<Scene>;
}

impl<F> Renderer for F
where
    F: Fn(&FormValues, &Dataset) -> anyhow::Result<Scene> + Send + Sync,
{
    fn render(&self, values: &FormValues, data: &Dataset) -> anyhow::Result<Scene> {
        self(values, data)
    }
}

/// A component: name, ordered parameter schema and render entry point.
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterSpec>,
    pub renderer: Arc<dyn Renderer>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, parameters: Vec<ParameterSpec>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            name: name.into(),
            parameters,
            renderer,
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.key == key)
    }

    pub fn render(&self, values: &FormValues, data: &Dataset) -> anyhow::Result<Scene> {
        self.renderer.render(values, data)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Ordered component registry. `list` returns registration order.
#[derive(Debug, Default)]
pub struct ComponentCatalog {
    components: Vec<Arc<ComponentDescriptor>>,
    index: HashMap<String, usize>,
}

impl ComponentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in component, in display order.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for descriptor in components::builtin_components() {
            // Built-in names are unique.
            if let Err(err) = catalog.register(descriptor) {
                tracing::error!(%err, "skipping built-in component");
            }
        }
        catalog
    }

    pub fn register(&mut self, descriptor: ComponentDescriptor) -> Result<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(VizError::DuplicateComponent {
                name: descriptor.name,
            });
        }
        let mut keys = HashSet::new();
        for param in &descriptor.parameters {
            if !keys.insert(param.key.as_str()) {
                return Err(VizError::Catalog {
                    reason: format!("component '{}' declares '{}' twice", descriptor.name, param.key),
                });
            }
            // `none` and "(none)" clear an input, so they cannot double as a choice.
            if let Some(choice) = param.choices.iter().find(|c| *c == "none" || *c == NONE_OPTION) {
                return Err(VizError::Catalog {
                    reason: format!(
                        "component '{}' parameter '{}' uses the reserved choice '{}'",
                        descriptor.name, param.key, choice
                    ),
                });
            }
        }
        tracing::debug!(component = %descriptor.name, parameters = descriptor.parameters.len(), "registered component");
        self.index.insert(descriptor.name.clone(), self.components.len());
        self.components.push(Arc::new(descriptor));
        Ok(())
    }

    pub fn list(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Result<Arc<ComponentDescriptor>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.components[i]))
            .ok_or_else(|| VizError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Load a catalog from JSON. Each entry names one of the built-in
    /// renderers by its strategy name.
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_reader(reader).map_err(|e| VizError::Catalog {
            reason: e.to_string(),
        })?;

        let mut catalog = Self::new();
        for entry in entries {
            let renderer = components::renderer_by_name(&entry.renderer).ok_or_else(|| VizError::Catalog {
                reason: format!("component '{}' uses unknown renderer '{}'", entry.name, entry.renderer),
            })?;
            catalog.register(ComponentDescriptor::new(entry.name, entry.parameters, renderer))?;
        }
        Ok(catalog)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    renderer: String,
    parameters: Vec<ParameterSpec>,
}
