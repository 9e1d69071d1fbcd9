//! Visualization dispatch.
//!
//! Rendering is split into `begin` and `finish` so that a render entry point
//! can run elsewhere (another task, another thread) while new commands keep
//! arriving. Every `begin` bumps a generation counter; `finish` only touches
//! the surface when the completion belongs to the latest generation.

use crate::catalog::ComponentDescriptor;
use crate::data::Dataset;
use crate::error::{Result, VizError};
use crate::form::FormValues;
use crate::scene::Scene;
use crate::surface::{DrawingHandle, SurfaceAdapter};
use anyhow::anyhow;
use serde::Serialize;
use std::sync::Arc;

/// A component plus the form snapshot to render it with. Consumed once.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub component: Arc<ComponentDescriptor>,
    pub values: FormValues,
}

impl RenderRequest {
    pub fn new(component: Arc<ComponentDescriptor>, values: FormValues) -> Self {
        Self { component, values }
    }

    fn missing_required(&self) -> Vec<&str> {
        self.component
            .parameters
            .iter()
            .filter(|p| p.required && self.values.get(&p.key).is_none())
            .map(|p| p.key.as_str())
            .collect()
    }
}

/// An in-flight render stamped with its generation.
#[derive(Debug)]
pub struct PendingRender {
    generation: u64,
    request: RenderRequest,
}

impl PendingRender {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn component(&self) -> &str {
        &self.request.component.name
    }

    /// Invoke the component's render entry point.
    pub fn run(&self, data: &Dataset) -> anyhow::Result<Scene> {
        tracing::debug!(component = self.component(), generation = self.generation, "render started");
        self.request.component.render(&self.request.values, data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RenderOutcome {
    /// The surface now holds exactly this output.
    Rendered {
        component: String,
        generation: u64,
        handle: DrawingHandle,
    },
    /// A newer render or a component switch superseded this one.
    Stale { generation: u64, latest: u64 },
}

impl RenderOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    generation: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the most recent `begin` or `invalidate`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Supersede every in-flight render.
    pub fn invalidate(&mut self) -> u64 {
        self.generation += 1;
        tracing::debug!(generation = self.generation, "renders invalidated");
        self.generation
    }

    /// Tear down the surface and stamp a new render.
    pub fn begin(&mut self, request: RenderRequest, surface: &mut dyn SurfaceAdapter) -> Result<PendingRender> {
        let generation = self.invalidate();
        surface.clear();

        let missing = request.missing_required();
        if !missing.is_empty() {
            return Err(VizError::render(
                &request.component.name,
                anyhow!("missing required values: {}", missing.join(", ")),
            ));
        }

        Ok(PendingRender { generation, request })
    }

    /// Apply a completed render. Stale completions leave the surface alone
    /// and are not errors.
    pub fn finish(
        &mut self,
        pending: PendingRender,
        result: anyhow::Result<Scene>,
        surface: &mut dyn SurfaceAdapter,
    ) -> Result<RenderOutcome> {
        if pending.generation != self.generation {
            tracing::warn!(
                component = pending.component(),
                generation = pending.generation,
                latest = self.generation,
                "discarding stale render"
            );
            return Ok(RenderOutcome::Stale {
                generation: pending.generation,
                latest: self.generation,
            });
        }

        let component = pending.component().to_string();
        let drawn = result.and_then(|scene| {
            surface.clear();
            let handle = surface.mount(&component, scene.width, scene.height)?;
            surface.draw(handle, &scene)?;
            Ok(handle)
        });

        match drawn {
            Ok(handle) => {
                tracing::info!(component = %component, generation = pending.generation, "rendered");
                Ok(RenderOutcome::Rendered {
                    component,
                    generation: pending.generation,
                    handle,
                })
            }
            Err(source) => {
                surface.clear();
                Err(VizError::render(&component, source))
            }
        }
    }

    /// Synchronous `begin` + run + `finish`.
    pub fn render(
        &mut self,
        request: RenderRequest,
        data: &Dataset,
        surface: &mut dyn SurfaceAdapter,
    ) -> Result<RenderOutcome> {
        let pending = self.begin(request, surface)?;
        let result = pending.run(data);
        self.finish(pending, result, surface)
    }
}
