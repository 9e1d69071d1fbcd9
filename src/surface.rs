// Drawing surfaces: mount targets that execute a Scene

use crate::scene::{Axis, DrawCommand, Rgb, Scene};
use crate::OutputFormat;
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;

/// Identifies one mounted drawing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DrawingHandle(u64);

impl DrawingHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A drawing target. The dispatcher only talks to this trait, so the same
/// render path works for rasters, SVG and in-memory recording.
pub trait SurfaceAdapter {
    /// Remove every mounted output.
    fn clear(&mut self);

    /// Mount a fresh output owned by `owner`.
    fn mount(&mut self, owner: &str, width: u32, height: u32) -> Result<DrawingHandle>;

    /// Execute a scene into a mounted output.
    fn draw(&mut self, handle: DrawingHandle, scene: &Scene) -> Result<()>;

    /// Number of mounted outputs.
    fn output_count(&self) -> usize;

    /// Owner of each mounted output, in mount order.
    fn owners(&self) -> Vec<&str>;

    /// Encoded bytes of the most recent drawn output, if any.
    fn export(&self) -> Result<Option<Vec<u8>>>;
}

pub fn surface_for(format: &OutputFormat) -> Box<dyn SurfaceAdapter> {
    match format {
        OutputFormat::Png => Box::new(BitmapSurface::new()),
        OutputFormat::Svg => Box::new(SvgSurface::new()),
        OutputFormat::Scene => Box::new(RecordingSurface::new()),
    }
}

// =============================================================================
// Mount bookkeeping shared by the backends
// =============================================================================

#[derive(Debug)]
struct Mounted<T> {
    handle: DrawingHandle,
    owner: String,
    width: u32,
    height: u32,
    output: Option<T>,
}

#[derive(Debug)]
struct Mounts<T> {
    next_id: u64,
    entries: Vec<Mounted<T>>,
}

impl<T> Default for Mounts<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

impl<T> Mounts<T> {
    fn mount(&mut self, owner: &str, width: u32, height: u32) -> Result<DrawingHandle> {
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot mount a {}x{} surface", width, height);
        }
        let handle = DrawingHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(Mounted {
            handle,
            owner: owner.to_string(),
            width,
            height,
            output: None,
        });
        tracing::debug!(handle = handle.0, owner, width, height, "surface mounted");
        Ok(handle)
    }

    fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(outputs = self.entries.len(), "surface cleared");
        }
        self.entries.clear();
    }

    fn get_mut(&mut self, handle: DrawingHandle) -> Result<&mut Mounted<T>> {
        self.entries
            .iter_mut()
            .find(|m| m.handle == handle)
            .with_context(|| format!("Drawing handle {} is not mounted", handle.0))
    }

    fn owners(&self) -> Vec<&str> {
        self.entries.iter().map(|m| m.owner.as_str()).collect()
    }

    fn latest_output(&self) -> Option<(&Mounted<T>, &T)> {
        self.entries
            .iter()
            .rev()
            .find_map(|m| m.output.as_ref().map(|o| (m, o)))
    }
}

// =============================================================================
// Plotters execution
// =============================================================================

fn to_rgb(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

fn category_label(categories: &[String], value: f64) -> String {
    if value < 0.0 {
        return String::new();
    }
    categories.get(value as usize).cloned().unwrap_or_default()
}

fn range(axis: &Axis) -> std::ops::Range<f64> {
    axis.domain.0..axis.domain.1
}

/// Execute a scene onto any plotters drawing area.
fn paint<DB>(root: &DrawingArea<DB, Shift>, scene: &Scene) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    let mut builder = ChartBuilder::on(root);
    builder.margin(10);
    if scene.show_axes {
        builder.x_label_area_size(40).y_label_area_size(50);
    }
    let mut chart = builder
        .build_cartesian_2d(range(&scene.x_axis), range(&scene.y_axis))
        .context("Failed to build chart")?;

    if scene.show_axes {
        let x_categories = &scene.x_axis.categories;
        let y_categories = &scene.y_axis.categories;
        let x_formatter = |x: &f64| category_label(x_categories, *x);
        let y_formatter = |y: &f64| category_label(y_categories, *y);

        let mut mesh = chart.configure_mesh();
        if scene.x_axis.is_categorical() {
            mesh.x_labels(x_categories.len()).x_label_formatter(&x_formatter);
        }
        if scene.y_axis.is_categorical() {
            mesh.y_labels(y_categories.len()).y_label_formatter(&y_formatter);
        }
        if let Some(label) = &scene.x_axis.label {
            mesh.x_desc(label.as_str());
        }
        if let Some(label) = &scene.y_axis.label {
            mesh.y_desc(label.as_str());
        }
        mesh.draw().context("Failed to draw mesh")?;
    }

    let mut has_legend = false;
    for command in &scene.commands {
        match command {
            DrawCommand::Line { points, style, legend } => {
                let color = to_rgb(style.color).mix(style.alpha);
                let stroke = color.stroke_width(style.width.max(1.0) as u32);
                let anno = chart
                    .draw_series(LineSeries::new(points.iter().copied(), stroke))
                    .context("Failed to draw line series")?;
                if let Some(label) = legend {
                    has_legend = true;
                    anno.label(label.as_str())
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], stroke));
                }
            }
            DrawCommand::Points { points, style, legend } => {
                let color = to_rgb(style.color).mix(style.alpha);
                let size = style.size.max(1.0) as i32;
                let anno = chart
                    .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), size, color.filled())))
                    .context("Failed to draw point series")?;
                if let Some(label) = legend {
                    has_legend = true;
                    anno.label(label.as_str())
                        .legend(move |(x, y)| Circle::new((x + 10, y), size, color.filled()));
                }
            }
            DrawCommand::Rect { tl, br, style, legend } => {
                let color = to_rgb(style.fill).mix(style.alpha);
                let anno = chart
                    .draw_series(std::iter::once(Rectangle::new([*tl, *br], color.filled())))
                    .context("Failed to draw rectangle")?;
                if let Some(label) = legend {
                    has_legend = true;
                    anno.label(label.as_str())
                        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
                }
            }
        }
    }

    if has_legend {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .context("Failed to draw legend")?;
    }

    root.present().context("Failed to present drawing")?;
    Ok(())
}

// =============================================================================
// Backends
// =============================================================================

/// Raster surface. Outputs are RGB buffers, exported as PNG.
#[derive(Debug, Default)]
pub struct BitmapSurface {
    mounts: Mounts<Vec<u8>>,
}

impl BitmapSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SurfaceAdapter for BitmapSurface {
    fn clear(&mut self) {
        self.mounts.clear();
    }

    fn mount(&mut self, owner: &str, width: u32, height: u32) -> Result<DrawingHandle> {
        self.mounts.mount(owner, width, height)
    }

    fn draw(&mut self, handle: DrawingHandle, scene: &Scene) -> Result<()> {
        let mounted = self.mounts.get_mut(handle)?;
        let mut buffer = vec![0u8; (mounted.width * mounted.height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (mounted.width, mounted.height)).into_drawing_area();
            paint(&root, scene)?;
        }
        mounted.output = Some(buffer);
        Ok(())
    }

    fn output_count(&self) -> usize {
        self.mounts.entries.len()
    }

    fn owners(&self) -> Vec<&str> {
        self.mounts.owners()
    }

    fn export(&self) -> Result<Option<Vec<u8>>> {
        let Some((mounted, buffer)) = self.mounts.latest_output() else {
            return Ok(None);
        };
        let mut png_bytes = Vec::new();
        {
            let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
            encoder
                .write_image(buffer, mounted.width, mounted.height, image::ColorType::Rgb8)
                .context("Failed to encode PNG")?;
        }
        Ok(Some(png_bytes))
    }
}

/// Vector surface. Outputs are SVG documents.
#[derive(Debug, Default)]
pub struct SvgSurface {
    mounts: Mounts<String>,
}

impl SvgSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&str> {
        self.mounts.latest_output().map(|(_, svg)| svg.as_str())
    }
}

impl SurfaceAdapter for SvgSurface {
    fn clear(&mut self) {
        self.mounts.clear();
    }

    fn mount(&mut self, owner: &str, width: u32, height: u32) -> Result<DrawingHandle> {
        self.mounts.mount(owner, width, height)
    }

    fn draw(&mut self, handle: DrawingHandle, scene: &Scene) -> Result<()> {
        let mounted = self.mounts.get_mut(handle)?;
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (mounted.width, mounted.height)).into_drawing_area();
            paint(&root, scene)?;
        }
        mounted.output = Some(svg);
        Ok(())
    }

    fn output_count(&self) -> usize {
        self.mounts.entries.len()
    }

    fn owners(&self) -> Vec<&str> {
        self.mounts.owners()
    }

    fn export(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.document().map(|svg| svg.as_bytes().to_vec()))
    }
}

/// Keeps scenes instead of pixels. Exports the latest scene as JSON.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    mounts: Mounts<Scene>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scenes(&self) -> Vec<&Scene> {
        self.mounts.entries.iter().filter_map(|m| m.output.as_ref()).collect()
    }
}

impl SurfaceAdapter for RecordingSurface {
    fn clear(&mut self) {
        self.mounts.clear();
    }

    fn mount(&mut self, owner: &str, width: u32, height: u32) -> Result<DrawingHandle> {
        self.mounts.mount(owner, width, height)
    }

    fn draw(&mut self, handle: DrawingHandle, scene: &Scene) -> Result<()> {
        let mounted = self.mounts.get_mut(handle)?;
        mounted.output = Some(scene.clone());
        Ok(())
    }

    fn output_count(&self) -> usize {
        self.mounts.entries.len()
    }

    fn owners(&self) -> Vec<&str> {
        self.mounts.owners()
    }

    fn export(&self) -> Result<Option<Vec<u8>>> {
        self.mounts
            .latest_output()
            .map(|(_, scene)| serde_json::to_vec_pretty(scene).context("Failed to serialize scene"))
            .transpose()
    }
}
