// Built-in components: parameter schemas and render entry points

use crate::catalog::{ComponentDescriptor, Renderer};
use crate::data::Dataset;
use crate::form::FormValues;
use crate::scale::{continuous_domain, min_max, normalize, zero_based_domain};
use crate::scene::{
    category_color, diverging_color, parse_color, Axis, DrawCommand, HoverRegion, LineStyle, PointStyle,
    RectStyle, Scene, STEEL_BLUE,
};
use crate::schema::{ColumnType, ParameterSpec, Value};
use crate::transform::{aggregate_by_category, box_stats, group_rows, histogram, numeric_column, numeric_pairs, parse_finite};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

const DEFAULT_WIDTH: f64 = 800.0;
const DEFAULT_HEIGHT: f64 = 600.0;
const MAX_DIMENSION: f64 = 8192.0;

type RenderFn = fn(&FormValues, &Dataset) -> Result<Scene>;

/// Renderer strategy names accepted in catalog files.
pub const RENDERERS: [&str; 6] = ["bar", "line", "scatter", "histogram", "box", "heatmap"];

pub fn renderer_by_name(name: &str) -> Option<Arc<dyn Renderer>> {
    let renderer: Arc<dyn Renderer> = match name {
        "bar" => Arc::new(render_bars),
        "line" => Arc::new(render_lines),
        "scatter" => Arc::new(render_scatter),
        "histogram" => Arc::new(render_histogram),
        "box" => Arc::new(render_boxes),
        "heatmap" => Arc::new(render_heatmap),
        _ => return None,
    };
    Some(renderer)
}

// =============================================================================
// Catalog
// =============================================================================

const NUMERIC: &[ColumnType] = &[ColumnType::Numeric];
const DISCRETE: &[ColumnType] = &[ColumnType::Categorical, ColumnType::Identifier];
const LABELS: &[ColumnType] = &[ColumnType::Identifier, ColumnType::Categorical];

fn sized(mut params: Vec<ParameterSpec>) -> Vec<ParameterSpec> {
    let mut all = vec![
        ParameterSpec::size("width", "Width", DEFAULT_WIDTH),
        ParameterSpec::size("height", "Height", DEFAULT_HEIGHT),
    ];
    all.append(&mut params);
    all
}

fn flag(key: &str, label: &str, default: bool) -> ParameterSpec {
    ParameterSpec::literal(key, label)
        .required()
        .with_choices(&["true", "false"])
        .with_default(Value::from(if default { "true" } else { "false" }))
}

fn position(default: &str) -> ParameterSpec {
    ParameterSpec::literal("position", "Position")
        .required()
        .with_choices(&["dodge", "stack"])
        .with_default(Value::from(default))
}

fn bar_params(position_default: &str) -> Vec<ParameterSpec> {
    let mut params = sized(vec![
        ParameterSpec::dimension("x", "x").required(),
        ParameterSpec::dimension("y", "y").required().filter(NUMERIC),
        ParameterSpec::dimension("color", "color"),
        ParameterSpec::dimension("hover", "hover"),
    ]);
    params.push(position(position_default));
    params
}

fn xy_params(extra: Vec<ParameterSpec>) -> Vec<ParameterSpec> {
    let mut params = sized(vec![
        ParameterSpec::dimension("x", "x").required().filter(NUMERIC),
        ParameterSpec::dimension("y", "y").required().filter(NUMERIC),
        ParameterSpec::dimension("color", "color"),
    ]);
    params.extend(extra);
    params
}

fn heatmap_params(id_label: &str) -> Vec<ParameterSpec> {
    sized(vec![
        ParameterSpec::dimension("idColumn", id_label).filter(LABELS),
        ParameterSpec::scale("scale", "Color scale")
            .required()
            .with_choices(&["row", "column", "global"])
            .with_default(Value::from("row")),
        ParameterSpec::literal("threshold", "Threshold")
            .required()
            .with_choices(&["off", "absolute", "greater", "less"])
            .with_default(Value::from("off")),
        ParameterSpec::literal("thresholdValue", "Threshold value").with_default(Value::Number(0.0)),
        flag("removeEmpty", "Remove empty", true),
        flag("clusterRows", "Cluster rows", true),
        flag("clusterColumns", "Cluster columns", true),
    ])
}

/// Built-in components in display order.
pub fn builtin_components() -> Vec<ComponentDescriptor> {
    let component = |name: &str, render: RenderFn, parameters: Vec<ParameterSpec>| {
        ComponentDescriptor::new(name, parameters, Arc::new(render))
    };

    let mut bar = bar_params("dodge");
    // position is implied for the plain bar chart
    bar.retain(|p| p.key != "position");

    vec![
        component("BarChart", render_bars, bar),
        component(
            "BoxPlot",
            render_boxes,
            sized(vec![
                ParameterSpec::dimension("x", "x").filter(DISCRETE),
                ParameterSpec::dimension("y", "y").required().filter(NUMERIC),
                ParameterSpec::dimension("color", "color").filter(DISCRETE),
            ]),
        ),
        component("GroupedBarChart", render_bars, bar_params("dodge")),
        component("StackedBarChart", render_bars, bar_params("stack")),
        component(
            "Histogram",
            render_histogram,
            sized(vec![
                ParameterSpec::dimension("x", "x").required().filter(NUMERIC),
                ParameterSpec::size("bins", "Bins", 10.0),
                ParameterSpec::literal("fill", "Fill color").with_default(Value::from("#4682b4")),
            ]),
        ),
        component("LineChart", render_lines, xy_params(vec![flag("points", "Show points", false)])),
        component(
            "StepChart",
            render_lines,
            xy_params(vec![ParameterSpec::literal("interpolation", "Interpolation")
                .required()
                .with_choices(&["step", "linear"])
                .with_default(Value::from("step"))]),
        ),
        component("Sparkline", render_lines, sized(vec![
            ParameterSpec::dimension("x", "x").required().filter(NUMERIC),
            ParameterSpec::dimension("y", "y").required().filter(NUMERIC),
            flag("axes", "Show axes", false),
        ])),
        component(
            "ScatterPlot",
            render_scatter,
            xy_params(vec![
                ParameterSpec::dimension("size", "size").filter(NUMERIC),
                ParameterSpec::dimension("hover", "hover"),
            ]),
        ),
        component(
            "BubbleChart",
            render_scatter,
            xy_params(vec![ParameterSpec::dimension("size", "size").required().filter(NUMERIC)]),
        ),
        component("DotPlot", render_scatter, sized(vec![
            ParameterSpec::dimension("x", "x").required().filter(NUMERIC),
            ParameterSpec::dimension("y", "y").required().filter(NUMERIC),
        ])),
        component(
            "StripPlot",
            render_boxes,
            sized(vec![
                ParameterSpec::dimension("x", "x").required().filter(DISCRETE),
                ParameterSpec::dimension("y", "y").required().filter(NUMERIC),
                flag("jitter", "Show points only", true),
            ]),
        ),
        component("TreeHeatmap", render_heatmap, heatmap_params("Identifier column")),
        component("Heatmap", render_heatmap, sized(vec![
            ParameterSpec::dimension("idColumn", "Row label").filter(LABELS),
            ParameterSpec::scale("scale", "Color scale")
                .required()
                .with_choices(&["global", "row", "column"])
                .with_default(Value::from("global")),
        ])),
        component("Correlogram", render_heatmap, sized(vec![
            ParameterSpec::scale("scale", "Color scale")
                .required()
                .with_choices(&["global"])
                .with_default(Value::from("global")),
            flag("clusterRows", "Cluster rows", false),
            flag("clusterColumns", "Cluster columns", false),
        ])),
        component("ParetoChart", render_bars, sized(vec![
            ParameterSpec::dimension("x", "x").required().filter(DISCRETE),
            ParameterSpec::dimension("y", "y").required().filter(NUMERIC),
            flag("sort", "Sort descending", true),
        ])),
        component("AreaChart", render_lines, xy_params(vec![flag("fill", "Fill area", true)])),
        component("ViolinPlot", render_boxes, sized(vec![
            ParameterSpec::dimension("x", "x").filter(DISCRETE),
            ParameterSpec::dimension("y", "y").required().filter(NUMERIC),
        ])),
        component("ColumnChart", render_bars, sized(vec![
            ParameterSpec::dimension("x", "x").required(),
            ParameterSpec::dimension("y", "y").filter(NUMERIC),
        ])),
        component("ScatterPlotMatrix", render_scatter, xy_params(vec![
            ParameterSpec::dimension("hover", "hover"),
        ])),
    ]
}

// =============================================================================
// Shared helpers
// =============================================================================

fn dimensions(values: &FormValues) -> (u32, u32) {
    let clamp = |v: f64| v.clamp(16.0, MAX_DIMENSION) as u32;
    (
        clamp(values.number("width").unwrap_or(DEFAULT_WIDTH)),
        clamp(values.number("height").unwrap_or(DEFAULT_HEIGHT)),
    )
}

fn required<'a>(values: &'a FormValues, key: &str) -> Result<&'a str> {
    values
        .column(key)
        .ok_or_else(|| anyhow!("No '{}' column selected", key))
}

fn text_or<'a>(values: &'a FormValues, key: &str, default: &'a str) -> &'a str {
    match values.get(key) {
        Some(Value::Text(s)) => s,
        _ => default,
    }
}

/// Flag with an explicit default for components that do not declare it.
fn flag_or(values: &FormValues, key: &str, default: bool) -> bool {
    if values.get(key).is_some() {
        values.flag(key)
    } else {
        default
    }
}

/// Hover text per row index, if a hover column is selected.
fn hover_text(data: &Dataset, values: &FormValues) -> Result<Option<Vec<String>>> {
    let Some(column) = values.column("hover") else {
        return Ok(None);
    };
    let idx = data
        .column_index(column)
        .ok_or_else(|| anyhow!("Column '{}' not found", column))?;
    Ok(Some(data.column(idx).map(str::to_string).collect()))
}

fn all_rows(data: &Dataset) -> Vec<usize> {
    (0..data.rows.len()).collect()
}

// =============================================================================
// Bars
// =============================================================================

fn render_bars(values: &FormValues, data: &Dataset) -> Result<Scene> {
    let (width, height) = dimensions(values);
    let x_col = required(values, "x")?;
    let y_col = values.column("y");
    let stacked = text_or(values, "position", "dodge") == "stack";

    let rows = all_rows(data);
    let (mut categories, totals) = aggregate_by_category(data, &rows, x_col, y_col)?;
    if flag_or(values, "sort", false) {
        let mut paired: Vec<(String, f64)> = categories.into_iter().zip(totals).collect();
        paired.sort_by(|a, b| b.1.total_cmp(&a.1));
        categories = paired.into_iter().map(|(c, _)| c).collect();
    }

    let groups = group_rows(data, values.column("color"))?;
    let hover = hover_text(data, values)?;

    // Per group: value at each category index.
    let mut series: Vec<(String, Vec<f64>)> = Vec::with_capacity(groups.len());
    for (key, group_rows) in &groups {
        let (cats, sums) = aggregate_by_category(data, group_rows, x_col, y_col)?;
        let mut by_category = vec![0.0; categories.len()];
        for (cat, sum) in cats.iter().zip(sums) {
            if let Some(pos) = categories.iter().position(|c| c == cat) {
                by_category[pos] = sum;
            }
        }
        series.push((key.clone(), by_category));
    }

    let mut extents = Vec::new();
    for cat_idx in 0..categories.len() {
        if stacked {
            extents.push(series.iter().map(|(_, v)| v[cat_idx].max(0.0)).sum::<f64>());
            extents.push(series.iter().map(|(_, v)| v[cat_idx].min(0.0)).sum::<f64>());
        } else {
            extents.extend(series.iter().map(|(_, v)| v[cat_idx]));
        }
    }

    let mut scene = Scene::new(
        width,
        height,
        Axis::categorical(categories.clone(), Some(x_col.to_string())),
        Axis::continuous(zero_based_domain(extents), Some(y_col.unwrap_or("count").to_string())),
    );

    let n_series = series.len().max(1) as f64;
    let bar_width = 0.8;
    let mut positive_base = vec![0.0; categories.len()];
    let mut negative_base = vec![0.0; categories.len()];

    for (series_idx, (key, by_category)) in series.iter().enumerate() {
        let color = if groups.len() > 1 { category_color(series_idx) } else { STEEL_BLUE };
        let legend = (!key.is_empty()).then(|| key.clone());

        for (cat_idx, &y_val) in by_category.iter().enumerate() {
            let x_center = cat_idx as f64 + 0.5;
            let (left, right, bottom, top) = if stacked {
                let base = if y_val >= 0.0 { &mut positive_base[cat_idx] } else { &mut negative_base[cat_idx] };
                let bottom = *base;
                *base += y_val;
                (x_center - bar_width / 2.0, x_center + bar_width / 2.0, bottom, *base)
            } else {
                let slot = bar_width / n_series;
                let offset = (series_idx as f64 - (n_series - 1.0) / 2.0) * slot;
                (x_center + offset - slot / 2.0, x_center + offset + slot / 2.0, 0.0, y_val)
            };

            scene.push(DrawCommand::Rect {
                tl: (left, top.max(bottom)),
                br: (right, top.min(bottom)),
                style: RectStyle::filled(color),
                legend: if cat_idx == 0 { legend.clone() } else { None },
            });
        }
    }

    if let Some(hover) = hover {
        let x_idx = data
            .column_index(x_col)
            .ok_or_else(|| anyhow!("Column '{}' not found", x_col))?;
        let y_domain = scene.y_axis.domain;
        for (cat_idx, category) in categories.iter().enumerate() {
            let labels: BTreeSet<&str> = rows
                .iter()
                .filter(|&&r| data.rows[r].get(x_idx) == Some(category))
                .map(|&r| hover[r].as_str())
                .filter(|s| !s.is_empty())
                .collect();
            scene.hover.push(HoverRegion {
                tl: (cat_idx as f64 + 0.1, y_domain.1),
                br: (cat_idx as f64 + 0.9, y_domain.0),
                text: labels.into_iter().collect::<Vec<_>>().join(", "),
            });
        }
    }

    Ok(scene)
}

// =============================================================================
// Lines
// =============================================================================

fn render_lines(values: &FormValues, data: &Dataset) -> Result<Scene> {
    let (width, height) = dimensions(values);
    let x_col = required(values, "x")?;
    let y_col = required(values, "y")?;
    let step = text_or(values, "interpolation", "linear") == "step";
    let show_points = flag_or(values, "points", false);
    let fill = flag_or(values, "fill", false);

    let groups = group_rows(data, values.column("color"))?;
    let mut lines = Vec::with_capacity(groups.len());
    for (key, rows) in &groups {
        let mut points = numeric_pairs(data, rows, x_col, y_col)
            .with_context(|| format!("Failed to extract line data for group '{}'", key))?;
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        lines.push((key.clone(), points));
    }

    let xs = lines.iter().flat_map(|(_, p)| p.iter().map(|pt| pt.0));
    let mut ys: Vec<f64> = lines.iter().flat_map(|(_, p)| p.iter().map(|pt| pt.1)).collect();
    if fill {
        ys.push(0.0);
    }

    let mut scene = Scene::new(
        width,
        height,
        Axis::continuous(continuous_domain(xs), Some(x_col.to_string())),
        Axis::continuous(continuous_domain(ys), Some(y_col.to_string())),
    );
    scene.show_axes = flag_or(values, "axes", true);

    let multi = lines.len() > 1;
    for (idx, (key, points)) in lines.into_iter().enumerate() {
        let color = if multi { category_color(idx) } else { STEEL_BLUE };
        let legend = (!key.is_empty()).then_some(key);

        let path = if step { step_points(&points) } else { points.clone() };

        if fill && points.len() > 1 {
            // One rect per segment down to zero approximates the area.
            for window in points.windows(2) {
                let (x0, y0) = window[0];
                let (x1, y1) = window[1];
                let top = (y0 + y1) / 2.0;
                scene.push(DrawCommand::Rect {
                    tl: (x0, top.max(0.0)),
                    br: (x1, top.min(0.0)),
                    style: RectStyle { fill: color, alpha: 0.3 },
                    legend: None,
                });
            }
        }

        scene.push(DrawCommand::Line {
            points: path,
            style: LineStyle::solid(color),
            legend: legend.clone(),
        });

        if show_points {
            scene.push(DrawCommand::Points {
                points,
                style: PointStyle::filled(color, 3.0),
                legend: None,
            });
        }
    }

    Ok(scene)
}

/// Expand a polyline into horizontal-then-vertical steps.
fn step_points(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(points.len() * 2);
    for (i, &(x, y)) in points.iter().enumerate() {
        if i > 0 {
            out.push((x, points[i - 1].1));
        }
        out.push((x, y));
    }
    out
}

// =============================================================================
// Points
// =============================================================================

fn render_scatter(values: &FormValues, data: &Dataset) -> Result<Scene> {
    let (width, height) = dimensions(values);
    let x_col = required(values, "x")?;
    let y_col = required(values, "y")?;
    let size_col = values.column("size");
    let hover = hover_text(data, values)?;

    let groups = group_rows(data, values.column("color"))?;

    let size_values = match size_col {
        Some(col) => Some(numeric_column(data, col)?),
        None => None,
    };
    let size_domain = size_values
        .as_ref()
        .and_then(|v| min_max(v.iter().copied()))
        .unwrap_or((0.0, 1.0));

    let mut all_points = Vec::new();
    let mut grouped = Vec::with_capacity(groups.len());
    for (key, rows) in &groups {
        let mut entries = Vec::with_capacity(rows.len());
        for &row in rows {
            let pts = numeric_pairs(data, &[row], x_col, y_col)?;
            if let Some(&pt) = pts.first() {
                entries.push((row, pt));
                all_points.push(pt);
            }
        }
        grouped.push((key.clone(), entries));
    }

    let mut scene = Scene::new(
        width,
        height,
        Axis::continuous(continuous_domain(all_points.iter().map(|p| p.0)), Some(x_col.to_string())),
        Axis::continuous(continuous_domain(all_points.iter().map(|p| p.1)), Some(y_col.to_string())),
    );

    let multi = grouped.len() > 1;
    let x_span = scene.x_axis.domain.1 - scene.x_axis.domain.0;
    let y_span = scene.y_axis.domain.1 - scene.y_axis.domain.0;

    for (idx, (key, entries)) in grouped.into_iter().enumerate() {
        let color = if multi { category_color(idx) } else { STEEL_BLUE };
        let legend = (!key.is_empty()).then_some(key);

        match (&size_col, &size_values) {
            (Some(col), Some(_)) => {
                // Sized points are emitted one command per point.
                let size_idx = data
                    .column_index(col)
                    .ok_or_else(|| anyhow!("Column '{}' not found", col))?;
                for (i, &(row, pt)) in entries.iter().enumerate() {
                    let raw = data.rows[row].get(size_idx).and_then(|c| parse_finite(c));
                    let size = raw.map_or(3.0, |v| 3.0 + 9.0 * normalize(v, size_domain));
                    scene.push(DrawCommand::Points {
                        points: vec![pt],
                        style: PointStyle::filled(color, size),
                        legend: if i == 0 { legend.clone() } else { None },
                    });
                }
            }
            _ => {
                scene.push(DrawCommand::Points {
                    points: entries.iter().map(|&(_, pt)| pt).collect(),
                    style: PointStyle::filled(color, 4.0),
                    legend,
                });
            }
        }

        if let Some(hover) = &hover {
            for &(row, (x, y)) in &entries {
                scene.hover.push(HoverRegion {
                    tl: (x - x_span * 0.01, y + y_span * 0.01),
                    br: (x + x_span * 0.01, y - y_span * 0.01),
                    text: hover[row].clone(),
                });
            }
        }
    }

    Ok(scene)
}

// =============================================================================
// Histogram
// =============================================================================

fn render_histogram(values: &FormValues, data: &Dataset) -> Result<Scene> {
    let (width, height) = dimensions(values);
    let x_col = required(values, "x")?;
    let bins = values.number("bins").unwrap_or(10.0).clamp(1.0, 1000.0) as usize;
    let fill = parse_color(values.text("fill").as_deref()).unwrap_or(STEEL_BLUE);

    let samples = numeric_column(data, x_col)?;
    if samples.is_empty() {
        anyhow::bail!("Column '{}' has no numeric values", x_col);
    }
    let counts = histogram(&samples, bins);

    let mut scene = Scene::new(
        width,
        height,
        Axis::continuous(
            continuous_domain(counts.iter().flat_map(|&(lo, hi, _)| [lo, hi])),
            Some(x_col.to_string()),
        ),
        Axis::continuous(
            zero_based_domain(counts.iter().map(|&(_, _, c)| c as f64)),
            Some("count".to_string()),
        ),
    );

    for (lo, hi, count) in counts {
        scene.push(DrawCommand::Rect {
            tl: (lo, count as f64),
            br: (hi, 0.0),
            style: RectStyle::filled(fill),
            legend: None,
        });
    }

    Ok(scene)
}

// =============================================================================
// Boxes
// =============================================================================

fn render_boxes(values: &FormValues, data: &Dataset) -> Result<Scene> {
    let (width, height) = dimensions(values);
    let y_col = required(values, "y")?;
    let x_col = values.column("x");
    let points_only = flag_or(values, "jitter", false);

    let y_idx = data
        .column_index(y_col)
        .ok_or_else(|| anyhow!("Column '{}' not found", y_col))?;
    let groups = group_rows(data, x_col)?;
    let mut series = Vec::with_capacity(groups.len());
    for (key, rows) in &groups {
        let mut samples = Vec::with_capacity(rows.len());
        for &row in rows {
            let cell = data.rows[row].get(y_idx).map(String::as_str).unwrap_or("").trim();
            if cell.is_empty() {
                continue;
            }
            let v = parse_finite(cell).with_context(|| {
                format!("Failed to parse '{}' as number in column '{}' at row {}", cell, y_col, row + 1)
            })?;
            samples.push(v);
        }
        series.push((key.clone(), samples));
    }

    let categories: Vec<String> = series
        .iter()
        .map(|(k, _)| if k.is_empty() { y_col.to_string() } else { k.clone() })
        .collect();
    let mut scene = Scene::new(
        width,
        height,
        Axis::categorical(categories, x_col.map(str::to_string)),
        Axis::continuous(
            continuous_domain(series.iter().flat_map(|(_, s)| s.iter().copied())),
            Some(y_col.to_string()),
        ),
    );

    for (idx, (key, samples)) in series.iter().enumerate() {
        let x = idx as f64 + 0.5;
        let color = category_color(idx);
        let legend = (!key.is_empty()).then(|| key.clone());

        if points_only {
            scene.push(DrawCommand::Points {
                points: samples.iter().map(|&v| (x, v)).collect(),
                style: PointStyle::filled(color, 3.0),
                legend,
            });
            continue;
        }

        let Some(stats) = box_stats(samples) else {
            continue;
        };
        let half = 0.25;
        let whisker = LineStyle { color, width: 2.0, alpha: 1.0 };

        scene.push(DrawCommand::Line {
            points: vec![(x, stats.min), (x, stats.q1)],
            style: whisker.clone(),
            legend: None,
        });
        scene.push(DrawCommand::Line {
            points: vec![(x, stats.q3), (x, stats.max)],
            style: whisker,
            legend: None,
        });
        scene.push(DrawCommand::Rect {
            tl: (x - half, stats.q3),
            br: (x + half, stats.q1),
            style: RectStyle { fill: color, alpha: 0.7 },
            legend,
        });
        scene.push(DrawCommand::Line {
            points: vec![(x - half, stats.median), (x + half, stats.median)],
            style: LineStyle { color: crate::scene::WHITE, width: 2.0, alpha: 0.9 },
            legend: None,
        });
        if !stats.outliers.is_empty() {
            scene.push(DrawCommand::Points {
                points: stats.outliers.iter().map(|&v| (x, v)).collect(),
                style: PointStyle::filled(color, 3.0),
                legend: None,
            });
        }
    }

    Ok(scene)
}

// =============================================================================
// Heatmap
// =============================================================================

/// Numeric matrix extracted for the heatmap: one row per data row.
struct Matrix {
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

fn numeric_matrix(data: &Dataset, id_col: Option<&str>) -> Result<Matrix> {
    let id_idx = match id_col {
        Some(name) => Some(
            data.column_index(name)
                .ok_or_else(|| anyhow!("Column '{}' not found", name))?,
        ),
        None => None,
    };

    // Numeric columns: every non-empty cell parses, and at least one is present.
    let numeric: Vec<usize> = (0..data.headers.len())
        .filter(|&c| Some(c) != id_idx)
        .filter(|&c| {
            let mut any = false;
            let all = data.column(c).all(|cell| {
                let t = cell.trim();
                if t.is_empty() {
                    return true;
                }
                any = true;
                parse_finite(t).is_some()
            });
            all && any
        })
        .collect();

    if numeric.is_empty() {
        anyhow::bail!("Heatmap requires at least one numeric column");
    }

    let row_labels = match id_idx {
        Some(idx) => data.column(idx).map(str::to_string).collect(),
        None => (1..=data.rows.len()).map(|i| i.to_string()).collect(),
    };
    let cells = data
        .rows
        .iter()
        .map(|row| {
            numeric
                .iter()
                .map(|&c| row.get(c).and_then(|v| parse_finite(v)))
                .collect()
        })
        .collect();

    Ok(Matrix {
        row_labels,
        col_labels: numeric.iter().map(|&c| data.headers[c].clone()).collect(),
        cells,
    })
}

/// Greedy nearest-neighbour ordering of vectors, starting from the first.
fn seriate(vectors: &[Vec<Option<f64>>]) -> Vec<usize> {
    let distance = |a: &[Option<f64>], b: &[Option<f64>]| -> f64 {
        a.iter()
            .zip(b)
            .filter_map(|(x, y)| Some((x.as_ref()? - y.as_ref()?).powi(2)))
            .sum::<f64>()
    };

    let mut order = Vec::with_capacity(vectors.len());
    let mut remaining: Vec<usize> = (0..vectors.len()).collect();
    if remaining.is_empty() {
        return order;
    }
    let mut current = remaining.remove(0);
    order.push(current);
    while !remaining.is_empty() {
        let (pos, _) = remaining
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (pos, distance(&vectors[current], &vectors[idx])))
            .fold((0, f64::INFINITY), |best, cand| if cand.1 < best.1 { cand } else { best });
        current = remaining.remove(pos);
        order.push(current);
    }
    order
}

fn transpose(cells: &[Vec<Option<f64>>], n_cols: usize) -> Vec<Vec<Option<f64>>> {
    (0..n_cols)
        .map(|c| cells.iter().map(|row| row.get(c).copied().flatten()).collect())
        .collect()
}

fn render_heatmap(values: &FormValues, data: &Dataset) -> Result<Scene> {
    let (width, height) = dimensions(values);
    let scale = text_or(values, "scale", "global");
    let threshold = text_or(values, "threshold", "off");
    let threshold_value = values.number("thresholdValue").unwrap_or(0.0);

    let mut matrix = numeric_matrix(data, values.column("idColumn"))?;
    let n_cols = matrix.col_labels.len();

    let keep = |v: f64| match threshold {
        "absolute" => v.abs() >= threshold_value,
        "greater" => v >= threshold_value,
        "less" => v <= threshold_value,
        _ => true,
    };

    if flag_or(values, "removeEmpty", false) {
        let mut labels = Vec::new();
        let mut cells = Vec::new();
        for (label, row) in matrix.row_labels.into_iter().zip(matrix.cells) {
            if row.iter().flatten().any(|&v| keep(v)) {
                labels.push(label);
                cells.push(row);
            }
        }
        if cells.is_empty() {
            anyhow::bail!("No cells pass the threshold");
        }
        matrix.row_labels = labels;
        matrix.cells = cells;
    }

    let row_order: Vec<usize> = if flag_or(values, "clusterRows", false) {
        seriate(&matrix.cells)
    } else {
        (0..matrix.cells.len()).collect()
    };
    let col_order: Vec<usize> = if flag_or(values, "clusterColumns", false) {
        seriate(&transpose(&matrix.cells, n_cols))
    } else {
        (0..n_cols).collect()
    };

    let global = min_max(matrix.cells.iter().flatten().flatten().copied()).unwrap_or((0.0, 1.0));
    let row_domains: Vec<(f64, f64)> = matrix
        .cells
        .iter()
        .map(|row| min_max(row.iter().flatten().copied()).unwrap_or(global))
        .collect();
    let col_domains: Vec<(f64, f64)> = transpose(&matrix.cells, n_cols)
        .iter()
        .map(|col| min_max(col.iter().flatten().copied()).unwrap_or(global))
        .collect();

    let mut scene = Scene::new(
        width,
        height,
        Axis::categorical(col_order.iter().map(|&c| matrix.col_labels[c].clone()).collect(), None),
        Axis::categorical(row_order.iter().map(|&r| matrix.row_labels[r].clone()).collect(), None),
    );

    for (y_pos, &r) in row_order.iter().enumerate() {
        for (x_pos, &c) in col_order.iter().enumerate() {
            let Some(v) = matrix.cells[r][c] else {
                continue;
            };
            if !keep(v) {
                continue;
            }
            let domain = match scale {
                "row" => row_domains[r],
                "column" => col_domains[c],
                _ => global,
            };
            scene.push(DrawCommand::Rect {
                tl: (x_pos as f64, y_pos as f64 + 1.0),
                br: (x_pos as f64 + 1.0, y_pos as f64),
                style: RectStyle::filled(diverging_color(normalize(v, domain))),
                legend: None,
            });
        }
    }

    Ok(scene)
}
