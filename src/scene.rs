// Scene IR: backend-agnostic drawing commands produced by render entry points

use serde::Serialize;

// =============================================================================
// Colors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const WHITE: Rgb = Rgb(255, 255, 255);
pub const STEEL_BLUE: Rgb = Rgb(70, 130, 180);

/// Categorical palette for color-grouped series.
const CATEGORY_PALETTE: [Rgb; 10] = [
    Rgb(31, 119, 180),
    Rgb(255, 127, 14),
    Rgb(44, 160, 44),
    Rgb(214, 39, 40),
    Rgb(148, 103, 189),
    Rgb(140, 86, 75),
    Rgb(227, 119, 194),
    Rgb(127, 127, 127),
    Rgb(188, 189, 34),
    Rgb(23, 190, 207),
];

pub fn category_color(index: usize) -> Rgb {
    CATEGORY_PALETTE[index % CATEGORY_PALETTE.len()]
}

/// Blue-white-red ramp for a value in [0, 1].
pub fn diverging_color(t: f64) -> Rgb {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    let lerp = |a: u8, b: u8, f: f64| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    let blue = Rgb(33, 102, 172);
    let red = Rgb(178, 24, 43);
    if t < 0.5 {
        let f = t / 0.5;
        Rgb(lerp(blue.0, 255, f), lerp(blue.1, 255, f), lerp(blue.2, 255, f))
    } else {
        let f = (t - 0.5) / 0.5;
        Rgb(lerp(255, red.0, f), lerp(255, red.1, f), lerp(255, red.2, f))
    }
}

/// Parse a color name or `#rrggbb` string.
pub fn parse_color(color_str: Option<&str>) -> Option<Rgb> {
    match color_str? {
        "red" => Some(Rgb(255, 0, 0)),
        "green" => Some(Rgb(0, 255, 0)),
        "blue" => Some(Rgb(0, 0, 255)),
        "black" => Some(BLACK),
        "yellow" => Some(Rgb(255, 255, 0)),
        "cyan" => Some(Rgb(0, 255, 255)),
        "magenta" => Some(Rgb(255, 0, 255)),
        "white" => Some(WHITE),
        hex if hex.len() == 7 && hex.is_ascii() && hex.starts_with('#') => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some(Rgb(channel(1)?, channel(3)?, channel(5)?))
        }
        _ => None,
    }
}

// =============================================================================
// Styles
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: Rgb,
    pub width: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointStyle {
    pub color: Rgb,
    pub size: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RectStyle {
    pub fill: Rgb,
    pub alpha: f64,
}

impl LineStyle {
    pub fn solid(color: Rgb) -> Self {
        Self { color, width: 2.0, alpha: 1.0 }
    }
}

impl PointStyle {
    pub fn filled(color: Rgb, size: f64) -> Self {
        Self { color, size, alpha: 0.8 }
    }
}

impl RectStyle {
    pub fn filled(fill: Rgb) -> Self {
        Self { fill, alpha: 1.0 }
    }
}

// =============================================================================
// Scene
// =============================================================================

/// One axis of the plotting area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub domain: (f64, f64),
    pub label: Option<String>,
    /// If non-empty, tick `i` is labeled `categories[i]`.
    pub categories: Vec<String>,
}

impl Axis {
    pub fn continuous(domain: (f64, f64), label: Option<String>) -> Self {
        Self { domain, label, categories: Vec::new() }
    }

    /// Category `i` is centered at `i + 0.5`.
    pub fn categorical(categories: Vec<String>, label: Option<String>) -> Self {
        let n = categories.len().max(1) as f64;
        Self { domain: (0.0, n), label, categories }
    }

    pub fn is_categorical(&self) -> bool {
        !self.categories.is_empty()
    }
}

/// Primitive drawing commands. Backends execute them blindly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Line {
        points: Vec<(f64, f64)>,
        style: LineStyle,
        legend: Option<String>,
    },
    Points {
        points: Vec<(f64, f64)>,
        style: PointStyle,
        legend: Option<String>,
    },
    Rect {
        // Top-Left, Bottom-Right
        tl: (f64, f64),
        br: (f64, f64),
        style: RectStyle,
        legend: Option<String>,
    },
}

/// Data-space rectangle carrying tooltip text for interactive hosts.
/// Static backends ignore it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverRegion {
    pub tl: (f64, f64),
    pub br: (f64, f64),
    pub text: String,
}

/// Complete drawing for one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub x_axis: Axis,
    pub y_axis: Axis,
    /// Whether the backend draws the mesh and tick labels.
    pub show_axes: bool,
    pub commands: Vec<DrawCommand>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hover: Vec<HoverRegion>,
}

impl Scene {
    pub fn new(width: u32, height: u32, x_axis: Axis, y_axis: Axis) -> Self {
        Self {
            width,
            height,
            x_axis,
            y_axis,
            show_axes: true,
            commands: Vec::new(),
            hover: Vec::new(),
        }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Distinct legend entries in first-seen order.
    pub fn legend_entries(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = Vec::new();
        for command in &self.commands {
            let legend = match command {
                DrawCommand::Line { legend, .. }
                | DrawCommand::Points { legend, .. }
                | DrawCommand::Rect { legend, .. } => legend.as_deref(),
            };
            if let Some(entry) = legend {
                if !entries.contains(&entry) {
                    entries.push(entry);
                }
            }
        }
        entries
    }
}
