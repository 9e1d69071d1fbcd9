// Library exports for vizbind

pub mod catalog;
pub mod components;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod introspect;
pub mod logging;
pub mod notification;
pub mod parser;
pub mod scale;
pub mod scene;
pub mod schema;
pub mod session;
pub mod surface;
pub mod transform;

pub use catalog::{ComponentCatalog, ComponentDescriptor, Renderer};
pub use data::{Dataset, DatasetId};
pub use dispatch::{Dispatcher, PendingRender, RenderOutcome, RenderRequest};
pub use error::{Result, VizError};
pub use form::{Control, FormBinder, FormModel, FormValues, InputControl};
pub use introspect::{ColumnManifest, ColumnManifestEntry, IntrospectConfig, Introspector};
pub use schema::{ColumnType, ColumnTypeFilter, ParameterKind, ParameterSpec, Value};
pub use session::{Command, Session, SessionState};
pub use surface::SurfaceAdapter;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
    /// Scene IR as JSON
    #[serde(rename = "scene")]
    Scene,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "scene" => Ok(Self::Scene),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            format: OutputFormat::Png,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub introspect: IntrospectConfig,
}

impl Config {
    pub fn from_json<R: std::io::Read>(reader: R) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_json("{}".as_bytes()).unwrap();
        assert_eq!(config.render.width, 800);
        assert_eq!(config.render.height, 600);
        assert_eq!(config.render.format, OutputFormat::Png);
        assert_eq!(config.introspect.sample_limit, 1000);
    }

    #[test]
    fn test_config_partial() {
        let json = r#"{"render": {"width": 320, "type": "svg"}, "introspect": {"chunk_size": 16}}"#;
        let config = Config::from_json(json.as_bytes()).unwrap();
        assert_eq!(config.render.width, 320);
        assert_eq!(config.render.height, 600);
        assert_eq!(config.render.format, OutputFormat::Svg);
        assert_eq!(config.introspect.chunk_size, 16);
        assert_eq!(config.introspect.identifier_min_rows, 20);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("scene".parse::<OutputFormat>(), Ok(OutputFormat::Scene));
        assert!("gif".parse::<OutputFormat>().is_err());
    }
}
