use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout_engine::error::LayoutError;

pub fn data_dir() -> PathBuf { dirs::home_dir().unwrap().join(".packgrid") }
pub fn restore_file() -> PathBuf { data_dir().join("layout.ron") }
pub fn config_file() -> PathBuf { dirs::home_dir().unwrap().join(".packgrid.toml") }

/// Per-layout settings. All distances are in layout pixels.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    /// Pack along the x axis instead of downward.
    #[serde(default = "no")]
    pub is_horizontal: bool,
    /// Optional column grid. Item widths and horizontal positions snap to
    /// whole columns when set.
    #[serde(default)]
    pub column_width: Option<f64>,
    /// Optional row grid, the vertical counterpart of `column_width`.
    #[serde(default)]
    pub row_height: Option<f64>,
    /// Spacing between items and after the last one.
    #[serde(default)]
    pub gutter: f64,
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
    #[serde(default = "default_drag_debounce_ms")]
    pub drag_debounce_ms: u64,
}

fn no() -> bool { false }

fn default_resize_debounce_ms() -> u64 { 100 }

fn default_drag_debounce_ms() -> u64 { 40 }

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            is_horizontal: false,
            column_width: None,
            row_height: None,
            gutter: 0.0,
            resize_debounce_ms: default_resize_debounce_ms(),
            drag_debounce_ms: default_drag_debounce_ms(),
        }
    }
}

impl LayoutSettings {
    /// Reject values the packer math cannot handle. Checked once when an
    /// engine is built, so the hot path can assume well-formed settings.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if !self.gutter.is_finite() || self.gutter < 0.0 {
            return Err(LayoutError::Configuration(format!(
                "gutter must be finite and non-negative, got {}",
                self.gutter
            )));
        }
        for (name, value) in [("column_width", self.column_width), ("row_height", self.row_height)]
        {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(LayoutError::Configuration(format!(
                        "{name} must be finite and positive, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn read(path: &Path) -> anyhow::Result<LayoutSettings> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    fn parse(buf: &str) -> anyhow::Result<LayoutSettings> {
        let settings: LayoutSettings = toml::from_str(buf)?;
        settings.validate()?;
        Ok(settings)
    }
}
