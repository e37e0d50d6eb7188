use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("invalid rectangle dimensions: {width}x{height}")]
    InvalidDimension { width: f64, height: f64 },
    #[error("invalid layout configuration: {0}")]
    Configuration(String),
    #[error("item is not tracked by this layout")]
    UnknownItem,
}
