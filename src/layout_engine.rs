pub mod engine;
pub mod error;
pub mod item;
pub mod packer;
pub mod rect;

pub use engine::{EventReceiver, EventSender, LayoutEngine, LayoutEvent};
pub use error::LayoutError;
pub use item::{ItemId, ItemState, LayoutItem};
pub use packer::{Packer, SortDirection};
pub use rect::Rect;
