//! Shared value types used by every sceneview crate.

mod types;

pub use types::{DrawMode, Transform};
