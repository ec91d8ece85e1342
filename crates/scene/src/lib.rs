//! Scene state: the fly camera, the per-frame state the renderer reads, and the
//! scene description loaded at startup.
//!
//! # Invariants
//! - One `FrameState` per window, owned by the event loop and passed by
//!   reference to every handler. There is no global state.
//! - Camera pitch never leaves [-89°, 89°]; the look direction is unit length.
//! - Held-key motion scales with elapsed frame time, not with frame count.

pub mod camera;
pub mod config;
pub mod frame;

pub use camera::Camera;
pub use config::{ConfigError, SceneConfig};
pub use frame::FrameState;
