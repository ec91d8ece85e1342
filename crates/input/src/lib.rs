//! Input model: keys the viewer understands, held-key polling and tap actions.
//!
//! # Invariants
//! - Held keys drive continuous motion and are sampled once per frame.
//! - Tap actions fire on press edges only; OS key repeat never re-fires them.
//! - Window-system key codes are translated at the app boundary; nothing here
//!   depends on the windowing library.

pub mod action;
pub mod bindings;
pub mod key;

pub use action::{Action, ActionMap};
pub use bindings::{KeyBindings, MoveKeys};
pub use key::{HeldKeys, Key, KeySet};
