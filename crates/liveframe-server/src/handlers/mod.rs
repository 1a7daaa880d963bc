//! Request handlers.

pub mod health;
pub mod renders;

pub use health::health;
pub use renders::{clear_history, create_render, get_render, list_history};
