//! Request handlers.

pub mod chat;
pub mod health;
pub mod settings;
pub mod summaries;

pub use chat::*;
pub use health::*;
pub use settings::*;
pub use summaries::*;
