//! Request handlers.

pub mod compose;
pub mod download;
pub mod health;

pub use compose::*;
pub use download::*;
pub use health::*;
