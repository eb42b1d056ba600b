//! Request handlers.

pub mod compose;
pub mod health;
pub mod jobs;
pub mod toolkit;

pub use compose::*;
pub use health::*;
pub use jobs::*;
pub use toolkit::*;
