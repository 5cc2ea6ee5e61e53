//! Systems - logic that operates on components.

mod collision;
mod walk;

pub use collision::*;
pub use walk::*;
