//! Navigation failure taxonomy.

use serde::{Deserialize, Serialize};

/// A navigation query that could not produce a path.
///
/// Always returned to the immediate caller; callers must not assume a path
/// exists between any two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavError {
    /// Source point resolves to no triangle, even after any requested
    /// centroid fallback.
    UnreachableSrc,
    /// Destination point resolves to no triangle, even after any requested
    /// centroid fallback.
    UnreachableDst,
    /// No sequence of triangles (or sealed hull doors) connects source and
    /// destination.
    Disconnected,
    /// The graph queried has no navigable triangles at all.
    EmptyZone,
}

impl std::fmt::Display for NavError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavError::UnreachableSrc => write!(f, "source point is not on the navigable mesh"),
            NavError::UnreachableDst => {
                write!(f, "destination point is not on the navigable mesh")
            }
            NavError::Disconnected => write!(f, "no navigable route connects the two points"),
            NavError::EmptyZone => write!(f, "navigation zone contains no triangles"),
        }
    }
}

impl std::error::Error for NavError {}
