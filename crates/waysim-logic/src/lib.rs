//! Pure navigation logic for waysim.
//!
//! This crate contains all navigation and world-geometry logic that is
//! independent of any ECS, engine, or runtime. Functions take plain data
//! and return results, making them unit-testable and portable.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`constants`] | Shared numeric defaults (grid cell, epsilons, NPC defaults) |
//! | [`decor`] | Uniform-grid spatial index over decor items |
//! | [`error`] | Typed navigation failures |
//! | [`floor_graph`] | Per-instance triangle mesh with weighted A* search |
//! | [`funnel`] | String-pull over a triangle portal corridor |
//! | [`geom`] | Vectors, rects, circles, polygons, affine transforms |
//! | [`gm_graph`] | Placed geomorph instances, hull-door pairing, door routing |
//! | [`layout`] | Template triangulation and world building |
//! | [`nav_path`] | Path value types, nav metas, segment stitching |
//! | [`route`] | Point-to-point navigation across instances |

pub mod constants;
pub mod decor;
pub mod error;
pub mod floor_graph;
pub mod funnel;
pub mod geom;
pub mod gm_graph;
pub mod layout;
pub mod nav_path;
pub mod route;
