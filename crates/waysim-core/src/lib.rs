//! waysim core - NPC walk simulation engine.
//!
//! An ECS-based simulation of NPCs walking a world of placed geomorph
//! instances, built on the navigation primitives in `waysim-logic`.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System via `hecs`:
//! - **Entities**: NPCs
//! - **Components**: Pure data (Pose, Mobility, Walk, Inventory, ...)
//! - **Systems**: Walk advancement and collision detection, run per tick
//!
//! The [`Session`](session::Session) owns the world, door and decor state
//! and the event queue; callers drive it with typed operations and
//! `update(dt)`, then drain events.
//!
//! # Example
//!
//! ```rust,no_run
//! use waysim_core::prelude::*;
//!
//! let json = std::fs::read_to_string("data/demo_world.json").unwrap();
//! let mut session = waysim_core::loader::load_session(&json).unwrap();
//! session.walk_npc("ada", waysim_logic::geom::Vec2::new(12.0, 5.0),
//!     DoorStrategy::Open, &Default::default()).unwrap();
//! loop {
//!     session.update(1.0 / 60.0);
//!     for event in session.drain_events() {
//!         println!("{event:?}");
//!     }
//! }
//! ```

pub mod actions;
pub mod components;
pub mod doors;
pub mod error;
pub mod events;
pub mod loader;
pub mod session;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::error::NpcError;
    pub use crate::events::{WalkOutcome, WayEvent};
    pub use crate::session::Session;
}
