//! Simulation events.
//!
//! Systems push events into the session's queue during a tick; callers
//! drain them after `update`. Events within a tick keep the order they
//! were pushed in.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use waysim_logic::floor_graph::DoorId;
use waysim_logic::nav_path::NavMeta;

use crate::components::WalkId;

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkOutcome {
    /// Reached the destination.
    Completed,
    /// Replaced by a new walk, or stopped by request or despawn.
    Cancelled,
    /// Stopped at a door the NPC could not pass.
    Blocked { gm_id: usize, door_id: DoorId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WayEvent {
    NpcSpawned {
        npc: String,
    },
    NpcRemoved {
        npc: String,
    },
    WalkStarted {
        npc: String,
        walk_id: WalkId,
    },
    WalkEnded {
        npc: String,
        walk_id: WalkId,
        outcome: WalkOutcome,
    },
    /// A nav meta the walk passed this tick (vertices, room transitions,
    /// door crossings, collision transitions).
    WayMeta {
        npc: String,
        walk_id: WalkId,
        meta: NavMeta,
    },
    DoorOpenRequested {
        npc: String,
        gm_id: usize,
        door_id: DoorId,
        forced: bool,
    },
    DoorChanged {
        gm_id: usize,
        door_id: DoorId,
        open: bool,
    },
    DecorAdded {
        key: String,
    },
    DecorRemoved {
        key: String,
    },
}

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<WayEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: WayEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<WayEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_push_order() {
        let mut q = EventQueue::default();
        q.push(WayEvent::NpcSpawned { npc: "a".into() });
        q.push(WayEvent::WalkStarted {
            npc: "a".into(),
            walk_id: 1,
        });
        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], WayEvent::NpcSpawned { .. }));
        assert!(q.is_empty());
    }
}
