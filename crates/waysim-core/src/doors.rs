//! Door state map.
//!
//! Doors are keyed by `(gm_id, door_id)`. Doors with no recorded state are
//! plain open archways. Open/close requests made while systems run are
//! queued and applied at the end of the tick, so every system in a tick
//! sees the same door state.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use waysim_logic::floor_graph::{DoorId, DoorStatus};

/// Mutable state of one door.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoorState {
    pub open: bool,
    pub locked: bool,
    /// Inventory key that unlocks the door, if any.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingOp {
    Open { authorized: bool },
    Close,
}

/// All doors of a world plus the tick's pending mutations.
#[derive(Debug, Clone, Default)]
pub struct DoorMap {
    states: HashMap<(usize, DoorId), DoorState>,
    pending: Vec<((usize, DoorId), PendingOp)>,
}

impl DoorMap {
    pub fn set_state(&mut self, gm_id: usize, door_id: DoorId, state: DoorState) {
        self.states.insert((gm_id, door_id), state);
    }

    pub fn state(&self, gm_id: usize, door_id: DoorId) -> Option<&DoorState> {
        self.states.get(&(gm_id, door_id))
    }

    /// Status as seen by searches and walks this tick.
    pub fn status(&self, gm_id: usize, door_id: DoorId) -> DoorStatus {
        match self.states.get(&(gm_id, door_id)) {
            None => DoorStatus::Open,
            Some(s) if s.open => DoorStatus::Open,
            Some(s) if s.locked => DoorStatus::Locked,
            Some(_) => DoorStatus::Closed,
        }
    }

    /// Whether an NPC holding `keys` may open the door.
    pub fn can_open(
        &self,
        gm_id: usize,
        door_id: DoorId,
        keys: &HashSet<String>,
        force: bool,
    ) -> bool {
        match self.states.get(&(gm_id, door_id)) {
            None => true,
            Some(s) if !s.locked || force => true,
            Some(s) => s.key.as_ref().map(|k| keys.contains(k)).unwrap_or(false),
        }
    }

    /// Queue an open for the end of the tick. An `authorized` open (key
    /// held, or forced) passes the lock; an unauthorized open of a locked
    /// door is dropped when applied.
    pub fn request_open(&mut self, gm_id: usize, door_id: DoorId, authorized: bool) {
        self.pending
            .push(((gm_id, door_id), PendingOp::Open { authorized }));
    }

    /// Queue a close for the end of the tick.
    pub fn request_close(&mut self, gm_id: usize, door_id: DoorId) {
        self.pending.push(((gm_id, door_id), PendingOp::Close));
    }

    /// Lock/unlock immediately. Locking is an outside mutation, not part of
    /// the walk tick.
    pub fn set_locked(&mut self, gm_id: usize, door_id: DoorId, locked: bool) {
        self.states.entry((gm_id, door_id)).or_default().locked = locked;
    }

    /// Apply queued mutations in request order. Returns the doors whose
    /// open state actually changed.
    pub fn apply_pending(&mut self) -> Vec<(usize, DoorId, bool)> {
        let mut changed = Vec::new();
        for ((gm_id, door_id), op) in std::mem::take(&mut self.pending) {
            let state = self.states.entry((gm_id, door_id)).or_insert(DoorState {
                open: true,
                ..Default::default()
            });
            let want_open = match op {
                PendingOp::Open { authorized } => {
                    if state.locked && !authorized {
                        continue;
                    }
                    true
                }
                PendingOp::Close => false,
            };
            if state.open != want_open {
                state.open = want_open;
                changed.push((gm_id, door_id, want_open));
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_doors_are_open_archways() {
        let doors = DoorMap::default();
        assert_eq!(doors.status(0, 7), DoorStatus::Open);
        assert!(doors.can_open(0, 7, &HashSet::new(), false));
    }

    #[test]
    fn status_reflects_state() {
        let mut doors = DoorMap::default();
        doors.set_state(
            0,
            1,
            DoorState {
                open: false,
                locked: false,
                key: None,
            },
        );
        assert_eq!(doors.status(0, 1), DoorStatus::Closed);
        doors.set_locked(0, 1, true);
        assert_eq!(doors.status(0, 1), DoorStatus::Locked);
    }

    #[test]
    fn requests_apply_at_tick_end_only() {
        let mut doors = DoorMap::default();
        doors.set_state(
            0,
            1,
            DoorState {
                open: false,
                locked: false,
                key: None,
            },
        );
        doors.request_open(0, 1, false);
        // Still closed until applied.
        assert_eq!(doors.status(0, 1), DoorStatus::Closed);
        let changed = doors.apply_pending();
        assert_eq!(changed, vec![(0, 1, true)]);
        assert_eq!(doors.status(0, 1), DoorStatus::Open);
        // Re-applying an open to an open door is a no-op.
        doors.request_open(0, 1, false);
        assert!(doors.apply_pending().is_empty());
    }

    #[test]
    fn locked_doors_ignore_unauthorized_opens() {
        let mut doors = DoorMap::default();
        doors.set_state(
            0,
            3,
            DoorState {
                open: false,
                locked: true,
                key: Some("brig".into()),
            },
        );
        doors.request_open(0, 3, false);
        assert!(doors.apply_pending().is_empty());
        assert_eq!(doors.status(0, 3), DoorStatus::Locked);

        doors.request_open(0, 3, true);
        assert_eq!(doors.apply_pending(), vec![(0, 3, true)]);
        assert_eq!(doors.status(0, 3), DoorStatus::Open);
    }

    #[test]
    fn locked_doors_need_the_right_key() {
        let mut doors = DoorMap::default();
        doors.set_state(
            0,
            2,
            DoorState {
                open: false,
                locked: true,
                key: Some("brig".into()),
            },
        );
        let mut keys = HashSet::new();
        assert!(!doors.can_open(0, 2, &keys, false));
        assert!(doors.can_open(0, 2, &keys, true)); // forced
        keys.insert("brig".into());
        assert!(doors.can_open(0, 2, &keys, false));
    }
}
