//! Geomorph instance graph.
//!
//! Tracks the placed geomorph instances of a world, their rooms in world
//! space, and the hull doors that connect adjacent instances. Cross-instance
//! routing happens here at door granularity; triangle-level pathfinding
//! stays inside each instance's `FloorGraph`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::constants::HULL_DOOR_SEAL_EPSILON;
use crate::error::NavError;
use crate::floor_graph::{DoorId, RoomId};
use crate::geom::{Polygon, Rect, Transform, Vec2};
use crate::nav_path::GmRoomId;

/// One placed geomorph instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmNode {
    pub gm_id: usize,
    /// Layout key of the geomorph template this instance was stamped from.
    pub key: String,
    pub transform: Transform,
    /// World-space bounding rect, used as a cheap pre-filter.
    pub rect: Rect,
    /// World-space room outlines, indexed by `RoomId`.
    pub rooms: Vec<Polygon>,
}

/// One door of a placed instance, in world space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorNode {
    pub gm_id: usize,
    pub door_id: DoorId,
    pub center: Vec2,
    /// Point just inside the doorway, used as a routing waypoint.
    pub entry: Vec2,
    /// Room the door fronts inside its instance, if any. Hull doors on the
    /// perimeter have no inner room of their own.
    pub room: Option<RoomId>,
    /// True for doors on the instance perimeter.
    pub hull: bool,
    /// A hull door with no counterpart on a neighbouring instance is sealed:
    /// it renders as wall and never routes.
    pub sealed: bool,
    /// The matching hull door on the neighbouring instance, once sealed
    /// pairing has run: `(gm_id, door_id)`.
    pub adjacent: Option<(usize, DoorId)>,
}

/// One hull-door hop of a cross-instance route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorCrossing {
    pub from_gm: usize,
    pub exit_door: DoorId,
    pub to_gm: usize,
    pub entry_door: DoorId,
}

struct RouteEntry {
    gm_id: usize,
    door_id: DoorId,
    cost: f32,
    seq: u64,
}

impl PartialEq for RouteEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.seq == other.seq
    }
}
impl Eq for RouteEntry {}
impl Ord for RouteEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for RouteEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// World-level graph of geomorph instances and their doors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GmGraph {
    gms: Vec<GmNode>,
    /// Doors grouped by instance, indexed `doors[gm_id][door_id]`.
    doors: Vec<Vec<DoorNode>>,
}

impl GmGraph {
    pub fn new(gms: Vec<GmNode>, doors: Vec<Vec<DoorNode>>) -> Self {
        assert_eq!(gms.len(), doors.len());
        let mut graph = Self { gms, doors };
        graph.seal_doors();
        graph
    }

    pub fn gms(&self) -> &[GmNode] {
        &self.gms
    }

    pub fn gm(&self, gm_id: usize) -> &GmNode {
        &self.gms[gm_id]
    }

    pub fn doors(&self, gm_id: usize) -> &[DoorNode] {
        &self.doors[gm_id]
    }

    pub fn door(&self, gm_id: usize, door_id: DoorId) -> &DoorNode {
        &self.doors[gm_id][door_id]
    }

    /// Pair hull doors whose world centers coincide across two instances;
    /// every unpaired hull door becomes sealed.
    fn seal_doors(&mut self) {
        let mut pairs: Vec<((usize, DoorId), (usize, DoorId))> = Vec::new();
        for a_gm in 0..self.doors.len() {
            for a in 0..self.doors[a_gm].len() {
                if !self.doors[a_gm][a].hull {
                    continue;
                }
                for b_gm in (a_gm + 1)..self.doors.len() {
                    for b in 0..self.doors[b_gm].len() {
                        if !self.doors[b_gm][b].hull {
                            continue;
                        }
                        let d = self.doors[a_gm][a]
                            .center
                            .distance(&self.doors[b_gm][b].center);
                        if d <= HULL_DOOR_SEAL_EPSILON {
                            pairs.push(((a_gm, a), (b_gm, b)));
                        }
                    }
                }
            }
        }
        for ((a_gm, a), (b_gm, b)) in pairs {
            self.doors[a_gm][a].adjacent = Some((b_gm, b));
            self.doors[b_gm][b].adjacent = Some((a_gm, a));
        }
        for gm_doors in &mut self.doors {
            for door in gm_doors.iter_mut() {
                if door.hull {
                    door.sealed = door.adjacent.is_none();
                }
            }
        }
    }

    /// Instance/room containing `point`, if any. Rect pre-filter first,
    /// then exact polygon tests in room order.
    pub fn find_room_containing(&self, point: &Vec2) -> Option<GmRoomId> {
        for gm in &self.gms {
            if !gm.rect.contains(point) {
                continue;
            }
            for (room_id, poly) in gm.rooms.iter().enumerate() {
                if poly.contains(point) {
                    return Some(GmRoomId {
                        gm_id: gm.gm_id,
                        room_id,
                    });
                }
            }
        }
        None
    }

    /// Instance whose bounding rect contains `point`, room tests skipped.
    /// Doorway points sit between room outlines and still need an owner.
    pub fn find_gm_containing(&self, point: &Vec2) -> Option<usize> {
        self.gms
            .iter()
            .find(|gm| gm.rect.contains(point))
            .map(|gm| gm.gm_id)
    }

    /// Dijkstra over unsealed hull doors: the ordered crossings taking
    /// `src_point` in `src_gm` to `dst_point` in `dst_gm`. Same instance
    /// yields an empty route. In-instance hops cost the straight distance
    /// between door centers; the hop through a paired door is free. Ties
    /// break by insertion order, so equal-cost routes stay deterministic.
    pub fn find_door_route(
        &self,
        src_gm: usize,
        src_point: &Vec2,
        dst_gm: usize,
        dst_point: &Vec2,
    ) -> Result<Vec<DoorCrossing>, NavError> {
        if src_gm == dst_gm {
            return Ok(Vec::new());
        }

        // State is (gm, hull door about to be exited).
        let mut dist: HashMap<(usize, DoorId), f32> = HashMap::new();
        let mut parent: HashMap<(usize, DoorId), Option<(usize, DoorId)>> = HashMap::new();
        let mut open = BinaryHeap::new();
        let mut seq = 0u64;

        for door in &self.doors[src_gm] {
            if !door.hull || door.sealed {
                continue;
            }
            let cost = src_point.distance(&door.center);
            dist.insert((src_gm, door.door_id), cost);
            parent.insert((src_gm, door.door_id), None);
            open.push(RouteEntry {
                gm_id: src_gm,
                door_id: door.door_id,
                cost,
                seq,
            });
            seq += 1;
        }

        let mut best_end: Option<((usize, DoorId), f32)> = None;

        while let Some(entry) = open.pop() {
            let key = (entry.gm_id, entry.door_id);
            if dist.get(&key).map(|&d| entry.cost > d).unwrap_or(true) {
                continue;
            }
            let (to_gm, entry_door) = match self.doors[entry.gm_id][entry.door_id].adjacent {
                Some(pair) => pair,
                None => continue,
            };

            if to_gm == dst_gm {
                let total = entry.cost + self.doors[to_gm][entry_door].center.distance(dst_point);
                if best_end.map(|(_, c)| total < c).unwrap_or(true) {
                    best_end = Some((key, total));
                }
                continue;
            }

            for next in &self.doors[to_gm] {
                if !next.hull || next.sealed || next.door_id == entry_door {
                    continue;
                }
                let next_key = (to_gm, next.door_id);
                let hop = self.doors[to_gm][entry_door].center.distance(&next.center);
                let tentative = entry.cost + hop;
                if dist.get(&next_key).map(|&d| tentative < d).unwrap_or(true) {
                    dist.insert(next_key, tentative);
                    parent.insert(next_key, Some(key));
                    open.push(RouteEntry {
                        gm_id: to_gm,
                        door_id: next.door_id,
                        cost: tentative,
                        seq,
                    });
                    seq += 1;
                }
            }
        }

        let (end, _) = best_end.ok_or(NavError::Disconnected)?;

        // Walk parents back to the source, then orient forward.
        let mut exits = vec![end];
        let mut at = end;
        while let Some(Some(prev)) = parent.get(&at) {
            exits.push(*prev);
            at = *prev;
        }
        exits.reverse();

        let crossings = exits
            .into_iter()
            .map(|(from_gm, exit_door)| {
                let (to_gm, entry_door) = self.doors[from_gm][exit_door]
                    .adjacent
                    .expect("routed doors are paired");
                DoorCrossing {
                    from_gm,
                    exit_door,
                    to_gm,
                    entry_door,
                }
            })
            .collect();
        Ok(crossings)
    }
}
