//! Component definitions for the walk simulation.
//!
//! Components are pure data attached to NPC entities. Behavior lives in the
//! systems and in `Session`.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use waysim_logic::floor_graph::DoorId;
use waysim_logic::geom::Vec2;
use waysim_logic::nav_path::{GlobalNavPath, GmRoomId, NavMeta, NavMetaKind};

pub type WalkId = u64;

/// Identity of an NPC entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcTag {
    pub key: String,
    pub class_key: String,
}

/// Where an NPC is and which way it faces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pose {
    pub point: Vec2,
    /// Heading in radians, world x axis = 0.
    pub angle: f32,
    pub gm_room: Option<GmRoomId>,
}

/// Movement parameters, copied from the NPC class at spawn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Mobility {
    /// World units per second.
    pub speed: f32,
    /// Body radius for collision.
    pub radius: f32,
    /// Maximum heading change in radians per second.
    pub turn_rate: f32,
}

/// Door keys the NPC carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub keys: HashSet<String>,
}

/// Spawnable NPC template, registered on the session. Movement fields fall
/// back to the shared defaults when a world definition omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcClass {
    pub key: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default = "default_turn_rate")]
    pub turn_rate: f32,
}

fn default_speed() -> f32 {
    waysim_logic::constants::DEFAULT_WALK_SPEED
}

fn default_radius() -> f32 {
    waysim_logic::constants::DEFAULT_NPC_RADIUS
}

fn default_turn_rate() -> f32 {
    waysim_logic::constants::DEFAULT_TURN_RATE
}

/// How a walking NPC treats doors along its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DoorStrategy {
    /// Never opens doors; a shut door ends the walk as blocked.
    None,
    /// Requests doors open and walks straight through, even when a lock it
    /// cannot pass keeps the door shut.
    #[default]
    Open,
    /// Requests the door open and waits at the threshold until it is; ends
    /// the walk blocked at a lock it cannot pass.
    SafeOpen,
    /// Opens every door, locked or not.
    ForceOpen,
}

/// A nav meta positioned by its distance along the walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WayMeta {
    pub meta: NavMeta,
    /// Path distance at the meta's vertex.
    pub length: f32,
}

/// A door the walk passes through, positioned by path distance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DoorCheck {
    pub gm_id: usize,
    pub door_id: DoorId,
    pub at: f32,
}

/// An in-progress walk along a `GlobalNavPath`.
///
/// `travelled` is monotone per walk; metas fire in `metas` order as it
/// passes their lengths, and door checks resolve as it approaches them.
#[derive(Debug, Clone)]
pub struct Walk {
    pub id: WalkId,
    pub path: GlobalNavPath,
    /// Cumulative length at each path vertex.
    pub sofars: Vec<f32>,
    /// Nav metas sorted by length (stable, so same-vertex metas keep their
    /// path order).
    pub metas: Vec<WayMeta>,
    pub next_meta: usize,
    pub door_checks: Vec<DoorCheck>,
    pub door_cursor: usize,
    pub travelled: f32,
    /// `travelled` as of the last collision pass; the two bound the tick's
    /// swept segment.
    pub prev_travelled: f32,
    pub total: f32,
    pub door_strategy: DoorStrategy,
    /// Paused by an explicit request.
    pub paused: bool,
    /// Paused by the simulation itself (e.g. whole-session pause).
    pub force_paused: bool,
    /// Set once the first tick has established initial contacts.
    pub started: bool,
    pub decor_contacts: HashSet<String>,
    pub npc_contacts: HashSet<String>,
}

impl Walk {
    pub fn new(id: WalkId, path: GlobalNavPath, door_strategy: DoorStrategy) -> Self {
        let sofars = path.cumulative_lengths();
        let total = *sofars.last().unwrap_or(&0.0);

        let mut metas: Vec<WayMeta> = path
            .nav_metas
            .iter()
            .map(|meta| WayMeta {
                meta: meta.clone(),
                length: sofars[meta.index],
            })
            .collect();
        metas.sort_by(|a, b| {
            a.length
                .partial_cmp(&b.length)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let door_checks: Vec<DoorCheck> = metas
            .iter()
            .filter_map(|wm| match wm.meta.kind {
                NavMetaKind::AtDoor { gm_id, door_id, .. } => Some(DoorCheck {
                    gm_id,
                    door_id,
                    at: wm.length,
                }),
                _ => None,
            })
            .collect();

        Self {
            id,
            path,
            sofars,
            metas,
            next_meta: 0,
            door_checks,
            door_cursor: 0,
            travelled: 0.0,
            prev_travelled: 0.0,
            total,
            door_strategy,
            paused: false,
            force_paused: false,
            started: false,
            decor_contacts: HashSet::new(),
            npc_contacts: HashSet::new(),
        }
    }

    /// Point at path distance `t`, plus the segment index it falls on.
    pub fn sample(&self, t: f32) -> (Vec2, usize) {
        let points = &self.path.points;
        if points.len() < 2 {
            return (points.first().copied().unwrap_or(Vec2::ZERO), 0);
        }
        let t = t.clamp(0.0, self.total);
        // First vertex with sofar > t bounds the segment.
        let i = self
            .sofars
            .partition_point(|&s| s <= t)
            .clamp(1, points.len() - 1);
        let seg = i - 1;
        let span = self.sofars[i] - self.sofars[seg];
        if span <= f32::EPSILON {
            return (points[i], seg);
        }
        let frac = (t - self.sofars[seg]) / span;
        (points[seg].lerp(&points[i], frac), seg)
    }

    /// Heading of the segment at path distance `t`, skipping degenerate
    /// segments.
    pub fn heading_at(&self, t: f32) -> Option<f32> {
        let (_, mut seg) = self.sample(t);
        while seg + 1 < self.path.points.len() {
            let dir = self.path.points[seg + 1] - self.path.points[seg];
            if dir.length() > f32::EPSILON {
                return Some(dir.angle());
            }
            seg += 1;
        }
        None
    }
}

/// Destinations queued behind the current walk. The next one starts only
/// when the current walk completes; cancellation and blocking clear it.
#[derive(Debug, Clone, Default)]
pub struct WalkQueue {
    pub pending: VecDeque<(Vec2, DoorStrategy)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_path() -> GlobalNavPath {
        GlobalNavPath {
            points: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(3.0, 0.0),
                Vec2::new(3.0, 4.0),
            ],
            edge_nodes: vec![vec![], vec![]],
            nav_metas: vec![
                NavMeta {
                    index: 0,
                    kind: NavMetaKind::Vertex,
                },
                NavMeta {
                    index: 1,
                    kind: NavMetaKind::AtDoor {
                        gm_id: 0,
                        door_id: 2,
                        hull: false,
                        next: None,
                    },
                },
                NavMeta {
                    index: 2,
                    kind: NavMetaKind::Vertex,
                },
            ],
            gm_room_ids: vec![],
        }
    }

    #[test]
    fn walk_precomputes_lengths_and_door_checks() {
        let walk = Walk::new(1, straight_path(), DoorStrategy::Open);
        assert_eq!(walk.total, 7.0);
        assert_eq!(walk.sofars, vec![0.0, 3.0, 7.0]);
        assert_eq!(walk.metas.len(), 3);
        assert_eq!(walk.door_checks.len(), 1);
        assert_eq!(walk.door_checks[0].at, 3.0);
        assert_eq!(walk.door_checks[0].door_id, 2);
    }

    #[test]
    fn sample_interpolates_along_segments() {
        let walk = Walk::new(1, straight_path(), DoorStrategy::Open);
        let (p, seg) = walk.sample(1.5);
        assert_eq!(seg, 0);
        assert!((p.x - 1.5).abs() < 1e-6 && p.y.abs() < 1e-6);
        let (p, seg) = walk.sample(5.0);
        assert_eq!(seg, 1);
        assert!((p.x - 3.0).abs() < 1e-6 && (p.y - 2.0).abs() < 1e-6);
        // Clamped at both ends.
        assert_eq!(walk.sample(-1.0).0, Vec2::new(0.0, 0.0));
        assert_eq!(walk.sample(100.0).0, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn heading_follows_current_segment() {
        let walk = Walk::new(1, straight_path(), DoorStrategy::Open);
        assert!((walk.heading_at(1.0).unwrap() - 0.0).abs() < 1e-6);
        let up = std::f32::consts::FRAC_PI_2;
        assert!((walk.heading_at(5.0).unwrap() - up).abs() < 1e-6);
    }
}
