//! Navigation path value types and cross-segment stitching.
//!
//! A `GlobalNavPath` is the unit of currency between the navigation service
//! and the NPC walk state machine: pulled world-space vertices, the
//! triangles each edge crosses, nav metas keyed to vertex indices, and the
//! (gmId, roomId) transitions along the way.

use serde::{Deserialize, Serialize};

use crate::constants::PATH_JOIN_EPSILON;
use crate::geom::Vec2;

/// Identifies a room within a placed geomorph instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GmRoomId {
    pub gm_id: usize,
    pub room_id: usize,
}

/// A triangle reference qualified by its geomorph instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub gm_id: usize,
    pub node_id: usize,
}

/// Collision transition phase carried on collide metas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollidePhase {
    Enter,
    /// Already overlapping when the walk began.
    StartInside,
    Exit,
}

/// What happens at a particular point along a navigation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavMetaKind {
    /// A turn vertex of the pulled path.
    Vertex,
    EnterRoom {
        gm_room: GmRoomId,
    },
    ExitRoom {
        gm_room: GmRoomId,
    },
    /// Crossing a doorway. For hull doors `next` names the geomorph/room
    /// entered on the far side.
    AtDoor {
        gm_id: usize,
        door_id: usize,
        hull: bool,
        next: Option<GmRoomId>,
    },
    /// NPC-vs-NPC proximity transition (emitted by the walk systems, never
    /// present in a freshly computed path).
    NpcsCollide {
        other_key: String,
        phase: CollidePhase,
    },
    /// NPC-vs-decor overlap transition (ditto).
    DecorCollide {
        decor_key: String,
        phase: CollidePhase,
    },
}

/// A nav meta bound to a vertex index of its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavMeta {
    pub index: usize,
    pub kind: NavMetaKind,
}

/// A path local to one geomorph instance, pre-stitching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalNavPath {
    pub gm_id: usize,
    pub points: Vec<Vec2>,
    /// Per edge, the triangles the edge crosses (local node ids).
    pub edge_nodes: Vec<Vec<usize>>,
    pub metas: Vec<NavMeta>,
    /// (vertex index, room) recorded only where the room changes.
    pub gm_rooms: Vec<(usize, GmRoomId)>,
}

/// A hull-door crossing between two consecutive path segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoorBoundary {
    /// Geomorph being left and its hull door.
    pub gm_id: usize,
    pub door_id: usize,
    /// Geomorph/room entered on the far side.
    pub next: GmRoomId,
}

/// A navigation path possibly spanning multiple geomorph instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalNavPath {
    pub points: Vec<Vec2>,
    pub edge_nodes: Vec<Vec<NodeRef>>,
    pub nav_metas: Vec<NavMeta>,
    /// (vertex index, gm/room) recorded only at transitions.
    pub gm_room_ids: Vec<(usize, GmRoomId)>,
}

impl GlobalNavPath {
    pub fn is_empty(&self) -> bool {
        self.points.len() < 2
    }

    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    /// Cumulative length at each vertex (`sofars`): entry 0 is 0, the last
    /// entry is the total path length.
    pub fn cumulative_lengths(&self) -> Vec<f32> {
        let mut sofars = Vec::with_capacity(self.points.len());
        let mut total = 0.0;
        sofars.push(0.0);
        for w in self.points.windows(2) {
            total += w[0].distance(&w[1]);
            sofars.push(total);
        }
        sofars
    }

    /// Room active at `vertex`, per the recorded transitions.
    pub fn room_at(&self, vertex: usize) -> Option<GmRoomId> {
        self.gm_room_ids
            .iter()
            .take_while(|(i, _)| *i <= vertex)
            .last()
            .map(|(_, r)| *r)
    }

    /// Stitch an ordered list of local segment paths into one global path.
    ///
    /// `boundaries` carries the hull-door crossing between each adjacent
    /// pair of segments (`boundaries.len() == segments.len() - 1`); an
    /// `AtDoor` meta is synthesized at each stitch point. Duplicate boundary
    /// points are dropped; meta indices are offset by the running point
    /// count. Deterministic for identical inputs.
    pub fn concatenate(segments: &[LocalNavPath], boundaries: &[DoorBoundary]) -> GlobalNavPath {
        assert!(
            segments.is_empty() || boundaries.len() == segments.len() - 1,
            "one boundary per adjacent segment pair"
        );

        let mut out = GlobalNavPath::default();
        let mut last_room: Option<GmRoomId> = None;

        for (si, seg) in segments.iter().enumerate() {
            let mut drop_first = false;
            if let (Some(last), Some(first)) = (out.points.last(), seg.points.first()) {
                if last.distance(first) <= PATH_JOIN_EPSILON {
                    drop_first = true;
                }
            }
            // Offset applied to this segment's vertex indices.
            let offset = out.points.len() - usize::from(drop_first);

            // Stitch boundary: the crossing happens at the shared vertex.
            if si > 0 {
                let b = boundaries[si - 1];
                out.nav_metas.push(NavMeta {
                    index: offset,
                    kind: NavMetaKind::AtDoor {
                        gm_id: b.gm_id,
                        door_id: b.door_id,
                        hull: true,
                        next: Some(b.next),
                    },
                });
            }

            out.points
                .extend(seg.points.iter().skip(usize::from(drop_first)).copied());
            out.edge_nodes.extend(seg.edge_nodes.iter().map(|nodes| {
                nodes
                    .iter()
                    .map(|&node_id| NodeRef {
                        gm_id: seg.gm_id,
                        node_id,
                    })
                    .collect::<Vec<_>>()
            }));
            out.nav_metas.extend(seg.metas.iter().map(|m| NavMeta {
                index: m.index + offset,
                kind: m.kind.clone(),
            }));

            for &(idx, room) in &seg.gm_rooms {
                if last_room != Some(room) {
                    out.gm_room_ids.push((idx + offset, room));
                    last_room = Some(room);
                }
            }
        }

        out.nav_metas.sort_by_key(|m| m.index);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(gm_id: usize, pts: &[(f32, f32)], room: usize) -> LocalNavPath {
        let points: Vec<Vec2> = pts.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
        let edge_nodes = vec![vec![0usize]; points.len().saturating_sub(1)];
        LocalNavPath {
            gm_id,
            points,
            edge_nodes,
            metas: vec![NavMeta {
                index: 0,
                kind: NavMetaKind::Vertex,
            }],
            gm_rooms: vec![(0, GmRoomId { gm_id, room_id: room })],
        }
    }

    #[test]
    fn concatenate_drops_duplicate_boundary_points() {
        let a = seg(0, &[(0.0, 0.0), (5.0, 0.0)], 0);
        let b = seg(1, &[(5.0, 0.0), (10.0, 0.0)], 0);
        let boundary = DoorBoundary {
            gm_id: 0,
            door_id: 3,
            next: GmRoomId {
                gm_id: 1,
                room_id: 0,
            },
        };
        let global = GlobalNavPath::concatenate(&[a.clone(), b.clone()], &[boundary]);

        // points = 2 + 2 - 1 duplicate drop
        assert_eq!(
            global.points.len(),
            a.points.len() + b.points.len() - 1,
            "{global:?}"
        );
        assert_eq!(global.edge_nodes.len(), global.points.len() - 1);
        assert_eq!(global.edge_nodes[1][0].gm_id, 1);
    }

    #[test]
    fn concatenate_point_count_arithmetic() {
        // Three segments sharing endpoints: total = sum - (segments - 1).
        let segs = vec![
            seg(0, &[(0.0, 0.0), (5.0, 0.0)], 0),
            seg(1, &[(5.0, 0.0), (9.0, 0.0), (9.0, 4.0)], 0),
            seg(2, &[(9.0, 4.0), (9.0, 9.0)], 1),
        ];
        let b = |gm_id, next_gm| DoorBoundary {
            gm_id,
            door_id: 0,
            next: GmRoomId {
                gm_id: next_gm,
                room_id: 0,
            },
        };
        let global = GlobalNavPath::concatenate(&segs, &[b(0, 1), b(1, 2)]);
        let sum: usize = segs.iter().map(|s| s.points.len()).sum();
        assert_eq!(global.points.len(), sum - (segs.len() - 1));
    }

    #[test]
    fn concatenate_synthesizes_at_door_metas() {
        let a = seg(0, &[(0.0, 0.0), (5.0, 0.0)], 0);
        let b = seg(1, &[(5.0, 0.0), (10.0, 0.0)], 2);
        let boundary = DoorBoundary {
            gm_id: 0,
            door_id: 7,
            next: GmRoomId {
                gm_id: 1,
                room_id: 2,
            },
        };
        let global = GlobalNavPath::concatenate(&[a, b], &[boundary]);

        let doors: Vec<&NavMeta> = global
            .nav_metas
            .iter()
            .filter(|m| matches!(m.kind, NavMetaKind::AtDoor { .. }))
            .collect();
        assert_eq!(doors.len(), 1);
        assert_eq!(doors[0].index, 1);
        match &doors[0].kind {
            NavMetaKind::AtDoor {
                gm_id,
                door_id,
                hull,
                next,
            } => {
                assert_eq!((*gm_id, *door_id, *hull), (0, 7, true));
                assert_eq!(
                    *next,
                    Some(GmRoomId {
                        gm_id: 1,
                        room_id: 2
                    })
                );
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn gm_room_ids_keep_transitions_only() {
        let a = seg(0, &[(0.0, 0.0), (5.0, 0.0)], 3);
        let mut b = seg(0, &[(5.0, 0.0), (10.0, 0.0)], 3); // same room
        b.gm_rooms = vec![(
            0,
            GmRoomId {
                gm_id: 0,
                room_id: 3,
            },
        )];
        let boundary = DoorBoundary {
            gm_id: 0,
            door_id: 0,
            next: GmRoomId {
                gm_id: 0,
                room_id: 3,
            },
        };
        let global = GlobalNavPath::concatenate(&[a, b], &[boundary]);
        assert_eq!(global.gm_room_ids.len(), 1, "{:?}", global.gm_room_ids);
    }

    #[test]
    fn concatenate_is_deterministic() {
        let segs = vec![
            seg(0, &[(0.0, 0.0), (5.0, 0.0)], 0),
            seg(1, &[(5.0, 0.0), (10.0, 0.0)], 1),
        ];
        let boundary = DoorBoundary {
            gm_id: 0,
            door_id: 1,
            next: GmRoomId {
                gm_id: 1,
                room_id: 1,
            },
        };
        let one = GlobalNavPath::concatenate(&segs, &[boundary]);
        let two = GlobalNavPath::concatenate(&segs, &[boundary]);
        assert_eq!(one, two);
    }

    #[test]
    fn cumulative_lengths_and_room_at() {
        let mut path = GlobalNavPath {
            points: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(3.0, 0.0),
                Vec2::new(3.0, 4.0),
            ],
            ..Default::default()
        };
        path.gm_room_ids = vec![
            (
                0,
                GmRoomId {
                    gm_id: 0,
                    room_id: 0,
                },
            ),
            (
                2,
                GmRoomId {
                    gm_id: 0,
                    room_id: 1,
                },
            ),
        ];
        let sofars = path.cumulative_lengths();
        assert_eq!(sofars, vec![0.0, 3.0, 7.0]);
        assert_eq!(path.room_at(1).unwrap().room_id, 0);
        assert_eq!(path.room_at(2).unwrap().room_id, 1);
    }
}
