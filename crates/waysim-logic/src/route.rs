//! Global navigation: point-to-point routing across geomorph instances.
//!
//! Resolves the source and destination instances, asks the `GmGraph` for the
//! hull-door crossings between them, runs one `FloorGraph` search per leg,
//! derives nav metas (vertices, room transitions, door crossings) for each
//! leg, and stitches the legs into a single `GlobalNavPath`.

use crate::constants::MAX_CENTROID_FALLBACK_DIST;
use crate::error::NavError;
use crate::floor_graph::{DoorId, DoorStatus, FloorGraph, FloorPath, RoomId, SearchOpts};
use crate::geom::Vec2;
use crate::gm_graph::GmGraph;
use crate::nav_path::{DoorBoundary, GlobalNavPath, GmRoomId, LocalNavPath, NavMeta, NavMetaKind};

/// Options for a global navigation query.
#[derive(Debug, Clone, Copy)]
pub struct NavOpts {
    /// Snap off-mesh endpoints to the nearest triangle centroid.
    pub centroids_fallback: bool,
    pub max_centroid_dist: f32,
    /// Extra search cost for triangles behind closed/locked doors. Zero
    /// leaves door state out of the search entirely.
    pub closed_weight: f32,
    pub locked_weight: f32,
}

impl Default for NavOpts {
    fn default() -> Self {
        Self {
            centroids_fallback: true,
            max_centroid_dist: MAX_CENTROID_FALLBACK_DIST,
            closed_weight: 0.0,
            locked_weight: 0.0,
        }
    }
}

/// Door state provider keyed by `(gm_id, door_id)`.
pub type DoorStatusFn<'a> = &'a dyn Fn(usize, DoorId) -> DoorStatus;

/// Derive per-leg nav metas and room transitions from a floor path.
///
/// Room changes are read off the triangle corridor: a doorway triangle
/// (room `None`) carries the previous room forward, so each door crossing
/// yields exactly one exit/enter pair. Non-hull door crossings get an
/// `AtDoor` meta at whichever edge endpoint sits nearer the doorway.
fn derive_local(gm_id: usize, gm_graph: &GmGraph, floor: &FloorGraph, path: FloorPath) -> LocalNavPath {
    let mut metas: Vec<NavMeta> = (0..path.points.len())
        .map(|index| NavMeta {
            index,
            kind: NavMetaKind::Vertex,
        })
        .collect();

    // Door crossings.
    let mut seen_doors: Vec<DoorId> = Vec::new();
    for (i, nodes) in path.edge_nodes.iter().enumerate() {
        for &n in nodes {
            for &door_id in floor.node_doors(n) {
                if seen_doors.contains(&door_id) {
                    continue;
                }
                seen_doors.push(door_id);
                let door = gm_graph.door(gm_id, door_id);
                if door.hull {
                    // Hull crossings are synthesized at the stitch point.
                    continue;
                }
                let near = door.entry;
                let index = if path.points[i].distance_squared(&near)
                    <= path.points[i + 1].distance_squared(&near)
                {
                    i
                } else {
                    i + 1
                };
                metas.push(NavMeta {
                    index,
                    kind: NavMetaKind::AtDoor {
                        gm_id,
                        door_id,
                        hull: false,
                        next: None,
                    },
                });
            }
        }
    }

    // Room transitions.
    let mut gm_rooms: Vec<(usize, GmRoomId)> = Vec::new();
    let mut room: Option<RoomId> = None;
    for (i, nodes) in path.edge_nodes.iter().enumerate() {
        for &n in nodes {
            let Some(r) = floor.node_room(n) else {
                continue;
            };
            if room == Some(r) {
                continue;
            }
            let at = if room.is_none() { 0 } else { i + 1 };
            if let Some(prev) = room {
                metas.push(NavMeta {
                    index: at,
                    kind: NavMetaKind::ExitRoom {
                        gm_room: GmRoomId {
                            gm_id,
                            room_id: prev,
                        },
                    },
                });
            }
            metas.push(NavMeta {
                index: at,
                kind: NavMetaKind::EnterRoom {
                    gm_room: GmRoomId { gm_id, room_id: r },
                },
            });
            gm_rooms.push((at, GmRoomId { gm_id, room_id: r }));
            room = Some(r);
        }
    }

    LocalNavPath {
        gm_id,
        points: path.points,
        edge_nodes: path.edge_nodes,
        metas,
        gm_rooms,
    }
}

/// Find a pulled path from `src` to `dst`, crossing hull doors as needed.
///
/// Failures are typed: an endpoint outside every instance (or off-mesh past
/// the fallback cap) is `UnreachableSrc`/`UnreachableDst`; endpoints on the
/// mesh with no connecting corridor are `Disconnected`.
pub fn global_nav_path(
    gm_graph: &GmGraph,
    floors: &[FloorGraph],
    src: &Vec2,
    dst: &Vec2,
    opts: &NavOpts,
    door_status: Option<DoorStatusFn>,
) -> Result<GlobalNavPath, NavError> {
    let src_gm = gm_graph
        .find_gm_containing(src)
        .ok_or(NavError::UnreachableSrc)?;
    let dst_gm = gm_graph
        .find_gm_containing(dst)
        .ok_or(NavError::UnreachableDst)?;

    let crossings = gm_graph.find_door_route(src_gm, src, dst_gm, dst)?;

    // Leg endpoints: src, then the shared boundary point of each crossing,
    // then dst.
    let mut legs: Vec<(usize, Vec2, Vec2)> = Vec::with_capacity(crossings.len() + 1);
    let mut at_gm = src_gm;
    let mut at_point = *src;
    for crossing in &crossings {
        let shared = gm_graph.door(crossing.from_gm, crossing.exit_door).center;
        legs.push((at_gm, at_point, shared));
        at_gm = crossing.to_gm;
        at_point = shared;
    }
    legs.push((at_gm, at_point, *dst));

    let last = legs.len() - 1;
    let mut locals = Vec::with_capacity(legs.len());
    for (i, (gm_id, from, to)) in legs.into_iter().enumerate() {
        let status = door_status.map(|f| move |d: DoorId| f(gm_id, d));
        let search = SearchOpts {
            centroids_fallback: opts.centroids_fallback,
            max_centroid_dist: opts.max_centroid_dist,
            closed_weight: opts.closed_weight,
            locked_weight: opts.locked_weight,
            door_status: status.as_ref().map(|f| f as &dyn Fn(DoorId) -> DoorStatus),
            ..Default::default()
        };
        let path = floors[gm_id]
            .find_path(&from, &to, &search)
            .map_err(|e| match e {
                // Legs between door boundary points start and end on-mesh;
                // a failure there means the corridor is broken, not the
                // caller's endpoints.
                NavError::UnreachableSrc if i > 0 => NavError::Disconnected,
                NavError::UnreachableDst if i < last => NavError::Disconnected,
                other => other,
            })?;
        locals.push(derive_local(gm_id, gm_graph, &floors[gm_id], path));
    }

    let boundaries: Vec<DoorBoundary> = crossings
        .iter()
        .zip(locals.iter().skip(1))
        .map(|(crossing, next_leg)| {
            let room_id = next_leg
                .gm_rooms
                .first()
                .map(|&(_, r)| r.room_id)
                .or_else(|| gm_graph.door(crossing.to_gm, crossing.entry_door).room)
                .unwrap_or(0);
            DoorBoundary {
                gm_id: crossing.from_gm,
                door_id: crossing.exit_door,
                next: GmRoomId {
                    gm_id: crossing.to_gm,
                    room_id,
                },
            }
        })
        .collect();

    Ok(GlobalNavPath::concatenate(&locals, &boundaries))
}
