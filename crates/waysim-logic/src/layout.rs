//! Geomorph layout builder.
//!
//! Turns rectangle-based geomorph templates (rooms plus doorway rects) into
//! triangulated floor graphs, then stamps placed instances into world space.
//! Each room is fan-triangulated around its center against a perimeter made
//! of its corners and the endpoints of every attached doorway; doorway rects
//! become two triangles of their own with no room, carrying the door id.
//! Shared vertices are deduplicated by quantized coordinate so adjacency
//! falls out of the shared-edge scan in `FloorGraph::from_triangles`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::VERTEX_QUANTUM;
use crate::floor_graph::{DoorId, FloorGraph, RoomId};
use crate::geom::{Polygon, Rect, Transform, Vec2};
use crate::gm_graph::{DoorNode, GmGraph, GmNode};

/// Wall-coincidence tolerance when attaching doors to room walls.
const EDGE_EPS: f32 = 1e-3;

/// A doorway rect in template-local space. It must bridge a wall: one side
/// coincident with a room wall and, for hull doors, the opposite side on
/// the template bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorSpec {
    pub rect: Rect,
    pub hull: bool,
}

/// A geomorph template: bounds, room rects and doorway rects, all in
/// template-local space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeomorphSpec {
    pub key: String,
    pub bounds: Rect,
    pub rooms: Vec<Rect>,
    pub doors: Vec<DoorSpec>,
}

/// One placed instance of a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub gm_key: String,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    UnknownGeomorph(String),
    /// A doorway rect touches no room wall of its template.
    DetachedDoor { gm_key: String, door: DoorId },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::UnknownGeomorph(key) => write!(f, "unknown geomorph key {key:?}"),
            LayoutError::DetachedDoor { gm_key, door } => {
                write!(f, "door {door} of geomorph {gm_key:?} touches no room wall")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// Overlap segment between one side of `door` and a wall of `room`, if any.
fn shared_edge(door: &Rect, room: &Rect) -> Option<(Vec2, Vec2)> {
    let y_overlap = door.y.max(room.y) < door.max_y().min(room.max_y()) - EDGE_EPS;
    let x_overlap = door.x.max(room.x) < door.max_x().min(room.max_x()) - EDGE_EPS;

    if (door.max_x() - room.x).abs() <= EDGE_EPS && y_overlap {
        let x = door.max_x();
        return Some((Vec2::new(x, door.y), Vec2::new(x, door.max_y())));
    }
    if (door.x - room.max_x()).abs() <= EDGE_EPS && y_overlap {
        return Some((Vec2::new(door.x, door.y), Vec2::new(door.x, door.max_y())));
    }
    if (door.max_y() - room.y).abs() <= EDGE_EPS && x_overlap {
        let y = door.max_y();
        return Some((Vec2::new(door.x, y), Vec2::new(door.max_x(), y)));
    }
    if (door.y - room.max_y()).abs() <= EDGE_EPS && x_overlap {
        return Some((Vec2::new(door.x, door.y), Vec2::new(door.max_x(), door.y)));
    }
    None
}

/// Midpoint of the door side lying on the template bounds, for hull doors.
fn hull_outer_center(door: &Rect, bounds: &Rect) -> Option<Vec2> {
    let c = door.center();
    if (door.x - bounds.x).abs() <= EDGE_EPS {
        return Some(Vec2::new(door.x, c.y));
    }
    if (door.max_x() - bounds.max_x()).abs() <= EDGE_EPS {
        return Some(Vec2::new(door.max_x(), c.y));
    }
    if (door.y - bounds.y).abs() <= EDGE_EPS {
        return Some(Vec2::new(c.x, door.y));
    }
    if (door.max_y() - bounds.max_y()).abs() <= EDGE_EPS {
        return Some(Vec2::new(c.x, door.max_y()));
    }
    None
}

/// Template triangulation, in local space.
struct TemplateMesh {
    vertices: Vec<Vec2>,
    tris: Vec<[usize; 3]>,
    node_room: Vec<Option<RoomId>>,
    node_doors: Vec<Vec<DoorId>>,
    /// Per door: routing center (outer-edge midpoint for hull doors, rect
    /// center otherwise), entry waypoint, fronted room.
    door_centers: Vec<Vec2>,
    door_entries: Vec<Vec2>,
    door_rooms: Vec<Option<RoomId>>,
}

struct VertexPool {
    vertices: Vec<Vec2>,
    index: HashMap<(i64, i64), usize>,
}

impl VertexPool {
    fn new() -> Self {
        Self {
            vertices: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn id(&mut self, p: Vec2) -> usize {
        let key = (
            (p.x / VERTEX_QUANTUM).round() as i64,
            (p.y / VERTEX_QUANTUM).round() as i64,
        );
        *self.index.entry(key).or_insert_with(|| {
            self.vertices.push(p);
            self.vertices.len() - 1
        })
    }
}

fn triangulate(spec: &GeomorphSpec) -> Result<TemplateMesh, LayoutError> {
    let mut pool = VertexPool::new();
    let mut tris: Vec<[usize; 3]> = Vec::new();
    let mut node_room: Vec<Option<RoomId>> = Vec::new();
    let mut node_doors: Vec<Vec<DoorId>> = Vec::new();

    // Door attachments first so room perimeters can include door endpoints.
    let mut attachments: Vec<Vec<(Vec2, Vec2)>> = vec![Vec::new(); spec.rooms.len()];
    let mut door_rooms: Vec<Option<RoomId>> = vec![None; spec.doors.len()];
    for (door_id, door) in spec.doors.iter().enumerate() {
        let mut attached = false;
        for (room_id, room) in spec.rooms.iter().enumerate() {
            if let Some(edge) = shared_edge(&door.rect, room) {
                attachments[room_id].push(edge);
                if door_rooms[door_id].is_none() {
                    door_rooms[door_id] = Some(room_id);
                }
                attached = true;
            }
        }
        if !attached {
            return Err(LayoutError::DetachedDoor {
                gm_key: spec.key.clone(),
                door: door_id,
            });
        }
    }

    // Room fans.
    for (room_id, room) in spec.rooms.iter().enumerate() {
        let center = room.center();
        let mut perimeter: Vec<Vec2> = Polygon::from_rect(room).points;
        for &(a, b) in &attachments[room_id] {
            perimeter.push(a);
            perimeter.push(b);
        }
        // CCW order around the center; the rect is convex so angle sort is
        // exact. Ties are coincident points and collapse below.
        perimeter.sort_by(|p, q| {
            let pa = (*p - center).angle();
            let qa = (*q - center).angle();
            pa.partial_cmp(&qa).unwrap_or(std::cmp::Ordering::Equal)
        });
        perimeter.dedup_by(|p, q| p.distance(q) <= VERTEX_QUANTUM);

        let c = pool.id(center);
        for i in 0..perimeter.len() {
            let a = pool.id(perimeter[i]);
            let b = pool.id(perimeter[(i + 1) % perimeter.len()]);
            if a == b || a == c || b == c {
                continue;
            }
            tris.push([c, a, b]);
            node_room.push(Some(room_id));
            node_doors.push(Vec::new());
        }
    }

    // Doorway quads, two triangles each.
    let mut door_centers = Vec::with_capacity(spec.doors.len());
    let mut door_entries = Vec::with_capacity(spec.doors.len());
    for (door_id, door) in spec.doors.iter().enumerate() {
        let r = &door.rect;
        let c0 = pool.id(Vec2::new(r.x, r.y));
        let c1 = pool.id(Vec2::new(r.max_x(), r.y));
        let c2 = pool.id(Vec2::new(r.max_x(), r.max_y()));
        let c3 = pool.id(Vec2::new(r.x, r.max_y()));
        for tri in [[c0, c1, c2], [c0, c2, c3]] {
            tris.push(tri);
            node_room.push(None);
            node_doors.push(vec![door_id]);
        }

        let center = if door.hull {
            hull_outer_center(r, &spec.bounds).unwrap_or_else(|| r.center())
        } else {
            r.center()
        };
        door_centers.push(center);
        door_entries.push(r.center());
    }

    Ok(TemplateMesh {
        vertices: pool.vertices,
        tris,
        node_room,
        node_doors,
        door_centers,
        door_entries,
        door_rooms,
    })
}

/// Stamp placed instances into world space: one `FloorGraph` per instance
/// (indexed by gm id) plus the instance graph with its hull doors paired.
pub fn build_world(
    specs: &[GeomorphSpec],
    placements: &[Placement],
) -> Result<(GmGraph, Vec<FloorGraph>), LayoutError> {
    let mut meshes: HashMap<&str, (usize, TemplateMesh)> = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
        meshes.insert(spec.key.as_str(), (i, triangulate(spec)?));
    }

    let mut gms = Vec::with_capacity(placements.len());
    let mut all_doors = Vec::with_capacity(placements.len());
    let mut floors = Vec::with_capacity(placements.len());

    for (gm_id, placement) in placements.iter().enumerate() {
        let (spec_idx, mesh) = meshes
            .get(placement.gm_key.as_str())
            .ok_or_else(|| LayoutError::UnknownGeomorph(placement.gm_key.clone()))?;
        let spec = &specs[*spec_idx];
        let t = &placement.transform;

        let vertices: Vec<Vec2> = mesh.vertices.iter().map(|v| t.apply(v)).collect();
        floors.push(FloorGraph::from_triangles(
            vertices,
            &mesh.tris,
            mesh.node_room.clone(),
            mesh.node_doors.clone(),
        ));

        let bounds = Polygon::from_rect(&spec.bounds);
        let world_bounds: Vec<Vec2> = bounds.points.iter().map(|p| t.apply(p)).collect();
        gms.push(GmNode {
            gm_id,
            key: spec.key.clone(),
            transform: *t,
            rect: Rect::from_points(&world_bounds),
            rooms: spec
                .rooms
                .iter()
                .map(|room| {
                    Polygon::new(
                        Polygon::from_rect(room)
                            .points
                            .iter()
                            .map(|p| t.apply(p))
                            .collect(),
                    )
                })
                .collect(),
        });

        all_doors.push(
            spec.doors
                .iter()
                .enumerate()
                .map(|(door_id, door)| DoorNode {
                    gm_id,
                    door_id,
                    center: t.apply(&mesh.door_centers[door_id]),
                    entry: t.apply(&mesh.door_entries[door_id]),
                    room: mesh.door_rooms[door_id],
                    hull: door.hull,
                    sealed: false,
                    adjacent: None,
                })
                .collect(),
        );
    }

    Ok((GmGraph::new(gms, all_doors), floors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floor_graph::SearchOpts;

    /// 10x10 template: two rooms split by a wall at x in (4.5, 5.5), an
    /// inner door bridging them and hull doors on the left and right walls.
    fn two_room_spec() -> GeomorphSpec {
        GeomorphSpec {
            key: "g-two-room".into(),
            bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
            rooms: vec![Rect::new(1.0, 1.0, 3.5, 8.0), Rect::new(5.5, 1.0, 3.5, 8.0)],
            doors: vec![
                DoorSpec {
                    rect: Rect::new(4.5, 4.0, 1.0, 1.5),
                    hull: false,
                },
                DoorSpec {
                    rect: Rect::new(0.0, 4.0, 1.0, 1.5),
                    hull: true,
                },
                DoorSpec {
                    rect: Rect::new(9.0, 4.0, 1.0, 1.5),
                    hull: true,
                },
            ],
        }
    }

    fn single_instance() -> (GmGraph, Vec<FloorGraph>) {
        build_world(
            &[two_room_spec()],
            &[Placement {
                gm_key: "g-two-room".into(),
                transform: Transform::IDENTITY,
            }],
        )
        .unwrap()
    }

    #[test]
    fn built_mesh_satisfies_invariants() {
        let (_, floors) = single_instance();
        floors[0].check_invariants().unwrap();
        assert!(floors[0].node_count() > 0);
    }

    #[test]
    fn doorway_triangles_have_no_room() {
        let (_, floors) = single_instance();
        let floor = &floors[0];
        for door_id in 0..3 {
            let nodes = floor.door_nodes(door_id);
            assert_eq!(nodes.len(), 2, "door {door_id}");
            for &n in nodes {
                assert_eq!(floor.node_room(n), None);
                assert_eq!(floor.node_doors(n), &[door_id]);
            }
        }
    }

    #[test]
    fn rooms_connect_only_through_the_door() {
        let (_, floors) = single_instance();
        let floor = &floors[0];
        let src = Vec2::new(2.0, 2.0); // room 0
        let dst = Vec2::new(8.0, 8.0); // room 1
        let path = floor.find_path(&src, &dst, &SearchOpts::default()).unwrap();

        // Some edge crosses the inner doorway triangles.
        let through_door = path
            .edge_nodes
            .iter()
            .flatten()
            .any(|&n| floor.node_doors(n).contains(&0));
        assert!(through_door, "{path:?}");
        // And the pulled path passes inside the doorway's y-span at the wall.
        assert!(path.points.iter().any(|p| p.x > 4.4 && p.x < 5.6));
    }

    #[test]
    fn detached_door_is_an_error() {
        let mut spec = two_room_spec();
        spec.doors.push(DoorSpec {
            rect: Rect::new(20.0, 20.0, 1.0, 1.0),
            hull: false,
        });
        let err = build_world(
            &[spec],
            &[Placement {
                gm_key: "g-two-room".into(),
                transform: Transform::IDENTITY,
            }],
        )
        .unwrap_err();
        assert_eq!(
            err,
            LayoutError::DetachedDoor {
                gm_key: "g-two-room".into(),
                door: 3
            }
        );
    }

    #[test]
    fn unknown_placement_key_is_an_error() {
        let err = build_world(
            &[two_room_spec()],
            &[Placement {
                gm_key: "nope".into(),
                transform: Transform::IDENTITY,
            }],
        )
        .unwrap_err();
        assert_eq!(err, LayoutError::UnknownGeomorph("nope".into()));
    }

    #[test]
    fn adjacent_instances_pair_hull_doors() {
        // Second instance translated one template width right: its left hull
        // door's outer edge lands on the first instance's right hull door.
        let (gm_graph, floors) = build_world(
            &[two_room_spec()],
            &[
                Placement {
                    gm_key: "g-two-room".into(),
                    transform: Transform::IDENTITY,
                },
                Placement {
                    gm_key: "g-two-room".into(),
                    transform: Transform::translation(10.0, 0.0),
                },
            ],
        )
        .unwrap();
        assert_eq!(floors.len(), 2);

        // Door 2 (right hull) of gm 0 pairs with door 1 (left hull) of gm 1.
        assert_eq!(gm_graph.door(0, 2).adjacent, Some((1, 1)));
        assert_eq!(gm_graph.door(1, 1).adjacent, Some((0, 2)));
        assert!(!gm_graph.door(0, 2).sealed);
        // Outward-facing hull doors have no counterpart and seal.
        assert!(gm_graph.door(0, 1).sealed);
        assert!(gm_graph.door(1, 2).sealed);
    }

    #[test]
    fn paired_hull_doors_share_a_boundary_point() {
        let (gm_graph, floors) = build_world(
            &[two_room_spec()],
            &[
                Placement {
                    gm_key: "g-two-room".into(),
                    transform: Transform::IDENTITY,
                },
                Placement {
                    gm_key: "g-two-room".into(),
                    transform: Transform::translation(10.0, 0.0),
                },
            ],
        )
        .unwrap();
        let shared = gm_graph.door(0, 2).center;
        assert_eq!(shared, gm_graph.door(1, 1).center);
        // The shared point is on both meshes (doorway triangle boundary).
        assert!(floors[0].locate(&shared, None, false, 0.0).is_some());
        assert!(floors[1].locate(&shared, None, false, 0.0).is_some());
    }

    #[test]
    fn room_lookup_in_world_space() {
        let (gm_graph, _) = build_world(
            &[two_room_spec()],
            &[
                Placement {
                    gm_key: "g-two-room".into(),
                    transform: Transform::IDENTITY,
                },
                Placement {
                    gm_key: "g-two-room".into(),
                    transform: Transform::translation(10.0, 0.0),
                },
            ],
        )
        .unwrap();
        let hit = gm_graph
            .find_room_containing(&Vec2::new(17.0, 5.0))
            .unwrap();
        assert_eq!((hit.gm_id, hit.room_id), (1, 1));
    }
}
