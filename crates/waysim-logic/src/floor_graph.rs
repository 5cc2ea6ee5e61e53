//! Triangulated floor graph for one geomorph instance.
//!
//! A `FloorGraph` owns the navigable triangles of a single placed geomorph:
//! triangle adjacency with per-edge portals, triangle→room membership and
//! triangle→door adjacency. It is built once at load time and read-only
//! afterwards; A* search state lives in a per-search scratch struct so the
//! graph can serve any number of overlapping queries.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::NavError;
use crate::funnel::{string_pull, PortalPoints};
use crate::geom::{point_in_triangle, tri_area2, Vec2};

pub type NodeId = usize;
pub type RoomId = usize;
pub type DoorId = usize;

/// The shared edge crossed when moving to a neighbour triangle.
/// `left`/`right` are vertex ids as seen travelling out of this triangle,
/// derived from the triangle's CCW winding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Portal {
    pub left: usize,
    pub right: usize,
}

/// One navigable triangle.
///
/// Invariant: `neighbours.len() == portals.len()`, and each portal's two
/// vertex ids are exactly the vertices shared with that neighbour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriNode {
    pub id: NodeId,
    pub vertex_ids: [usize; 3],
    pub centroid: Vec2,
    pub neighbours: Vec<NodeId>,
    pub portals: Vec<Portal>,
}

/// Open/closed/locked status of a door, as reported by the door state
/// provider when weighting a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorStatus {
    Open,
    Closed,
    Locked,
}

/// Per-search options.
///
/// `src_node`/`dst_node` pin the endpoints to known triangles (used when
/// routing through door entry points that sit on triangle boundaries).
pub struct SearchOpts<'a> {
    pub room: Option<RoomId>,
    pub centroids_fallback: bool,
    pub max_centroid_dist: f32,
    pub src_node: Option<NodeId>,
    pub dst_node: Option<NodeId>,
    /// Extra cost for entering a triangle adjacent to a closed door.
    pub closed_weight: f32,
    /// Extra cost for entering a triangle adjacent to a locked door.
    pub locked_weight: f32,
    pub door_status: Option<&'a dyn Fn(DoorId) -> DoorStatus>,
}

impl Default for SearchOpts<'_> {
    fn default() -> Self {
        Self {
            room: None,
            centroids_fallback: false,
            max_centroid_dist: crate::constants::MAX_CENTROID_FALLBACK_DIST,
            src_node: None,
            dst_node: None,
            closed_weight: 0.0,
            locked_weight: 0.0,
            door_status: None,
        }
    }
}

/// A path through one floor graph: pulled vertices plus, for each edge,
/// the triangles that edge crosses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloorPath {
    pub points: Vec<Vec2>,
    pub edge_nodes: Vec<Vec<NodeId>>,
}

impl FloorPath {
    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }
}

/// Entry in the A* open heap. Lower `f` wins; ties broken by insertion
/// order, so equal-cost expansions stay deterministic.
struct OpenEntry {
    node: NodeId,
    f: f32,
    seq: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}
impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: invert both keys.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-search scratch state, sized to the graph. Allocated per search so
/// overlapping searches on the same graph never share mutable state.
struct SearchState {
    g: Vec<f32>,
    entry: Vec<Vec2>,
    parent: Vec<Option<NodeId>>,
    closed: Vec<bool>,
}

impl SearchState {
    fn new(len: usize) -> Self {
        Self {
            g: vec![f32::MAX; len],
            entry: vec![Vec2::ZERO; len],
            parent: vec![None; len],
            closed: vec![false; len],
        }
    }
}

/// Triangulated navigable mesh of one geomorph instance, in world space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorGraph {
    vertices: Vec<Vec2>,
    nodes: Vec<TriNode>,
    /// Room each triangle belongs to. `None` marks doorway triangles.
    node_room: Vec<Option<RoomId>>,
    /// Doors each triangle is adjacent to (usually 0 or 1).
    node_doors: Vec<Vec<DoorId>>,
    /// Reverse index: door id → triangles adjacent to it.
    door_nodes: HashMap<DoorId, Vec<NodeId>>,
}

impl FloorGraph {
    /// Build from raw triangles. Winding is normalized to CCW; adjacency and
    /// portals are derived from shared vertex pairs.
    pub fn from_triangles(
        vertices: Vec<Vec2>,
        tris: &[[usize; 3]],
        node_room: Vec<Option<RoomId>>,
        node_doors: Vec<Vec<DoorId>>,
    ) -> Self {
        assert_eq!(tris.len(), node_room.len());
        assert_eq!(tris.len(), node_doors.len());

        let mut nodes: Vec<TriNode> = tris
            .iter()
            .enumerate()
            .map(|(id, tri)| {
                let mut v = *tri;
                let area = tri_area2(&vertices[v[0]], &vertices[v[1]], &vertices[v[2]]);
                if area < 0.0 {
                    v.swap(1, 2);
                }
                let centroid = Vec2::new(
                    (vertices[v[0]].x + vertices[v[1]].x + vertices[v[2]].x) / 3.0,
                    (vertices[v[0]].y + vertices[v[1]].y + vertices[v[2]].y) / 3.0,
                );
                TriNode {
                    id,
                    vertex_ids: v,
                    centroid,
                    neighbours: Vec::new(),
                    portals: Vec::new(),
                }
            })
            .collect();

        // Shared-edge map keyed by canonical (min, max) vertex pair.
        let mut edge_map: HashMap<(usize, usize), (NodeId, usize, usize)> = HashMap::new();
        let mut links: Vec<(NodeId, NodeId, usize, usize)> = Vec::new();
        for node in &nodes {
            for e in 0..3 {
                let a = node.vertex_ids[e];
                let b = node.vertex_ids[(e + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                if let Some(&(other, oa, ob)) = edge_map.get(&key) {
                    links.push((node.id, other, a, b));
                    links.push((other, node.id, oa, ob));
                } else {
                    edge_map.insert(key, (node.id, a, b));
                }
            }
        }
        for (from, to, a, b) in links {
            // Directed edge a→b in `from`'s CCW winding: crossing outward,
            // b is on the left, a on the right.
            nodes[from].neighbours.push(to);
            nodes[from].portals.push(Portal { left: b, right: a });
        }

        let mut door_nodes: HashMap<DoorId, Vec<NodeId>> = HashMap::new();
        for (id, doors) in node_doors.iter().enumerate() {
            for &d in doors {
                door_nodes.entry(d).or_default().push(id);
            }
        }

        Self {
            vertices,
            nodes,
            node_room,
            node_doors,
            door_nodes,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[TriNode] {
        &self.nodes
    }

    pub fn vertex(&self, id: usize) -> Vec2 {
        self.vertices[id]
    }

    pub fn node_room(&self, node: NodeId) -> Option<RoomId> {
        self.node_room[node]
    }

    pub fn node_doors(&self, node: NodeId) -> &[DoorId] {
        &self.node_doors[node]
    }

    /// Triangles adjacent to a door, in build order.
    pub fn door_nodes(&self, door: DoorId) -> &[NodeId] {
        self.door_nodes.get(&door).map(Vec::as_slice).unwrap_or(&[])
    }

    fn node_matches_room(&self, node: NodeId, room: Option<RoomId>) -> bool {
        match room {
            None => true,
            // Doorway triangles (room = None) stay usable under a room filter
            // so paths can still leave through doors.
            Some(r) => self.node_room[node].map(|nr| nr == r).unwrap_or(true),
        }
    }

    /// Triangle containing `point`, if any; with `centroids_fallback`, the
    /// nearest centroid within `max_centroid_dist` instead.
    pub fn locate(
        &self,
        point: &Vec2,
        room: Option<RoomId>,
        centroids_fallback: bool,
        max_centroid_dist: f32,
    ) -> Option<NodeId> {
        for node in &self.nodes {
            if !self.node_matches_room(node.id, room) {
                continue;
            }
            let [a, b, c] = node.vertex_ids;
            if point_in_triangle(point, &self.vertices[a], &self.vertices[b], &self.vertices[c]) {
                return Some(node.id);
            }
        }
        if !centroids_fallback {
            return None;
        }
        let max_sq = max_centroid_dist * max_centroid_dist;
        self.nodes
            .iter()
            .filter(|n| self.node_matches_room(n.id, room))
            .map(|n| (n.id, n.centroid.distance_squared(point)))
            .filter(|&(_, d)| d <= max_sq)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(id, _)| id)
    }

    /// Extra cost for entering `node`, from door weights.
    fn door_weight(&self, node: NodeId, opts: &SearchOpts) -> f32 {
        let status = match opts.door_status {
            Some(f) => f,
            None => return 0.0,
        };
        if opts.closed_weight == 0.0 && opts.locked_weight == 0.0 {
            return 0.0;
        }
        let mut weight = 0.0;
        for &door in &self.node_doors[node] {
            match status(door) {
                DoorStatus::Open => {}
                DoorStatus::Closed => weight += opts.closed_weight,
                DoorStatus::Locked => weight += opts.locked_weight,
            }
        }
        weight
    }

    /// A* over triangle adjacency. Traversal cost is the distance between
    /// consecutive portal midpoints (continuous, not centroid hops); the
    /// heuristic is straight-line distance to the destination point.
    fn find_node_path(
        &self,
        src_node: NodeId,
        src_point: &Vec2,
        dst_node: NodeId,
        dst_point: &Vec2,
        opts: &SearchOpts,
    ) -> Option<Vec<NodeId>> {
        if src_node == dst_node {
            return Some(vec![src_node]);
        }

        let mut state = SearchState::new(self.nodes.len());
        let mut open = BinaryHeap::new();
        let mut seq = 0u64;

        state.g[src_node] = 0.0;
        state.entry[src_node] = *src_point;
        open.push(OpenEntry {
            node: src_node,
            f: src_point.distance(dst_point),
            seq,
        });

        while let Some(current) = open.pop() {
            let u = current.node;
            if u == dst_node {
                let mut path = vec![u];
                let mut at = u;
                while let Some(prev) = state.parent[at] {
                    path.push(prev);
                    at = prev;
                }
                path.reverse();
                return Some(path);
            }
            if state.closed[u] {
                continue;
            }
            state.closed[u] = true;

            let node = &self.nodes[u];
            for (i, &v) in node.neighbours.iter().enumerate() {
                if state.closed[v] || !self.node_matches_room(v, opts.room) {
                    continue;
                }
                let portal = node.portals[i];
                let mid = self.vertices[portal.left].midpoint(&self.vertices[portal.right]);
                let step = state.entry[u].distance(&mid) + self.door_weight(v, opts);
                let tentative = state.g[u] + step;
                if tentative < state.g[v] {
                    state.g[v] = tentative;
                    state.entry[v] = mid;
                    state.parent[v] = Some(u);
                    seq += 1;
                    open.push(OpenEntry {
                        node: v,
                        f: tentative + mid.distance(dst_point),
                        seq,
                    });
                }
            }
        }

        None
    }

    /// Portal sequence along a node path, oriented for forward travel.
    fn path_portals(&self, node_path: &[NodeId]) -> Vec<PortalPoints> {
        node_path
            .windows(2)
            .map(|w| {
                let node = &self.nodes[w[0]];
                let i = node
                    .neighbours
                    .iter()
                    .position(|&n| n == w[1])
                    .expect("adjacent nodes in path");
                let portal = node.portals[i];
                PortalPoints {
                    left: self.vertices[portal.left],
                    right: self.vertices[portal.right],
                }
            })
            .collect()
    }

    /// Find a pulled path between two points on this floor.
    pub fn find_path(
        &self,
        src: &Vec2,
        dst: &Vec2,
        opts: &SearchOpts,
    ) -> Result<FloorPath, NavError> {
        if self.nodes.is_empty() {
            return Err(NavError::EmptyZone);
        }

        let src_node = opts
            .src_node
            .or_else(|| self.locate(src, opts.room, opts.centroids_fallback, opts.max_centroid_dist))
            .ok_or(NavError::UnreachableSrc)?;
        let dst_node = opts
            .dst_node
            .or_else(|| self.locate(dst, opts.room, opts.centroids_fallback, opts.max_centroid_dist))
            .ok_or(NavError::UnreachableDst)?;

        let node_path = self
            .find_node_path(src_node, src, dst_node, dst, opts)
            .ok_or(NavError::Disconnected)?;

        if node_path.len() == 1 {
            return Ok(FloorPath {
                points: vec![*src, *dst],
                edge_nodes: vec![vec![src_node]],
            });
        }

        let portals = self.path_portals(&node_path);
        let pulled = string_pull(*src, *dst, &portals);

        let points: Vec<Vec2> = pulled.iter().map(|p| p.point).collect();
        let edge_nodes: Vec<Vec<NodeId>> = pulled
            .windows(2)
            .map(|w| {
                let lo = w[0].corridor_index.min(node_path.len() - 1);
                let hi = w[1].corridor_index.min(node_path.len() - 1);
                node_path[lo..=hi].to_vec()
            })
            .collect();

        Ok(FloorPath { points, edge_nodes })
    }

    /// Structural invariants: portal count matches neighbour count and every
    /// portal's vertices are shared with the neighbour. Used by tests and
    /// the headless harness.
    pub fn check_invariants(&self) -> Result<(), String> {
        for node in &self.nodes {
            if node.neighbours.len() != node.portals.len() {
                return Err(format!(
                    "node {}: {} neighbours vs {} portals",
                    node.id,
                    node.neighbours.len(),
                    node.portals.len()
                ));
            }
            for (i, &nb) in node.neighbours.iter().enumerate() {
                let portal = node.portals[i];
                let other = &self.nodes[nb];
                let shared = [portal.left, portal.right]
                    .iter()
                    .filter(|v| other.vertex_ids.contains(v) && node.vertex_ids.contains(v))
                    .count();
                if shared != 2 {
                    return Err(format!(
                        "node {} portal to {} shares {} vertices, want 2",
                        node.id, nb, shared
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x1 strip of unit quads, each split into two triangles:
    ///
    ///   3 --- 4 --- 5
    ///   | \   | \   |
    ///   0 --- 1 --- 2
    fn strip() -> FloorGraph {
        let vertices = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 1.0),
        ];
        let tris = [[0, 1, 3], [1, 4, 3], [1, 2, 4], [2, 5, 4]];
        FloorGraph::from_triangles(vertices, &tris, vec![Some(0); 4], vec![vec![]; 4])
    }

    #[test]
    fn adjacency_and_portals() {
        let g = strip();
        g.check_invariants().unwrap();
        // Middle triangles touch two neighbours, end triangles one.
        assert_eq!(g.nodes()[0].neighbours.len(), 1);
        assert_eq!(g.nodes()[1].neighbours.len(), 2);
        assert_eq!(g.nodes()[2].neighbours.len(), 2);
        assert_eq!(g.nodes()[3].neighbours.len(), 1);
    }

    #[test]
    fn locate_inside_and_outside() {
        let g = strip();
        assert!(g.locate(&Vec2::new(0.2, 0.2), None, false, 0.0).is_some());
        assert!(g.locate(&Vec2::new(5.0, 5.0), None, false, 0.0).is_none());
    }

    #[test]
    fn centroid_fallback_respects_distance_cap() {
        let g = strip();
        let p = Vec2::new(3.0, 0.5); // 1 unit right of the mesh
        assert!(g.locate(&p, None, true, 0.2).is_none());
        assert!(g.locate(&p, None, true, 5.0).is_some());
    }

    #[test]
    fn find_path_same_triangle() {
        let g = strip();
        let path = g
            .find_path(
                &Vec2::new(0.2, 0.2),
                &Vec2::new(0.3, 0.3),
                &SearchOpts::default(),
            )
            .unwrap();
        assert_eq!(path.points.len(), 2);
        assert_eq!(path.edge_nodes.len(), 1);
    }

    #[test]
    fn find_path_across_strip() {
        let g = strip();
        let src = Vec2::new(0.1, 0.5);
        let dst = Vec2::new(1.9, 0.5);
        let path = g.find_path(&src, &dst, &SearchOpts::default()).unwrap();
        assert_eq!(path.points.first(), Some(&src));
        assert_eq!(path.points.last(), Some(&dst));
        assert_eq!(path.edge_nodes.len(), path.points.len() - 1);
        // Straight corridor: the pulled path is the straight segment.
        assert!((path.length() - src.distance(&dst)).abs() < 1e-3);
    }

    #[test]
    fn path_length_at_least_straight_line() {
        let g = strip();
        let src = Vec2::new(0.1, 0.1);
        let dst = Vec2::new(1.9, 0.9);
        let path = g.find_path(&src, &dst, &SearchOpts::default()).unwrap();
        assert!(path.length() >= src.distance(&dst) - 1e-4);
    }

    #[test]
    fn unreachable_point_is_typed_failure() {
        let g = strip();
        let err = g
            .find_path(
                &Vec2::new(50.0, 50.0),
                &Vec2::new(0.5, 0.5),
                &SearchOpts::default(),
            )
            .unwrap_err();
        assert_eq!(err, NavError::UnreachableSrc);
        let err = g
            .find_path(
                &Vec2::new(0.5, 0.5),
                &Vec2::new(50.0, 50.0),
                &SearchOpts::default(),
            )
            .unwrap_err();
        assert_eq!(err, NavError::UnreachableDst);
    }

    #[test]
    fn room_filter_restricts_search() {
        // Same strip, but left quad is room 0 and right quad room 1.
        let vertices = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 1.0),
        ];
        let tris = [[0, 1, 3], [1, 4, 3], [1, 2, 4], [2, 5, 4]];
        let g = FloorGraph::from_triangles(
            vertices,
            &tris,
            vec![Some(0), Some(0), Some(1), Some(1)],
            vec![vec![]; 4],
        );
        let opts = SearchOpts {
            room: Some(0),
            ..Default::default()
        };
        let err = g
            .find_path(&Vec2::new(0.2, 0.5), &Vec2::new(1.8, 0.5), &opts)
            .unwrap_err();
        assert_eq!(err, NavError::UnreachableDst);
    }

    #[test]
    fn door_weight_prefers_open_route() {
        // 4x4 quad grid split into 8 triangles. The bottom row (nodes 0..=3)
        // is adjacent to door 0, the top row (4..=7) is not. A heavy closed
        // weight should push the route through the top row.
        let vertices = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(4.0, 2.0),
            Vec2::new(0.0, 4.0),
            Vec2::new(2.0, 4.0),
            Vec2::new(4.0, 4.0),
        ];
        let tris = [
            [0, 1, 3],
            [1, 4, 3],
            [1, 2, 4],
            [2, 5, 4],
            [3, 4, 6],
            [4, 7, 6],
            [4, 5, 7],
            [5, 8, 7],
        ];
        let mut node_doors = vec![vec![0usize]; 4];
        node_doors.extend(std::iter::repeat(Vec::new()).take(4));
        let g = FloorGraph::from_triangles(vertices, &tris, vec![Some(0); 8], node_doors);
        g.check_invariants().unwrap();

        let src = Vec2::new(0.5, 1.9);
        let dst = Vec2::new(3.5, 1.9);
        let status = |_d: DoorId| DoorStatus::Closed;

        let flat = g.find_path(&src, &dst, &SearchOpts::default()).unwrap();
        let flat_top = flat.edge_nodes.iter().flatten().any(|&n| n >= 4);
        assert!(!flat_top, "unweighted route stays in the bottom row");

        let opts = SearchOpts {
            closed_weight: 100.0,
            door_status: Some(&status),
            ..Default::default()
        };
        let weighted = g.find_path(&src, &dst, &opts).unwrap();
        let weighted_top = weighted.edge_nodes.iter().flatten().any(|&n| n >= 4);
        assert!(weighted_top, "closed-door weight forces a detour");
        assert!(weighted.length() >= flat.length() - 1e-4);
    }
}
