//! Decor spatial index.
//!
//! Decor items (furniture, props, trigger points) live in a uniform grid
//! keyed by world-space cell. An item registers in every cell its bounds
//! overlap; circle queries fan out over the covered cells and run exact
//! shape tests on the candidates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::DECOR_GRID_CELL;
use crate::geom::{point_segment_distance, Circle, Rect, Vec2};

/// Collision footprint of one decor item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecorShape {
    Point(Vec2),
    Circle(Circle),
    Rect(Rect),
}

impl DecorShape {
    pub fn bounds(&self) -> Rect {
        match self {
            DecorShape::Point(p) => Rect::new(p.x, p.y, 0.0, 0.0),
            DecorShape::Circle(c) => c.bounds(),
            DecorShape::Rect(r) => *r,
        }
    }

    /// Exact overlap test against an NPC body circle.
    pub fn intersects_circle(&self, circle: &Circle) -> bool {
        match self {
            DecorShape::Point(p) => circle.contains(p),
            DecorShape::Circle(c) => c.intersects_circle(circle),
            DecorShape::Rect(r) => circle.intersects_rect(r),
        }
    }

    /// Overlap test against a body circle swept from `a` to `b`.
    pub fn intersects_swept(&self, a: &Vec2, b: &Vec2, radius: f32) -> bool {
        match self {
            DecorShape::Point(p) => point_segment_distance(p, a, b) <= radius,
            DecorShape::Circle(c) => {
                point_segment_distance(&c.center, a, b) <= radius + c.radius
            }
            DecorShape::Rect(r) => r.outset(radius).intersects_segment(a, b),
        }
    }
}

/// One decor item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decor {
    pub key: String,
    /// Owning group key, if the item was spawned as part of a group.
    #[serde(default)]
    pub parent: Option<String>,
    pub shape: DecorShape,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Uniform-grid index over decor items, keyed by item key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecorGrid {
    cell: f32,
    items: HashMap<String, Decor>,
    cells: HashMap<(i32, i32), Vec<String>>,
}

impl Default for DecorGrid {
    fn default() -> Self {
        Self::new(DECOR_GRID_CELL)
    }
}

impl DecorGrid {
    pub fn new(cell: f32) -> Self {
        assert!(cell > 0.0);
        Self {
            cell,
            items: HashMap::new(),
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, p: &Vec2) -> (i32, i32) {
        (
            (p.x / self.cell).floor() as i32,
            (p.y / self.cell).floor() as i32,
        )
    }

    fn cells_over(&self, bounds: &Rect) -> Vec<(i32, i32)> {
        let (x0, y0) = self.cell_of(&Vec2::new(bounds.x, bounds.y));
        let (x1, y1) = self.cell_of(&Vec2::new(bounds.max_x(), bounds.max_y()));
        let mut out = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                out.push((cx, cy));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Decor> {
        self.items.get(key)
    }

    /// Insert an item, replacing any previous item with the same key.
    pub fn add(&mut self, decor: Decor) {
        self.remove(&decor.key);
        for cell in self.cells_over(&decor.shape.bounds()) {
            self.cells.entry(cell).or_default().push(decor.key.clone());
        }
        self.items.insert(decor.key.clone(), decor);
    }

    /// Remove an item by key. Idempotent.
    pub fn remove(&mut self, key: &str) -> Option<Decor> {
        let decor = self.items.remove(key)?;
        for cell in self.cells_over(&decor.shape.bounds()) {
            if let Some(keys) = self.cells.get_mut(&cell) {
                keys.retain(|k| k != key);
                if keys.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        Some(decor)
    }

    /// Remove every item whose `parent` is `group`. Returns removed keys.
    pub fn remove_group(&mut self, group: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .items
            .values()
            .filter(|d| d.parent.as_deref() == Some(group))
            .map(|d| d.key.clone())
            .collect();
        keys.sort();
        for key in &keys {
            self.remove(key);
        }
        keys
    }

    /// Items whose shape overlaps `circle`, sorted by key for deterministic
    /// iteration.
    pub fn query_circle(&self, circle: &Circle) -> Vec<&Decor> {
        self.query_bounds(&circle.bounds(), |shape| shape.intersects_circle(circle))
    }

    /// Items overlapping the body circle swept from `a` to `b`, sorted by
    /// key. Catches contacts a between-sample test would step over.
    pub fn query_swept(&self, a: &Vec2, b: &Vec2, radius: f32) -> Vec<&Decor> {
        let bounds = Rect::from_points(&[*a, *b]).outset(radius);
        self.query_bounds(&bounds, |shape| shape.intersects_swept(a, b, radius))
    }

    fn query_bounds(&self, bounds: &Rect, hit: impl Fn(&DecorShape) -> bool) -> Vec<&Decor> {
        let mut hits: Vec<&Decor> = Vec::new();
        for cell in self.cells_over(bounds) {
            let Some(keys) = self.cells.get(&cell) else {
                continue;
            };
            for key in keys {
                let decor = &self.items[key];
                if hit(&decor.shape) && !hits.iter().any(|d| d.key == decor.key) {
                    hits.push(decor);
                }
            }
        }
        hits.sort_by(|a, b| a.key.cmp(&b.key));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(key: &str, x: f32, y: f32) -> Decor {
        Decor {
            key: key.to_string(),
            parent: None,
            shape: DecorShape::Point(Vec2::new(x, y)),
            tags: Vec::new(),
        }
    }

    #[test]
    fn add_remove_roundtrip() {
        let mut grid = DecorGrid::default();
        grid.add(point("lamp", 3.0, 3.0));
        assert_eq!(grid.len(), 1);
        assert!(grid.get("lamp").is_some());
        assert!(grid.remove("lamp").is_some());
        assert!(grid.is_empty());
        assert!(grid.remove("lamp").is_none());
    }

    #[test]
    fn add_replaces_same_key() {
        let mut grid = DecorGrid::default();
        grid.add(point("lamp", 3.0, 3.0));
        grid.add(point("lamp", 55.0, 55.0));
        assert_eq!(grid.len(), 1);

        // The stale registration must be gone from its old cell.
        let near_old = Circle {
            center: Vec2::new(3.0, 3.0),
            radius: 1.0,
        };
        assert!(grid.query_circle(&near_old).is_empty());
        let near_new = Circle {
            center: Vec2::new(55.0, 55.0),
            radius: 1.0,
        };
        assert_eq!(grid.query_circle(&near_new).len(), 1);
    }

    #[test]
    fn rect_spanning_cells_registers_in_each() {
        let mut grid = DecorGrid::new(10.0);
        grid.add(Decor {
            key: "table".into(),
            parent: None,
            shape: DecorShape::Rect(Rect::new(8.0, 8.0, 14.0, 4.0)),
            tags: Vec::new(),
        });
        // Queries from either end of the rect find it.
        for x in [9.0f32, 21.0] {
            let probe = Circle {
                center: Vec2::new(x, 9.0),
                radius: 0.5,
            };
            assert_eq!(grid.query_circle(&probe).len(), 1, "probe at x={x}");
        }
        // A query far from the rect finds nothing.
        let probe = Circle {
            center: Vec2::new(9.0, 40.0),
            radius: 0.5,
        };
        assert!(grid.query_circle(&probe).is_empty());
    }

    #[test]
    fn query_is_exact_not_cell_granular() {
        let mut grid = DecorGrid::new(10.0);
        grid.add(point("a", 1.0, 1.0));
        // Same cell, but outside the probe circle.
        let probe = Circle {
            center: Vec2::new(8.0, 8.0),
            radius: 2.0,
        };
        assert!(grid.query_circle(&probe).is_empty());
    }

    #[test]
    fn query_results_sorted_and_deduped() {
        let mut grid = DecorGrid::new(10.0);
        grid.add(point("b", 5.0, 5.0));
        grid.add(point("a", 5.5, 5.0));
        grid.add(Decor {
            key: "c".into(),
            parent: None,
            shape: DecorShape::Rect(Rect::new(0.0, 0.0, 25.0, 25.0)),
            tags: Vec::new(),
        });
        let probe = Circle {
            center: Vec2::new(5.0, 5.0),
            radius: 3.0,
        };
        let keys: Vec<&str> = grid
            .query_circle(&probe)
            .iter()
            .map(|d| d.key.as_str())
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn swept_query_catches_items_between_samples() {
        let mut grid = DecorGrid::default();
        grid.add(Decor {
            key: "pebble".into(),
            parent: None,
            shape: DecorShape::Circle(Circle::new(Vec2::new(5.0, 0.0), 0.1)),
            tags: Vec::new(),
        });
        // Neither endpoint circle touches the pebble.
        for x in [3.0f32, 7.0] {
            let probe = Circle::new(Vec2::new(x, 0.0), 0.5);
            assert!(grid.query_circle(&probe).is_empty(), "probe at x={x}");
        }
        // The sweep between them does.
        let hits = grid.query_swept(&Vec2::new(3.0, 0.0), &Vec2::new(7.0, 0.0), 0.5);
        assert_eq!(hits.len(), 1);
        // An offset sweep that clears the pebble does not.
        let hits = grid.query_swept(&Vec2::new(3.0, 1.0), &Vec2::new(7.0, 1.0), 0.5);
        assert!(hits.is_empty());
    }

    #[test]
    fn remove_group_removes_children_only() {
        let mut grid = DecorGrid::default();
        let mut child = point("chair-1", 2.0, 2.0);
        child.parent = Some("dining-set".into());
        let mut child2 = point("chair-2", 3.0, 2.0);
        child2.parent = Some("dining-set".into());
        grid.add(child);
        grid.add(child2);
        grid.add(point("lamp", 9.0, 9.0));

        let removed = grid.remove_group("dining-set");
        assert_eq!(removed, vec!["chair-1".to_string(), "chair-2".to_string()]);
        assert_eq!(grid.len(), 1);
        assert!(grid.get("lamp").is_some());
    }
}
