//! Funnel (string-pull) algorithm.
//!
//! Converts a corridor of triangle portals into the minimal taut polyline
//! from source to destination. Maintains an apex plus left/right funnel
//! edges; whenever a new portal crosses the funnel, the tightened side's
//! corner is emitted as a turn point and the funnel restarts from it.

use crate::geom::{tri_area2, Vec2};

/// One portal the path passes through, as seen travelling forward:
/// `left` and `right` are the portal endpoints on each side.
#[derive(Debug, Clone, Copy)]
pub struct PortalPoints {
    pub left: Vec2,
    pub right: Vec2,
}

/// A pulled waypoint plus the corridor index it sits at
/// (0 = source node, `portals.len()` = destination node).
#[derive(Debug, Clone, Copy)]
pub struct PulledPoint {
    pub point: Vec2,
    pub corridor_index: usize,
}

fn v_equal(a: &Vec2, b: &Vec2) -> bool {
    a.distance_squared(b) < 0.001 * 0.001
}

/// Pull `src -> dst` taut through `portals`.
///
/// The result always starts at `src` and ends at `dst`; with no portals it
/// is just the straight segment.
pub fn string_pull(src: Vec2, dst: Vec2, portals: &[PortalPoints]) -> Vec<PulledPoint> {
    let mut result = vec![PulledPoint {
        point: src,
        corridor_index: 0,
    }];

    if portals.is_empty() {
        result.push(PulledPoint {
            point: dst,
            corridor_index: 0,
        });
        return result;
    }

    let last_index = portals.len();

    let mut apex = src;
    let mut left = src;
    let mut right = src;
    let mut apex_index = 0usize;
    let mut left_index = 0usize;
    let mut right_index = 0usize;

    // Treat the destination as one final degenerate portal.
    let mut i = 0usize;
    while i <= last_index {
        let (p_left, p_right, corridor) = if i < last_index {
            (portals[i].left, portals[i].right, i + 1)
        } else {
            (dst, dst, last_index)
        };

        // Tighten the right side: the candidate narrows the funnel when it
        // is left of (or on) the current right edge.
        if tri_area2(&apex, &right, &p_right) >= 0.0 {
            if v_equal(&apex, &right) || tri_area2(&apex, &left, &p_right) < 0.0 {
                right = p_right;
                right_index = corridor;
            } else {
                // Right crossed over left: emit the left corner and restart.
                result.push(PulledPoint {
                    point: left,
                    corridor_index: left_index,
                });
                apex = left;
                apex_index = left_index;
                left = apex;
                right = apex;
                right_index = apex_index;
                i = apex_index;
                continue;
            }
        }

        // Tighten the left side, mirrored.
        if tri_area2(&apex, &left, &p_left) <= 0.0 {
            if v_equal(&apex, &left) || tri_area2(&apex, &right, &p_left) > 0.0 {
                left = p_left;
                left_index = corridor;
            } else {
                // Left crossed over right: emit the right corner and restart.
                result.push(PulledPoint {
                    point: right,
                    corridor_index: right_index,
                });
                apex = right;
                apex_index = right_index;
                left = apex;
                right = apex;
                left_index = apex_index;
                i = apex_index;
                continue;
            }
        }

        i += 1;
    }

    // Always terminate at the destination.
    let last = result.last().map(|p| p.point);
    if last.map(|p| !v_equal(&p, &dst)).unwrap_or(true) {
        result.push(PulledPoint {
            point: dst,
            corridor_index: last_index,
        });
    } else if let Some(tail) = result.last_mut() {
        tail.corridor_index = last_index;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal(lx: f32, ly: f32, rx: f32, ry: f32) -> PortalPoints {
        PortalPoints {
            left: Vec2::new(lx, ly),
            right: Vec2::new(rx, ry),
        }
    }

    #[test]
    fn no_portals_is_straight_segment() {
        let pulled = string_pull(Vec2::new(0.0, 0.0), Vec2::new(5.0, 0.0), &[]);
        assert_eq!(pulled.len(), 2);
        assert_eq!(pulled[0].point, Vec2::new(0.0, 0.0));
        assert_eq!(pulled[1].point, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn wide_corridor_stays_straight() {
        // Travelling +x, left is +y. Portals far wider than the straight line.
        let portals = vec![
            portal(1.0, 10.0, 1.0, -10.0),
            portal(2.0, 10.0, 2.0, -10.0),
            portal(3.0, 10.0, 3.0, -10.0),
        ];
        let pulled = string_pull(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0), &portals);
        assert_eq!(pulled.len(), 2, "no turn points expected: {pulled:?}");
    }

    #[test]
    fn corner_emits_single_turn_point() {
        // An L-shaped corridor: go +x, then forced up around a corner at x=2.
        let portals = vec![
            portal(1.0, 1.0, 1.0, -1.0),
            portal(2.0, 1.0, 2.0, -1.0),
            // Corner portal: right endpoint pulls the path up over (2, 1).
            portal(2.0, 4.0, 2.0, 1.0),
        ];
        let pulled = string_pull(Vec2::new(0.0, 0.0), Vec2::new(2.5, 5.0), &portals);
        assert_eq!(pulled.len(), 3, "one turn point expected: {pulled:?}");
        assert_eq!(pulled[1].point, Vec2::new(2.0, 1.0));
        assert!(pulled[1].corridor_index >= 1);
        assert_eq!(pulled.last().unwrap().point, Vec2::new(2.5, 5.0));
    }

    #[test]
    fn pulled_path_not_longer_than_portal_midpoints() {
        let portals = vec![
            portal(2.0, 3.0, 2.0, 0.0),
            portal(4.0, 3.0, 4.0, 0.0),
            portal(6.0, 3.0, 6.0, 0.0),
        ];
        let src = Vec2::new(0.0, 1.0);
        let dst = Vec2::new(8.0, 2.0);
        let pulled = string_pull(src, dst, &portals);
        let pulled_len: f32 = pulled
            .windows(2)
            .map(|w| w[0].point.distance(&w[1].point))
            .sum();

        let mut mids = vec![src];
        mids.extend(portals.iter().map(|p| p.left.midpoint(&p.right)));
        mids.push(dst);
        let mid_len: f32 = mids.windows(2).map(|w| w[0].distance(&w[1])).sum();

        assert!(pulled_len <= mid_len + 1e-4, "{pulled_len} vs {mid_len}");
        assert!(pulled_len >= src.distance(&dst) - 1e-4);
    }

    #[test]
    fn corridor_indices_are_monotonic() {
        let portals = vec![
            portal(1.0, 1.0, 1.0, -1.0),
            portal(2.0, 1.0, 2.0, -1.0),
            portal(2.0, 4.0, 2.0, 1.0),
            portal(3.0, 4.0, 3.0, 2.0),
        ];
        let pulled = string_pull(Vec2::new(0.0, 0.0), Vec2::new(3.5, 5.0), &portals);
        for w in pulled.windows(2) {
            assert!(w[0].corridor_index <= w[1].corridor_index, "{pulled:?}");
        }
        assert_eq!(pulled.last().unwrap().corridor_index, portals.len());
    }
}
