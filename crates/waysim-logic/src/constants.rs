//! Shared numeric defaults for the navigation core.

/// Decor spatial grid cell size in world units.
pub const DECOR_GRID_CELL: f32 = 10.0;

/// Default cap on the centroid fallback distance when a query point is not
/// strictly inside any triangle. Roughly one room.
pub const MAX_CENTROID_FALLBACK_DIST: f32 = 60.0;

/// Distance ahead of an at-door meta at which door strategy is applied,
/// and at which `SafeOpen` stops short of an impassable door.
pub const DOOR_APPROACH_DIST: f32 = 2.0;

/// Two hull-door centers closer than this are considered the same physical
/// opening and get sealed together.
pub const HULL_DOOR_SEAL_EPSILON: f32 = 0.5;

/// Two path endpoints closer than this are treated as the same point when
/// stitching path segments.
pub const PATH_JOIN_EPSILON: f32 = 0.01;

/// Vertex coordinates are quantized to this precision when deduplicating
/// shared mesh vertices.
pub const VERTEX_QUANTUM: f32 = 0.001;

/// Default NPC walk speed in world units per second.
pub const DEFAULT_WALK_SPEED: f32 = 6.0;

/// Default NPC body radius in world units.
pub const DEFAULT_NPC_RADIUS: f32 = 0.8;

/// Default NPC turn rate in radians per second.
pub const DEFAULT_TURN_RATE: f32 = 8.0;
