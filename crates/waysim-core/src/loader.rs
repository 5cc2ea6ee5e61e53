//! World loading.
//!
//! Builds a ready `Session` from a JSON world definition: geomorph
//! templates, placements, NPC classes, initial NPCs, decor and door state.

use serde::Deserialize;

use waysim_logic::decor::Decor;
use waysim_logic::floor_graph::DoorId;
use waysim_logic::geom::{Transform, Vec2};
use waysim_logic::layout::{build_world, GeomorphSpec, LayoutError, Placement};

use crate::components::NpcClass;
use crate::doors::DoorState;
use crate::error::NpcError;
use crate::session::Session;

#[derive(Debug, Clone, Deserialize)]
pub struct PlacementDef {
    pub gm_key: String,
    /// Affine matrix `[a b c d e f]`.
    pub transform: [f32; 6],
}

#[derive(Debug, Clone, Deserialize)]
pub struct NpcDef {
    pub key: String,
    pub class: String,
    pub point: Vec2,
    /// Door keys granted at spawn.
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoorDef {
    pub gm_id: usize,
    pub door_id: DoorId,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub key: Option<String>,
}

/// Top-level world definition.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldDef {
    pub geomorphs: Vec<GeomorphSpec>,
    pub placements: Vec<PlacementDef>,
    #[serde(default)]
    pub classes: Vec<NpcClass>,
    #[serde(default)]
    pub npcs: Vec<NpcDef>,
    #[serde(default)]
    pub decor: Vec<Decor>,
    #[serde(default)]
    pub doors: Vec<DoorDef>,
}

#[derive(Debug)]
pub enum LoadError {
    Json(serde_json::Error),
    Layout(LayoutError),
    Npc(NpcError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Json(e) => write!(f, "invalid world JSON: {e}"),
            LoadError::Layout(e) => write!(f, "world layout failed: {e}"),
            LoadError::Npc(e) => write!(f, "initial NPC setup failed: {e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e)
    }
}

impl From<LayoutError> for LoadError {
    fn from(e: LayoutError) -> Self {
        LoadError::Layout(e)
    }
}

impl From<NpcError> for LoadError {
    fn from(e: NpcError) -> Self {
        LoadError::Npc(e)
    }
}

/// Parse a world definition and build a session from it.
pub fn load_session(json: &str) -> Result<Session, LoadError> {
    let def: WorldDef = serde_json::from_str(json)?;

    let placements: Vec<Placement> = def
        .placements
        .iter()
        .map(|p| Placement {
            gm_key: p.gm_key.clone(),
            transform: Transform::from_array(p.transform),
        })
        .collect();
    let (gm_graph, floors) = build_world(&def.geomorphs, &placements)?;
    log::info!(
        "loaded world: {} instances, {} floor meshes",
        gm_graph.gms().len(),
        floors.len()
    );

    let mut session = Session::new(gm_graph, floors);

    for class in def.classes {
        session.register_class(class);
    }
    for door in def.doors {
        session.set_door_state(
            door.gm_id,
            door.door_id,
            DoorState {
                open: door.open,
                locked: door.locked,
                key: door.key,
            },
        );
    }
    for decor in def.decor {
        session.add_decor(decor);
    }
    for npc in def.npcs {
        session.spawn_npc(&npc.key, &npc.class, npc.point)?;
        for key in npc.keys {
            session.give_key(&npc.key, &key)?;
        }
    }
    // Setup events are not part of the first tick.
    session.drain_events();

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: &str = r#"{
        "geomorphs": [{
            "key": "cabin",
            "bounds": {"x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0},
            "rooms": [
                {"x": 1.0, "y": 1.0, "width": 3.5, "height": 8.0},
                {"x": 5.5, "y": 1.0, "width": 3.5, "height": 8.0}
            ],
            "doors": [
                {"rect": {"x": 4.5, "y": 4.0, "width": 1.0, "height": 1.5}, "hull": false},
                {"rect": {"x": 9.0, "y": 4.0, "width": 1.0, "height": 1.5}, "hull": true}
            ]
        }],
        "placements": [
            {"gm_key": "cabin", "transform": [1, 0, 0, 1, 0, 0]},
            {"gm_key": "cabin", "transform": [1, 0, 0, 1, 10, 0]}
        ],
        "classes": [{"key": "crew", "speed": 6.0, "radius": 0.8, "turn_rate": 8.0}],
        "npcs": [{"key": "ada", "class": "crew", "point": {"x": 2.0, "y": 2.0}}],
        "decor": [{"key": "crate-1", "shape": {"Rect": {"x": 7.0, "y": 7.0, "width": 1.0, "height": 1.0}}}],
        "doors": [{"gm_id": 0, "door_id": 0, "open": false}]
    }"#;

    #[test]
    fn loads_a_complete_world() {
        let session = load_session(WORLD).unwrap();
        assert_eq!(session.floors().len(), 2);
        assert_eq!(session.npc_count(), 1);
        assert!(session.decor().get("crate-1").is_some());
        assert_eq!(
            session.door_status(0, 0),
            waysim_logic::floor_graph::DoorStatus::Closed
        );
        let pose = session.pose("ada").unwrap();
        assert_eq!(pose.gm_room.map(|r| (r.gm_id, r.room_id)), Some((0, 0)));
    }

    #[test]
    fn bad_json_is_a_typed_error() {
        let err = load_session("{").map(|_| ()).unwrap_err();
        assert!(matches!(err, LoadError::Json(_)));
    }

    #[test]
    fn unknown_class_fails_the_load() {
        let broken = WORLD.replace("\"class\": \"crew\"", "\"class\": \"ghost\"");
        let err = load_session(&broken).map(|_| ()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Npc(NpcError::UnknownClass(_))
        ));
    }
}
