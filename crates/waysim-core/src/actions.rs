//! NPC action requests.
//!
//! Actions arrive as JSON (`{"action": "walk", "dst": {"x": 1, "y": 2}}`)
//! and parse into a closed enum; anything else is an
//! `NpcError::UnrecognizedAction`, never a silent no-op.

use serde::{Deserialize, Serialize};

use waysim_logic::geom::Vec2;

use crate::components::DoorStrategy;
use crate::error::NpcError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case", deny_unknown_fields)]
pub enum NpcAction {
    /// Walk to a point, replacing any current walk.
    Walk {
        dst: Vec2,
        #[serde(default)]
        door_strategy: DoorStrategy,
    },
    /// Queue a destination behind the current walk.
    QueueWalk {
        dst: Vec2,
        #[serde(default)]
        door_strategy: DoorStrategy,
    },
    /// Cancel the current walk and clear the queue.
    Stop,
    Pause,
    Resume,
    /// Turn in place toward a point.
    LookAt { point: Vec2 },
    SetSpeed { speed: f32 },
    GrantKey { key: String },
    RevokeKey { key: String },
    /// Despawn the NPC, cancelling any walk.
    Remove,
}

impl NpcAction {
    pub fn parse(raw: &str) -> Result<Self, NpcError> {
        serde_json::from_str(raw).map_err(|_| NpcError::UnrecognizedAction(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_actions() {
        let action = NpcAction::parse(r#"{"action": "walk", "dst": {"x": 3.0, "y": 4.0}}"#);
        assert_eq!(
            action,
            Ok(NpcAction::Walk {
                dst: Vec2::new(3.0, 4.0),
                door_strategy: DoorStrategy::Open,
            })
        );
        assert_eq!(NpcAction::parse(r#"{"action": "stop"}"#), Ok(NpcAction::Stop));
        let action = NpcAction::parse(
            r#"{"action": "walk", "dst": {"x": 0, "y": 0}, "door_strategy": "safe-open"}"#,
        );
        assert!(matches!(
            action,
            Ok(NpcAction::Walk {
                door_strategy: DoorStrategy::SafeOpen,
                ..
            })
        ));
    }

    #[test]
    fn unknown_action_is_typed_error() {
        let err = NpcAction::parse(r#"{"action": "moonwalk"}"#).unwrap_err();
        assert!(matches!(err, NpcError::UnrecognizedAction(_)));
        // Extra fields on a known action are rejected too.
        let err = NpcAction::parse(r#"{"action": "stop", "dst": {"x": 0, "y": 0}}"#).unwrap_err();
        assert!(matches!(err, NpcError::UnrecognizedAction(_)));
    }
}
