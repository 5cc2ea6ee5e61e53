//! NPC operation failures.

use waysim_logic::error::NavError;

#[derive(Debug, Clone, PartialEq)]
pub enum NpcError {
    UnknownNpc(String),
    DuplicateNpc(String),
    UnknownClass(String),
    /// An action request that names no supported action.
    UnrecognizedAction(String),
    Nav(NavError),
}

impl std::fmt::Display for NpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NpcError::UnknownNpc(key) => write!(f, "no NPC with key {key:?}"),
            NpcError::DuplicateNpc(key) => write!(f, "NPC key {key:?} already spawned"),
            NpcError::UnknownClass(key) => write!(f, "no NPC class {key:?}"),
            NpcError::UnrecognizedAction(raw) => write!(f, "unrecognized NPC action: {raw}"),
            NpcError::Nav(e) => write!(f, "navigation failed: {e}"),
        }
    }
}

impl std::error::Error for NpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NpcError::Nav(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NavError> for NpcError {
    fn from(e: NavError) -> Self {
        NpcError::Nav(e)
    }
}
