//! States of the table rebuild.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the rebuild. Every state except `Idle`, `Committed` and
/// `Aborted` runs inside the ambient transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RebuildState {
    Idle,
    TempCopy,
    FkDetached,
    PermissionsCaptured,
    DdlCaptured,
    OriginalDropped,
    Rebuilt,
    DataRestored,
    TempDropped,
    ObjectsRestored,
    Committed,
    Aborted,
}

impl RebuildState {
    /// The forward path, in order.
    pub const SEQUENCE: [RebuildState; 11] = [
        RebuildState::Idle,
        RebuildState::TempCopy,
        RebuildState::FkDetached,
        RebuildState::PermissionsCaptured,
        RebuildState::DdlCaptured,
        RebuildState::OriginalDropped,
        RebuildState::Rebuilt,
        RebuildState::DataRestored,
        RebuildState::TempDropped,
        RebuildState::ObjectsRestored,
        RebuildState::Committed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RebuildState::Idle => "Idle",
            RebuildState::TempCopy => "TempCopy",
            RebuildState::FkDetached => "FKDetached",
            RebuildState::PermissionsCaptured => "PermissionsCaptured",
            RebuildState::DdlCaptured => "DDLCaptured",
            RebuildState::OriginalDropped => "OriginalDropped",
            RebuildState::Rebuilt => "Rebuilt",
            RebuildState::DataRestored => "DataRestored",
            RebuildState::TempDropped => "TempDropped",
            RebuildState::ObjectsRestored => "ObjectsRestored",
            RebuildState::Committed => "Committed",
            RebuildState::Aborted => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RebuildState::Committed | RebuildState::Aborted)
    }

    /// Next state on the forward path. `None` once terminal.
    pub fn next(&self) -> Option<RebuildState> {
        let position = Self::SEQUENCE.iter().position(|s| s == self)?;
        Self::SEQUENCE.get(position + 1).copied()
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(&self, to: RebuildState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == RebuildState::Aborted || self.next() == Some(to)
    }
}

impl fmt::Display for RebuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
