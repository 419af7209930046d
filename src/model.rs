//! Core data model.
//!
//! A work item is something that needs doing. Participants carry at most one
//! at a time between meetings. The meeting snapshot is a point-in-time copy of
//! the coordinator's joint state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// An immutable unit of work handed between actors through a [`WorkQueue`].
///
/// [`WorkQueue`]: crate::queue::WorkQueue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier.
    pub id: WorkId,

    /// Human-readable description of the work (e.g. "quest 7").
    pub description: String,

    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: WorkId::new(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.description, self.id)
    }
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkId(pub Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 hex chars of the UUID
        let simple = self.0.simple().to_string();
        f.write_str(simple.get(..8).unwrap_or(&simple))
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Stable identity of a participant. Numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u32);

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "participant {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Meeting phase
// ---------------------------------------------------------------------------

/// Where the hall is in the meeting protocol, derived from joint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Convener absent. Participants may come and go.
    Idle,
    /// Convener present, waiting for everyone inside to sit.
    Convening,
    /// Convener present and all participants seated at the start. Work moves.
    Active,
    /// Meeting over, convener waiting for everyone to stand before leaving.
    Dispersing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Convening => "convening",
            Phase::Active => "active",
            Phase::Dispersing => "dispersing",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A consistent copy of the coordinator's state, taken under its lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSnapshot {
    pub convener_present: bool,
    pub meeting_active: bool,
    /// A meeting has begun at some point during the current convener visit.
    pub meeting_held: bool,
    /// Everyone inside, mapped to whether they are seated.
    pub seating: BTreeMap<ParticipantId, bool>,
    /// Participants still inside since the last meeting ended.
    pub departing: BTreeSet<ParticipantId>,
}

impl MeetingSnapshot {
    pub fn phase(&self) -> Phase {
        match (self.convener_present, self.meeting_active, self.meeting_held) {
            (false, _, _) => Phase::Idle,
            (true, true, _) => Phase::Active,
            (true, false, false) => Phase::Convening,
            (true, false, true) => Phase::Dispersing,
        }
    }

    /// Vacuously true when nobody is inside.
    pub fn all_seated(&self) -> bool {
        self.seating.values().all(|&sitting| sitting)
    }

    /// Vacuously true when nobody is inside.
    pub fn all_standing(&self) -> bool {
        self.seating.values().all(|&sitting| !sitting)
    }

    pub fn seated_count(&self) -> usize {
        self.seating.values().filter(|&&sitting| sitting).count()
    }

    pub fn is_inside(&self, id: ParticipantId) -> bool {
        self.seating.contains_key(&id)
    }

    /// Do the joint-state invariants hold?
    ///
    /// The meeting is only ever active with the convener present; with the
    /// convener present it must be active once everyone is seated and must
    /// have ended once a non-empty hall is entirely standing.
    pub fn is_consistent(&self) -> bool {
        if !self.convener_present {
            return !self.meeting_active;
        }
        if self.all_seated() && !self.meeting_active {
            return false;
        }
        if !self.seating.is_empty() && self.all_standing() && self.meeting_active {
            return false;
        }
        !self.meeting_active || self.meeting_held
    }
}
