//! crates/draw_duel_core/src/domain.rs
//!
//! Defines the pure, core data structures for the game.
//! These structs are independent of any database or transport format.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a stroke paints or erases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushMode {
    Draw,
    Erase,
}

/// Line-cap style of a stroke, matching the canvas `lineCap` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushStyle {
    Round,
    Square,
    Butt,
}

/// One atomic instruction in a drawing timeline.
///
/// Serialized as a tagged object, e.g.
/// `{"type":"start","x":0,"y":0,"color":"#000","size":4,"mode":"draw","brushStyle":"round"}`.
/// Unknown event types, modes, or styles fail deserialization, so the codec
/// can validate exhaustively by variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StrokeEvent {
    /// Begins a new path.
    Start {
        x: f64,
        y: f64,
        color: String,
        size: f64,
        mode: BrushMode,
        #[serde(rename = "brushStyle")]
        brush_style: BrushStyle,
    },
    /// Extends the current path to (x, y).
    Draw { x: f64, y: f64 },
    /// Closes the current path. A no-op when no path is open.
    End,
}

/// An ordered, replay-significant sequence of stroke events.
///
/// Immutable once submitted; replaying the same timeline through the same
/// renderer always reproduces the same raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline(pub Vec<StrokeEvent>);

impl Timeline {
    pub fn events(&self) -> &[StrokeEvent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The persisted unit: a secret word drawn as a timeline.
#[derive(Debug, Clone)]
pub struct Drawing {
    /// Opaque, globally unique, unguessable identifier (exposed in URLs).
    pub id: String,
    pub author_id: i64,
    pub timeline: Timeline,
    /// Canonical stored form: trimmed, original casing preserved for display
    /// to the author. The comparison form is derived at guess time; the two
    /// are never stored separately.
    pub secret_word: String,
    /// Users who have correctly guessed this drawing.
    pub guessed_by: HashSet<i64>,
    pub created_at: DateTime<Utc>,
}

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub points: i64,
}

/// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: i64,
    pub nickname: String,
    pub password_hash: String,
}

/// Author-facing listing entry for one of their own drawings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawingSummary {
    pub id: String,
    pub word: String,
    pub created_at: DateTime<Utc>,
}

/// Guesser-facing listing entry: a drawing the user may still attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenDuel {
    pub drawing_id: String,
    pub author_nickname: String,
}

/// Projection of a [`Drawing`] safe to serve to an arbitrary viewer.
///
/// `word` is only populated for the drawing's author and is omitted from the
/// serialized form entirely otherwise, so a client that renders every field
/// it receives can never leak the secret.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicDrawing {
    pub id: String,
    pub timeline: Timeline,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

/// Ephemeral result of one guess attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuessOutcome {
    pub correct: bool,
}
