//! crates/draw_duel_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the game's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or renderers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BrushMode, BrushStyle, Drawing, DrawingSummary, OpenDuel, Timeline, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// Error type for all store operations.
///
/// Abstracts away the specific errors of the backing persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    /// The (drawing, user) pair is already recorded; returned by the
    /// guessed-by check-and-set when it loses a race or the user has
    /// guessed before.
    #[error("drawing already guessed by this user")]
    AlreadyGuessed,
    /// A uniqueness constraint was violated (e.g. duplicate nickname).
    #[error("conflict: {0}")]
    Conflict(String),
    /// The store is temporarily unreachable. Distinct from `NotFound` so a
    /// connection loss is never misreported as a missing record.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected store error: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DrawingStore: Send + Sync {
    // --- User Management ---

    /// Creates a user with a unique nickname. Fails with
    /// [`StoreError::Conflict`] when the nickname is taken.
    async fn create_user(&self, nickname: &str, password_hash: &str) -> StoreResult<User>;

    async fn user(&self, user_id: i64) -> StoreResult<User>;

    async fn user_by_nickname(&self, nickname: &str) -> StoreResult<UserCredentials>;

    /// Adjusts a user's points by a relative delta. Implementations must
    /// express this as an increment, not a read-modify-write, so concurrent
    /// awards from different scoring events commute.
    async fn add_points(&self, user_id: i64, delta: i64) -> StoreResult<()>;

    /// Top users ordered by points descending, nickname ascending as a
    /// tiebreak.
    async fn leaderboard(&self, limit: u32) -> StoreResult<Vec<User>>;

    // --- Drawing Management ---

    /// Persists a drawing with an empty guessed-by set and returns a fresh
    /// globally-unique, non-sequential identifier. Sequential or time-based
    /// identifiers are disallowed: the id is exposed in shareable URLs and
    /// must not be enumerable.
    async fn create_drawing(
        &self,
        author_id: i64,
        timeline: &Timeline,
        secret_word: &str,
    ) -> StoreResult<String>;

    async fn drawing(&self, drawing_id: &str) -> StoreResult<Drawing>;

    /// Atomically adds `user_id` to the drawing's guessed-by set iff not
    /// already present. The check and the insert must be indivisible with
    /// respect to concurrent callers for the same drawing; two simultaneous
    /// correct guesses by the same user must not both succeed.
    async fn mark_guessed(&self, drawing_id: &str, user_id: i64) -> StoreResult<()>;

    /// Records a correct guess as one indivisible unit: adds `guesser_id`
    /// to the drawing's guessed-by set and awards one point each to guesser
    /// and author. All three writes land together or not at all, so a
    /// guesser can never end up in the set with the awards missing. Returns
    /// [`StoreError::AlreadyGuessed`], awarding nothing, when the
    /// (drawing, guesser) pair is already recorded.
    async fn record_correct_guess(
        &self,
        drawing_id: &str,
        guesser_id: i64,
        author_id: i64,
    ) -> StoreResult<()>;

    /// All drawings by the given author, newest first.
    async fn drawings_by_author(&self, author_id: i64) -> StoreResult<Vec<DrawingSummary>>;

    /// The matchmaker query: drawings the user may still attempt. Excludes
    /// the user's own drawings and drawings they have already solved.
    /// Newest first; empty when nothing qualifies.
    async fn open_duels_for(&self, user_id: i64) -> StoreResult<Vec<OpenDuel>>;

    // --- Auth Sessions ---

    async fn create_session(
        &self,
        session_id: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Resolves a session id to a user id; `NotFound` for unknown or expired
    /// sessions.
    async fn session_user(&self, session_id: &str) -> StoreResult<i64>;

    async fn delete_session(&self, session_id: &str) -> StoreResult<()>;
}

/// Provider of candidate words offered as drawing prompts. Not part of the
/// core's correctness surface.
pub trait WordProvider: Send + Sync {
    /// Returns `count` distinct word strings (fewer if the source is smaller).
    fn pick_random_words(&self, count: usize) -> Vec<String>;
}

//=========================================================================================
// Renderer Port (Timeline Replay)
//=========================================================================================

/// Stroke attributes captured by a `Start` event, borrowed for one path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush<'a> {
    pub color: &'a str,
    pub size: f64,
    pub mode: BrushMode,
    pub style: BrushStyle,
}

/// A renderer capable of executing draw commands. Implemented by the actual
/// raster client; the core only drives it during
/// [`replay`](crate::timeline::replay).
pub trait Renderer {
    fn begin_path(&mut self, x: f64, y: f64, brush: Brush<'_>);
    fn line_to(&mut self, x: f64, y: f64);
    fn end_path(&mut self);
}
