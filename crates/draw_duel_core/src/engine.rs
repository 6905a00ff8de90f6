//! crates/draw_duel_core/src/engine.rs
//!
//! The duel engine: drawing submission, the secrecy filter, the matchmaker,
//! and the scoring state machine. All persistence goes through the
//! [`DrawingStore`] port.

use std::sync::Arc;

use crate::domain::{
    Drawing, DrawingSummary, GuessOutcome, OpenDuel, PublicDrawing, Timeline, User,
};
use crate::ports::{DrawingStore, StoreError};

/// The error taxonomy the engine surfaces to callers.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Malformed timeline or empty word; rejected before any persistence.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Unknown drawing id.
    #[error("drawing not found")]
    NotFound,
    /// Self-guess or repeat guess. Distinct from `NotFound` so clients can
    /// tell "does not exist" from "not allowed".
    #[error("not allowed to guess this drawing")]
    Forbidden,
    /// The persistence layer is temporarily unreachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// A convenience type alias for `Result<T, GameError>`.
pub type GameResult<T> = Result<T, GameError>;

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => GameError::NotFound,
            StoreError::Unavailable(msg) => GameError::StoreUnavailable(msg),
            // AlreadyGuessed is absorbed by the scoring path and never
            // escapes the engine; anything else reaching here is a bug in
            // the store adapter.
            other => GameError::Internal(other.to_string()),
        }
    }
}

/// Canonical comparison form of a word or guess: trimmed and lowercased.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// The Secrecy Filter: projects a drawing for a given viewer.
///
/// The secret word is included iff the viewer is the author; otherwise the
/// field is `None` and the serialized record carries no `word` key at all.
/// Every endpoint that returns a drawing to a non-author must go through
/// this projection, never the raw record.
pub fn project(drawing: Drawing, viewer: Option<i64>) -> PublicDrawing {
    let word = if viewer == Some(drawing.author_id) {
        Some(drawing.secret_word)
    } else {
        None
    };
    PublicDrawing {
        id: drawing.id,
        timeline: drawing.timeline,
        created_at: drawing.created_at,
        word,
    }
}

/// Orchestrates all duel operations over a [`DrawingStore`].
#[derive(Clone)]
pub struct DuelService {
    store: Arc<dyn DrawingStore>,
}

impl DuelService {
    pub fn new(store: Arc<dyn DrawingStore>) -> Self {
        Self { store }
    }

    /// Validates and persists a new drawing, returning its fresh id.
    pub async fn submit_drawing(
        &self,
        author_id: i64,
        timeline: Timeline,
        secret_word: &str,
    ) -> GameResult<String> {
        timeline
            .validate()
            .map_err(|e| GameError::InvalidInput(e.to_string()))?;
        let word = secret_word.trim();
        if normalize_word(word).is_empty() {
            return Err(GameError::InvalidInput(
                "secret word must not be empty".to_string(),
            ));
        }
        let timeline = timeline.into_normalized();
        let id = self.store.create_drawing(author_id, &timeline, word).await?;
        Ok(id)
    }

    /// Fetches a drawing through the secrecy filter. `viewer` is `None` for
    /// anonymous callers; the id is shareable, so no authentication is
    /// required to view the timeline.
    pub async fn fetch_drawing(
        &self,
        drawing_id: &str,
        viewer: Option<i64>,
    ) -> GameResult<PublicDrawing> {
        let drawing = self.store.drawing(drawing_id).await?;
        Ok(project(drawing, viewer))
    }

    /// The author's own drawings, newest first, words included.
    pub async fn my_drawings(&self, author_id: i64) -> GameResult<Vec<DrawingSummary>> {
        Ok(self.store.drawings_by_author(author_id).await?)
    }

    /// The matchmaker listing: drawings the user may still attempt.
    pub async fn open_duels(&self, user_id: i64) -> GameResult<Vec<OpenDuel>> {
        Ok(self.store.open_duels_for(user_id).await?)
    }

    pub async fn leaderboard(&self, limit: u32) -> GameResult<Vec<User>> {
        Ok(self.store.leaderboard(limit).await?)
    }

    /// Evaluates one guess. Per (drawing, user) the terminal states are:
    ///
    /// - `Forbidden` when the guesser authored the drawing or already solved
    ///   it (incorrect guesses are not recorded, so retries stay open);
    /// - `{correct: false}` with no state mutation whatsoever;
    /// - `{correct: true}` exactly once: the guessed-by insert and the two
    ///   point awards land as one indivisible store write, so a failure
    ///   cannot strand the guesser in the set without the awards. A
    ///   concurrent duplicate that loses the race still gets
    ///   `{correct: true}`, without awarding points a second time.
    pub async fn submit_guess(
        &self,
        drawing_id: &str,
        user_id: i64,
        guess: &str,
    ) -> GameResult<GuessOutcome> {
        let drawing = self.store.drawing(drawing_id).await?;
        if drawing.author_id == user_id {
            return Err(GameError::Forbidden);
        }
        if drawing.guessed_by.contains(&user_id) {
            return Err(GameError::Forbidden);
        }

        if normalize_word(guess) != normalize_word(&drawing.secret_word) {
            return Ok(GuessOutcome { correct: false });
        }

        match self
            .store
            .record_correct_guess(drawing_id, user_id, drawing.author_id)
            .await
        {
            Ok(()) => Ok(GuessOutcome { correct: true }),
            // Lost a race against an identical concurrent guess by the same
            // user: idempotent success, no second award.
            Err(StoreError::AlreadyGuessed) => Ok(GuessOutcome { correct: true }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::domain::{BrushMode, BrushStyle, StrokeEvent, UserCredentials};
    use crate::memory::MemoryStore;
    use crate::ports::StoreResult;

    fn sample_timeline() -> Timeline {
        Timeline(vec![
            StrokeEvent::Start {
                x: 0.0,
                y: 0.0,
                color: "#000".to_string(),
                size: 4.0,
                mode: BrushMode::Draw,
                brush_style: BrushStyle::Round,
            },
            StrokeEvent::Draw { x: 5.0, y: 5.0 },
            StrokeEvent::End,
        ])
    }

    struct Fixture {
        service: DuelService,
        store: Arc<MemoryStore>,
        alice: i64,
        bob: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let alice = store.create_user("alice", "hash").await.unwrap().id;
        let bob = store.create_user("bob", "hash").await.unwrap().id;
        Fixture {
            service: DuelService::new(store.clone()),
            store,
            alice,
            bob,
        }
    }

    async fn points(store: &MemoryStore, user_id: i64) -> i64 {
        store.user(user_id).await.unwrap().points
    }

    #[tokio::test]
    async fn submit_rejects_empty_timeline() {
        let f = fixture().await;
        let err = f
            .service
            .submit_drawing(f.alice, Timeline(vec![]), "cat")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn submit_rejects_blank_word() {
        let f = fixture().await;
        let err = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn stored_timeline_round_trips() {
        let f = fixture().await;
        let id = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();
        let fetched = f.service.fetch_drawing(&id, None).await.unwrap();
        assert_eq!(fetched.timeline, sample_timeline());
    }

    #[tokio::test]
    async fn secrecy_filter_hides_word_from_non_authors() {
        let f = fixture().await;
        let id = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();

        let for_bob = f.service.fetch_drawing(&id, Some(f.bob)).await.unwrap();
        assert_eq!(for_bob.word, None);

        let anonymous = f.service.fetch_drawing(&id, None).await.unwrap();
        assert_eq!(anonymous.word, None);

        let for_alice = f.service.fetch_drawing(&id, Some(f.alice)).await.unwrap();
        assert_eq!(for_alice.word.as_deref(), Some("cat"));
    }

    #[tokio::test]
    async fn fetch_unknown_drawing_is_not_found() {
        let f = fixture().await;
        let err = f.service.fetch_drawing("nope", None).await.unwrap_err();
        assert!(matches!(err, GameError::NotFound));
    }

    #[tokio::test]
    async fn self_guess_is_forbidden_even_when_correct() {
        let f = fixture().await;
        let id = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();
        let err = f.service.submit_guess(&id, f.alice, "cat").await.unwrap_err();
        assert!(matches!(err, GameError::Forbidden));
        assert_eq!(points(&f.store, f.alice).await, 0);
    }

    #[tokio::test]
    async fn wrong_guess_mutates_nothing_and_retries_stay_open() {
        let f = fixture().await;
        let id = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();

        let outcome = f.service.submit_guess(&id, f.bob, "dog").await.unwrap();
        assert!(!outcome.correct);
        assert_eq!(points(&f.store, f.bob).await, 0);
        assert_eq!(points(&f.store, f.alice).await, 0);
        assert!(f.store.drawing(&id).await.unwrap().guessed_by.is_empty());

        // The wrong guess was not recorded as an attempt.
        let outcome = f.service.submit_guess(&id, f.bob, "cat").await.unwrap();
        assert!(outcome.correct);
        assert_eq!(points(&f.store, f.bob).await, 1);
        assert_eq!(points(&f.store, f.alice).await, 1);
    }

    #[tokio::test]
    async fn correct_guess_is_normalized_and_awards_both_sides() {
        let f = fixture().await;
        let id = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();

        let outcome = f.service.submit_guess(&id, f.bob, "  Cat ").await.unwrap();
        assert!(outcome.correct);
        assert_eq!(points(&f.store, f.bob).await, 1);
        assert_eq!(points(&f.store, f.alice).await, 1);

        let guessed_by = f.store.drawing(&id).await.unwrap().guessed_by;
        assert_eq!(guessed_by.len(), 1);
        assert!(guessed_by.contains(&f.bob));
    }

    #[tokio::test]
    async fn repeat_guess_after_solving_is_forbidden() {
        let f = fixture().await;
        let id = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();

        f.service.submit_guess(&id, f.bob, "cat").await.unwrap();
        let err = f.service.submit_guess(&id, f.bob, "cat").await.unwrap_err();
        assert!(matches!(err, GameError::Forbidden));

        // No double award.
        assert_eq!(points(&f.store, f.bob).await, 1);
        assert_eq!(points(&f.store, f.alice).await, 1);
    }

    #[tokio::test]
    async fn guess_on_unknown_drawing_is_not_found() {
        let f = fixture().await;
        let err = f.service.submit_guess("nope", f.bob, "cat").await.unwrap_err();
        assert!(matches!(err, GameError::NotFound));
    }

    #[tokio::test]
    async fn matchmaker_excludes_own_and_solved_drawings() {
        let f = fixture().await;
        let d1 = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();
        let d2 = f
            .service
            .submit_drawing(f.bob, sample_timeline(), "dog")
            .await
            .unwrap();

        // Bob never sees his own drawing.
        let duels = f.service.open_duels(f.bob).await.unwrap();
        assert_eq!(duels.len(), 1);
        assert_eq!(duels[0].drawing_id, d1);
        assert_eq!(duels[0].author_nickname, "alice");

        // Solved drawings drop out of the listing.
        f.service.submit_guess(&d1, f.bob, "cat").await.unwrap();
        assert!(f.service.open_duels(f.bob).await.unwrap().is_empty());

        // Alice still has Bob's drawing open.
        let duels = f.service.open_duels(f.alice).await.unwrap();
        assert_eq!(duels.len(), 1);
        assert_eq!(duels[0].drawing_id, d2);
    }

    #[tokio::test]
    async fn matchmaker_returns_empty_for_empty_store() {
        let f = fixture().await;
        assert!(f.service.open_duels(f.bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn my_drawings_lists_newest_first_with_words() {
        let f = fixture().await;
        let first = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "dog")
            .await
            .unwrap();

        let mine = f.service.my_drawings(f.alice).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second);
        assert_eq!(mine[0].word, "dog");
        assert_eq!(mine[1].id, first);
        assert_eq!(mine[1].word, "cat");
    }

    #[tokio::test]
    async fn leaderboard_orders_by_points_desc() {
        let f = fixture().await;
        let carol = f.store.create_user("carol", "hash").await.unwrap().id;
        f.store.add_points(f.bob, 3).await.unwrap();
        f.store.add_points(carol, 5).await.unwrap();

        let board = f.service.leaderboard(2).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].nickname, "carol");
        assert_eq!(board[0].points, 5);
        assert_eq!(board[1].nickname, "bob");
    }

    /// Fails the first scoring write as if the database dropped out
    /// mid-request, then behaves like the in-memory store.
    struct FlakyStore {
        inner: MemoryStore,
        fail_once: AtomicBool,
    }

    #[async_trait]
    impl DrawingStore for FlakyStore {
        async fn create_user(&self, nickname: &str, password_hash: &str) -> StoreResult<User> {
            self.inner.create_user(nickname, password_hash).await
        }

        async fn user(&self, user_id: i64) -> StoreResult<User> {
            self.inner.user(user_id).await
        }

        async fn user_by_nickname(&self, nickname: &str) -> StoreResult<UserCredentials> {
            self.inner.user_by_nickname(nickname).await
        }

        async fn add_points(&self, user_id: i64, delta: i64) -> StoreResult<()> {
            self.inner.add_points(user_id, delta).await
        }

        async fn leaderboard(&self, limit: u32) -> StoreResult<Vec<User>> {
            self.inner.leaderboard(limit).await
        }

        async fn create_drawing(
            &self,
            author_id: i64,
            timeline: &Timeline,
            secret_word: &str,
        ) -> StoreResult<String> {
            self.inner.create_drawing(author_id, timeline, secret_word).await
        }

        async fn drawing(&self, drawing_id: &str) -> StoreResult<Drawing> {
            self.inner.drawing(drawing_id).await
        }

        async fn mark_guessed(&self, drawing_id: &str, user_id: i64) -> StoreResult<()> {
            self.inner.mark_guessed(drawing_id, user_id).await
        }

        async fn record_correct_guess(
            &self,
            drawing_id: &str,
            guesser_id: i64,
            author_id: i64,
        ) -> StoreResult<()> {
            if self.fail_once.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection lost".to_string()));
            }
            self.inner
                .record_correct_guess(drawing_id, guesser_id, author_id)
                .await
        }

        async fn drawings_by_author(&self, author_id: i64) -> StoreResult<Vec<DrawingSummary>> {
            self.inner.drawings_by_author(author_id).await
        }

        async fn open_duels_for(&self, user_id: i64) -> StoreResult<Vec<OpenDuel>> {
            self.inner.open_duels_for(user_id).await
        }

        async fn create_session(
            &self,
            session_id: &str,
            user_id: i64,
            expires_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            self.inner.create_session(session_id, user_id, expires_at).await
        }

        async fn session_user(&self, session_id: &str) -> StoreResult<i64> {
            self.inner.session_user(session_id).await
        }

        async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
            self.inner.delete_session(session_id).await
        }
    }

    #[tokio::test]
    async fn failed_scoring_write_leaves_the_guess_retryable() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_once: AtomicBool::new(true),
        });
        let alice = store.create_user("alice", "hash").await.unwrap().id;
        let bob = store.create_user("bob", "hash").await.unwrap().id;
        let service = DuelService::new(store.clone());
        let id = service
            .submit_drawing(alice, sample_timeline(), "cat")
            .await
            .unwrap();

        let err = service.submit_guess(&id, bob, "cat").await.unwrap_err();
        assert!(matches!(err, GameError::StoreUnavailable(_)));

        // Nothing landed: Bob is not stranded in the guessed-by set with
        // zero points, so the retry is a fresh correct guess rather than
        // Forbidden.
        assert!(store.inner.drawing(&id).await.unwrap().guessed_by.is_empty());
        assert_eq!(store.inner.user(bob).await.unwrap().points, 0);

        let outcome = service.submit_guess(&id, bob, "cat").await.unwrap();
        assert!(outcome.correct);
        assert_eq!(store.inner.user(bob).await.unwrap().points, 1);
        assert_eq!(store.inner.user(alice).await.unwrap().points, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_correct_guesses_score_exactly_once() {
        let f = fixture().await;
        let id = f
            .service
            .submit_drawing(f.alice, sample_timeline(), "cat")
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let service = f.service.clone();
            let id = id.clone();
            let bob = f.bob;
            tasks.push(tokio::spawn(async move {
                service.submit_guess(&id, bob, "cat").await
            }));
        }

        let mut correct = 0;
        let mut forbidden = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(outcome) => {
                    assert!(outcome.correct);
                    correct += 1;
                }
                // Guesses that read the drawing after the winner's insert
                // observe the membership and are refused outright.
                Err(GameError::Forbidden) => forbidden += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(correct >= 1);
        assert_eq!(correct + forbidden, 16);

        // Exactly one award each, and the set contains Bob exactly once.
        assert_eq!(points(&f.store, f.bob).await, 1);
        assert_eq!(points(&f.store, f.alice).await, 1);
        let guessed_by = f.store.drawing(&id).await.unwrap().guessed_by;
        assert_eq!(guessed_by.len(), 1);
    }
}
