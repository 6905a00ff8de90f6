//! crates/draw_duel_core/src/memory.rs
//!
//! An in-memory [`DrawingStore`] used by the engine's unit tests and as a
//! throwaway backend for local development. All state lives behind a single
//! mutex, which makes the guessed-by check-and-set trivially atomic.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Drawing, DrawingSummary, OpenDuel, Timeline, User, UserCredentials};
use crate::ports::{DrawingStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    users: HashMap<i64, StoredUser>,
    /// Insertion order doubles as creation order; listings walk it in
    /// reverse for newest-first.
    drawings: Vec<Drawing>,
    sessions: HashMap<String, (i64, DateTime<Utc>)>,
}

struct StoredUser {
    user: User,
    password_hash: String,
}

/// In-memory store. Cheap to construct, nothing survives a drop.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a panic mid-mutation in another test
        // thread; propagating the panic is the right call here.
        self.inner.lock().expect("memory store mutex poisoned")
    }
}

#[async_trait]
impl DrawingStore for MemoryStore {
    async fn create_user(&self, nickname: &str, password_hash: &str) -> StoreResult<User> {
        let mut inner = self.lock();
        if inner.users.values().any(|u| u.user.nickname == nickname) {
            return Err(StoreError::Conflict(format!(
                "nickname {nickname:?} is taken"
            )));
        }
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            nickname: nickname.to_string(),
            points: 0,
        };
        inner.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(user)
    }

    async fn user(&self, user_id: i64) -> StoreResult<User> {
        self.lock()
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))
    }

    async fn user_by_nickname(&self, nickname: &str) -> StoreResult<UserCredentials> {
        self.lock()
            .users
            .values()
            .find(|u| u.user.nickname == nickname)
            .map(|u| UserCredentials {
                id: u.user.id,
                nickname: u.user.nickname.clone(),
                password_hash: u.password_hash.clone(),
            })
            .ok_or_else(|| StoreError::NotFound(format!("user {nickname:?}")))
    }

    async fn add_points(&self, user_id: i64, delta: i64) -> StoreResult<()> {
        let mut inner = self.lock();
        let stored = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
        stored.user.points += delta;
        Ok(())
    }

    async fn leaderboard(&self, limit: u32) -> StoreResult<Vec<User>> {
        let inner = self.lock();
        let mut users: Vec<User> = inner.users.values().map(|u| u.user.clone()).collect();
        users.sort_by(|a, b| b.points.cmp(&a.points).then(a.nickname.cmp(&b.nickname)));
        users.truncate(limit as usize);
        Ok(users)
    }

    async fn create_drawing(
        &self,
        author_id: i64,
        timeline: &Timeline,
        secret_word: &str,
    ) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.lock();
        if !inner.users.contains_key(&author_id) {
            return Err(StoreError::NotFound(format!("user {author_id}")));
        }
        inner.drawings.push(Drawing {
            id: id.clone(),
            author_id,
            timeline: timeline.clone(),
            secret_word: secret_word.to_string(),
            guessed_by: HashSet::new(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn drawing(&self, drawing_id: &str) -> StoreResult<Drawing> {
        self.lock()
            .drawings
            .iter()
            .find(|d| d.id == drawing_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("drawing {drawing_id}")))
    }

    async fn mark_guessed(&self, drawing_id: &str, user_id: i64) -> StoreResult<()> {
        let mut inner = self.lock();
        let drawing = inner
            .drawings
            .iter_mut()
            .find(|d| d.id == drawing_id)
            .ok_or_else(|| StoreError::NotFound(format!("drawing {drawing_id}")))?;
        // Check and insert under one guard: the atomic check-and-set.
        if !drawing.guessed_by.insert(user_id) {
            return Err(StoreError::AlreadyGuessed);
        }
        Ok(())
    }

    async fn record_correct_guess(
        &self,
        drawing_id: &str,
        guesser_id: i64,
        author_id: i64,
    ) -> StoreResult<()> {
        // Everything happens under one guard, so the membership insert and
        // the two awards are indivisible. Users are checked up front: no
        // write lands unless all of them can.
        let mut inner = self.lock();
        for id in [guesser_id, author_id] {
            if !inner.users.contains_key(&id) {
                return Err(StoreError::NotFound(format!("user {id}")));
            }
        }
        let drawing = inner
            .drawings
            .iter_mut()
            .find(|d| d.id == drawing_id)
            .ok_or_else(|| StoreError::NotFound(format!("drawing {drawing_id}")))?;
        if !drawing.guessed_by.insert(guesser_id) {
            return Err(StoreError::AlreadyGuessed);
        }
        for id in [guesser_id, author_id] {
            if let Some(stored) = inner.users.get_mut(&id) {
                stored.user.points += 1;
            }
        }
        Ok(())
    }

    async fn drawings_by_author(&self, author_id: i64) -> StoreResult<Vec<DrawingSummary>> {
        Ok(self
            .lock()
            .drawings
            .iter()
            .rev()
            .filter(|d| d.author_id == author_id)
            .map(|d| DrawingSummary {
                id: d.id.clone(),
                word: d.secret_word.clone(),
                created_at: d.created_at,
            })
            .collect())
    }

    async fn open_duels_for(&self, user_id: i64) -> StoreResult<Vec<OpenDuel>> {
        let inner = self.lock();
        Ok(inner
            .drawings
            .iter()
            .rev()
            .filter(|d| d.author_id != user_id && !d.guessed_by.contains(&user_id))
            .map(|d| OpenDuel {
                drawing_id: d.id.clone(),
                author_nickname: inner
                    .users
                    .get(&d.author_id)
                    .map(|u| u.user.nickname.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn create_session(
        &self,
        session_id: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.lock()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn session_user(&self, session_id: &str) -> StoreResult<i64> {
        let inner = self.lock();
        match inner.sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(StoreError::NotFound(format!("session {session_id}"))),
        }
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        self.lock().sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_nickname_is_a_conflict() {
        let store = MemoryStore::new();
        store.create_user("alice", "h1").await.unwrap();
        let err = store.create_user("alice", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn mark_guessed_is_at_most_once() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", "h").await.unwrap().id;
        let bob = store.create_user("bob", "h").await.unwrap().id;
        let id = store
            .create_drawing(alice, &Timeline(vec![]), "cat")
            .await
            .unwrap();

        store.mark_guessed(&id, bob).await.unwrap();
        let err = store.mark_guessed(&id, bob).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyGuessed));
    }

    #[tokio::test]
    async fn mark_guessed_unknown_drawing_is_not_found() {
        let store = MemoryStore::new();
        let bob = store.create_user("bob", "h").await.unwrap().id;
        let err = store.mark_guessed("nope", bob).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn record_correct_guess_moves_membership_and_points_together() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", "h").await.unwrap().id;
        let bob = store.create_user("bob", "h").await.unwrap().id;
        let id = store
            .create_drawing(alice, &Timeline(vec![]), "cat")
            .await
            .unwrap();

        store.record_correct_guess(&id, bob, alice).await.unwrap();
        assert!(store.drawing(&id).await.unwrap().guessed_by.contains(&bob));
        assert_eq!(store.user(bob).await.unwrap().points, 1);
        assert_eq!(store.user(alice).await.unwrap().points, 1);

        // A duplicate awards nothing.
        let err = store.record_correct_guess(&id, bob, alice).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyGuessed));
        assert_eq!(store.user(bob).await.unwrap().points, 1);
        assert_eq!(store.user(alice).await.unwrap().points, 1);
    }

    #[tokio::test]
    async fn expired_session_is_not_found() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", "h").await.unwrap().id;
        store
            .create_session("sid", alice, Utc::now() - chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert!(matches!(
            store.session_user("sid").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
