//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use draw_duel_core::StoreError;
use std::sync::Arc;
use tracing::warn;

use crate::web::state::AppState;

/// The caller's resolved identity, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

/// Extracts the session id from the `Cookie` header, if any.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
}

/// Resolves the caller's identity without requiring one. Used by endpoints
/// that serve both authenticated and anonymous viewers (a drawing's id is a
/// shareable URL).
///
/// Only a missing cookie or an unknown/expired session means anonymous. A
/// store failure propagates, so an outage is never mistaken for a logged-out
/// caller and answered with a wordless drawing.
pub async fn maybe_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<i64>, StoreError> {
    let Some(session_id) = session_cookie(headers) else {
        return Ok(None);
    };
    match state.store.session_user(session_id).await {
        Ok(user_id) => Ok(Some(user_id)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Middleware that validates the session cookie and extracts the user id.
///
/// If valid, inserts a [`CurrentUser`] into request extensions for handlers
/// to use. If invalid or missing, returns 401 Unauthorized; identity is
/// never silently defaulted.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session_id =
        session_cookie(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .store
        .session_user(session_id)
        .await
        .map_err(|e| {
            warn!("Failed to validate session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::words::EmbeddedWordList;
    use crate::config::Config;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use draw_duel_core::domain::{
        Drawing, DrawingSummary, OpenDuel, Timeline, User, UserCredentials,
    };
    use draw_duel_core::memory::MemoryStore;
    use draw_duel_core::ports::{DrawingStore, StoreResult};

    /// A store whose every call fails as if the database were unreachable.
    struct DownStore;

    fn down<T>() -> StoreResult<T> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    #[async_trait]
    impl DrawingStore for DownStore {
        async fn create_user(&self, _: &str, _: &str) -> StoreResult<User> {
            down()
        }

        async fn user(&self, _: i64) -> StoreResult<User> {
            down()
        }

        async fn user_by_nickname(&self, _: &str) -> StoreResult<UserCredentials> {
            down()
        }

        async fn add_points(&self, _: i64, _: i64) -> StoreResult<()> {
            down()
        }

        async fn leaderboard(&self, _: u32) -> StoreResult<Vec<User>> {
            down()
        }

        async fn create_drawing(&self, _: i64, _: &Timeline, _: &str) -> StoreResult<String> {
            down()
        }

        async fn drawing(&self, _: &str) -> StoreResult<Drawing> {
            down()
        }

        async fn mark_guessed(&self, _: &str, _: i64) -> StoreResult<()> {
            down()
        }

        async fn record_correct_guess(&self, _: &str, _: i64, _: i64) -> StoreResult<()> {
            down()
        }

        async fn drawings_by_author(&self, _: i64) -> StoreResult<Vec<DrawingSummary>> {
            down()
        }

        async fn open_duels_for(&self, _: i64) -> StoreResult<Vec<OpenDuel>> {
            down()
        }

        async fn create_session(&self, _: &str, _: i64, _: DateTime<Utc>) -> StoreResult<()> {
            down()
        }

        async fn session_user(&self, _: &str) -> StoreResult<i64> {
            down()
        }

        async fn delete_session(&self, _: &str) -> StoreResult<()> {
            down()
        }
    }

    fn state_with(store: Arc<dyn DrawingStore>) -> AppState {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: "sqlite::memory:".to_string(),
            log_level: tracing::Level::INFO,
            leaderboard_size: 10,
            session_ttl_days: 30,
            cors_origin: "http://localhost:3000".to_string(),
        };
        AppState::new(store, Arc::new(EmbeddedWordList::new()), Arc::new(config))
    }

    fn cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, value.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn missing_cookie_is_anonymous() {
        // No cookie means no store round-trip at all, outage or not.
        let state = state_with(Arc::new(DownStore));
        let viewer = maybe_user(&state, &HeaderMap::new()).await.unwrap();
        assert_eq!(viewer, None);
    }

    #[tokio::test]
    async fn unknown_session_is_anonymous() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let viewer = maybe_user(&state, &cookie("session=ghost")).await.unwrap();
        assert_eq!(viewer, None);
    }

    #[tokio::test]
    async fn store_outage_is_surfaced_not_anonymous() {
        let state = state_with(Arc::new(DownStore));
        let err = maybe_user(&state, &cookie("session=live")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
