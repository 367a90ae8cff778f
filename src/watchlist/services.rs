use tracing::{info, warn};
use uuid::Uuid;

use super::dto::ToggleAction;
use crate::error::AppError;
use crate::state::AppState;

pub async fn list(st: &AppState, user_id: Uuid) -> Result<Vec<String>, AppError> {
    Ok(st.watchlist.list(user_id).await?)
}

/// Removes the pair if present, otherwise adds it.
///
/// Runs as delete-then-insert against the store. If neither step changes a row,
/// another request added the pair in between; that surfaces as
/// `WatchlistConflict` rather than a second `Added`.
pub async fn toggle(st: &AppState, user_id: Uuid, coin_id: &str) -> Result<ToggleAction, AppError> {
    if coin_id.trim().is_empty() {
        return Err(AppError::validation("coinId is required"));
    }

    if st.watchlist.remove(user_id, coin_id).await? {
        info!(%user_id, coin_id, "watchlist entry removed");
        return Ok(ToggleAction::Removed);
    }

    if st.watchlist.insert(user_id, coin_id).await? {
        info!(%user_id, coin_id, "watchlist entry added");
        return Ok(ToggleAction::Added);
    }

    warn!(%user_id, coin_id, "concurrent watchlist toggle");
    Err(AppError::WatchlistConflict)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::testing::{test_config, Fixture};
    use crate::mail::fake::RecordingMailer;
    use crate::auth::repo::memory::MemoryUserStore;
    use crate::watchlist::repo::memory::RacingStore;

    #[tokio::test]
    async fn toggle_is_self_inverse() {
        let fx = Fixture::new();
        let user = Uuid::new_v4();

        assert_eq!(toggle(&fx.state, user, "bitcoin").await.unwrap(), ToggleAction::Added);
        assert_eq!(list(&fx.state, user).await.unwrap(), vec!["bitcoin".to_string()]);
        assert_eq!(toggle(&fx.state, user, "bitcoin").await.unwrap(), ToggleAction::Removed);
        assert!(list(&fx.state, user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lists_are_per_user_in_insertion_order() {
        let fx = Fixture::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        for coin in ["ethereum", "bitcoin", "solana"] {
            toggle(&fx.state, alice, coin).await.unwrap();
        }
        toggle(&fx.state, bob, "bitcoin").await.unwrap();

        assert_eq!(
            list(&fx.state, alice).await.unwrap(),
            vec!["ethereum", "bitcoin", "solana"]
        );
        assert_eq!(list(&fx.state, bob).await.unwrap(), vec!["bitcoin"]);
    }

    #[tokio::test]
    async fn empty_coin_id_is_rejected() {
        let fx = Fixture::new();
        let err = toggle(&fx.state, Uuid::new_v4(), "  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn concurrent_toggles_never_duplicate() {
        let fx = Fixture::new();
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let state = fx.state.clone();
            handles.push(tokio::spawn(async move { toggle(&state, user, "bitcoin").await }));
        }
        let mut outcomes = Vec::new();
        for h in handles {
            outcomes.push(h.await.unwrap());
        }

        let rows = fx.watchlist.count(user, "bitcoin");
        assert!(rows <= 1);
        let added = outcomes.iter().filter(|o| matches!(o, Ok(ToggleAction::Added))).count();
        let removed = outcomes.iter().filter(|o| matches!(o, Ok(ToggleAction::Removed))).count();
        let conflicts = outcomes
            .iter()
            .filter(|o| matches!(o, Err(AppError::WatchlistConflict)))
            .count();
        // Either the two calls serialized (added then removed, no row left) or
        // they raced on the add (one added, one conflict, one row left).
        assert!(
            (added == 1 && removed == 1 && rows == 0) || (added == 1 && conflicts == 1 && rows == 1),
            "outcomes {outcomes:?}, rows {rows}"
        );
    }

    #[tokio::test]
    async fn losing_concurrent_add_surfaces_conflict() {
        let store = Arc::new(RacingStore::default());
        let state = AppState::from_parts(
            Arc::new(test_config()),
            Arc::new(MemoryUserStore::default()),
            store.clone(),
            Arc::new(RecordingMailer::default()),
        );
        let user = Uuid::new_v4();

        let err = toggle(&state, user, "bitcoin").await.unwrap_err();
        assert!(matches!(err, AppError::WatchlistConflict));
        assert_eq!(store.inner.count(user, "bitcoin"), 1);
    }
}
