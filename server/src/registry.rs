//! Registry of connected sessions and their scores
//!
//! `GameState` is the only shared mutable state in the server. Membership and
//! scores live in one table behind a single async mutex, so a score exists if
//! and only if its session is registered. The lock only ever guards in-memory
//! work: callers take a `snapshot()` and do their network I/O outside it.

use crate::session::Session;
use log::{debug, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// A session's final standing, used for winner computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub name: String,
    pub addr: SocketAddr,
    pub score: u32,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    score: u32,
}

/// Connected sessions in join order, each with its score
#[derive(Debug, Default)]
pub struct GameState {
    entries: Mutex<Vec<Entry>>,
    joined: Notify,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session with a zero score.
    ///
    /// A stale entry under the same address (a socket whose closure has not
    /// been noticed yet) is replaced.
    pub async fn add(&self, session: Session) {
        {
            let mut entries = self.entries.lock().await;
            if let Some(existing) = entries.iter_mut().find(|e| e.session == session) {
                debug!("Replacing stale session for {}", session.addr());
                *existing = Entry { session, score: 0 };
            } else {
                info!("Registered {}", session);
                entries.push(Entry { session, score: 0 });
            }
        }
        self.joined.notify_waiters();
    }

    /// Removes the session with this address; removing an absent one is a no-op.
    ///
    /// Returns the removed session, if any.
    pub async fn remove(&self, addr: &SocketAddr) -> Option<Session> {
        let mut entries = self.entries.lock().await;
        let index = entries.iter().position(|e| e.session.addr() == *addr)?;
        let entry = entries.remove(index);
        debug!("Removed {}", entry.session);
        Some(entry.session)
    }

    /// Removes `session` only if the registered entry is still the same socket.
    ///
    /// Used by a connection's own listener so it can never evict a newer
    /// session that happens to reuse the address.
    pub async fn remove_exact(&self, session: &Session) -> bool {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| !e.session.same_connection(session));
        entries.len() != before
    }

    pub async fn contains(&self, addr: &SocketAddr) -> bool {
        self.entries
            .lock()
            .await
            .iter()
            .any(|e| e.session.addr() == *addr)
    }

    /// Point-in-time copy of the registered sessions, in join order
    pub async fn snapshot(&self) -> Vec<Session> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|e| e.session.clone())
            .collect()
    }

    /// Point-in-time copy of every registered session's score, in join order
    pub async fn standings(&self) -> Vec<Standing> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|e| Standing {
                name: e.session.name().to_string(),
                addr: e.session.addr(),
                score: e.score,
            })
            .collect()
    }

    pub async fn score_of(&self, addr: &SocketAddr) -> Option<u32> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.session.addr() == *addr)
            .map(|e| e.score)
    }

    /// Adds one point; returns the new score, or `None` if the session left
    pub async fn award_point(&self, addr: &SocketAddr) -> Option<u32> {
        let mut entries = self.entries.lock().await;
        let entry = entries.iter_mut().find(|e| e.session.addr() == *addr)?;
        entry.score += 1;
        Some(entry.score)
    }

    /// Zeroes every registered session's score at the start of a round.
    ///
    /// Returns how many sessions take part.
    pub async fn reset_scores(&self) -> usize {
        let mut entries = self.entries.lock().await;
        for entry in entries.iter_mut() {
            entry.score = 0;
        }
        entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Waits at most `poll` for a session to join.
    ///
    /// Returns whether the registry is non-empty afterwards; callers loop on
    /// this so they stay responsive to shutdown between polls.
    pub async fn wait_for_players(&self, poll: Duration) -> bool {
        let joined = self.joined.notified();
        if !self.is_empty().await {
            return true;
        }
        let _ = tokio::time::timeout(poll, joined).await;
        !self.is_empty().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::session_pair;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_registry_creation() {
        let state = GameState::new();
        assert!(state.is_empty().await);
        assert_eq!(state.len().await, 0);
        assert!(state.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_session_starts_at_zero() {
        let state = GameState::new();
        let (_player, session) = session_pair("Ash").await;
        let addr = session.addr();

        state.add(session).await;

        assert_eq!(state.len().await, 1);
        assert!(state.contains(&addr).await);
        assert_eq!(state.score_of(&addr).await, Some(0));
    }

    #[tokio::test]
    async fn test_snapshot_keeps_join_order() {
        let state = GameState::new();
        let (_p1, first) = session_pair("Ash").await;
        let (_p2, second) = session_pair("Misty").await;
        let (_p3, third) = session_pair("Brock").await;

        state.add(first.clone()).await;
        state.add(second.clone()).await;
        state.add(third.clone()).await;

        let names: Vec<String> = state
            .snapshot()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["Ash", "Misty", "Brock"]);
    }

    #[tokio::test]
    async fn test_remove_drops_score_entry() {
        let state = GameState::new();
        let (_player, session) = session_pair("Ash").await;
        let addr = session.addr();
        state.add(session).await;
        state.award_point(&addr).await;

        let removed = state.remove(&addr).await;

        assert_eq!(removed.map(|s| s.addr()), Some(addr));
        assert_eq!(state.score_of(&addr).await, None);
        assert!(state.standings().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_absent_session_is_noop() {
        let state = GameState::new();
        let (_player, session) = session_pair("Ash").await;
        let addr = session.addr();
        state.add(session).await;

        assert!(state.remove(&addr).await.is_some());
        assert!(state.remove(&addr).await.is_none());
        assert!(state.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_insulated_from_removal() {
        let state = GameState::new();
        let (_p1, first) = session_pair("Ash").await;
        let (_p2, second) = session_pair("Misty").await;
        state.add(first.clone()).await;
        state.add(second.clone()).await;

        let snapshot = state.snapshot().await;
        state.remove(&first.addr()).await;

        assert_eq!(snapshot.len(), 2);
        assert!(!state.contains(&snapshot[0].addr()).await);
        assert!(state.contains(&snapshot[1].addr()).await);
    }

    #[tokio::test]
    async fn test_award_point_and_reset() {
        let state = GameState::new();
        let (_p1, first) = session_pair("Ash").await;
        let (_p2, second) = session_pair("Misty").await;
        state.add(first.clone()).await;
        state.add(second.clone()).await;

        assert_eq!(state.award_point(&first.addr()).await, Some(1));
        assert_eq!(state.award_point(&first.addr()).await, Some(2));
        assert_eq!(state.award_point(&second.addr()).await, Some(1));

        assert_eq!(state.reset_scores().await, 2);
        assert_eq!(state.score_of(&first.addr()).await, Some(0));
        assert_eq!(state.score_of(&second.addr()).await, Some(0));
    }

    #[tokio::test]
    async fn test_mid_round_joiner_is_scored() {
        let state = GameState::new();
        let (_p1, first) = session_pair("Ash").await;
        state.add(first.clone()).await;
        assert_eq!(state.reset_scores().await, 1);

        let (_p2, late) = session_pair("Brock").await;
        state.add(late.clone()).await;
        assert_eq!(state.award_point(&late.addr()).await, Some(1));

        let standings = state.standings().await;
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[1].name, "Brock");
        assert_eq!(standings[1].score, 1);
    }

    #[tokio::test]
    async fn test_award_point_to_departed_session() {
        let state = GameState::new();
        let (_player, session) = session_pair("Ash").await;
        let addr = session.addr();
        state.add(session).await;
        state.remove(&addr).await;

        assert_eq!(state.award_point(&addr).await, None);
        assert!(state.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_exact_ignores_newer_socket() {
        let state = GameState::new();
        let (_p1, old) = session_pair("Ash").await;
        let (_p2, other) = session_pair("Ash").await;
        let newer = Session::new(old.addr(), "Ash", Arc::clone(other.connection()));

        state.add(old.clone()).await;
        state.add(newer.clone()).await;
        assert_eq!(state.len().await, 1);

        assert!(!state.remove_exact(&old).await);
        assert!(state.contains(&old.addr()).await);
        assert!(state.remove_exact(&newer).await);
        assert!(state.is_empty().await);
    }

    #[tokio::test]
    async fn test_wait_for_players_wakes_on_join() {
        let state = Arc::new(GameState::new());
        let (_player, session) = session_pair("Ash").await;

        assert!(!state.wait_for_players(Duration::from_millis(20)).await);

        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.wait_for_players(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        state.add(session).await;

        assert!(waiter.await.unwrap());
    }
}
