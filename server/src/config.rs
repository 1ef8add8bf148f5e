//! Timing knobs for the round orchestrator and connection listeners

use std::time::Duration;

/// Every duration the server waits on, gathered so tests can shrink them.
///
/// `Default` gives the production values.
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Deadline for each player's answer to one question
    pub answer_timeout: Duration,
    /// How long late data is drained after an answer times out
    pub drain_window: Duration,
    /// Pause between one question's results and the next question
    pub question_pause: Duration,
    /// Number of "waiting for next round" notices sent before a round
    pub wait_notices: u32,
    /// Pause between consecutive waiting notices
    pub wait_notice_interval: Duration,
    /// How often an empty lobby is re-checked for players
    pub player_poll_interval: Duration,
    /// How long a new connection may take to send its name
    pub handshake_timeout: Duration,
    /// How often an idle connection is checked for closure
    pub idle_check_interval: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            answer_timeout: shared::ANSWER_TIMEOUT,
            drain_window: Duration::from_millis(10),
            question_pause: Duration::from_secs(10),
            wait_notices: 5,
            wait_notice_interval: Duration::from_secs(2),
            player_poll_interval: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            idle_check_interval: Duration::from_secs(1),
        }
    }
}

impl GameSettings {
    /// Window late joiners get before a round's scores are reset
    pub fn join_window(&self) -> Duration {
        self.wait_notice_interval * self.wait_notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GameSettings::default();

        assert_eq!(settings.answer_timeout, Duration::from_secs(10));
        assert_eq!(settings.wait_notices, 5);
        assert_eq!(settings.join_window(), Duration::from_secs(10));
        assert!(settings.drain_window < settings.answer_timeout);
    }
}
