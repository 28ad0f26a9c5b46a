//! Domain logic for the feed client.
//!
//! This module contains pure functions that implement the reconnect policy
//! without side effects, making them easy to test.

/// Lifecycle of the feed client
///
/// `Disconnected → Connecting → Connected → Reconnecting → Connecting → …`, ending in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    /// `Closed` is the only terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `consecutive_failures` - Failed sessions or connect attempts since the last successful connect
/// * `max_attempts` - Upper bound on consecutive failures, `None` for no bound
///
/// # Returns
///
/// `true` if reconnection should be attempted, `false` otherwise
pub fn should_attempt_reconnect(consecutive_failures: u32, max_attempts: Option<u32>) -> bool {
    match max_attempts {
        Some(max) => consecutive_failures < max,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_attempt_reconnect_without_limit() {
        // テスト項目: 上限なしの場合、失敗回数に関わらず再接続すべきと判定される
        // given (前提条件):
        let failures = u32::MAX;

        // when (操作):
        let result = should_attempt_reconnect(failures, None);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_attempt_reconnect_within_limit() {
        // テスト項目: 失敗回数が上限未満の場合、再接続すべきと判定される
        // given (前提条件):
        let failures = 4;

        // when (操作):
        let result = should_attempt_reconnect(failures, Some(5));

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_attempt_reconnect_at_limit() {
        // テスト項目: 失敗回数が上限に達した場合、再接続すべきではないと判定される
        // given (前提条件):
        let failures = 5;

        // when (操作):
        let result = should_attempt_reconnect(failures, Some(5));

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_only_closed_is_terminal() {
        // テスト項目: Closed のみが終端状態である
        // given (前提条件):
        let states = [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
        ];

        // when (操作) / then (期待する結果):
        assert!(states.iter().all(|state| !state.is_terminal()));
        assert!(ConnectionState::Closed.is_terminal());
    }
}
