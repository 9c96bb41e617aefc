//! 会话超时模块
//!
//! 纯时间判定，不持有任何状态：会话层记录最后活动时刻，
//! 每次请求时拿它来问一句是否超时。恰好等于窗口时仍然有效。

use chrono::{DateTime, Duration, Utc};

/// 判定最后活动时刻是否已超出窗口
pub fn session_expired(
    last_activity_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    now - last_activity_at > window
}

/// 会话超时判定器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeout {
    /// 无活动窗口
    pub window: Duration,
}

impl Default for SessionTimeout {
    fn default() -> Self {
        Self {
            window: Duration::minutes(30),
        }
    }
}

impl SessionTimeout {
    /// 创建指定窗口的判定器
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// 最后活动在 `last_activity_at` 的会话，在 `now` 是否已超时
    pub fn is_expired(&self, last_activity_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        session_expired(last_activity_at, now, self.window)
    }

    /// 距超时还剩多久，已超时返回 None
    pub fn remaining(
        &self,
        last_activity_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let elapsed = now - last_activity_at;
        if elapsed > self.window {
            None
        } else {
            Some(self.window - elapsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_window() {
        let timeout = SessionTimeout::new(Duration::minutes(30));
        let start = Utc::now();

        assert!(!timeout.is_expired(start, start));
        assert!(!timeout.is_expired(start, start + Duration::minutes(29)));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let timeout = SessionTimeout::new(Duration::minutes(30));
        let start = Utc::now();

        // 恰好等于窗口仍然有效，多一秒就超时
        assert!(!timeout.is_expired(start, start + Duration::minutes(30)));
        assert!(timeout.is_expired(start, start + Duration::minutes(30) + Duration::seconds(1)));
    }

    #[test]
    fn test_remaining() {
        let timeout = SessionTimeout::new(Duration::minutes(30));
        let start = Utc::now();

        assert_eq!(
            timeout.remaining(start, start + Duration::minutes(10)),
            Some(Duration::minutes(20))
        );
        assert_eq!(timeout.remaining(start, start + Duration::hours(1)), None);
    }

    #[test]
    fn test_free_function() {
        let start = Utc::now();
        assert!(session_expired(
            start,
            start + Duration::hours(2),
            Duration::minutes(30)
        ));
        assert!(!session_expired(
            start,
            start + Duration::minutes(5),
            Duration::minutes(30)
        ));
    }
}
