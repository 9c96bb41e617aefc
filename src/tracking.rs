//! 登录活动跟踪模块
//!
//! 每次成功登录时累计次数并滚动记录时间与来源 IP：
//! current 槽位先移入 last，再写入本次的值，整个过程在
//! 存储层的单次原子更新内完成。

use std::net::IpAddr;
use std::sync::Arc;

use crate::account::SignInStat;
use crate::clock::Clock;
use crate::error::Result;
use crate::store::SecurityStore;

/// 登录活动跟踪器
#[derive(Clone)]
pub struct ActivityTracker {
    store: Arc<dyn SecurityStore>,
    clock: Arc<dyn Clock>,
}

impl ActivityTracker {
    /// 创建跟踪器
    pub fn new(store: Arc<dyn SecurityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 记录一次成功登录，返回更新后的统计
    pub fn record_sign_in(
        &self,
        account_id: &str,
        source_ip: Option<IpAddr>,
    ) -> Result<SignInStat> {
        let now = self.clock.now();
        let updated = self.store.update_account(account_id, &mut |account| {
            account.stats.record(now, source_ip);
        })?;
        Ok(updated.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::clock::ManualClock;
    use crate::store::InMemorySecurityStore;
    use chrono::Duration;

    fn tracker() -> (ManualClock, ActivityTracker) {
        let store = Arc::new(InMemorySecurityStore::new());
        let clock = ManualClock::starting_now();
        store
            .insert_account(&Account::new("acct-1", "a@example.com", clock.now()))
            .unwrap();
        let tracker = ActivityTracker::new(store, Arc::new(clock.clone()));
        (clock, tracker)
    }

    #[test]
    fn test_first_sign_in() {
        let (clock, tracker) = tracker();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();

        let stats = tracker.record_sign_in("acct-1", Some(ip)).unwrap();
        assert_eq!(stats.sign_in_count, 1);
        assert_eq!(stats.current_sign_in_at, Some(clock.now()));
        assert_eq!(stats.current_sign_in_ip, Some(ip));
        assert!(stats.last_sign_in_at.is_none());
        assert!(stats.last_sign_in_ip.is_none());
    }

    #[test]
    fn test_current_shifts_to_last() {
        let (clock, tracker) = tracker();
        let first_ip: IpAddr = "203.0.113.7".parse().unwrap();
        let second_ip: IpAddr = "198.51.100.4".parse().unwrap();

        tracker.record_sign_in("acct-1", Some(first_ip)).unwrap();
        let first_at = clock.now();

        clock.advance(Duration::hours(3));
        let stats = tracker.record_sign_in("acct-1", Some(second_ip)).unwrap();

        assert_eq!(stats.sign_in_count, 2);
        assert_eq!(stats.current_sign_in_at, Some(clock.now()));
        assert_eq!(stats.current_sign_in_ip, Some(second_ip));
        assert_eq!(stats.last_sign_in_at, Some(first_at));
        assert_eq!(stats.last_sign_in_ip, Some(first_ip));
    }

    #[test]
    fn test_missing_ip_recorded_as_none() {
        let (_, tracker) = tracker();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();

        tracker.record_sign_in("acct-1", Some(ip)).unwrap();
        let stats = tracker.record_sign_in("acct-1", None).unwrap();

        assert_eq!(stats.current_sign_in_ip, None);
        assert_eq!(stats.last_sign_in_ip, Some(ip));
    }
}
