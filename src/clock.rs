//! 时钟模块
//!
//! 所有需要"当前时间"的组件都通过 [`Clock`] trait 获取时间，
//! 而不是直接调用 `Utc::now()`。这样过期、锁定窗口等与时间相关的
//! 行为在测试中可以用 [`ManualClock`] 精确推进，无需 sleep。
//!
//! ## 示例
//!
//! ```rust
//! use guardrs::clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_now();
//! let t0 = clock.now();
//!
//! clock.advance(Duration::hours(2));
//! assert_eq!(clock.now() - t0, Duration::hours(2));
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// 可注入的时间源
pub trait Clock: Send + Sync {
    /// 返回当前时间
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟，生产环境的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// 创建系统时钟
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动时钟，时间只在显式调用时变化
///
/// 克隆后的实例共享同一个底层时间，方便在测试中从多处推进。
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// 以指定时间创建手动时钟
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// 以当前系统时间创建手动时钟
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// 向前推进时间
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now = *now + delta;
    }

    /// 直接设定时间
    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("clock lock poisoned")
    }
}
