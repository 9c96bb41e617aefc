//! 失败锁定模块
//!
//! 跟踪失败的认证尝试，达到阈值后锁定账户，并按配置的策略解锁：
//!
//! - **Email**: 锁定时签发 Unlock token 并邮寄，持 token 解锁。
//! - **Time**: 锁定满 `unlock_period` 后，下一次检查时自动解锁。
//! - **Both**（默认）: 两条路径都可用。
//!
//! 计数与锁定转换在存储层的单次原子更新内完成：并发失败尝试下
//! 锁定转换恰好发生一次，邮件也只发一封。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::account::{Account, LockReason, TokenPurpose};
use crate::audit::{AuditLogger, EventType, SecurityEvent};
use crate::clock::Clock;
use crate::error::{AuthError, Error, Result, StorageError};
use crate::mailer::{deliver, MailPayload, MailTemplate, Mailer};
use crate::store::SecurityStore;
use crate::vault::TokenVault;

// ============================================================================
// 配置
// ============================================================================

/// 解锁策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockStrategy {
    /// 仅凭邮寄的 Unlock token 解锁
    Email,
    /// 仅超时自动解锁
    Time,
    /// 两条路径都可用
    Both,
}

impl UnlockStrategy {
    /// 是否包含邮件路径
    pub fn uses_email(&self) -> bool {
        matches!(self, UnlockStrategy::Email | UnlockStrategy::Both)
    }

    /// 是否包含超时路径
    pub fn uses_time(&self) -> bool {
        matches!(self, UnlockStrategy::Time | UnlockStrategy::Both)
    }
}

/// 账户已自动解锁后，迟到的 Unlock token 如何处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaleUnlockPolicy {
    /// 视为无操作的成功（默认）
    Accept,
    /// 返回验证错误
    Reject,
}

/// 失败锁定配置
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// 触发锁定的失败次数阈值
    pub max_failed_attempts: u32,

    /// 解锁策略
    pub unlock_strategy: UnlockStrategy,

    /// 超时自动解锁的锁定时长
    pub unlock_period: Duration,

    /// Unlock token 的有效期，None 表示不过期
    pub unlock_token_ttl: Option<Duration>,

    /// 迟到 token 的处理策略
    pub stale_unlock: StaleUnlockPolicy,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            unlock_strategy: UnlockStrategy::Both,
            unlock_period: Duration::hours(1),
            unlock_token_ttl: None,
            stale_unlock: StaleUnlockPolicy::Accept,
        }
    }
}

impl LockoutConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 严格配置：阈值低、只认邮件、迟到 token 报错
    pub fn strict() -> Self {
        Self {
            max_failed_attempts: 3,
            unlock_strategy: UnlockStrategy::Email,
            unlock_period: Duration::hours(24),
            unlock_token_ttl: Some(Duration::hours(24)),
            stale_unlock: StaleUnlockPolicy::Reject,
        }
    }

    /// 宽松配置：阈值高、短超时即可自动解锁
    pub fn relaxed() -> Self {
        Self {
            max_failed_attempts: 10,
            unlock_strategy: UnlockStrategy::Time,
            unlock_period: Duration::minutes(15),
            unlock_token_ttl: None,
            stale_unlock: StaleUnlockPolicy::Accept,
        }
    }

    /// 设置失败阈值
    pub fn with_max_failed_attempts(mut self, max: u32) -> Self {
        self.max_failed_attempts = max;
        self
    }

    /// 设置解锁策略
    pub fn with_unlock_strategy(mut self, strategy: UnlockStrategy) -> Self {
        self.unlock_strategy = strategy;
        self
    }

    /// 设置自动解锁时长
    pub fn with_unlock_period(mut self, period: Duration) -> Self {
        self.unlock_period = period;
        self
    }

    /// 设置 Unlock token 有效期
    pub fn with_unlock_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.unlock_token_ttl = ttl;
        self
    }

    /// 设置迟到 token 策略
    pub fn with_stale_unlock(mut self, policy: StaleUnlockPolicy) -> Self {
        self.stale_unlock = policy;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.max_failed_attempts == 0 {
            return Err(Error::config("max_failed_attempts", "must be at least 1"));
        }
        if self.unlock_strategy.uses_time() && self.unlock_period <= Duration::zero() {
            return Err(Error::config("unlock_period", "must be positive"));
        }
        if let Some(ttl) = self.unlock_token_ttl
            && ttl <= Duration::zero()
        {
            return Err(Error::config("unlock_token_ttl", "must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// 结果类型
// ============================================================================

/// 一次失败记录的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// 更新后的失败计数
    pub failed_attempts: u32,

    /// 本次调用是否触发了锁定转换
    pub just_locked: bool,
}

/// 账户的锁定状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    /// 未锁定
    Unlocked,
    /// 已锁定
    Locked {
        /// 锁定时刻
        since: DateTime<Utc>,
        /// 锁定原因
        reason: LockReason,
    },
}

// ============================================================================
// LockoutGuard
// ============================================================================

/// 失败锁定守卫
#[derive(Clone)]
pub struct LockoutGuard {
    store: Arc<dyn SecurityStore>,
    clock: Arc<dyn Clock>,
    vault: TokenVault,
    mailer: Arc<dyn Mailer>,
    audit: Arc<dyn AuditLogger>,
    config: LockoutConfig,
}

impl LockoutGuard {
    /// 创建守卫
    pub fn new(
        store: Arc<dyn SecurityStore>,
        clock: Arc<dyn Clock>,
        vault: TokenVault,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AuditLogger>,
        config: LockoutConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            vault,
            mailer,
            audit,
            config,
        })
    }

    /// 获取配置引用
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// 认证尝试前的锁定检查
    ///
    /// 超时策略下锁定已满 `unlock_period` 时就地自动解锁并放行；
    /// 否则锁定中的账户返回 `AuthError::AccountLocked`。
    ///
    /// # Errors
    ///
    /// - `AuthError::AccountLocked` - 账户锁定中且未到自动解锁时刻
    /// - `StorageError::NotFound` - 账户不存在
    pub fn ensure_unlocked(&self, account_id: &str) -> Result<()> {
        let now = self.clock.now();
        let mut auto_unlocked = false;
        let uses_time = self.config.unlock_strategy.uses_time();
        let period = self.config.unlock_period;

        let updated = self.store.update_account(account_id, &mut |account| {
            if let Some(locked_at) = account.locked_at
                && uses_time
                && now - locked_at >= period
            {
                account.unlock();
                auto_unlocked = true;
            }
        })?;

        if auto_unlocked {
            self.audit.log(
                SecurityEvent::new(EventType::AccountUnlocked)
                    .with_account_id(account_id)
                    .at(now)
                    .with_detail("via", "timeout"),
            );
        }
        if updated.is_locked() {
            return Err(Error::Auth(AuthError::AccountLocked));
        }
        Ok(())
    }

    /// 记录一次失败的认证尝试
    ///
    /// 计数递增与阈值判定在一次原子更新内完成，并发失败下锁定转换
    /// 恰好发生一次；已锁定的账户不再递增计数。触发锁定且策略含邮件
    /// 路径时，签发 Unlock token 并邮寄（投递失败不上抛）。
    pub fn record_failure(&self, account_id: &str) -> Result<FailureOutcome> {
        let now = self.clock.now();
        let threshold = self.config.max_failed_attempts;
        let mut just_locked = false;

        let updated = self.store.update_account(account_id, &mut |account| {
            if account.is_locked() {
                return;
            }
            account.failed_attempts += 1;
            if account.failed_attempts >= threshold {
                account.lock(now, LockReason::FailedAttempts);
                just_locked = true;
            }
        })?;

        if just_locked {
            self.audit.log(
                SecurityEvent::new(EventType::AccountLocked)
                    .with_account_id(account_id)
                    .at(now)
                    .with_detail("failed_attempts", updated.failed_attempts.to_string()),
            );
            if self.config.unlock_strategy.uses_email() {
                self.send_unlock_token(&updated, now)?;
            }
        }

        Ok(FailureOutcome {
            failed_attempts: updated.failed_attempts,
            just_locked,
        })
    }

    /// 记录一次成功的认证，清零失败计数
    pub fn record_success(&self, account_id: &str) -> Result<()> {
        self.store.update_account(account_id, &mut |account| {
            account.failed_attempts = 0;
        })?;
        Ok(())
    }

    /// 持邮寄的 token 解锁
    ///
    /// 账户已经（比如超时）解锁时按 `stale_unlock` 策略处理：
    /// Accept 吞为无操作成功，Reject 返回验证错误。
    pub fn unlock_by_token(&self, account_id: &str, presented: &str) -> Result<()> {
        let now = self.clock.now();
        self.vault
            .redeem(account_id, TokenPurpose::Unlock, presented)?;

        let mut was_locked = false;
        self.store.update_account(account_id, &mut |account| {
            if account.is_locked() {
                account.unlock();
                was_locked = true;
            }
        })?;

        if !was_locked {
            return match self.config.stale_unlock {
                StaleUnlockPolicy::Accept => Ok(()),
                StaleUnlockPolicy::Reject => {
                    Err(Error::validation("account is not locked"))
                }
            };
        }

        self.audit.log(
            SecurityEvent::new(EventType::AccountUnlocked)
                .with_account_id(account_id)
                .at(now)
                .with_detail("via", "token"),
        );
        Ok(())
    }

    /// 重新签发并邮寄 Unlock token
    ///
    /// # Errors
    ///
    /// - `ValidationError` - 账户未锁定
    pub fn resend_unlock_token(&self, account_id: &str) -> Result<()> {
        let account = self
            .store
            .find_account(account_id)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(account_id.to_string())))?;
        if !account.is_locked() {
            return Err(Error::validation("account is not locked"));
        }
        self.send_unlock_token(&account, self.clock.now())
    }

    /// 手动锁定账户
    pub fn lock(&self, account_id: &str) -> Result<()> {
        let now = self.clock.now();
        self.store.update_account(account_id, &mut |account| {
            if !account.is_locked() {
                account.lock(now, LockReason::Manual);
            }
        })?;
        self.audit.log(
            SecurityEvent::new(EventType::AccountLocked)
                .with_account_id(account_id)
                .at(now)
                .with_detail("via", "manual"),
        );
        Ok(())
    }

    /// 手动解锁账户并清零计数
    pub fn unlock(&self, account_id: &str) -> Result<()> {
        let now = self.clock.now();
        self.store.update_account(account_id, &mut |account| {
            account.unlock();
        })?;
        self.vault.revoke(account_id, TokenPurpose::Unlock)?;
        self.audit.log(
            SecurityEvent::new(EventType::AccountUnlocked)
                .with_account_id(account_id)
                .at(now)
                .with_detail("via", "manual"),
        );
        Ok(())
    }

    /// 查询锁定状态
    pub fn status(&self, account_id: &str) -> Result<LockState> {
        let account = self
            .store
            .find_account(account_id)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(account_id.to_string())))?;
        Ok(match (account.locked_at, account.lock_reason) {
            (Some(since), Some(reason)) => LockState::Locked { since, reason },
            _ => LockState::Unlocked,
        })
    }

    fn send_unlock_token(&self, account: &Account, now: DateTime<Utc>) -> Result<()> {
        let issued = self.vault.issue(
            &account.id,
            TokenPurpose::Unlock,
            self.config.unlock_token_ttl,
        )?;
        self.audit.log(
            SecurityEvent::new(EventType::UnlockTokenIssued)
                .with_account_id(&account.id)
                .at(now),
        );
        deliver(
            self.mailer.as_ref(),
            self.audit.as_ref(),
            &account.id,
            &account.email,
            MailTemplate::UnlockInstructions,
            &MailPayload {
                secret: issued.secret,
                expires_at: issued.expires_at,
            },
            now,
        );
        Ok(())
    }
}
