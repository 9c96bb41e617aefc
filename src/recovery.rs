//! 密码找回模块
//!
//! 邮寄单次使用的重置 token，凭它设置新密码：
//!
//! - [`RecoveryFlow::request_reset`]: 按邮箱签发 Recovery token 并邮寄。
//!   默认对未知邮箱静默成功，避免账户枚举。
//! - [`RecoveryFlow::reset_password`]: 校验顺序固定为
//!   确认一致 → 密码策略 → 兑换 token → 写入新密码。
//!   前两项失败不消耗 token，用户可以换个密码重试同一封邮件。

use chrono::Duration;
use std::sync::Arc;

use crate::account::TokenPurpose;
use crate::audit::{AuditLogger, EventType, SecurityEvent};
use crate::clock::Clock;
use crate::credential::CredentialStore;
use crate::error::{Error, Result, StorageError, ValidationError};
use crate::mailer::{deliver, MailPayload, MailTemplate, Mailer};
use crate::store::SecurityStore;
use crate::vault::TokenVault;

/// 密码找回配置
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// 重置 token 的有效期
    pub token_ttl: Duration,

    /// 未知邮箱是否静默成功（防枚举）
    pub enumeration_safe: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(6),
            enumeration_safe: true,
        }
    }
}

impl RecoveryConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 token 有效期
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// 设置枚举保护开关
    pub fn with_enumeration_safe(mut self, safe: bool) -> Self {
        self.enumeration_safe = safe;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.token_ttl <= Duration::zero() {
            return Err(Error::config("token_ttl", "must be positive"));
        }
        Ok(())
    }
}

/// 密码找回流程
#[derive(Clone)]
pub struct RecoveryFlow {
    store: Arc<dyn SecurityStore>,
    clock: Arc<dyn Clock>,
    vault: TokenVault,
    credentials: CredentialStore,
    mailer: Arc<dyn Mailer>,
    audit: Arc<dyn AuditLogger>,
    config: RecoveryConfig,
}

impl RecoveryFlow {
    /// 创建找回流程
    pub fn new(
        store: Arc<dyn SecurityStore>,
        clock: Arc<dyn Clock>,
        vault: TokenVault,
        credentials: CredentialStore,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AuditLogger>,
        config: RecoveryConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            vault,
            credentials,
            mailer,
            audit,
            config,
        })
    }

    /// 获取配置引用
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// 为邮箱请求密码重置
    ///
    /// 已知邮箱：签发 Recovery token（取代此前未用的）并邮寄密文，
    /// 投递失败只记审计、token 依旧有效。未知邮箱：`enumeration_safe`
    /// 为真时静默成功并记审计，否则返回 `StorageError::NotFound`。
    pub fn request_reset(&self, email: &str) -> Result<()> {
        let now = self.clock.now();
        let account = match self.store.find_account_by_email(email)? {
            Some(account) => account,
            None => {
                if self.config.enumeration_safe {
                    self.audit.log(
                        SecurityEvent::new(EventType::PasswordResetRequested)
                            .at(now)
                            .with_detail("outcome", "unknown_email"),
                    );
                    return Ok(());
                }
                return Err(Error::Storage(StorageError::NotFound(format!(
                    "no account for email {email}"
                ))));
            }
        };

        let issued = self.vault.issue(
            &account.id,
            TokenPurpose::Recovery,
            Some(self.config.token_ttl),
        )?;
        self.audit.log(
            SecurityEvent::new(EventType::PasswordResetRequested)
                .with_account_id(&account.id)
                .at(now),
        );
        deliver(
            self.mailer.as_ref(),
            self.audit.as_ref(),
            &account.id,
            &account.email,
            MailTemplate::ResetPasswordInstructions,
            &MailPayload {
                secret: issued.secret,
                expires_at: issued.expires_at,
            },
            now,
        );
        Ok(())
    }

    /// 凭重置 token 设置新密码
    ///
    /// 确认不一致或密码过弱时 token 未被兑换，凭证也未改动；
    /// 兑换成功后写入新密码并清零失败计数。
    ///
    /// # Errors
    ///
    /// - `ValidationError::PasswordMismatch` - 两次输入不一致
    /// - `ValidationError::PasswordTooShort` 等 - 不满足密码策略
    /// - `TokenError::NotFound` / `Expired` / `AlreadyConsumed` - token 无效
    pub fn reset_password(
        &self,
        account_id: &str,
        presented: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<()> {
        if new_password != confirmation {
            return Err(Error::Validation(ValidationError::PasswordMismatch));
        }
        self.credentials.check_policy(new_password)?;

        self.vault
            .redeem(account_id, TokenPurpose::Recovery, presented)?;
        self.credentials.set_password(account_id, new_password)?;
        self.store.update_account(account_id, &mut |account| {
            account.failed_attempts = 0;
        })?;

        self.audit.log(
            SecurityEvent::new(EventType::PasswordResetCompleted)
                .with_account_id(account_id)
                .at(self.clock.now()),
        );
        Ok(())
    }
}
