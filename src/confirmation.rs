//! 邮箱确认模块
//!
//! 新账户凭邮寄的确认 token 激活。未确认的账户在启用确认能力的
//! 认证流水线里会被挡在凭证校验之前（见 `registry`）。

use chrono::Duration;
use std::sync::Arc;

use crate::account::TokenPurpose;
use crate::audit::{AuditLogger, EventType, SecurityEvent};
use crate::clock::Clock;
use crate::error::{Error, Result, StorageError};
use crate::mailer::{deliver, MailPayload, MailTemplate, Mailer};
use crate::store::SecurityStore;
use crate::vault::TokenVault;

/// 邮箱确认配置
#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// 确认 token 的有效期，None 表示不过期（默认）
    pub token_ttl: Option<Duration>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self { token_ttl: None }
    }
}

impl ConfirmationConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 token 有效期
    pub fn with_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if let Some(ttl) = self.token_ttl
            && ttl <= Duration::zero()
        {
            return Err(Error::config("token_ttl", "must be positive"));
        }
        Ok(())
    }
}

/// 邮箱确认流程
#[derive(Clone)]
pub struct ConfirmationFlow {
    store: Arc<dyn SecurityStore>,
    clock: Arc<dyn Clock>,
    vault: TokenVault,
    mailer: Arc<dyn Mailer>,
    audit: Arc<dyn AuditLogger>,
    config: ConfirmationConfig,
}

impl ConfirmationFlow {
    /// 创建确认流程
    pub fn new(
        store: Arc<dyn SecurityStore>,
        clock: Arc<dyn Clock>,
        vault: TokenVault,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AuditLogger>,
        config: ConfirmationConfig,
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
    pub fn config(&self) -> &ConfirmationConfig {
        &self.config
    }

    /// 签发确认 token 并邮寄
    ///
    /// 重复调用会取代旧 token（补发确认邮件的场景）。
    ///
    /// # Errors
    ///
    /// - `ValidationError` - 账户已确认
    /// - `StorageError::NotFound` - 账户不存在
    pub fn send_confirmation(&self, account_id: &str) -> Result<()> {
        let now = self.clock.now();
        let account = self
            .store
            .find_account(account_id)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(account_id.to_string())))?;
        if account.is_confirmed() {
            return Err(Error::validation("account is already confirmed"));
        }

        let issued = self.vault.issue(
            account_id,
            TokenPurpose::Confirmation,
            self.config.token_ttl,
        )?;
        self.audit.log(
            SecurityEvent::new(EventType::ConfirmationSent)
                .with_account_id(account_id)
                .at(now),
        );
        deliver(
            self.mailer.as_ref(),
            self.audit.as_ref(),
            account_id,
            &account.email,
            MailTemplate::ConfirmationInstructions,
            &MailPayload {
                secret: issued.secret,
                expires_at: issued.expires_at,
            },
            now,
        );
        Ok(())
    }

    /// 凭确认 token 激活账户
    pub fn confirm(&self, account_id: &str, presented: &str) -> Result<()> {
        let now = self.clock.now();
        self.vault
            .redeem(account_id, TokenPurpose::Confirmation, presented)?;

        self.store.update_account(account_id, &mut |account| {
            if account.confirmed_at.is_none() {
                account.confirmed_at = Some(now);
            }
        })?;

        self.audit.log(
            SecurityEvent::new(EventType::AccountConfirmed)
                .with_account_id(account_id)
                .at(now),
        );
        Ok(())
    }
}
