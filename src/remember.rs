//! 记住我模块
//!
//! 跨会话的持久登录 token。与单次使用的重置/解锁 token 不同，
//! 记住我 token 在窗口期内可验证任意多次；签发新 token 或调用
//! [`RememberService::forget`] 会让旧密文失效。

use chrono::Duration;
use std::sync::Arc;

use crate::account::TokenPurpose;
use crate::audit::{AuditLogger, EventType, SecurityEvent};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::vault::{IssuedToken, TokenVault};

/// 记住我配置
#[derive(Debug, Clone)]
pub struct RememberConfig {
    /// token 的有效窗口
    pub window: Duration,
}

impl Default for RememberConfig {
    fn default() -> Self {
        Self {
            window: Duration::weeks(2),
        }
    }
}

impl RememberConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置有效窗口
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.window <= Duration::zero() {
            return Err(Error::config("window", "must be positive"));
        }
        Ok(())
    }
}

/// 记住我服务
#[derive(Clone)]
pub struct RememberService {
    clock: Arc<dyn Clock>,
    vault: TokenVault,
    audit: Arc<dyn AuditLogger>,
    config: RememberConfig,
}

impl RememberService {
    /// 创建服务
    pub fn new(
        clock: Arc<dyn Clock>,
        vault: TokenVault,
        audit: Arc<dyn AuditLogger>,
        config: RememberConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            clock,
            vault,
            audit,
            config,
        })
    }

    /// 获取配置引用
    pub fn config(&self) -> &RememberConfig {
        &self.config
    }

    /// 签发记住我 token
    ///
    /// 密文只在返回值里出现一次，由调用方写入客户端 cookie。
    /// 取代该账户已有的记住我 token。
    pub fn issue(&self, account_id: &str) -> Result<IssuedToken> {
        let issued = self.vault.issue(
            account_id,
            TokenPurpose::Remember,
            Some(self.config.window),
        )?;
        self.audit.log(
            SecurityEvent::new(EventType::RememberIssued)
                .with_account_id(account_id)
                .at(self.clock.now()),
        );
        Ok(issued)
    }

    /// 验证客户端出示的记住我密文
    ///
    /// 只验证、不消费：窗口期内可调用任意多次。密文不匹配、已被取代
    /// 或已过期都返回 `Ok(false)`，错误只用于存储故障。
    pub fn validate(&self, account_id: &str, presented: &str) -> Result<bool> {
        match self.vault.verify(account_id, TokenPurpose::Remember, presented) {
            Ok(_) => Ok(true),
            Err(err) if err.is_security_rejection() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// 立即撤销该账户的记住我 token（登出所有记住的客户端）
    pub fn forget(&self, account_id: &str) -> Result<()> {
        self.vault.revoke(account_id, TokenPurpose::Remember)?;
        self.audit.log(
            SecurityEvent::new(EventType::RememberForgotten)
                .with_account_id(account_id)
                .at(self.clock.now()),
        );
        Ok(())
    }
}
