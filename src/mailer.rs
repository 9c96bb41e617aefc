//! 邮件投递接口
//!
//! 核心只定义投递接口，不实现邮件传输。投递相对触发它的流程是
//! fire-and-forget 的：投递失败只进审计日志，token 签发不会因此回滚，
//! token 依旧有效（接受的失败模式）。
//!
//! ## 示例
//!
//! ```rust
//! use guardrs::mailer::{InMemoryMailer, MailPayload, MailTemplate, Mailer};
//!
//! let mailer = InMemoryMailer::new();
//! mailer
//!     .send(
//!         "user@example.com",
//!         MailTemplate::ResetPasswordInstructions,
//!         &MailPayload { secret: "raw-secret".into(), expires_at: None },
//!     )
//!     .unwrap();
//!
//! let outbox = mailer.outbox();
//! assert_eq!(outbox.len(), 1);
//! assert_eq!(outbox[0].to, "user@example.com");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::audit::{AuditLogger, EventType, SecurityEvent};
use crate::error::Result;

/// 邮件模板标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MailTemplate {
    /// 密码重置说明
    ResetPasswordInstructions,
    /// 账户解锁说明
    UnlockInstructions,
    /// 邮箱确认说明
    ConfirmationInstructions,
}

impl MailTemplate {
    /// 模板标签的字符串形式（审计事件用）
    pub fn as_str(&self) -> &'static str {
        match self {
            MailTemplate::ResetPasswordInstructions => "reset_password_instructions",
            MailTemplate::UnlockInstructions => "unlock_instructions",
            MailTemplate::ConfirmationInstructions => "confirmation_instructions",
        }
    }
}

/// 邮件载荷
///
/// `secret` 是 token 的原始密文；应用层负责把它嵌进链接。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailPayload {
    /// token 原始密文
    pub secret: String,

    /// token 过期时间（None 表示不过期，模板可据此措辞）
    pub expires_at: Option<DateTime<Utc>>,
}

/// 邮件投递接口
///
/// 实现方可以把真正的发送放到队列或后台线程；
/// 这里的返回值只表示"是否成功交给投递渠道"。
pub trait Mailer: Send + Sync {
    /// 发送一封模板邮件
    fn send(&self, to: &str, template: MailTemplate, payload: &MailPayload) -> Result<()>;
}

/// 丢弃所有邮件的空实现
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMailer;

impl NullMailer {
    /// 创建空投递器
    pub fn new() -> Self {
        Self
    }
}

impl Mailer for NullMailer {
    fn send(&self, _to: &str, _template: MailTemplate, _payload: &MailPayload) -> Result<()> {
        Ok(())
    }
}

/// 发出的邮件记录（内存实现用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    /// 收件地址
    pub to: String,

    /// 模板
    pub template: MailTemplate,

    /// 载荷
    pub payload: MailPayload,
}

/// 内存投递器，把邮件累积在发件箱里供测试断言
#[derive(Debug, Default)]
pub struct InMemoryMailer {
    outbox: RwLock<Vec<OutboundMail>>,
}

impl InMemoryMailer {
    /// 创建内存投递器
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回全部已发邮件
    pub fn outbox(&self) -> Vec<OutboundMail> {
        self.outbox.read().map(|o| o.clone()).unwrap_or_default()
    }

    /// 返回发给某地址的最后一封邮件
    pub fn last_for(&self, to: &str) -> Option<OutboundMail> {
        self.outbox()
            .into_iter()
            .rev()
            .find(|mail| mail.to == to)
    }

    /// 清空发件箱
    pub fn clear(&self) {
        if let Ok(mut outbox) = self.outbox.write() {
            outbox.clear();
        }
    }
}

impl Mailer for InMemoryMailer {
    fn send(&self, to: &str, template: MailTemplate, payload: &MailPayload) -> Result<()> {
        if let Ok(mut outbox) = self.outbox.write() {
            outbox.push(OutboundMail {
                to: to.to_string(),
                template,
                payload: payload.clone(),
            });
        }
        Ok(())
    }
}

/// 投递一封 token 邮件，失败只记审计事件
///
/// token 在投递前已持久化，投递失败不回滚签发。
pub(crate) fn deliver(
    mailer: &dyn Mailer,
    audit: &dyn AuditLogger,
    account_id: &str,
    to: &str,
    template: MailTemplate,
    payload: &MailPayload,
    now: DateTime<Utc>,
) {
    if let Err(err) = mailer.send(to, template, payload) {
        audit.log(
            SecurityEvent::new(EventType::MailDeliveryFailed)
                .with_account_id(account_id)
                .at(now)
                .with_detail("template", template.as_str())
                .with_detail("error", err.to_string()),
        );
    }
}
