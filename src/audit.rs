//! 审计日志模块
//!
//! 面向操作者的可观测性层：每个安全相关的状态迁移（登录成功/失败、
//! 锁定/解锁、token 签发、密码重置、邮箱确认、邮件投递失败）都会产生
//! 一条 [`SecurityEvent`]。
//!
//! 对外返回的错误保持非枚举化（比如找不到邮箱时重置请求静默成功），
//! 具体原因只出现在审计事件里。
//!
//! ## 使用示例
//!
//! ```rust
//! use guardrs::audit::{AuditLogger, EventType, InMemoryAuditLogger, SecurityEvent};
//!
//! let logger = InMemoryAuditLogger::new();
//!
//! logger.log(SecurityEvent::new(EventType::LoginSucceeded).with_account_id("acct-1"));
//! logger.log(
//!     SecurityEvent::new(EventType::LoginFailed)
//!         .with_account_id("acct-1")
//!         .with_detail("reason", "invalid_credentials"),
//! );
//!
//! assert_eq!(logger.events().len(), 2);
//! assert_eq!(logger.events_by_account("acct-1").len(), 2);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// 事件严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventSeverity {
    /// 一般信息
    #[default]
    Info,
    /// 警告
    Warning,
    /// 错误
    Error,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Info => write!(f, "INFO"),
            EventSeverity::Warning => write!(f, "WARNING"),
            EventSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// 安全事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 账户创建
    AccountCreated,
    /// 登录成功
    LoginSucceeded,
    /// 登录失败
    LoginFailed,
    /// 账户锁定
    AccountLocked,
    /// 账户解锁
    AccountUnlocked,
    /// 解锁 token 签发
    UnlockTokenIssued,
    /// 密码重置请求
    PasswordResetRequested,
    /// 密码重置完成
    PasswordResetCompleted,
    /// 密码变更
    PasswordChanged,
    /// 确认邮件发送
    ConfirmationSent,
    /// 邮箱确认完成
    AccountConfirmed,
    /// 记住我 token 签发
    RememberIssued,
    /// 记住我 token 撤销
    RememberForgotten,
    /// 邮件投递失败（不会上抛到触发它的请求）
    MailDeliveryFailed,
}

impl EventType {
    /// 事件的默认严重程度
    pub fn default_severity(&self) -> EventSeverity {
        match self {
            EventType::LoginFailed | EventType::AccountLocked => EventSeverity::Warning,
            EventType::MailDeliveryFailed => EventSeverity::Error,
            _ => EventSeverity::Info,
        }
    }
}

/// 安全事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// 事件类型
    pub event_type: EventType,

    /// 严重程度
    pub severity: EventSeverity,

    /// 相关账户（如有）
    pub account_id: Option<String>,

    /// 事件时间
    pub occurred_at: DateTime<Utc>,

    /// 额外细节（具体错误种类等，仅供操作者）
    pub details: HashMap<String, String>,
}

impl SecurityEvent {
    /// 创建事件，严重程度取类型默认值
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            severity: event_type.default_severity(),
            account_id: None,
            occurred_at: Utc::now(),
            details: HashMap::new(),
        }
    }

    /// 设置相关账户
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// 覆盖严重程度
    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// 覆盖事件时间（组件内部用注入时钟填充）
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// 添加细节
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// 审计日志接口
pub trait AuditLogger: Send + Sync {
    /// 记录一条事件
    ///
    /// 记录失败不应影响触发它的安全操作，实现不返回错误。
    fn log(&self, event: SecurityEvent);
}

/// 丢弃所有事件的空实现
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditLogger;

impl NullAuditLogger {
    /// 创建空审计日志器
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NullAuditLogger {
    fn log(&self, _event: SecurityEvent) {}
}

/// 内存审计日志器
///
/// 适用于测试与开发。生产环境建议接到结构化日志或事件总线。
#[derive(Debug, Default)]
pub struct InMemoryAuditLogger {
    events: RwLock<Vec<SecurityEvent>>,
}

impl InMemoryAuditLogger {
    /// 创建内存日志器
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回目前为止记录的全部事件
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// 按账户过滤事件
    pub fn events_by_account(&self, account_id: &str) -> Vec<SecurityEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.account_id.as_deref() == Some(account_id))
            .collect()
    }

    /// 按类型过滤事件
    pub fn events_by_type(&self, event_type: EventType) -> Vec<SecurityEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// 清空事件
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log(&self, event: SecurityEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}
