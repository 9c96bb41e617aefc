//! 账户数据模型
//!
//! 定义安全模块共享的三类记录：
//!
//! - [`Account`]: 账户本体（邮箱、密码哈希、确认/锁定状态、失败计数）
//! - [`SecurityToken`]: 某一用途下的安全 token 记录（只存加盐哈希，不存密文）
//! - [`SignInStat`]: 登录统计（次数、时间、来源地址）
//!
//! 这些记录归存储层所有，只能通过各模块的操作修改，调用方不应直接改写。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, ValidationError};

// ============================================================================
// Token 用途
// ============================================================================

/// 安全 Token 的用途标签
///
/// 同一账户在同一用途下最多只有一个有效 token；重新签发会使旧的失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenPurpose {
    /// 密码重置
    Recovery,
    /// 记住我（多次验证，不消费）
    Remember,
    /// 账户解锁
    Unlock,
    /// 邮箱确认
    Confirmation,
}

impl TokenPurpose {
    /// 用途标签的字符串形式（用于审计事件与存储键）
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Recovery => "recovery",
            TokenPurpose::Remember => "remember",
            TokenPurpose::Unlock => "unlock",
            TokenPurpose::Confirmation => "confirmation",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenPurpose {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recovery" => Ok(TokenPurpose::Recovery),
            "remember" => Ok(TokenPurpose::Remember),
            "unlock" => Ok(TokenPurpose::Unlock),
            "confirmation" => Ok(TokenPurpose::Confirmation),
            other => Err(Error::Validation(ValidationError::Custom(format!(
                "unknown token purpose: {}",
                other
            )))),
        }
    }
}

// ============================================================================
// 锁定原因
// ============================================================================

/// 账户锁定原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockReason {
    /// 失败尝试达到阈值
    FailedAttempts,
    /// 管理员手动锁定
    Manual,
}

// ============================================================================
// 登录统计
// ============================================================================

/// 登录统计记录
///
/// 每次成功认证时原子更新：current 值移入 last，新值写入 current。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInStat {
    /// 累计成功登录次数
    pub sign_in_count: u32,

    /// 本次登录时间
    pub current_sign_in_at: Option<DateTime<Utc>>,

    /// 上次登录时间
    pub last_sign_in_at: Option<DateTime<Utc>>,

    /// 本次登录来源地址
    pub current_sign_in_ip: Option<IpAddr>,

    /// 上次登录来源地址
    pub last_sign_in_ip: Option<IpAddr>,
}

impl SignInStat {
    /// 记录一次成功登录：current 移入 last，新值写入 current，计数 +1
    pub fn record(&mut self, at: DateTime<Utc>, ip: Option<IpAddr>) {
        self.last_sign_in_at = self.current_sign_in_at;
        self.last_sign_in_ip = self.current_sign_in_ip;
        self.current_sign_in_at = Some(at);
        self.current_sign_in_ip = ip;
        self.sign_in_count = self.sign_in_count.saturating_add(1);
    }
}

// ============================================================================
// 账户
// ============================================================================

/// 账户记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// 稳定标识符
    pub id: String,

    /// 邮箱地址（唯一）
    pub email: String,

    /// 密码哈希（PHC 字符串），未设置密码时为 None
    pub password_hash: Option<String>,

    /// 邮箱确认时间，None 表示未确认
    pub confirmed_at: Option<DateTime<Utc>>,

    /// 锁定时间，None 表示未锁定
    pub locked_at: Option<DateTime<Utc>>,

    /// 锁定原因
    pub lock_reason: Option<LockReason>,

    /// 连续失败尝试次数（成功或解锁后归零）
    pub failed_attempts: u32,

    /// 登录统计
    pub stats: SignInStat,

    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// 创建新账户（未确认、未锁定、无密码）
    pub fn new(id: impl Into<String>, email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            password_hash: None,
            confirmed_at: None,
            locked_at: None,
            lock_reason: None,
            failed_attempts: 0,
            stats: SignInStat::default(),
            created_at,
        }
    }

    /// 账户是否已确认
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    /// 账户是否处于锁定状态
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// 进入锁定状态
    pub(crate) fn lock(&mut self, at: DateTime<Utc>, reason: LockReason) {
        self.locked_at = Some(at);
        self.lock_reason = Some(reason);
    }

    /// 解除锁定并清零失败计数
    pub(crate) fn unlock(&mut self) {
        self.locked_at = None;
        self.lock_reason = None;
        self.failed_attempts = 0;
    }
}

// ============================================================================
// 安全 Token
// ============================================================================

/// 安全 Token 记录
///
/// 密文（raw secret）只在签发时返回一次，这里只保存它的加盐哈希。
/// 兑换成功后标记 `consumed` 而不是删除，便于审计。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityToken {
    /// 存储标识（随机十六进制，不含密文信息）
    pub token_id: String,

    /// 所属账户
    pub account_id: String,

    /// 用途
    pub purpose: TokenPurpose,

    /// 哈希盐值（十六进制）
    pub secret_salt: String,

    /// 密文的 HMAC-SHA256 哈希（十六进制）
    pub secret_hash: String,

    /// 签发时间
    pub issued_at: DateTime<Utc>,

    /// 过期时间，None 表示永不过期
    pub expires_at: Option<DateTime<Utc>>,

    /// 是否已被兑换
    pub consumed: bool,

    /// 兑换时间
    pub consumed_at: Option<DateTime<Utc>>,
}

impl SecurityToken {
    /// 在给定时刻是否已过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    /// 在给定时刻是否可兑换（未消费且未过期）
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && !self.is_expired(now)
    }
}
