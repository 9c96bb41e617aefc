//! # GuardRS
//!
//! 可组合的账户安全模块库。
//!
//! 各认证能力（密码校验、失败锁定、密码找回、记住我、登录跟踪、
//! 会话超时、邮箱确认）彼此独立，挂接到同一个账户实体上，共享一套
//! 安全 token 基础设施。
//!
//! ## 功能特性
//!
//! - **密码凭证**: Argon2id 哈希与密码策略校验
//! - **安全 Token 金库**: 只存哈希、单一有效、单次兑换的 token 基础设施
//! - **失败锁定**: 阈值锁定，邮件或超时解锁
//! - **密码找回**: 防枚举的重置邮件与单次使用的重置 token
//! - **记住我**: 窗口期内可多次验证的持久登录 token
//! - **登录跟踪**: 次数、时间与来源 IP 的滚动记录
//! - **会话超时**: 无状态的最后活动时刻判定
//! - **邮箱确认**: 确认前挡在认证流水线之外
//! - **能力注册**: 按声明把上述能力组装成认证流水线
//!
//! ## 组装示例
//!
//! ```rust
//! use guardrs::audit::NullAuditLogger;
//! use guardrs::clock::SystemClock;
//! use guardrs::mailer::NullMailer;
//! use guardrs::password::PasswordHasher;
//! use guardrs::registry::{Authenticator, AuthenticatorConfig};
//! use guardrs::store::InMemorySecurityStore;
//! use std::sync::Arc;
//!
//! let auth = Authenticator::new(
//!     Arc::new(InMemorySecurityStore::new()),
//!     Arc::new(SystemClock::new()),
//!     Arc::new(NullMailer::new()),
//!     Arc::new(NullAuditLogger::new()),
//!     AuthenticatorConfig::default().with_hasher(PasswordHasher::fast_insecure()),
//! )
//! .unwrap();
//!
//! let account = auth.register("user@example.com", "Str0ng_password").unwrap();
//! let authed = auth
//!     .authenticate("user@example.com", "Str0ng_password", None)
//!     .unwrap();
//! assert_eq!(authed.id, account.id);
//! ```
//!
//! ## 单独使用某个模块
//!
//! 每个能力也可以脱离流水线单独构造，只依赖存储、时钟等共享协作者：
//!
//! ```rust
//! use guardrs::account::TokenPurpose;
//! use guardrs::clock::SystemClock;
//! use guardrs::store::InMemorySecurityStore;
//! use guardrs::vault::{TokenVault, VaultConfig};
//! use std::sync::Arc;
//!
//! let vault = TokenVault::new(
//!     Arc::new(InMemorySecurityStore::new()),
//!     Arc::new(SystemClock::new()),
//!     VaultConfig::default(),
//! )
//! .unwrap();
//!
//! let issued = vault.issue("acct-1", TokenPurpose::Recovery, None).unwrap();
//! vault.redeem("acct-1", TokenPurpose::Recovery, &issued.secret).unwrap();
//! ```

pub mod account;
pub mod audit;
pub mod clock;
pub mod confirmation;
pub mod credential;
pub mod error;
pub mod lockout;
pub mod mailer;
pub mod password;
pub mod random;
pub mod recovery;
pub mod registry;
pub mod remember;
pub mod store;
pub mod timeout;
pub mod tracking;
pub mod vault;

pub use error::{Error, Result};

// ============================================================================
// 账户与存储导出
// ============================================================================

pub use account::{Account, LockReason, SecurityToken, SignInStat, TokenPurpose};
pub use store::{InMemorySecurityStore, SecurityStore};

// ============================================================================
// 基础设施导出
// ============================================================================

pub use audit::{AuditLogger, InMemoryAuditLogger, NullAuditLogger, SecurityEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use mailer::{InMemoryMailer, MailPayload, MailTemplate, Mailer, NullMailer};
pub use random::{
    constant_time_compare, constant_time_compare_str, generate_random_base64_url,
    generate_random_bytes, generate_random_hex, generate_token_secret,
};
pub use vault::{IssuedToken, TokenVault, VaultConfig};

// ============================================================================
// 能力模块导出
// ============================================================================

pub use confirmation::{ConfirmationConfig, ConfirmationFlow};
pub use credential::CredentialStore;
pub use lockout::{
    FailureOutcome, LockState, LockoutConfig, LockoutGuard, StaleUnlockPolicy, UnlockStrategy,
};
pub use password::{PasswordHasher, PasswordPolicy};
pub use recovery::{RecoveryConfig, RecoveryFlow};
pub use registry::{Authenticator, AuthenticatorConfig, Capability, ModuleRegistry};
pub use remember::{RememberConfig, RememberService};
pub use timeout::{SessionTimeout, session_expired};
pub use tracking::ActivityTracker;
