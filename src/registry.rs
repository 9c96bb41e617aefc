//! 能力注册与认证流水线
//!
//! 各安全模块彼此独立，由 [`ModuleRegistry`] 声明一个账户体系启用了
//! 哪些能力，[`Authenticator`] 按声明把它们组装成一条认证流水线：
//!
//! 检查顺序固定为 锁定 → 确认 → 凭证，每一关用自己的错误短路；
//! 未知邮箱与密码错误返回同一个 `InvalidCredentials`，不泄露账户
//! 是否存在。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use crate::account::Account;
use crate::audit::{AuditLogger, EventType, SecurityEvent};
use crate::clock::Clock;
use crate::confirmation::{ConfirmationConfig, ConfirmationFlow};
use crate::credential::CredentialStore;
use crate::error::{AuthError, Error, Result, StorageError, ValidationError};
use crate::lockout::{LockoutConfig, LockoutGuard};
use crate::mailer::Mailer;
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::random::generate_random_hex;
use crate::recovery::{RecoveryConfig, RecoveryFlow};
use crate::remember::{RememberConfig, RememberService};
use crate::store::SecurityStore;
use crate::timeout::SessionTimeout;
use crate::tracking::ActivityTracker;
use crate::vault::{TokenVault, VaultConfig};

// ============================================================================
// 能力标签
// ============================================================================

/// 账户体系可以启用的安全能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// 密码认证（基础能力，必须启用）
    Database,
    /// 邮箱确认
    Confirmable,
    /// 密码找回
    Recoverable,
    /// 记住我
    Rememberable,
    /// 登录活动跟踪
    Trackable,
    /// 会话超时
    Timeoutable,
    /// 失败锁定
    Lockable,
}

impl Capability {
    /// 能力标签的字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Database => "database",
            Capability::Confirmable => "confirmable",
            Capability::Recoverable => "recoverable",
            Capability::Rememberable => "rememberable",
            Capability::Trackable => "trackable",
            Capability::Timeoutable => "timeoutable",
            Capability::Lockable => "lockable",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "database" => Ok(Capability::Database),
            "confirmable" => Ok(Capability::Confirmable),
            "recoverable" => Ok(Capability::Recoverable),
            "rememberable" => Ok(Capability::Rememberable),
            "trackable" => Ok(Capability::Trackable),
            "timeoutable" => Ok(Capability::Timeoutable),
            "lockable" => Ok(Capability::Lockable),
            other => Err(Error::Validation(ValidationError::Custom(format!(
                "unknown capability: {}",
                other
            )))),
        }
    }
}

/// 启用的能力集合，保持声明顺序、自动去重
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRegistry {
    enabled: Vec<Capability>,
}

impl ModuleRegistry {
    /// 从能力列表构建，重复声明只保留首次出现
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        let mut enabled = Vec::new();
        for cap in capabilities {
            if !enabled.contains(&cap) {
                enabled.push(cap);
            }
        }
        Self { enabled }
    }

    /// 该能力是否启用
    pub fn enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    /// 按声明顺序迭代
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.enabled.iter().copied()
    }

    /// 启用的能力数量
    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

// ============================================================================
// 配置
// ============================================================================

/// 认证器配置：启用的能力加上各模块的配置
#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    /// 启用的能力（必须包含 `Database`）
    pub enabled_modules: Vec<Capability>,

    /// token 金库配置
    pub vault: VaultConfig,

    /// 密码哈希参数
    pub hasher: PasswordHasher,

    /// 密码策略
    pub policy: PasswordPolicy,

    /// 失败锁定配置
    pub lockout: LockoutConfig,

    /// 密码找回配置
    pub recovery: RecoveryConfig,

    /// 记住我配置
    pub remember: RememberConfig,

    /// 邮箱确认配置
    pub confirmation: ConfirmationConfig,

    /// 会话超时窗口
    pub timeout: SessionTimeout,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            enabled_modules: vec![
                Capability::Database,
                Capability::Recoverable,
                Capability::Rememberable,
                Capability::Trackable,
                Capability::Lockable,
            ],
            vault: VaultConfig::default(),
            hasher: PasswordHasher::new(),
            policy: PasswordPolicy::default(),
            lockout: LockoutConfig::default(),
            recovery: RecoveryConfig::default(),
            remember: RememberConfig::default(),
            confirmation: ConfirmationConfig::default(),
            timeout: SessionTimeout::default(),
        }
    }
}

impl AuthenticatorConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置启用的能力
    pub fn with_modules(mut self, modules: impl IntoIterator<Item = Capability>) -> Self {
        self.enabled_modules = modules.into_iter().collect();
        self
    }

    /// 设置密码哈希参数
    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// 设置密码策略
    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 设置失败锁定配置
    pub fn with_lockout(mut self, lockout: LockoutConfig) -> Self {
        self.lockout = lockout;
        self
    }

    /// 设置密码找回配置
    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    /// 设置记住我配置
    pub fn with_remember(mut self, remember: RememberConfig) -> Self {
        self.remember = remember;
        self
    }

    /// 设置邮箱确认配置
    pub fn with_confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// 设置会话超时窗口
    pub fn with_timeout(mut self, timeout: SessionTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.enabled_modules.contains(&Capability::Database) {
            return Err(Error::config(
                "enabled_modules",
                "the database capability is required",
            ));
        }
        self.vault.validate()?;
        self.lockout.validate()?;
        self.recovery.validate()?;
        self.remember.validate()?;
        self.confirmation.validate()?;
        Ok(())
    }
}

// ============================================================================
// Authenticator
// ============================================================================

/// 组装后的认证器
///
/// 所有组件共享同一个存储、时钟、投递器与审计日志器；
/// 未启用的能力不参与流水线，但对应组件仍可单独取用。
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn SecurityStore>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditLogger>,
    registry: ModuleRegistry,
    credentials: CredentialStore,
    lockout: LockoutGuard,
    recovery: RecoveryFlow,
    remember: RememberService,
    confirmation: ConfirmationFlow,
    tracker: ActivityTracker,
    timeout: SessionTimeout,
}

impl Authenticator {
    /// 按配置组装认证器
    pub fn new(
        store: Arc<dyn SecurityStore>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AuditLogger>,
        config: AuthenticatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let registry = ModuleRegistry::new(config.enabled_modules.clone());

        let vault = TokenVault::new(store.clone(), clock.clone(), config.vault)?;
        let credentials =
            CredentialStore::new(store.clone(), config.hasher, config.policy);
        let lockout = LockoutGuard::new(
            store.clone(),
            clock.clone(),
            vault.clone(),
            mailer.clone(),
            audit.clone(),
            config.lockout,
        )?;
        let recovery = RecoveryFlow::new(
            store.clone(),
            clock.clone(),
            vault.clone(),
            credentials.clone(),
            mailer.clone(),
            audit.clone(),
            config.recovery,
        )?;
        let remember = RememberService::new(
            clock.clone(),
            vault.clone(),
            audit.clone(),
            config.remember,
        )?;
        let confirmation = ConfirmationFlow::new(
            store.clone(),
            clock.clone(),
            vault,
            mailer,
            audit.clone(),
            config.confirmation,
        )?;
        let tracker = ActivityTracker::new(store.clone(), clock.clone());

        Ok(Self {
            store,
            clock,
            audit,
            registry,
            credentials,
            lockout,
            recovery,
            remember,
            confirmation,
            tracker,
            timeout: config.timeout,
        })
    }

    /// 启用的能力集合
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// 凭证存储
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// 失败锁定守卫
    pub fn lockout(&self) -> &LockoutGuard {
        &self.lockout
    }

    /// 密码找回流程
    pub fn recovery(&self) -> &RecoveryFlow {
        &self.recovery
    }

    /// 记住我服务
    pub fn remember(&self) -> &RememberService {
        &self.remember
    }

    /// 邮箱确认流程
    pub fn confirmation(&self) -> &ConfirmationFlow {
        &self.confirmation
    }

    /// 登录活动跟踪器
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// 会话超时判定器
    pub fn timeout(&self) -> &SessionTimeout {
        &self.timeout
    }

    /// 注册新账户
    ///
    /// 密码先过策略再哈希；邮箱唯一。启用确认能力时随即邮寄确认
    /// token，账户在确认前无法通过认证。
    ///
    /// # Errors
    ///
    /// - `ValidationError::InvalidEmail` - 邮箱格式不合法
    /// - `ValidationError` - 密码不满足策略
    /// - `StorageError::AlreadyExists` - 邮箱已注册
    pub fn register(&self, email: &str, password: &str) -> Result<Account> {
        validate_email(email)?;
        self.credentials.check_policy(password)?;
        let hash = self.credentials.hasher().hash(password)?;

        let now = self.clock.now();
        let mut account = Account::new(generate_random_hex(16)?, email, now);
        account.password_hash = Some(hash);
        self.store.insert_account(&account)?;

        self.audit.log(
            SecurityEvent::new(EventType::AccountCreated)
                .with_account_id(&account.id)
                .at(now),
        );

        if self.registry.enabled(Capability::Confirmable) {
            self.confirmation.send_confirmation(&account.id)?;
        }
        Ok(account)
    }

    /// 按邮箱和密码认证
    ///
    /// 检查顺序固定：锁定 → 确认 → 凭证。未知邮箱与密码错误统一
    /// 返回 `InvalidCredentials`。启用锁定能力时，凭证失败计入失败
    /// 计数，触发锁定的那一次直接返回 `AccountLocked`；成功则清零
    /// 计数并（启用跟踪时）记录登录活动。
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
        source_ip: Option<IpAddr>,
    ) -> Result<Account> {
        let now = self.clock.now();
        let account = match self.store.find_account_by_email(email)? {
            Some(account) => account,
            None => {
                self.audit.log(
                    SecurityEvent::new(EventType::LoginFailed)
                        .at(now)
                        .with_detail("reason", "unknown_email"),
                );
                return Err(Error::Auth(AuthError::InvalidCredentials));
            }
        };

        if self.registry.enabled(Capability::Lockable) {
            self.lockout.ensure_unlocked(&account.id)?;
        }

        if self.registry.enabled(Capability::Confirmable) && !account.is_confirmed() {
            self.audit.log(
                SecurityEvent::new(EventType::LoginFailed)
                    .with_account_id(&account.id)
                    .at(now)
                    .with_detail("reason", "unconfirmed"),
            );
            return Err(Error::Auth(AuthError::AccountUnconfirmed));
        }

        if !self.credentials.verify_against(&account, password)? {
            self.audit.log(
                SecurityEvent::new(EventType::LoginFailed)
                    .with_account_id(&account.id)
                    .at(now)
                    .with_detail("reason", "invalid_credentials"),
            );
            if self.registry.enabled(Capability::Lockable) {
                let outcome = self.lockout.record_failure(&account.id)?;
                if outcome.just_locked {
                    return Err(Error::Auth(AuthError::AccountLocked));
                }
            }
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }

        if self.registry.enabled(Capability::Lockable) {
            self.lockout.record_success(&account.id)?;
        }
        if self.registry.enabled(Capability::Trackable) {
            self.tracker.record_sign_in(&account.id, source_ip)?;
        }

        self.audit.log(
            SecurityEvent::new(EventType::LoginSucceeded)
                .with_account_id(&account.id)
                .at(now),
        );

        // 返回流水线更新后的快照；账户在流水线中途被删除时如实报错，
        // 不退回陈旧快照
        self.store
            .find_account(&account.id)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(account.id.clone())))
    }

    /// 持当前密码改密
    ///
    /// # Errors
    ///
    /// - `ValidationError::PasswordMismatch` - 两次新密码不一致
    /// - `AuthError::InvalidCredentials` - 当前密码错误
    /// - `ValidationError` - 新密码不满足策略
    pub fn change_password(
        &self,
        account_id: &str,
        current: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<()> {
        if new_password != confirmation {
            return Err(Error::Validation(ValidationError::PasswordMismatch));
        }
        if !self.credentials.verify(account_id, current)? {
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }
        self.credentials.set_password(account_id, new_password)?;
        self.audit.log(
            SecurityEvent::new(EventType::PasswordChanged)
                .with_account_id(account_id)
                .at(self.clock.now()),
        );
        Ok(())
    }
}

/// 最小的邮箱格式检查：非空本地部分 + `@` + 含点的域名
fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(Error::Validation(ValidationError::InvalidEmail(
            email.to_string(),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{SecurityToken, TokenPurpose};
    use crate::audit::InMemoryAuditLogger;
    use crate::clock::ManualClock;
    use crate::mailer::InMemoryMailer;
    use crate::store::{AccountUpdate, InMemorySecurityStore};
    use chrono::{DateTime, Utc};

    fn authenticator(config: AuthenticatorConfig) -> (Arc<InMemoryMailer>, Authenticator) {
        let mailer = Arc::new(InMemoryMailer::new());
        let auth = Authenticator::new(
            Arc::new(InMemorySecurityStore::new()),
            Arc::new(ManualClock::starting_now()),
            mailer.clone(),
            Arc::new(InMemoryAuditLogger::new()),
            config.with_hasher(PasswordHasher::fast_insecure()),
        )
        .unwrap();
        (mailer, auth)
    }

    #[test]
    fn test_capability_round_trip() {
        for cap in [
            Capability::Database,
            Capability::Confirmable,
            Capability::Recoverable,
            Capability::Rememberable,
            Capability::Trackable,
            Capability::Timeoutable,
            Capability::Lockable,
        ] {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
        assert!("passwordless".parse::<Capability>().is_err());
    }

    #[test]
    fn test_registry_dedups_preserving_order() {
        let registry = ModuleRegistry::new([
            Capability::Database,
            Capability::Lockable,
            Capability::Database,
            Capability::Trackable,
            Capability::Lockable,
        ]);
        let order: Vec<Capability> = registry.iter().collect();
        assert_eq!(
            order,
            vec![
                Capability::Database,
                Capability::Lockable,
                Capability::Trackable
            ]
        );
        assert!(registry.enabled(Capability::Trackable));
        assert!(!registry.enabled(Capability::Confirmable));
    }

    #[test]
    fn test_config_requires_database() {
        let config = AuthenticatorConfig::new().with_modules([Capability::Lockable]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_register_and_authenticate() {
        let (_, auth) = authenticator(AuthenticatorConfig::default());

        let account = auth.register("a@example.com", "Str0ng_password").unwrap();
        let authed = auth
            .authenticate("a@example.com", "Str0ng_password", None)
            .unwrap();
        assert_eq!(authed.id, account.id);
        assert_eq!(authed.stats.sign_in_count, 1);
    }

    #[test]
    fn test_register_rejects_duplicate_email() {
        let (_, auth) = authenticator(AuthenticatorConfig::default());
        auth.register("a@example.com", "Str0ng_password").unwrap();
        assert!(auth.register("a@example.com", "0ther_password").is_err());
    }

    #[test]
    fn test_register_rejects_bad_email() {
        let (_, auth) = authenticator(AuthenticatorConfig::default());
        for email in ["", "no-at-sign", "@example.com", "a@nodot", "a@.com"] {
            let err = auth.register(email, "Str0ng_password").unwrap_err();
            assert!(
                matches!(err, Error::Validation(ValidationError::InvalidEmail(_))),
                "{email:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_email_is_invalid_credentials() {
        let (_, auth) = authenticator(AuthenticatorConfig::default());
        let err = auth
            .authenticate("ghost@example.com", "anything1", None)
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_wrong_password_is_invalid_credentials() {
        let (_, auth) = authenticator(AuthenticatorConfig::default());
        auth.register("a@example.com", "Str0ng_password").unwrap();

        let err = auth
            .authenticate("a@example.com", "wrong_password1", None)
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_unconfirmed_gate_before_credentials() {
        let (mailer, auth) = authenticator(
            AuthenticatorConfig::new().with_modules([
                Capability::Database,
                Capability::Confirmable,
            ]),
        );
        let account = auth.register("a@example.com", "Str0ng_password").unwrap();

        // 密码正确与否都先报未确认
        for password in ["Str0ng_password", "wrong_password1"] {
            let err = auth
                .authenticate("a@example.com", password, None)
                .unwrap_err();
            assert_eq!(err, Error::Auth(AuthError::AccountUnconfirmed));
        }

        let secret = mailer.last_for("a@example.com").unwrap().payload.secret;
        auth.confirmation().confirm(&account.id, &secret).unwrap();
        auth.authenticate("a@example.com", "Str0ng_password", None)
            .unwrap();
    }

    #[test]
    fn test_locking_attempt_reports_locked() {
        let (_, auth) = authenticator(
            AuthenticatorConfig::new().with_lockout(
                LockoutConfig::new().with_max_failed_attempts(2),
            ),
        );
        auth.register("a@example.com", "Str0ng_password").unwrap();

        let err = auth
            .authenticate("a@example.com", "wrong_password1", None)
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::InvalidCredentials));

        // 第二次失败触发锁定，这一次就报 AccountLocked
        let err = auth
            .authenticate("a@example.com", "wrong_password1", None)
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::AccountLocked));

        // 此后即便密码正确也被锁挡住
        let err = auth
            .authenticate("a@example.com", "Str0ng_password", None)
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::AccountLocked));
    }

    #[test]
    fn test_disabled_lockable_never_locks() {
        let (_, auth) = authenticator(
            AuthenticatorConfig::new()
                .with_modules([Capability::Database])
                .with_lockout(LockoutConfig::new().with_max_failed_attempts(1)),
        );
        auth.register("a@example.com", "Str0ng_password").unwrap();

        for _ in 0..5 {
            let err = auth
                .authenticate("a@example.com", "wrong_password1", None)
                .unwrap_err();
            assert_eq!(err, Error::Auth(AuthError::InvalidCredentials));
        }
        auth.authenticate("a@example.com", "Str0ng_password", None)
            .unwrap();
    }

    /// 按 id 查找永远落空的存储，模拟账户在流水线中途被删除
    struct VanishingAccountStore {
        inner: InMemorySecurityStore,
    }

    impl SecurityStore for VanishingAccountStore {
        fn insert_account(&self, account: &Account) -> crate::Result<()> {
            self.inner.insert_account(account)
        }

        fn find_account(&self, _account_id: &str) -> crate::Result<Option<Account>> {
            Ok(None)
        }

        fn find_account_by_email(&self, email: &str) -> crate::Result<Option<Account>> {
            self.inner.find_account_by_email(email)
        }

        fn update_account(
            &self,
            account_id: &str,
            apply: AccountUpdate<'_>,
        ) -> crate::Result<Account> {
            self.inner.update_account(account_id, apply)
        }

        fn delete_account(&self, account_id: &str) -> crate::Result<()> {
            self.inner.delete_account(account_id)
        }

        fn put_token(&self, token: &SecurityToken) -> crate::Result<()> {
            self.inner.put_token(token)
        }

        fn latest_token(
            &self,
            account_id: &str,
            purpose: TokenPurpose,
        ) -> crate::Result<Option<SecurityToken>> {
            self.inner.latest_token(account_id, purpose)
        }

        fn consume_token(&self, token_id: &str, at: DateTime<Utc>) -> crate::Result<bool> {
            self.inner.consume_token(token_id, at)
        }

        fn remove_tokens(
            &self,
            account_id: &str,
            purpose: TokenPurpose,
        ) -> crate::Result<usize> {
            self.inner.remove_tokens(account_id, purpose)
        }
    }

    #[test]
    fn test_account_vanishing_mid_pipeline_is_reported() {
        let auth = Authenticator::new(
            Arc::new(VanishingAccountStore {
                inner: InMemorySecurityStore::new(),
            }),
            Arc::new(ManualClock::starting_now()),
            Arc::new(InMemoryMailer::new()),
            Arc::new(InMemoryAuditLogger::new()),
            AuthenticatorConfig::new()
                .with_modules([Capability::Database])
                .with_hasher(PasswordHasher::fast_insecure()),
        )
        .unwrap();
        auth.register("a@example.com", "Str0ng_password").unwrap();

        // 凭证通过但最终快照落空：上报存储错误而不是陈旧快照
        let err = auth
            .authenticate("a@example.com", "Str0ng_password", None)
            .unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::NotFound(_))));
    }

    #[test]
    fn test_change_password() {
        let (_, auth) = authenticator(AuthenticatorConfig::default());
        auth.register("a@example.com", "Str0ng_password").unwrap();
        let account = auth
            .authenticate("a@example.com", "Str0ng_password", None)
            .unwrap();

        let err = auth
            .change_password(&account.id, "wrong_password1", "N3w_password", "N3w_password")
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::InvalidCredentials));

        auth.change_password(&account.id, "Str0ng_password", "N3w_password", "N3w_password")
            .unwrap();
        auth.authenticate("a@example.com", "N3w_password", None)
            .unwrap();
    }
}
