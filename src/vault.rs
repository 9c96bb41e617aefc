//! 安全 Token 金库
//!
//! 所有基于 token 的流程（密码重置、记住我、账户解锁、邮箱确认）共用的
//! token 基础设施：
//!
//! - **签发**: 生成密码学安全的随机密文（默认 32 字节熵，最低 24 字节），
//!   只持久化它的加盐 HMAC-SHA256 哈希；密文仅在签发时返回一次。
//! - **单一有效**: 同一 (账户, 用途) 下签发新 token 会取代旧 token，
//!   旧密文随即失效。
//! - **兑换**: 常量时间比较哈希、检查过期，然后通过存储层的条件更新
//!   （compare-and-swap）标记消费；并发兑换最多一个成功。
//! - **只验证**: 记住我这类多次使用的 token 走 [`TokenVault::verify`]，
//!   不消费、只检查哈希与过期。
//!
//! ## 示例
//!
//! ```rust
//! use guardrs::vault::{TokenVault, VaultConfig};
//! use guardrs::store::InMemorySecurityStore;
//! use guardrs::clock::SystemClock;
//! use guardrs::account::TokenPurpose;
//! use chrono::Duration;
//! use std::sync::Arc;
//!
//! let vault = TokenVault::new(
//!     Arc::new(InMemorySecurityStore::new()),
//!     Arc::new(SystemClock::new()),
//!     VaultConfig::default(),
//! ).unwrap();
//!
//! // 签发：密文只返回这一次
//! let issued = vault
//!     .issue("acct-1", TokenPurpose::Recovery, Some(Duration::hours(6)))
//!     .unwrap();
//!
//! // 兑换：成功后同一密文不能再次兑换
//! vault.redeem("acct-1", TokenPurpose::Recovery, &issued.secret).unwrap();
//! assert!(vault.redeem("acct-1", TokenPurpose::Recovery, &issued.secret).is_err());
//! ```

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::account::{SecurityToken, TokenPurpose};
use crate::clock::Clock;
use crate::error::{CryptoError, Error, Result, TokenError};
use crate::random::{
    constant_time_compare_str, generate_random_hex, generate_token_id, generate_token_secret,
    hex_encode,
};
use crate::store::SecurityStore;

/// 密文熵的下限（字节）
pub const MIN_SECRET_LENGTH: usize = 24;

/// Token 金库配置
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// 密文熵的字节数（base64url 编码后更长）
    pub secret_length: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self { secret_length: 32 }
    }
}

impl VaultConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置密文熵的字节数
    pub fn with_secret_length(mut self, length: usize) -> Self {
        self.secret_length = length;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.secret_length < MIN_SECRET_LENGTH {
            return Err(Error::config(
                "secret_length",
                format!("must be at least {} bytes", MIN_SECRET_LENGTH),
            ));
        }
        Ok(())
    }
}

/// 签发结果
///
/// `secret` 是唯一一次拿到密文的机会，之后只能重新签发。
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// 原始密文（交付给邮件等投递渠道）
    pub secret: String,

    /// 对应的存储标识
    pub token_id: String,

    /// 签发时间
    pub issued_at: DateTime<Utc>,

    /// 过期时间，None 表示永不过期
    pub expires_at: Option<DateTime<Utc>>,
}

/// 安全 Token 金库
#[derive(Clone)]
pub struct TokenVault {
    store: Arc<dyn SecurityStore>,
    clock: Arc<dyn Clock>,
    config: VaultConfig,
}

impl TokenVault {
    /// 创建金库
    pub fn new(
        store: Arc<dyn SecurityStore>,
        clock: Arc<dyn Clock>,
        config: VaultConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            config,
        })
    }

    /// 获取配置引用
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// 为账户签发指定用途的 token
    ///
    /// 会取代该 (账户, 用途) 下已有的 token：旧密文从此无法兑换。
    /// `ttl` 为 None 时 token 永不过期。
    pub fn issue(
        &self,
        account_id: &str,
        purpose: TokenPurpose,
        ttl: Option<Duration>,
    ) -> Result<IssuedToken> {
        let now = self.clock.now();
        let secret = generate_token_secret(self.config.secret_length)?;
        let salt = generate_random_hex(16)?;
        let hash = hash_secret(&salt, &secret)?;
        let token_id = generate_token_id()?;
        let expires_at = ttl.map(|d| now + d);

        let token = SecurityToken {
            token_id: token_id.clone(),
            account_id: account_id.to_string(),
            purpose,
            secret_salt: salt,
            secret_hash: hash,
            issued_at: now,
            expires_at,
            consumed: false,
            consumed_at: None,
        };
        self.store.put_token(&token)?;

        Ok(IssuedToken {
            secret,
            token_id,
            issued_at: now,
            expires_at,
        })
    }

    /// 兑换单次使用的 token
    ///
    /// 成功后该 token 被标记消费，同一密文不能再次兑换。
    ///
    /// # Errors
    ///
    /// - `TokenError::NotFound` - 不存在或密文不匹配（同一路径，fail closed）
    /// - `TokenError::AlreadyConsumed` - 已兑换过（含并发兑换中落败的一方）
    /// - `TokenError::Expired` - 已过期
    pub fn redeem(
        &self,
        account_id: &str,
        purpose: TokenPurpose,
        presented: &str,
    ) -> Result<SecurityToken> {
        let now = self.clock.now();
        let token = self.lookup_matching(account_id, purpose, presented)?;

        if token.consumed {
            return Err(Error::Token(TokenError::AlreadyConsumed));
        }
        if token.is_expired(now) {
            return Err(Error::Token(TokenError::Expired));
        }

        // 存储层的条件更新：并发兑换只有一个能走到这里并成功
        if !self.store.consume_token(&token.token_id, now)? {
            return Err(Error::Token(TokenError::AlreadyConsumed));
        }

        Ok(token)
    }

    /// 只验证、不消费的路径（记住我 token 在有效期内可多次验证）
    pub fn verify(
        &self,
        account_id: &str,
        purpose: TokenPurpose,
        presented: &str,
    ) -> Result<SecurityToken> {
        let now = self.clock.now();
        let token = self.lookup_matching(account_id, purpose, presented)?;

        if token.consumed {
            return Err(Error::Token(TokenError::AlreadyConsumed));
        }
        if token.is_expired(now) {
            return Err(Error::Token(TokenError::Expired));
        }
        Ok(token)
    }

    /// 立即撤销该 (账户, 用途) 下的全部 token
    pub fn revoke(&self, account_id: &str, purpose: TokenPurpose) -> Result<usize> {
        self.store.remove_tokens(account_id, purpose)
    }

    /// 查找当前 token 并做常量时间哈希匹配
    fn lookup_matching(
        &self,
        account_id: &str,
        purpose: TokenPurpose,
        presented: &str,
    ) -> Result<SecurityToken> {
        let token = self
            .store
            .latest_token(account_id, purpose)?
            .ok_or(Error::Token(TokenError::NotFound))?;

        let candidate = hash_secret(&token.secret_salt, presented)?;
        if !constant_time_compare_str(&candidate, &token.secret_hash) {
            return Err(Error::Token(TokenError::NotFound));
        }
        Ok(token)
    }
}

/// 计算密文的加盐哈希：HMAC-SHA256，盐值作密钥，结果十六进制编码
fn hash_secret(salt: &str, secret: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(salt.as_bytes())
        .map_err(|e| Error::Crypto(CryptoError::EncodingFailed(e.to_string())))?;
    mac.update(secret.as_bytes());
    Ok(hex_encode(&mac.finalize().into_bytes()))
}
