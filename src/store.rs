//! 存储抽象模块
//!
//! 定义 [`SecurityStore`] trait 和内存实现 [`InMemorySecurityStore`]。
//!
//! 存储层必须保证两类原子性：
//!
//! - `update_account`: 闭包在写锁（等价于数据库的行级锁）内执行，
//!   针对同一账户的"读-改-写"不会交错。失败计数与阈值判断依赖这一点。
//! - `consume_token`: 对 `consumed` 标志的条件更新（compare-and-swap），
//!   两个并发兑换最多只有一个成功。
//!
//! 生产环境可以基于事务型数据库实现此 trait；内存实现用于单实例部署与测试。

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::account::{Account, SecurityToken, TokenPurpose};
use crate::error::{Error, Result, StorageError};

/// 账户的原子更新闭包
///
/// 在存储层的写锁内执行，只允许修改传入的账户记录，
/// 不得回调存储层（会死锁）。
pub type AccountUpdate<'a> = &'a mut dyn FnMut(&mut Account);

/// 账户与安全 Token 的统一存储接口
pub trait SecurityStore: Send + Sync {
    // ------------------------------------------------------------------
    // 账户
    // ------------------------------------------------------------------

    /// 插入新账户；id 或邮箱已存在时返回 `AlreadyExists`
    fn insert_account(&self, account: &Account) -> Result<()>;

    /// 按 id 查找账户
    fn find_account(&self, account_id: &str) -> Result<Option<Account>>;

    /// 按邮箱查找账户
    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// 原子更新账户，返回更新后的快照；账户不存在时返回 `NotFound`
    fn update_account(&self, account_id: &str, apply: AccountUpdate<'_>) -> Result<Account>;

    /// 删除账户
    fn delete_account(&self, account_id: &str) -> Result<()>;

    // ------------------------------------------------------------------
    // 安全 Token
    // ------------------------------------------------------------------

    /// 保存 token 并使其成为该 (账户, 用途) 下的当前 token
    ///
    /// 被取代的旧 token 必须在同一原子操作内标记消费：已经完成查找、
    /// 正要消费旧 token 的并发兑换会在 `consume_token` 处失败关闭。
    /// 旧 token 保留在历史中（审计用），`latest_token` 只会返回新的。
    fn put_token(&self, token: &SecurityToken) -> Result<()>;

    /// 返回该 (账户, 用途) 下最近签发的 token（含已消费的）
    fn latest_token(&self, account_id: &str, purpose: TokenPurpose)
    -> Result<Option<SecurityToken>>;

    /// 按 token_id 条件标记消费：未消费则标记并返回 `true`；
    /// 已消费返回 `false`；不存在返回 `NotFound`
    fn consume_token(&self, token_id: &str, at: DateTime<Utc>) -> Result<bool>;

    /// 删除该 (账户, 用途) 下的全部 token，返回删除数量
    fn remove_tokens(&self, account_id: &str, purpose: TokenPurpose) -> Result<usize>;
}

// ============================================================================
// 内存实现
// ============================================================================

/// 内存存储实现
///
/// 适用于单实例部署或测试环境。写锁天然提供按账户的串行化。
#[derive(Debug, Default)]
pub struct InMemorySecurityStore {
    accounts: RwLock<HashMap<String, Account>>,
    email_index: RwLock<HashMap<String, String>>, // email -> account_id
    tokens: RwLock<HashMap<String, SecurityToken>>, // token_id -> token
    latest_index: RwLock<HashMap<(String, TokenPurpose), String>>, // (account, purpose) -> token_id
}

impl InMemorySecurityStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存储的账户数量
    pub fn account_count(&self) -> usize {
        self.accounts.read().map(|a| a.len()).unwrap_or(0)
    }

    /// 当前存储的 token 总数（含历史）
    pub fn token_count(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or(0)
    }
}

fn poisoned(_: impl std::fmt::Debug) -> Error {
    Error::Storage(StorageError::Unavailable("lock poisoned".into()))
}

impl SecurityStore for InMemorySecurityStore {
    fn insert_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        let mut emails = self.email_index.write().map_err(poisoned)?;

        if accounts.contains_key(&account.id) {
            return Err(Error::Storage(StorageError::AlreadyExists(
                account.id.clone(),
            )));
        }
        if emails.contains_key(&account.email) {
            return Err(Error::Storage(StorageError::AlreadyExists(
                account.email.clone(),
            )));
        }

        emails.insert(account.email.clone(), account.id.clone());
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn find_account(&self, account_id: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().map_err(poisoned)?;
        Ok(accounts.get(account_id).cloned())
    }

    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let emails = self.email_index.read().map_err(poisoned)?;
        match emails.get(email) {
            Some(id) => {
                let accounts = self.accounts.read().map_err(poisoned)?;
                Ok(accounts.get(id).cloned())
            }
            None => Ok(None),
        }
    }

    fn update_account(&self, account_id: &str, apply: AccountUpdate<'_>) -> Result<Account> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| Error::Storage(StorageError::NotFound(account_id.to_string())))?;
        apply(account);
        Ok(account.clone())
    }

    fn delete_account(&self, account_id: &str) -> Result<()> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        let mut emails = self.email_index.write().map_err(poisoned)?;

        let account = accounts
            .remove(account_id)
            .ok_or_else(|| Error::Storage(StorageError::NotFound(account_id.to_string())))?;
        emails.remove(&account.email);
        Ok(())
    }

    fn put_token(&self, token: &SecurityToken) -> Result<()> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let mut latest = self.latest_index.write().map_err(poisoned)?;

        // 在持有 tokens 写锁时标记被取代的 token：与 `consume_token`
        // 争同一把锁，读到旧快照的在途兑换随后 CAS 必然失败
        if let Some(prior_id) = latest.get(&(token.account_id.clone(), token.purpose))
            && let Some(prior) = tokens.get_mut(prior_id)
            && !prior.consumed
        {
            prior.consumed = true;
            prior.consumed_at = Some(token.issued_at);
        }

        tokens.insert(token.token_id.clone(), token.clone());
        latest.insert(
            (token.account_id.clone(), token.purpose),
            token.token_id.clone(),
        );
        Ok(())
    }

    fn latest_token(
        &self,
        account_id: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<SecurityToken>> {
        let latest = self.latest_index.read().map_err(poisoned)?;
        match latest.get(&(account_id.to_string(), purpose)) {
            Some(token_id) => {
                let tokens = self.tokens.read().map_err(poisoned)?;
                Ok(tokens.get(token_id).cloned())
            }
            None => Ok(None),
        }
    }

    fn consume_token(&self, token_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let token = tokens
            .get_mut(token_id)
            .ok_or_else(|| Error::Storage(StorageError::NotFound(token_id.to_string())))?;

        if token.consumed {
            return Ok(false);
        }
        token.consumed = true;
        token.consumed_at = Some(at);
        Ok(true)
    }

    fn remove_tokens(&self, account_id: &str, purpose: TokenPurpose) -> Result<usize> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let mut latest = self.latest_index.write().map_err(poisoned)?;

        let before = tokens.len();
        tokens.retain(|_, t| !(t.account_id == account_id && t.purpose == purpose));
        latest.remove(&(account_id.to_string(), purpose));
        Ok(before - tokens.len())
    }
}
