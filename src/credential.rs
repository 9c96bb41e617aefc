//! 凭证存储模块
//!
//! 负责账户密码的设置与验证，独立于其他所有模块：
//!
//! - [`CredentialStore::set_password`]: 先过策略（弱密码拒绝），
//!   再做 Argon2id 慢哈希，最后原子写入账户记录。
//! - [`CredentialStore::verify`]: 按存储的 PHC 哈希验证明文；
//!   明文和哈希不会出现在返回值或任何日志里。

use std::sync::Arc;

use crate::account::Account;
use crate::error::Result;
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::store::SecurityStore;

/// 凭证存储
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SecurityStore>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
}

impl CredentialStore {
    /// 创建凭证存储
    pub fn new(store: Arc<dyn SecurityStore>, hasher: PasswordHasher, policy: PasswordPolicy) -> Self {
        Self {
            store,
            hasher,
            policy,
        }
    }

    /// 获取当前密码策略
    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// 获取当前哈希参数
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// 只校验策略，不改动任何状态
    pub fn check_policy(&self, plaintext: &str) -> Result<()> {
        self.policy.validate(plaintext)
    }

    /// 设置账户密码
    ///
    /// # Errors
    ///
    /// - `ValidationError::PasswordTooShort` / `PasswordTooWeak` 等策略错误
    /// - `StorageError::NotFound` - 账户不存在
    pub fn set_password(&self, account_id: &str, plaintext: &str) -> Result<()> {
        self.policy.validate(plaintext)?;
        let hash = self.hasher.hash(plaintext)?;

        self.store.update_account(account_id, &mut |account| {
            account.password_hash = Some(hash.clone());
        })?;
        Ok(())
    }

    /// 验证账户密码
    ///
    /// 账户没有密码时返回 `Ok(false)`（fail closed）。
    pub fn verify(&self, account_id: &str, plaintext: &str) -> Result<bool> {
        let account = match self.store.find_account(account_id)? {
            Some(account) => account,
            None => return Ok(false),
        };
        self.verify_against(&account, plaintext)
    }

    /// 用已加载的账户快照验证（认证流水线复用，省一次查询）
    pub(crate) fn verify_against(&self, account: &Account, plaintext: &str) -> Result<bool> {
        match &account.password_hash {
            Some(hash) => self.hasher.verify(plaintext, hash),
            None => Ok(false),
        }
    }

    /// 已存储的哈希是否需要按当前成本参数重新生成
    pub fn needs_rehash(&self, account_id: &str) -> Result<bool> {
        let account = self.store.find_account(account_id)?;
        Ok(match account.and_then(|a| a.password_hash) {
            Some(hash) => self.hasher.needs_rehash(&hash),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ValidationError};
    use crate::store::InMemorySecurityStore;
    use chrono::Utc;

    fn setup() -> (Arc<InMemorySecurityStore>, CredentialStore) {
        let store = Arc::new(InMemorySecurityStore::new());
        store
            .insert_account(&Account::new("acct-1", "a@example.com", Utc::now()))
            .unwrap();
        let credentials = CredentialStore::new(
            store.clone(),
            PasswordHasher::fast_insecure(),
            PasswordPolicy::default(),
        );
        (store, credentials)
    }

    #[test]
    fn test_set_and_verify() {
        let (_, credentials) = setup();

        credentials.set_password("acct-1", "Str0ng_password").unwrap();
        assert!(credentials.verify("acct-1", "Str0ng_password").unwrap());
        assert!(!credentials.verify("acct-1", "wrong_password1").unwrap());
    }

    #[test]
    fn test_weak_password_rejected_without_mutation() {
        let (store, credentials) = setup();

        let err = credentials.set_password("acct-1", "weak").unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::PasswordTooShort { .. })
        ));

        // 账户未被改动
        let account = store.find_account("acct-1").unwrap().unwrap();
        assert!(account.password_hash.is_none());
    }

    #[test]
    fn test_verify_without_password_fails_closed() {
        let (_, credentials) = setup();
        assert!(!credentials.verify("acct-1", "anything1").unwrap());
    }

    #[test]
    fn test_verify_unknown_account_fails_closed() {
        let (_, credentials) = setup();
        assert!(!credentials.verify("missing", "anything1").unwrap());
    }

    #[test]
    fn test_hash_never_exposed() {
        let (store, credentials) = setup();
        credentials.set_password("acct-1", "Str0ng_password").unwrap();

        let stored = store
            .find_account("acct-1")
            .unwrap()
            .unwrap()
            .password_hash
            .unwrap();
        // 存的是 PHC 字符串，不含明文
        assert!(stored.starts_with("$argon2id"));
        assert!(!stored.contains("Str0ng_password"));
    }

    #[test]
    fn test_needs_rehash() {
        let store = Arc::new(InMemorySecurityStore::new());
        store
            .insert_account(&Account::new("acct-1", "a@example.com", Utc::now()))
            .unwrap();
        let low_cost = CredentialStore::new(
            store.clone(),
            PasswordHasher::fast_insecure(),
            PasswordPolicy::default(),
        );
        low_cost.set_password("acct-1", "Str0ng_password").unwrap();
        assert!(!low_cost.needs_rehash("acct-1").unwrap());

        let high_cost = CredentialStore::new(
            store,
            PasswordHasher::new(),
            PasswordPolicy::default(),
        );
        assert!(high_cost.needs_rehash("acct-1").unwrap());
    }
}
