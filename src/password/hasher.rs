//! 密码哈希实现
//!
//! 基于 Argon2id 的慢速加盐单向哈希，成本参数可配置。

use argon2::{Argon2, Params, Version};
use password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};

use crate::error::{Error, PasswordHashError, Result};

/// 密码哈希器
///
/// 成本参数在构造时固定；历史哈希用 [`PasswordHasher::verify`] 验证时
/// 按哈希串内嵌的参数解析，与当前配置无关。
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    /// 内存成本（KiB）
    memory_kib: u32,

    /// 迭代次数
    iterations: u32,

    /// 并行度
    parallelism: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        // Argon2 crate 的默认参数：19 MiB、2 轮、单线程
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordHasher {
    /// 使用默认成本参数创建哈希器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置内存成本（KiB）
    pub fn with_memory_kib(mut self, memory_kib: u32) -> Self {
        self.memory_kib = memory_kib;
        self
    }

    /// 设置迭代次数
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// 设置并行度
    pub fn with_parallelism(mut self, parallelism: u32) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// 低成本配置（仅用于测试环境，加快测试速度）
    pub fn fast_insecure() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| {
                Error::PasswordHash(PasswordHashError::HashFailed(format!(
                    "invalid Argon2 params: {}",
                    e
                )))
            })?;
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            params,
        ))
    }

    /// 哈希密码
    ///
    /// # Example
    ///
    /// ```rust
    /// use guardrs::password::PasswordHasher;
    ///
    /// let hasher = PasswordHasher::fast_insecure();
    /// let hash = hasher.hash("my_password").unwrap();
    /// assert!(hash.starts_with("$argon2id"));
    /// ```
    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::fill(&mut salt_bytes).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "failed to generate random salt: {}",
                e
            )))
        })?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "failed to encode salt: {}",
                e
            )))
        })?;

        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| {
                Error::PasswordHash(PasswordHashError::HashFailed(format!(
                    "Argon2 hash failed: {}",
                    e
                )))
            })
    }

    /// 验证密码
    ///
    /// 密码正确返回 `Ok(true)`，错误返回 `Ok(false)`；
    /// 明文和哈希都不会出现在任何错误信息里。
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            Error::PasswordHash(PasswordHashError::InvalidFormat(format!(
                "invalid Argon2 hash: {}",
                e
            )))
        })?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// 检查哈希是否需要按当前成本参数重新生成
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => return true,
        };
        if parsed.algorithm.as_str() != "argon2id" {
            return true;
        }
        let params = match Params::try_from(&parsed) {
            Ok(params) => params,
            Err(_) => return true,
        };
        params.m_cost() < self.memory_kib
            || params.t_cost() < self.iterations
            || params.p_cost() < self.parallelism
    }
}
