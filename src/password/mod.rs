//! 密码哈希与策略模块
//!
//! 提供密码的慢速加盐哈希（Argon2id，成本可配置）和设置前的强度校验。
//!
//! ## 示例
//!
//! ```rust
//! use guardrs::password::{PasswordHasher, PasswordPolicy};
//!
//! let policy = PasswordPolicy::default();
//! policy.validate("Str0ng_password").unwrap();
//!
//! let hasher = PasswordHasher::fast_insecure();
//! let hash = hasher.hash("Str0ng_password").unwrap();
//! assert!(hasher.verify("Str0ng_password", &hash).unwrap());
//! assert!(!hasher.verify("wrong", &hash).unwrap());
//! ```

mod hasher;
mod policy;

pub use hasher::PasswordHasher;
pub use policy::PasswordPolicy;
