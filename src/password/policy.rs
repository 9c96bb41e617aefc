//! 密码策略
//!
//! 设置密码前的强度校验：长度上下限、字符种类、最少不同字符数。
//! 不满足策略的密码以 `ValidationError` 的具体变体返回，
//! 调用方可以据此给出准确的提示。

use std::collections::HashSet;

use crate::error::{Error, Result, ValidationError};

/// 密码策略
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// 最小长度
    pub min_length: usize,

    /// 最大长度（防止超长输入拖慢慢哈希）
    pub max_length: usize,

    /// 是否要求同时包含字母和数字
    pub require_letter_and_digit: bool,

    /// 最少不同字符数（0 表示不限制）
    pub min_distinct_chars: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_letter_and_digit: true,
            min_distinct_chars: 4,
        }
    }
}

impl PasswordPolicy {
    /// 创建默认策略
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最小长度
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// 设置最大长度
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// 设置是否要求字母加数字
    pub fn with_letter_and_digit(mut self, required: bool) -> Self {
        self.require_letter_and_digit = required;
        self
    }

    /// 设置最少不同字符数
    pub fn with_min_distinct_chars(mut self, min: usize) -> Self {
        self.min_distinct_chars = min;
        self
    }

    /// 严格策略
    pub fn strict() -> Self {
        Self {
            min_length: 12,
            max_length: 128,
            require_letter_and_digit: true,
            min_distinct_chars: 8,
        }
    }

    /// 宽松策略（适用于开发环境）
    pub fn relaxed() -> Self {
        Self {
            min_length: 6,
            max_length: 256,
            require_letter_and_digit: false,
            min_distinct_chars: 0,
        }
    }

    /// 校验密码，不满足策略时返回具体的验证错误
    ///
    /// # Example
    ///
    /// ```rust
    /// use guardrs::password::PasswordPolicy;
    ///
    /// let policy = PasswordPolicy::default();
    /// assert!(policy.validate("short1").is_err());
    /// assert!(policy.validate("long_enough_42").is_ok());
    /// ```
    pub fn validate(&self, password: &str) -> Result<()> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(Error::Validation(ValidationError::PasswordTooShort {
                min_length: self.min_length,
                actual: length,
            }));
        }
        if length > self.max_length {
            return Err(Error::Validation(ValidationError::PasswordTooLong {
                max_length: self.max_length,
                actual: length,
            }));
        }

        if self.require_letter_and_digit {
            let has_letter = password.chars().any(|c| c.is_alphabetic());
            let has_digit = password.chars().any(|c| c.is_ascii_digit());
            if !has_letter || !has_digit {
                return Err(Error::Validation(ValidationError::PasswordTooWeak(
                    "must contain both letters and digits".to_string(),
                )));
            }
        }

        if self.min_distinct_chars > 0 {
            let distinct: HashSet<char> = password.chars().collect();
            if distinct.len() < self.min_distinct_chars {
                return Err(Error::Validation(ValidationError::PasswordTooWeak(
                    format!("must use at least {} distinct characters", self.min_distinct_chars),
                )));
            }
        }

        Ok(())
    }
}
