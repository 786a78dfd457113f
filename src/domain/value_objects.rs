use crate::domain::errors::{DomainError, DomainResult};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// 交易状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// 已跳转网关，等待IPN
    Pending,
    /// 支付成功
    Succeeded,
    /// 支付失败
    Failed,
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentState::Pending => write!(f, "pending"),
            PaymentState::Succeeded => write!(f, "succeeded"),
            PaymentState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentState::Pending),
            "succeeded" => Ok(PaymentState::Succeeded),
            "failed" => Ok(PaymentState::Failed),
            other => Err(DomainError::InvalidState {
                expected: "pending, succeeded or failed".to_string(),
                actual: other.to_string(),
            }),
        }
    }
}

/// 网关金额（VND × 100，整数，避免浮点数精度问题）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// 金额（最小单位 × 100）
    pub amount_minor_units: i64,
}

impl Money {
    /// 网关要求的倍数
    pub const SCALE: i64 = 100;

    /// 创建新的金额对象（已乘100）
    pub fn from_minor_units(amount_minor_units: i64) -> Self {
        Self { amount_minor_units }
    }

    /// 从结账请求中的小数金额换算，四舍五入到整数
    pub fn from_major_decimal(amount: f64) -> DomainResult<Self> {
        if !amount.is_finite() {
            return Err(DomainError::InvalidRequest(
                "amount must be a finite number".to_string(),
            ));
        }
        if amount < 0.0 {
            return Err(DomainError::InvalidRequest(
                "amount must not be negative".to_string(),
            ));
        }

        let scaled = (amount * Self::SCALE as f64).round();
        if scaled > i64::MAX as f64 {
            return Err(DomainError::InvalidRequest("amount is too large".to_string()));
        }

        Ok(Self {
            amount_minor_units: scaled as i64,
        })
    }

    /// 转换为VND
    pub fn to_vnd(&self) -> f64 {
        self.amount_minor_units as f64 / Self::SCALE as f64
    }

    pub fn to_minor_units(&self) -> i64 {
        self.amount_minor_units
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} VND", self.to_vnd())
    }
}

/// `encodeURIComponent` 保留的字符：字母数字与 `- _ . ! ~ * ' ( )`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// 参数值序列化方式
///
/// `Raw` 直接拼接原值；`Percent` 按 `encodeURIComponent` 的字符集编码并把 `%20` 写作 `+`，
/// 与网关回调验签时的做法一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationMode {
    #[default]
    Raw,
    Percent,
}

impl SerializationMode {
    pub fn encode<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            SerializationMode::Raw => Cow::Borrowed(value),
            SerializationMode::Percent => {
                let encoded: Cow<'a, str> = utf8_percent_encode(value, URI_COMPONENT).into();
                if encoded.contains("%20") {
                    Cow::Owned(encoded.replace("%20", "+"))
                } else {
                    encoded
                }
            }
        }
    }
}

impl fmt::Display for SerializationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationMode::Raw => write!(f, "raw"),
            SerializationMode::Percent => write!(f, "percent"),
        }
    }
}

impl FromStr for SerializationMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "false" => Ok(SerializationMode::Raw),
            "percent" | "true" => Ok(SerializationMode::Percent),
            other => Err(DomainError::ConfigurationError(format!(
                "unknown serialization mode: {}",
                other
            ))),
        }
    }
}
