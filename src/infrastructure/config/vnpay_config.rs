use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{SecretKey, SerializationMode};
use chrono::FixedOffset;
use std::sync::Arc;

pub const DEFAULT_PAYMENT_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

/// VNPay 配置
#[derive(Debug, Clone)]
pub struct VnPayConfig {
    /// 商户号（vnp_TmnCode）
    pub tmn_code: String,

    /// 签名密钥
    pub hash_secret: SecretKey,

    /// 网关支付地址
    pub payment_url: String,

    /// 支付完成后的回跳地址
    pub return_url: String,

    /// 时间戳所用时区，默认 UTC+7
    pub utc_offset: FixedOffset,

    /// 订单有效期（分钟）
    pub expire_minutes: i64,

    /// 生成支付地址时的参数编码方式
    pub sign_encoding: SerializationMode,

    /// 验签时的参数编码方式，网关按编码后的值签名回调，默认 `Percent`
    pub verify_encoding: SerializationMode,

    /// 默认语言
    pub default_locale: String,
}

impl VnPayConfig {
    pub fn from_env() -> DomainResult<Arc<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok()).map(Arc::new)
    }

    /// 从任意键值来源读取配置
    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| DomainError::ConfigurationError(format!("{} must be set", key)))
        };

        let hash_secret = lookup("VNPAY_SECRET_KEY")
            .filter(|value| !value.is_empty())
            .map(SecretKey::new)
            .ok_or(DomainError::MissingSecret)?;

        let offset_hours: i32 = parse_or(&lookup, "VNPAY_UTC_OFFSET_HOURS", 7)?;
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            DomainError::ConfigurationError(format!(
                "VNPAY_UTC_OFFSET_HOURS out of range: {}",
                offset_hours
            ))
        })?;

        let expire_minutes: i64 = parse_or(&lookup, "VNPAY_EXPIRE_MINUTES", 15)?;
        if !(1..=7 * 24 * 60).contains(&expire_minutes) {
            return Err(DomainError::ConfigurationError(format!(
                "VNPAY_EXPIRE_MINUTES out of range: {}",
                expire_minutes
            )));
        }

        Ok(Self {
            tmn_code: required("VNPAY_TMNCODE")?,
            hash_secret,
            payment_url: lookup("VNPAY_URL")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_URL.to_string()),
            return_url: required("VNPAY_RETURN_URL")?,
            utc_offset,
            expire_minutes,
            sign_encoding: parse_or(&lookup, "VNPAY_SIGN_ENCODING", SerializationMode::Raw)?,
            verify_encoding: parse_or(
                &lookup,
                "VNPAY_VERIFY_ENCODING",
                SerializationMode::Percent,
            )?,
            default_locale: lookup("VNPAY_DEFAULT_LOCALE")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| "vn".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> DomainResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            DomainError::ConfigurationError(format!("{} has an invalid value: {}", key, raw))
        }),
        _ => Ok(default),
    }
}
