//! VNPay 请求签名与回调验签
//!
//! 签名串由按键名字节序升序排列的 `key=value` 以 `&` 连接而成，
//! `vnp_SecureHash` 与 `vnp_SecureHashType` 永远不参与签名。
//! 摘要为 HMAC-SHA512，小写十六进制。

use crate::domain::entities::PaymentRequest;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::SerializationMode;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha512;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

type HmacSha512 = Hmac<Sha512>;

pub const API_VERSION: &str = "2.1.0";
pub const COMMAND_PAY: &str = "pay";

pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";

/// 参与签名的参数集合，始终按键名字节序升序迭代
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalParameterSet {
    params: BTreeMap<String, String>,
}

/// 网关回跳/IPN 携带的参数
pub type PaymentReturnPayload = CanonicalParameterSet;

impl CanonicalParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由支付请求组装参数，未选择银行时不包含 `vnp_BankCode`
    pub fn from_request(request: &PaymentRequest) -> Self {
        let mut set = Self::new();
        set.insert("vnp_Version", API_VERSION);
        set.insert("vnp_Command", COMMAND_PAY);
        set.insert("vnp_TmnCode", &request.merchant_code);
        set.insert("vnp_Amount", request.amount_minor_units.to_string());
        set.insert("vnp_CurrCode", &request.currency_code);
        set.insert("vnp_TxnRef", &request.order_reference);
        set.insert("vnp_OrderInfo", &request.order_description);
        set.insert("vnp_OrderType", &request.order_type);
        set.insert("vnp_ReturnUrl", &request.return_url);
        set.insert("vnp_IpAddr", &request.client_ip_address);
        set.insert("vnp_CreateDate", &request.created_at);
        set.insert("vnp_ExpireDate", &request.expire_at);
        set.insert("vnp_Locale", request.effective_locale());
        if let Some(bank_code) = request.effective_bank_code() {
            set.insert("vnp_BankCode", bank_code);
        }
        set
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.params.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 生成签名串；签名字段本身被跳过
    pub fn serialize(&self, mode: SerializationMode) -> String {
        self.params
            .iter()
            .filter(|(key, _)| !is_hash_field(key))
            .map(|(key, value)| format!("{}={}", mode.encode(key), mode.encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CanonicalParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn is_hash_field(key: &str) -> bool {
    key == SECURE_HASH_FIELD || key == SECURE_HASH_TYPE_FIELD
}

/// 商户密钥，Debug 输出不包含内容
#[derive(Clone)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

/// 签名后的跳转地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPaymentUrl {
    sign_data: String,
    secure_hash: String,
    url: String,
}

impl SignedPaymentUrl {
    /// 参与HMAC的签名串
    pub fn sign_data(&self) -> &str {
        &self.sign_data
    }

    pub fn secure_hash(&self) -> &str {
        &self.secure_hash
    }

    #[cfg(test)]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 地址能否放进 `Location` 头：HTTP 字段值不允许除制表符外的控制字符
    pub fn is_redirectable(&self) -> bool {
        !self
            .url
            .bytes()
            .any(|b| (b < 0x20 && b != b'\t') || b == 0x7f)
    }

    pub fn into_url(self) -> String {
        self.url
    }
}

/// 验签结果，不存在中间状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// 签名一致，携带去除签名字段后的参数
    Authentic(PaymentReturnPayload),
    Inauthentic,
}

impl VerificationResult {
    #[cfg(test)]
    pub fn is_authentic(&self) -> bool {
        matches!(self, VerificationResult::Authentic(_))
    }
}

/// 计算参数集合的 HMAC-SHA512（小写十六进制）
pub fn compute_secure_hash(
    params: &CanonicalParameterSet,
    mode: SerializationMode,
    secret: &SecretKey,
) -> DomainResult<String> {
    let mac = keyed_mac(secret, &params.serialize(mode))?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn keyed_mac(secret: &SecretKey, sign_data: &str) -> DomainResult<HmacSha512> {
    if secret.is_empty() {
        return Err(DomainError::MissingSecret);
    }

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| DomainError::CryptoError(format!("HMAC init error: {}", e)))?;
    mac.update(sign_data.as_bytes());
    Ok(mac)
}

/// VNPay 签名协议
///
/// 只持有非敏感配置；密钥在每次调用时传入。
#[derive(Debug, Clone)]
pub struct PaymentSignatureProtocol {
    gateway_url: String,
    sign_mode: SerializationMode,
    verify_mode: SerializationMode,
}

impl PaymentSignatureProtocol {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            sign_mode: SerializationMode::Raw,
            verify_mode: SerializationMode::Raw,
        }
    }

    pub fn with_modes(
        mut self,
        sign_mode: SerializationMode,
        verify_mode: SerializationMode,
    ) -> Self {
        self.sign_mode = sign_mode;
        self.verify_mode = verify_mode;
        self
    }

    /// 生成带签名的跳转地址
    pub fn build_signed_payment_request(
        &self,
        request: &PaymentRequest,
        secret: &SecretKey,
    ) -> DomainResult<SignedPaymentUrl> {
        request.validate()?;

        let params = CanonicalParameterSet::from_request(request);
        let sign_data = params.serialize(self.sign_mode);
        let secure_hash = hex::encode(keyed_mac(secret, &sign_data)?.finalize().into_bytes());

        let url = format!(
            "{}?{}&{}={}",
            self.gateway_url, sign_data, SECURE_HASH_FIELD, secure_hash
        );

        debug!("Signed payment request for order: {}", request.order_reference);

        Ok(SignedPaymentUrl {
            sign_data,
            secure_hash,
            url,
        })
    }

    /// 校验网关回传参数
    ///
    /// 缺少 `vnp_SecureHash` 时返回 [`DomainError::MalformedPayload`]；
    /// 签名不一致只是 [`VerificationResult::Inauthentic`]。
    pub fn verify_payment_return(
        &self,
        mut payload: PaymentReturnPayload,
        secret: &SecretKey,
    ) -> DomainResult<VerificationResult> {
        let received = payload.remove(SECURE_HASH_FIELD).ok_or_else(|| {
            DomainError::MalformedPayload(format!("missing {}", SECURE_HASH_FIELD))
        })?;
        payload.remove(SECURE_HASH_TYPE_FIELD);

        let mac = keyed_mac(secret, &payload.serialize(self.verify_mode))?;

        let received = match hex::decode(received.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(VerificationResult::Inauthentic),
        };

        match mac.verify_slice(&received) {
            Ok(()) => Ok(VerificationResult::Authentic(payload)),
            Err(_) => Ok(VerificationResult::Inauthentic),
        }
    }
}
