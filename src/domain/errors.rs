use thiserror::Error;

/// 领域层错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 支付请求字段不合法（金额为负、订单号为空等）
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),

    /// 未加载商户密钥
    #[error("Merchant secret key is not configured")]
    MissingSecret,

    /// 网关回调缺少签名字段
    #[error("Malformed gateway payload: {0}")]
    MalformedPayload(String),

    /// 交易记录未找到
    #[error("Payment attempt not found: {0}")]
    AttemptNotFound(String),

    /// 交易状态错误
    #[error("Invalid payment state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// 数据库错误
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// 加密错误
    #[error("Cryptography error: {0}")]
    CryptoError(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secret_does_not_echo_anything() {
        let err = DomainError::MissingSecret;
        assert_eq!(err.to_string(), "Merchant secret key is not configured");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = DomainError::InvalidState {
            expected: "pending".to_string(),
            actual: "succeeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid payment state: expected pending, got succeeded"
        );
    }
}
