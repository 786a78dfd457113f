use crate::domain::CanonicalParameterSet;
use serde::{Deserialize, Serialize};

/// 创建支付请求（结账页提交的表单）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    /// 商户订单号，缺省时自动生成
    pub order_id: Option<String>,

    /// 支付金额（VND，尚未乘100）
    pub amount: f64,

    /// 订单描述
    #[serde(alias = "orderDescription")]
    pub order_info: Option<String>,

    /// 银行代码
    pub bank_code: Option<String>,

    /// 语言
    #[serde(alias = "language")]
    pub locale: Option<String>,

    /// 订单类型
    pub order_type: Option<String>,
}

/// 支付地址响应
#[derive(Debug, Serialize)]
pub struct PaymentUrlResponse {
    pub url: String,

    /// 商户订单号
    pub order_id: String,

    /// 金额（已乘100）
    pub amount: i64,
}

/// 浏览器回跳的响应
#[derive(Debug, Serialize)]
pub struct PaymentReturnResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CanonicalParameterSet>,
}

impl PaymentReturnResponse {
    pub fn successful(data: CanonicalParameterSet) -> Self {
        Self {
            message: "Payment successful".to_string(),
            data: Some(data),
        }
    }

    pub fn invalid() -> Self {
        Self {
            message: "Invalid payment".to_string(),
            data: None,
        }
    }
}

/// IPN 响应，字段名由网关规定
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,

    #[serde(rename = "Message")]
    pub message: String,
}

impl IpnResponse {
    fn new(rsp_code: &str, message: &str) -> Self {
        Self {
            rsp_code: rsp_code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn success() -> Self {
        Self::new("00", "Success")
    }

    pub fn order_not_found() -> Self {
        Self::new("01", "Order not found")
    }

    pub fn already_confirmed() -> Self {
        Self::new("02", "This order has been updated to the payment status")
    }

    pub fn invalid_amount() -> Self {
        Self::new("04", "Amount invalid")
    }

    pub fn checksum_failed() -> Self {
        Self::new("97", "Checksum failed")
    }

    pub fn invalid_request() -> Self {
        Self::new("99", "Invalid request")
    }

    pub fn unknown_error() -> Self {
        Self::new("99", "Unknown error")
    }
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: String, message: String) -> Self {
        Self { error, message }
    }
}
