use crate::domain::errors::DomainResult;
use crate::domain::value_objects::Money;
use crate::domain::{PaymentRequest, PaymentReturnPayload, SignedPaymentUrl, VerificationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 结账时由调用方提供的订单信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOrder {
    /// 商户订单号，缺省时自动生成
    pub order_reference: Option<String>,
    pub amount: Money,
    pub order_description: Option<String>,
    pub order_type: Option<String>,
    pub locale: Option<String>,
    pub bank_code: Option<String>,
    pub client_ip: String,
}

/// 支付网关端口接口
///
/// 签名与验签均为纯计算，因此接口是同步的。
pub trait PaymentGatewayPort: Send + Sync + 'static {
    /// 补全商户配置与时间戳，生成待签名的支付请求
    fn prepare_request(
        &self,
        order: CheckoutOrder,
        now: DateTime<Utc>,
    ) -> DomainResult<PaymentRequest>;

    /// 生成带签名的跳转地址
    fn sign_request(&self, request: &PaymentRequest) -> DomainResult<SignedPaymentUrl>;

    /// 校验网关回传参数
    fn verify_return(&self, payload: PaymentReturnPayload) -> DomainResult<VerificationResult>;
}
