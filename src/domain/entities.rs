use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Money, PaymentState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 发往网关的支付请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// 商户订单号（vnp_TxnRef）
    pub order_reference: String,

    /// 金额（已乘100）
    pub amount_minor_units: i64,

    /// 订单描述
    pub order_description: String,

    /// 订单类型
    pub order_type: String,

    /// 币种
    pub currency_code: String,

    /// 语言
    pub locale_code: String,

    /// 银行代码，未选择时不发送
    pub bank_code: Option<String>,

    /// 客户端IP
    pub client_ip_address: String,

    /// 创建时间（YYYYMMDDHHmmss）
    pub created_at: String,

    /// 过期时间（YYYYMMDDHHmmss）
    pub expire_at: String,

    /// 回跳地址
    pub return_url: String,

    /// 商户号（vnp_TmnCode）
    pub merchant_code: String,
}

impl PaymentRequest {
    pub const CURRENCY_VND: &'static str = "VND";
    pub const DEFAULT_LOCALE: &'static str = "vn";
    pub const DEFAULT_ORDER_TYPE: &'static str = "other";

    /// 校验结构性字段
    pub fn validate(&self) -> DomainResult<()> {
        if self.amount_minor_units < 0 {
            return Err(DomainError::InvalidRequest(
                "amount must not be negative".to_string(),
            ));
        }

        let required = [
            ("order reference", &self.order_reference),
            ("client IP address", &self.client_ip_address),
            ("return URL", &self.return_url),
            ("merchant code", &self.merchant_code),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidRequest(format!("{} must not be empty", name)));
            }
        }

        Ok(())
    }

    /// 空字符串视为未选择银行
    pub fn effective_bank_code(&self) -> Option<&str> {
        self.bank_code.as_deref().filter(|code| !code.is_empty())
    }

    pub fn effective_locale(&self) -> &str {
        if self.locale_code.is_empty() {
            Self::DEFAULT_LOCALE
        } else {
            &self.locale_code
        }
    }
}

/// 一次结账尝试的记录，供IPN对账使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub id: Uuid,

    /// 商户订单号
    pub txn_ref: String,

    /// 网关交易号（IPN返回）
    pub transaction_no: Option<String>,

    pub amount: Money,

    pub state: PaymentState,

    pub order_info: String,

    pub bank_code: Option<String>,

    pub client_ip: String,

    /// 网关响应码
    pub response_code: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentAttempt {
    /// 根据已校验的支付请求创建记录
    pub fn from_request(request: &PaymentRequest) -> DomainResult<Self> {
        request.validate()?;

        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            txn_ref: request.order_reference.clone(),
            transaction_no: None,
            amount: Money::from_minor_units(request.amount_minor_units),
            state: PaymentState::Pending,
            order_info: request.order_description.clone(),
            bank_code: request.effective_bank_code().map(str::to_string),
            client_ip: request.client_ip_address.clone(),
            response_code: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        })
    }

    /// 标记为支付成功
    pub fn mark_as_succeeded(
        &mut self,
        transaction_no: Option<String>,
        response_code: String,
    ) -> DomainResult<()> {
        self.ensure_pending()?;

        let now = Utc::now();
        self.state = PaymentState::Succeeded;
        self.transaction_no = transaction_no;
        self.response_code = Some(response_code);
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// 标记为支付失败
    pub fn mark_as_failed(
        &mut self,
        transaction_no: Option<String>,
        response_code: String,
    ) -> DomainResult<()> {
        self.ensure_pending()?;

        self.state = PaymentState::Failed;
        self.transaction_no = transaction_no;
        self.response_code = Some(response_code);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.state == PaymentState::Pending
    }

    fn ensure_pending(&self) -> DomainResult<()> {
        if !self.is_pending() {
            return Err(DomainError::InvalidState {
                expected: PaymentState::Pending.to_string(),
                actual: self.state.to_string(),
            });
        }
        Ok(())
    }
}
