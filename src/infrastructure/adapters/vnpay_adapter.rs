use crate::domain::errors::DomainResult;
use crate::domain::{
    PaymentRequest, PaymentReturnPayload, PaymentSignatureProtocol, SignedPaymentUrl,
    VerificationResult,
};
use crate::infrastructure::config::VnPayConfig;
use crate::ports::payment_gateway_port::{CheckoutOrder, PaymentGatewayPort};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// 网关要求的时间格式
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// VNPay 网关适配器实现
#[derive(Debug, Clone)]
pub struct VnPayAdapter {
    config: Arc<VnPayConfig>,
    protocol: PaymentSignatureProtocol,
}

impl VnPayAdapter {
    pub fn new(config: Arc<VnPayConfig>) -> Self {
        let protocol = PaymentSignatureProtocol::new(config.payment_url.clone())
            .with_modes(config.sign_encoding, config.verify_encoding);

        Self { config, protocol }
    }

    /// 生成商户订单号：日时分秒 + 4位随机数
    fn generate_order_reference(local: &DateTime<FixedOffset>) -> String {
        let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
        format!("{}{:04}", local.format("%d%H%M%S"), suffix)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PaymentGatewayPort for VnPayAdapter {
    fn prepare_request(
        &self,
        order: CheckoutOrder,
        now: DateTime<Utc>,
    ) -> DomainResult<PaymentRequest> {
        let local = now.with_timezone(&self.config.utc_offset);
        let expire = local + Duration::minutes(self.config.expire_minutes);

        let order_reference = non_empty(order.order_reference)
            .unwrap_or_else(|| Self::generate_order_reference(&local));
        let order_description = non_empty(order.order_description)
            .unwrap_or_else(|| format!("Thanh toan don hang :{}", order_reference));

        let request = PaymentRequest {
            order_reference,
            amount_minor_units: order.amount.to_minor_units(),
            order_description,
            order_type: non_empty(order.order_type)
                .unwrap_or_else(|| PaymentRequest::DEFAULT_ORDER_TYPE.to_string()),
            currency_code: PaymentRequest::CURRENCY_VND.to_string(),
            locale_code: non_empty(order.locale)
                .unwrap_or_else(|| self.config.default_locale.clone()),
            bank_code: non_empty(order.bank_code),
            client_ip_address: order.client_ip,
            created_at: local.format(TIMESTAMP_FORMAT).to_string(),
            expire_at: expire.format(TIMESTAMP_FORMAT).to_string(),
            return_url: self.config.return_url.clone(),
            merchant_code: self.config.tmn_code.clone(),
        };

        debug!(
            "Prepared VNPay request {} ({} minor units)",
            request.order_reference, request.amount_minor_units
        );

        Ok(request)
    }

    fn sign_request(&self, request: &PaymentRequest) -> DomainResult<SignedPaymentUrl> {
        self.protocol
            .build_signed_payment_request(request, &self.config.hash_secret)
    }

    fn verify_return(&self, payload: PaymentReturnPayload) -> DomainResult<VerificationResult> {
        self.protocol
            .verify_payment_return(payload, &self.config.hash_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::tests::sample_request;
    use crate::domain::signature::{compute_secure_hash, SECURE_HASH_FIELD};
    use crate::domain::{CanonicalParameterSet, Money, SecretKey, SerializationMode};
    use crate::infrastructure::config::vnpay_config::tests::test_config;
    use chrono::TimeZone;

    fn adapter() -> VnPayAdapter {
        VnPayAdapter::new(Arc::new(test_config()))
    }

    fn checkout() -> CheckoutOrder {
        CheckoutOrder {
            order_reference: Some("OR100123".to_string()),
            amount: Money::from_minor_units(10_000_000),
            order_description: None,
            order_type: None,
            locale: None,
            bank_code: None,
            client_ip: "127.0.0.1".to_string(),
        }
    }

    fn noon_in_hanoi() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap()
    }

    #[test]
    fn test_prepare_request_fills_defaults() {
        let request = adapter().prepare_request(checkout(), noon_in_hanoi()).unwrap();

        assert_eq!(request, sample_request());
    }

    #[test]
    fn test_expire_date_crosses_midnight() {
        let late = Utc.with_ymd_and_hms(2024, 12, 31, 16, 50, 0).unwrap();
        let request = adapter().prepare_request(checkout(), late).unwrap();

        assert_eq!(request.created_at, "20241231235000");
        assert_eq!(request.expire_at, "20250101000500");
    }

    #[test]
    fn test_generated_order_reference() {
        let mut order = checkout();
        order.order_reference = Some("  ".to_string());

        let request = adapter().prepare_request(order, noon_in_hanoi()).unwrap();

        assert_eq!(request.order_reference.len(), 12);
        assert!(request.order_reference.starts_with("01120000"));
        assert!(request.order_reference.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(
            request.order_description,
            format!("Thanh toan don hang :{}", request.order_reference)
        );
    }

    #[test]
    fn test_caller_values_win_over_defaults() {
        let mut order = checkout();
        order.order_description = Some("Áo thun".to_string());
        order.order_type = Some("fashion".to_string());
        order.locale = Some("en".to_string());
        order.bank_code = Some("NCB".to_string());

        let request = adapter().prepare_request(order, noon_in_hanoi()).unwrap();

        assert_eq!(request.order_description, "Áo thun");
        assert_eq!(request.order_type, "fashion");
        assert_eq!(request.locale_code, "en");
        assert_eq!(request.bank_code.as_deref(), Some("NCB"));
    }

    #[test]
    fn test_sign_and_verify_through_adapter() {
        let adapter = adapter();
        let request = adapter.prepare_request(checkout(), noon_in_hanoi()).unwrap();
        let signed = adapter.sign_request(&request).unwrap();

        assert!(
            signed
                .url()
                .starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?vnp_Amount=10000000&")
        );
        assert_eq!(
            signed.secure_hash(),
            "476702fc1767490e59ff918d404e6263f00a1bfb9d576bdfd79d28c876b5d77481c6c2f0f992998a27c602763e806f1cb28547bed9f55580754bd273136b0fed"
        );

    }

    #[test]
    fn test_default_config_accepts_gateway_signed_return() {
        let adapter = adapter();
        let mut payload: CanonicalParameterSet = [
            ("vnp_Amount", "10000000"),
            ("vnp_OrderInfo", "Thanh toan don hang :OR100123"),
            ("vnp_ResponseCode", "00"),
            ("vnp_TxnRef", "OR100123"),
        ]
        .into_iter()
        .collect();
        let gateway_hash =
            compute_secure_hash(&payload, SerializationMode::Percent, &SecretKey::new("testsecret"))
                .unwrap();
        payload.insert(SECURE_HASH_FIELD, gateway_hash);

        assert!(adapter.verify_return(payload).unwrap().is_authentic());
    }

    #[test]
    fn test_raw_verification_is_opt_in() {
        let mut config = test_config();
        config.verify_encoding = SerializationMode::Raw;
        let adapter = VnPayAdapter::new(Arc::new(config));

        let request = adapter.prepare_request(checkout(), noon_in_hanoi()).unwrap();
        let signed = adapter.sign_request(&request).unwrap();
        let mut payload = CanonicalParameterSet::from_request(&request);
        payload.insert(SECURE_HASH_FIELD, signed.secure_hash());

        assert!(adapter.verify_return(payload).unwrap().is_authentic());
    }
}
