use crate::application::dto::{CreatePaymentRequest, IpnResponse, PaymentUrlResponse};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{
    CanonicalParameterSet, Money, PaymentAttempt, PaymentReturnPayload, VerificationResult,
};
use crate::ports::{CheckoutOrder, PaymentGatewayPort, PaymentLedgerPort};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 支付服务
pub struct PaymentService<G: PaymentGatewayPort, L: PaymentLedgerPort> {
    gateway: Arc<G>,
    ledger: Arc<L>,
}

impl<G: PaymentGatewayPort, L: PaymentLedgerPort> PaymentService<G, L> {
    pub fn new(gateway: Arc<G>, ledger: Arc<L>) -> Self {
        Self { gateway, ledger }
    }

    /// 创建支付，返回带签名的网关地址
    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
        client_ip: String,
    ) -> DomainResult<PaymentUrlResponse> {
        self.create_payment_at(request, client_ip, Utc::now(), false)
            .await
    }

    /// 创建支付，地址将用作 302 跳转
    ///
    /// 地址无法放进 `Location` 头时在记录交易之前失败，同一订单号可以重试。
    pub async fn create_redirect_payment(
        &self,
        request: CreatePaymentRequest,
        client_ip: String,
    ) -> DomainResult<PaymentUrlResponse> {
        self.create_payment_at(request, client_ip, Utc::now(), true)
            .await
    }

    async fn create_payment_at(
        &self,
        request: CreatePaymentRequest,
        client_ip: String,
        now: DateTime<Utc>,
        redirect: bool,
    ) -> DomainResult<PaymentUrlResponse> {
        info!("Creating VNPay payment for order: {:?}", request.order_id);

        // 1. 金额换算
        let amount = Money::from_major_decimal(request.amount)?;
        debug!("Checkout amount: {}", amount);

        // 2. 补全网关参数
        let payment_request = self.gateway.prepare_request(
            CheckoutOrder {
                order_reference: request.order_id,
                amount,
                order_description: request.order_info,
                order_type: request.order_type,
                locale: request.locale,
                bank_code: request.bank_code,
                client_ip,
            },
            now,
        )?;

        // 3. 签名
        let signed = self.gateway.sign_request(&payment_request)?;
        debug!(
            "Sign data for order {}: {}",
            payment_request.order_reference,
            signed.sign_data()
        );

        if redirect && !signed.is_redirectable() {
            return Err(DomainError::InvalidRequest(
                "payment URL contains control characters and cannot be redirected to".to_string(),
            ));
        }

        // 4. 记录交易，供IPN对账
        let attempt = PaymentAttempt::from_request(&payment_request)?;
        self.ledger.save(&attempt).await?;
        debug!("Payment attempt recorded: {}", attempt.id);

        info!("Payment URL created for order: {}", attempt.txn_ref);

        Ok(PaymentUrlResponse {
            url: signed.into_url(),
            order_id: attempt.txn_ref,
            amount: attempt.amount.to_minor_units(),
        })
    }

    /// 校验浏览器回跳参数
    pub fn verify_return(&self, payload: PaymentReturnPayload) -> DomainResult<VerificationResult> {
        let txn_ref = payload.get("vnp_TxnRef").unwrap_or_default().to_string();

        let result = self.gateway.verify_return(payload);
        match &result {
            Ok(VerificationResult::Authentic(_)) => {
                info!("Authentic VNPay return for order: {}", txn_ref)
            }
            Ok(VerificationResult::Inauthentic) => {
                warn!("Inauthentic VNPay return for order: {}", txn_ref)
            }
            Err(DomainError::MalformedPayload(reason)) => {
                warn!(
                    "Malformed VNPay return for order {} ({}), possible tampering",
                    txn_ref, reason
                )
            }
            Err(e) => error!("VNPay return verification error: {}", e),
        }
        result
    }

    /// 处理网关IPN
    ///
    /// 网关只关心 `RspCode`，因此这里不返回错误。
    pub async fn handle_ipn(&self, payload: PaymentReturnPayload) -> IpnResponse {
        let params = match self.verify_return(payload) {
            Ok(VerificationResult::Authentic(params)) => params,
            Ok(VerificationResult::Inauthentic) => return IpnResponse::checksum_failed(),
            Err(DomainError::MalformedPayload(_)) => return IpnResponse::invalid_request(),
            Err(_) => return IpnResponse::unknown_error(),
        };

        match self.reconcile(&params).await {
            Ok(response) => response,
            Err(e) => {
                error!("IPN reconciliation error: {}", e);
                IpnResponse::unknown_error()
            }
        }
    }

    async fn reconcile(&self, params: &CanonicalParameterSet) -> DomainResult<IpnResponse> {
        let Some(txn_ref) = params.get("vnp_TxnRef") else {
            return Ok(IpnResponse::order_not_found());
        };

        let Some(mut attempt) = self.ledger.find_by_txn_ref(txn_ref).await? else {
            warn!("IPN for unknown order: {}", txn_ref);
            return Ok(IpnResponse::order_not_found());
        };

        let reported_amount = params
            .get("vnp_Amount")
            .and_then(|amount| amount.parse::<i64>().ok());
        if reported_amount != Some(attempt.amount.to_minor_units()) {
            warn!(
                "IPN amount mismatch for order {}: reported {:?}, recorded {}",
                txn_ref,
                reported_amount,
                attempt.amount.to_minor_units()
            );
            return Ok(IpnResponse::invalid_amount());
        }

        if !attempt.is_pending() {
            debug!("IPN for already confirmed order: {}", txn_ref);
            return Ok(IpnResponse::already_confirmed());
        }

        let response_code = params.get("vnp_ResponseCode").unwrap_or_default().to_string();
        let transaction_ok = params
            .get("vnp_TransactionStatus")
            .is_none_or(|status| status == "00");
        let transaction_no = params.get("vnp_TransactionNo").map(str::to_string);

        if response_code == "00" && transaction_ok {
            attempt.mark_as_succeeded(transaction_no, response_code)?;
            info!("Payment succeeded via IPN: {}", txn_ref);
        } else {
            info!(
                "Payment failed via IPN: {} (response code {})",
                txn_ref, response_code
            );
            attempt.mark_as_failed(transaction_no, response_code)?;
        }

        // 并发或重发的通知只有一条能写入终态
        if !self.ledger.settle(&attempt).await? {
            debug!("IPN lost the race for order: {}", txn_ref);
            return Ok(IpnResponse::already_confirmed());
        }

        Ok(IpnResponse::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signature::{compute_secure_hash, SECURE_HASH_FIELD, SECURE_HASH_TYPE_FIELD};
    use crate::domain::{PaymentState, SecretKey, SerializationMode};
    use crate::infrastructure::adapters::{InMemoryPaymentLedger, VnPayAdapter};
    use crate::infrastructure::config::vnpay_config::tests::test_config;
    use chrono::TimeZone;

    type TestService = PaymentService<VnPayAdapter, InMemoryPaymentLedger>;

    fn service() -> (TestService, Arc<InMemoryPaymentLedger>) {
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let gateway = Arc::new(VnPayAdapter::new(Arc::new(test_config())));
        (PaymentService::new(gateway, ledger.clone()), ledger)
    }

    fn checkout(order_id: &str, amount: f64) -> CreatePaymentRequest {
        CreatePaymentRequest {
            order_id: Some(order_id.to_string()),
            amount,
            order_info: None,
            bank_code: None,
            locale: None,
            order_type: None,
        }
    }

    /// 模拟网关签名的IPN参数
    fn gateway_callback(txn_ref: &str, amount: &str, response_code: &str) -> PaymentReturnPayload {
        let mut payload: CanonicalParameterSet = [
            ("vnp_Amount", amount),
            ("vnp_BankCode", "NCB"),
            ("vnp_OrderInfo", "Thanh toan don hang :OR100123"),
            ("vnp_ResponseCode", response_code),
            ("vnp_TmnCode", "TESTCODE01"),
            ("vnp_TransactionNo", "14123456"),
            ("vnp_TransactionStatus", response_code),
            ("vnp_TxnRef", txn_ref),
        ]
        .into_iter()
        .collect();

        let hash = compute_secure_hash(
            &payload,
            SerializationMode::Percent,
            &SecretKey::new("testsecret"),
        )
        .unwrap();
        payload.insert(SECURE_HASH_FIELD, hash);
        payload.insert(SECURE_HASH_TYPE_FIELD, "HmacSHA512");
        payload
    }

    #[tokio::test]
    async fn test_create_payment() {
        let (service, ledger) = service();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();

        let response = service
            .create_payment_at(
                checkout("OR100123", 100_000.0),
                "127.0.0.1".to_string(),
                now,
                false,
            )
            .await
            .unwrap();

        assert_eq!(response.order_id, "OR100123");
        assert_eq!(response.amount, 10_000_000);
        assert!(response.url.ends_with(
            "&vnp_SecureHash=476702fc1767490e59ff918d404e6263f00a1bfb9d576bdfd79d28c876b5d77481c6c2f0f992998a27c602763e806f1cb28547bed9f55580754bd273136b0fed"
        ));

        let attempt = ledger.find_by_txn_ref("OR100123").await.unwrap().unwrap();
        assert_eq!(attempt.state, PaymentState::Pending);
        assert_eq!(attempt.amount.to_minor_units(), 10_000_000);
    }

    #[tokio::test]
    async fn test_create_payment_rejects_negative_amount() {
        let (service, ledger) = service();

        let result = service
            .create_payment(checkout("OR1", -5.0), "127.0.0.1".to_string())
            .await;

        assert!(matches!(result, Err(DomainError::InvalidRequest(_))));
        assert!(ledger.find_by_txn_ref("OR1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_payment_requires_client_ip() {
        let (service, ledger) = service();

        let result = service.create_payment(checkout("OR1", 10.0), String::new()).await;

        assert!(matches!(result, Err(DomainError::InvalidRequest(_))));
        assert!(ledger.find_by_txn_ref("OR1").await.unwrap().is_none());
    }

    #[test]
    fn test_verify_return_reports_malformed_payload() {
        let (service, _) = service();
        let payload: CanonicalParameterSet = [("vnp_TxnRef", "OR1")].into_iter().collect();

        let result = service.verify_return(payload);
        assert!(matches!(result, Err(DomainError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_ipn_success_marks_attempt_paid() {
        let (service, ledger) = service();
        service
            .create_payment(checkout("OR100123", 100_000.0), "127.0.0.1".to_string())
            .await
            .unwrap();

        let response = service
            .handle_ipn(gateway_callback("OR100123", "10000000", "00"))
            .await;
        assert_eq!(response, IpnResponse::success());

        let attempt = ledger.find_by_txn_ref("OR100123").await.unwrap().unwrap();
        assert_eq!(attempt.state, PaymentState::Succeeded);
        assert_eq!(attempt.transaction_no.as_deref(), Some("14123456"));

        let replay = service
            .handle_ipn(gateway_callback("OR100123", "10000000", "00"))
            .await;
        assert_eq!(replay, IpnResponse::already_confirmed());
    }

    #[tokio::test]
    async fn test_ipn_failure_marks_attempt_failed() {
        let (service, ledger) = service();
        service
            .create_payment(checkout("OR100123", 100_000.0), "127.0.0.1".to_string())
            .await
            .unwrap();

        let response = service
            .handle_ipn(gateway_callback("OR100123", "10000000", "24"))
            .await;
        assert_eq!(response, IpnResponse::success());

        let attempt = ledger.find_by_txn_ref("OR100123").await.unwrap().unwrap();
        assert_eq!(attempt.state, PaymentState::Failed);
        assert_eq!(attempt.response_code.as_deref(), Some("24"));
    }

    #[tokio::test]
    async fn test_redirect_payment_with_control_characters_is_not_recorded() {
        let (service, ledger) = service();
        let mut request = checkout("ORX", 1_000.0);
        request.order_info = Some("line1\nline2".to_string());

        let result = service
            .create_redirect_payment(request, "127.0.0.1".to_string())
            .await;

        assert!(matches!(result, Err(DomainError::InvalidRequest(_))));
        assert!(ledger.find_by_txn_ref("ORX").await.unwrap().is_none());

        let retried = service
            .create_redirect_payment(checkout("ORX", 1_000.0), "127.0.0.1".to_string())
            .await
            .unwrap();
        assert_eq!(retried.order_id, "ORX");
    }

    #[tokio::test]
    async fn test_concurrent_ipns_settle_once() {
        let (service, ledger) = service();
        service
            .create_payment(checkout("OR100123", 100_000.0), "127.0.0.1".to_string())
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            service.handle_ipn(gateway_callback("OR100123", "10000000", "00")),
            service.handle_ipn(gateway_callback("OR100123", "10000000", "24")),
        );

        let mut codes = vec![first.rsp_code, second.rsp_code];
        codes.sort();
        assert_eq!(codes, vec!["00".to_string(), "02".to_string()]);

        let attempt = ledger.find_by_txn_ref("OR100123").await.unwrap().unwrap();
        assert!(!attempt.is_pending());
    }

    #[tokio::test]
    async fn test_ipn_decision_table() {
        let (service, _) = service();
        service
            .create_payment(checkout("OR100123", 100_000.0), "127.0.0.1".to_string())
            .await
            .unwrap();

        let unknown = service
            .handle_ipn(gateway_callback("OR999", "10000000", "00"))
            .await;
        assert_eq!(unknown, IpnResponse::order_not_found());

        let wrong_amount = service
            .handle_ipn(gateway_callback("OR100123", "100", "00"))
            .await;
        assert_eq!(wrong_amount, IpnResponse::invalid_amount());

        let mut tampered = gateway_callback("OR100123", "10000000", "00");
        tampered.insert("vnp_ResponseCode", "01");
        assert_eq!(service.handle_ipn(tampered).await, IpnResponse::checksum_failed());

        let mut unsigned = gateway_callback("OR100123", "10000000", "00");
        unsigned.remove(SECURE_HASH_FIELD);
        assert_eq!(service.handle_ipn(unsigned).await, IpnResponse::invalid_request());
    }
}
