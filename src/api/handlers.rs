use crate::application::{
    CreatePaymentRequest, ErrorResponse, IpnResponse, PaymentReturnResponse, PaymentService,
};
use crate::domain::errors::DomainError;
use crate::domain::{CanonicalParameterSet, VerificationResult};
use crate::ports::{PaymentGatewayPort, PaymentLedgerPort};
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// 应用状态
pub struct AppState<G: PaymentGatewayPort, L: PaymentLedgerPort> {
    pub payment_service: Arc<PaymentService<G, L>>,
}

impl<G: PaymentGatewayPort, L: PaymentLedgerPort> Clone for AppState<G, L> {
    fn clone(&self) -> Self {
        Self {
            payment_service: self.payment_service.clone(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::InvalidRequest(_) | DomainError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        DomainError::AttemptNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(code: &str, error: DomainError) -> ApiError {
    let status = error_status(&error);
    // 5xx 不向调用方暴露内部细节
    let message = if status.is_server_error() {
        "Internal server error".to_string()
    } else {
        error.to_string()
    };
    (status, Json(ErrorResponse::new(code.to_string(), message)))
}

/// 取客户端IP：优先 x-forwarded-for，IPv6 回环地址转为 127.0.0.1
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string);

    let ip = forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default();

    match ip.as_str() {
        "::1" | "0:0:0:0:0:0:0:1" => "127.0.0.1".to_string(),
        _ => ip,
    }
}

/// 创建支付并 302 跳转到网关
pub async fn create_payment<G: PaymentGatewayPort, L: PaymentLedgerPort>(
    State(state): State<AppState<G, L>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Response, ApiError> {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    let response = state
        .payment_service
        .create_redirect_payment(request, ip)
        .await
        .map_err(|e| {
            error!("Payment creation error: {}", e);
            api_error("PAYMENT_ERROR", e)
        })?;

    let location = HeaderValue::from_str(&response.url).map_err(|_| {
        error!("Payment URL for {} is not a valid header value", response.order_id);
        api_error(
            "PAYMENT_ERROR",
            DomainError::InvalidRequest(
                "payment URL contains characters that cannot be redirected to".to_string(),
            ),
        )
    })?;

    info!("Redirecting order {} to VNPay", response.order_id);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// 创建支付并以 JSON 返回地址
pub async fn create_payment_url<G: PaymentGatewayPort, L: PaymentLedgerPort>(
    State(state): State<AppState<G, L>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    state
        .payment_service
        .create_payment(request, ip)
        .await
        .map(|response| (StatusCode::OK, Json(response)))
        .map_err(|e| {
            error!("Payment creation error: {}", e);
            api_error("PAYMENT_ERROR", e)
        })
}

/// 浏览器回跳
pub async fn payment_return<G: PaymentGatewayPort, L: PaymentLedgerPort>(
    State(state): State<AppState<G, L>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload: CanonicalParameterSet = params.into_iter().collect();

    match state.payment_service.verify_return(payload) {
        Ok(VerificationResult::Authentic(data)) => {
            Ok((StatusCode::OK, Json(PaymentReturnResponse::successful(data))))
        }
        Ok(VerificationResult::Inauthentic) => Ok((
            StatusCode::BAD_REQUEST,
            Json(PaymentReturnResponse::invalid()),
        )),
        Err(e) => Err(api_error("INVALID_PAYLOAD", e)),
    }
}

/// 网关IPN，始终返回 200
pub async fn vnpay_ipn<G: PaymentGatewayPort, L: PaymentLedgerPort>(
    State(state): State<AppState<G, L>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<IpnResponse>) {
    info!("Received VNPay IPN");

    let payload: CanonicalParameterSet = params.into_iter().collect();
    let response = state.payment_service.handle_ipn(payload).await;

    (StatusCode::OK, Json(response))
}

/// 健康检查
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "10.0.0.2:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_maps_ipv6_loopback() {
        let peer: SocketAddr = "[::1]:5000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "127.0.0.1");
    }

    #[test]
    fn test_client_ip_without_source_is_empty() {
        assert_eq!(client_ip(&HeaderMap::new(), None), "");
    }

    #[test]
    fn test_server_errors_hide_details() {
        let (status, Json(body)) = api_error("PAYMENT_ERROR", DomainError::MissingSecret);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Internal server error");

        let (status, Json(body)) = api_error(
            "PAYMENT_ERROR",
            DomainError::InvalidRequest("amount must not be negative".to_string()),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.message.contains("amount must not be negative"));
    }
}
