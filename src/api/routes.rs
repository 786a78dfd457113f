use super::handlers::*;
use crate::ports::{PaymentGatewayPort, PaymentLedgerPort};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_router<G: PaymentGatewayPort, L: PaymentLedgerPort>(state: AppState<G, L>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/vnpay", post(create_payment::<G, L>))
        .route("/api/vnpay/url", post(create_payment_url::<G, L>))
        .route("/api/vnpay/return", get(payment_return::<G, L>))
        .route("/api/vnpay/vnpay-ipn", get(vnpay_ipn::<G, L>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
