mod api;
mod application;
mod domain;
mod infrastructure;
mod ports;

use api::AppState;
use application::PaymentService;
use infrastructure::{InMemoryPaymentLedger, MySqlPaymentLedger, VnPayAdapter, VnPayConfig};
use ports::PaymentLedgerPort;
use sqlx::MySqlPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting VNPay gateway service...");

    // 加载VNPay配置，缺少密钥时直接退出
    let config = VnPayConfig::from_env()?;
    info!(
        "VNPay configuration loaded for merchant: {} (sign: {}, verify: {})",
        config.tmn_code, config.sign_encoding, config.verify_encoding
    );

    let gateway = Arc::new(VnPayAdapter::new(config));

    let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            info!("Connecting to database...");
            let pool = MySqlPool::connect(&database_url).await?;
            info!("Database connected successfully");

            let ledger = Arc::new(MySqlPaymentLedger::new(Arc::new(pool)));
            serve(gateway, ledger, &addr).await
        }
        Err(_) => {
            warn!("DATABASE_URL not set, payment attempts are kept in memory");
            serve(gateway, Arc::new(InMemoryPaymentLedger::new()), &addr).await
        }
    }
}

async fn serve<L: PaymentLedgerPort>(
    gateway: Arc<VnPayAdapter>,
    ledger: Arc<L>,
    addr: &str,
) -> anyhow::Result<()> {
    let app_state = AppState {
        payment_service: Arc::new(PaymentService::new(gateway, ledger)),
    };

    let app = api::create_router(app_state);

    info!("Server listening on {}", addr);
    info!("Available endpoints:");
    info!("  GET  /health - Health check");
    info!("  POST /api/vnpay - Create payment (302 to VNPay)");
    info!("  POST /api/vnpay/url - Create payment (JSON url)");
    info!("  GET  /api/vnpay/return - Browser return");
    info!("  GET  /api/vnpay/vnpay-ipn - VNPay IPN");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
