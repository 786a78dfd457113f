use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Money, PaymentState};
use crate::domain::PaymentAttempt;
use crate::ports::payment_ledger_port::PaymentLedgerPort;
use async_trait::async_trait;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use tracing::{debug, error};

/// MySQL交易记录仓储实现
///
/// 表结构：
///
/// ```sql
/// CREATE TABLE vnpay_payment_attempts (
///     id            BINARY(16)   PRIMARY KEY,
///     txn_ref       VARCHAR(100) NOT NULL UNIQUE,
///     transaction_no VARCHAR(64) NULL,
///     amount_minor_units BIGINT  NOT NULL,
///     state         VARCHAR(16)  NOT NULL,
///     order_info    VARCHAR(255) NOT NULL,
///     bank_code     VARCHAR(32)  NULL,
///     client_ip     VARCHAR(64)  NOT NULL,
///     response_code VARCHAR(8)   NULL,
///     created_at    DATETIME(6)  NOT NULL,
///     updated_at    DATETIME(6)  NOT NULL,
///     paid_at       DATETIME(6)  NULL
/// );
/// ```
#[derive(Clone)]
pub struct MySqlPaymentLedger {
    pool: Arc<Pool<MySql>>,
}

impl MySqlPaymentLedger {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentLedgerPort for MySqlPaymentLedger {
    /// 保存交易记录
    async fn save(&self, attempt: &PaymentAttempt) -> DomainResult<()> {
        let query = r#"
            INSERT INTO vnpay_payment_attempts (
                id, txn_ref, transaction_no, amount_minor_units,
                state, order_info, bank_code, client_ip,
                response_code, created_at, updated_at, paid_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(attempt.id)
            .bind(&attempt.txn_ref)
            .bind(&attempt.transaction_no)
            .bind(attempt.amount.to_minor_units())
            .bind(attempt.state.to_string())
            .bind(&attempt.order_info)
            .bind(&attempt.bank_code)
            .bind(&attempt.client_ip)
            .bind(&attempt.response_code)
            .bind(attempt.created_at)
            .bind(attempt.updated_at)
            .bind(attempt.paid_at)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if duplicate {
                    DomainError::InvalidRequest(format!(
                        "duplicate order reference: {}",
                        attempt.txn_ref
                    ))
                } else {
                    DomainError::DatabaseError(e)
                }
            })?;

        debug!("Payment attempt saved: {}", attempt.txn_ref);
        Ok(())
    }

    /// 根据商户订单号查找
    async fn find_by_txn_ref(&self, txn_ref: &str) -> DomainResult<Option<PaymentAttempt>> {
        let query = r#"
            SELECT id, txn_ref, transaction_no, amount_minor_units,
                   state, order_info, bank_code, client_ip,
                   response_code, created_at, updated_at, paid_at
            FROM vnpay_payment_attempts
            WHERE txn_ref = ?
        "#;

        let row = sqlx::query_as::<_, PaymentAttemptRow>(query)
            .bind(txn_ref)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(PaymentAttemptRow::into_attempt).transpose()
    }

    /// 写入终态，条件更新保证只有第一条通知生效
    async fn settle(&self, attempt: &PaymentAttempt) -> DomainResult<bool> {
        let query = r#"
            UPDATE vnpay_payment_attempts
            SET transaction_no = ?, state = ?, response_code = ?, updated_at = ?, paid_at = ?
            WHERE txn_ref = ? AND state = ?
        "#;

        let rows_affected = sqlx::query(query)
            .bind(&attempt.transaction_no)
            .bind(attempt.state.to_string())
            .bind(&attempt.response_code)
            .bind(attempt.updated_at)
            .bind(attempt.paid_at)
            .bind(&attempt.txn_ref)
            .bind(PaymentState::Pending.to_string())
            .execute(self.pool.as_ref())
            .await?
            .rows_affected();

        if rows_affected == 0 {
            // 区分“已确认”与“不存在”
            if self.find_by_txn_ref(&attempt.txn_ref).await?.is_none() {
                error!("No payment attempt found to settle: {}", attempt.txn_ref);
                return Err(DomainError::AttemptNotFound(attempt.txn_ref.clone()));
            }
            debug!("Payment attempt already settled: {}", attempt.txn_ref);
            return Ok(false);
        }

        debug!("Payment attempt settled: {}", attempt.txn_ref);
        Ok(true)
    }
}

/// 数据库行结构体
#[derive(Debug, sqlx::FromRow)]
struct PaymentAttemptRow {
    id: uuid::Uuid,
    txn_ref: String,
    transaction_no: Option<String>,
    amount_minor_units: i64,
    state: String,
    order_info: String,
    bank_code: Option<String>,
    client_ip: String,
    response_code: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PaymentAttemptRow {
    fn into_attempt(self) -> DomainResult<PaymentAttempt> {
        let state: PaymentState = self.state.parse()?;

        Ok(PaymentAttempt {
            id: self.id,
            txn_ref: self.txn_ref,
            transaction_no: self.transaction_no,
            amount: Money::from_minor_units(self.amount_minor_units),
            state,
            order_info: self.order_info,
            bank_code: self.bank_code,
            client_ip: self.client_ip,
            response_code: self.response_code,
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str) -> PaymentAttemptRow {
        let now = chrono::Utc::now();
        PaymentAttemptRow {
            id: uuid::Uuid::new_v4(),
            txn_ref: "OR100123".to_string(),
            transaction_no: Some("14123456".to_string()),
            amount_minor_units: 10_000_000,
            state: state.to_string(),
            order_info: "Thanh toan don hang :OR100123".to_string(),
            bank_code: None,
            client_ip: "127.0.0.1".to_string(),
            response_code: Some("00".to_string()),
            created_at: now,
            updated_at: now,
            paid_at: Some(now),
        }
    }

    #[test]
    fn test_row_into_attempt() {
        let attempt = row("succeeded").into_attempt().unwrap();

        assert_eq!(attempt.state, PaymentState::Succeeded);
        assert_eq!(attempt.amount.to_minor_units(), 10_000_000);
        assert_eq!(attempt.transaction_no.as_deref(), Some("14123456"));
    }

    #[test]
    fn test_unknown_state_is_an_error_not_a_panic() {
        let result = row("refunded").into_attempt();
        assert!(matches!(result, Err(DomainError::InvalidState { .. })));
    }
}
