use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::PaymentAttempt;
use crate::ports::payment_ledger_port::PaymentLedgerPort;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// 进程内交易记录，未配置数据库时使用
#[derive(Debug, Default)]
pub struct InMemoryPaymentLedger {
    attempts: RwLock<HashMap<String, PaymentAttempt>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentLedgerPort for InMemoryPaymentLedger {
    async fn save(&self, attempt: &PaymentAttempt) -> DomainResult<()> {
        let mut attempts = self.attempts.write().await;
        if attempts.contains_key(&attempt.txn_ref) {
            return Err(DomainError::InvalidRequest(format!(
                "duplicate order reference: {}",
                attempt.txn_ref
            )));
        }

        attempts.insert(attempt.txn_ref.clone(), attempt.clone());
        debug!("Payment attempt saved: {}", attempt.txn_ref);
        Ok(())
    }

    async fn find_by_txn_ref(&self, txn_ref: &str) -> DomainResult<Option<PaymentAttempt>> {
        Ok(self.attempts.read().await.get(txn_ref).cloned())
    }

    async fn settle(&self, attempt: &PaymentAttempt) -> DomainResult<bool> {
        let mut attempts = self.attempts.write().await;
        let existing = attempts
            .get_mut(&attempt.txn_ref)
            .ok_or_else(|| DomainError::AttemptNotFound(attempt.txn_ref.clone()))?;

        if !existing.is_pending() {
            debug!("Payment attempt already settled: {}", attempt.txn_ref);
            return Ok(false);
        }

        *existing = attempt.clone();
        debug!("Payment attempt settled: {}", attempt.txn_ref);
        Ok(true)
    }
}
