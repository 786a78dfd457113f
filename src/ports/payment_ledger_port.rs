use crate::domain::errors::DomainResult;
use crate::domain::PaymentAttempt;
use async_trait::async_trait;

/// 交易记录仓储端口接口
#[async_trait]
pub trait PaymentLedgerPort: Send + Sync + 'static {
    /// 保存新的交易记录，商户订单号重复时返回 `InvalidRequest`
    async fn save(&self, attempt: &PaymentAttempt) -> DomainResult<()>;

    /// 根据商户订单号查找
    async fn find_by_txn_ref(&self, txn_ref: &str) -> DomainResult<Option<PaymentAttempt>>;

    /// 写入终态，仅当已存记录仍为 `Pending` 时生效
    ///
    /// 返回 `false` 表示记录已被其他通知确认过；记录不存在时返回 `AttemptNotFound`。
    async fn settle(&self, attempt: &PaymentAttempt) -> DomainResult<bool>;
}
