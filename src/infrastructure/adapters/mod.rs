pub mod in_memory_payment_ledger;
pub mod mysql_payment_ledger;
pub mod vnpay_adapter;

pub use in_memory_payment_ledger::InMemoryPaymentLedger;
pub use mysql_payment_ledger::MySqlPaymentLedger;
pub use vnpay_adapter::VnPayAdapter;
