pub mod adapters;
pub mod config;

pub use adapters::{InMemoryPaymentLedger, MySqlPaymentLedger, VnPayAdapter};
pub use config::VnPayConfig;
