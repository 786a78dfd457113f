pub mod payment_gateway_port;
pub mod payment_ledger_port;

pub use payment_gateway_port::{CheckoutOrder, PaymentGatewayPort};
pub use payment_ledger_port::PaymentLedgerPort;
