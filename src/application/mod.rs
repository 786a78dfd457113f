pub mod dto;
pub mod payment_service;

pub use dto::{
    CreatePaymentRequest, ErrorResponse, IpnResponse, PaymentReturnResponse, PaymentUrlResponse,
};
pub use payment_service::PaymentService;
