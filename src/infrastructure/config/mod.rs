pub mod vnpay_config;

pub use vnpay_config::VnPayConfig;
