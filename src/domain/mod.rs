pub mod entities;
pub mod errors;
pub mod signature;
pub mod value_objects;

pub use entities::{PaymentAttempt, PaymentRequest};
pub use errors::{DomainError, DomainResult};
pub use signature::{
    CanonicalParameterSet, PaymentReturnPayload, PaymentSignatureProtocol, SecretKey,
    SignedPaymentUrl, VerificationResult,
};
pub use value_objects::{Money, PaymentState, SerializationMode};
