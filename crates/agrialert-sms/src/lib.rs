//! SMS delivery for AgriAlert
//!
//! `SmsTransport` is the seam the alert pipeline talks to. `TwilioClient`
//! sends real messages (and optionally runs Twilio Verify); `LoggingTransport`
//! only logs, for running without credentials.

pub mod error;
pub mod phone;
pub mod transport;
pub mod twilio;

pub use error::SmsError;
pub use phone::{codes_match, generate_code, validate_phone_number, CODE_LENGTH};
pub use transport::{LoggingTransport, MessageReceipt, SmsTransport, VerificationReceipt};
pub use twilio::TwilioClient;
