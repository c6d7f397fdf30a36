//! Hearth provider clients
//!
//! Thin HTTP clients for the external messaging providers. Each client makes
//! exactly one delivery attempt per call; retry policy belongs to the caller.

pub mod sendgrid;
pub mod twilio;

pub use sendgrid::{SendGridClient, SendGridError};
pub use twilio::{TwilioClient, TwilioError};
