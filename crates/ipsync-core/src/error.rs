//! Error types for the IPSync core.

use thiserror::Error;

/// Validation errors for records and deltas received from the gateway.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("ip address is empty")]
    EmptyIp,

    #[error("invalid {field} for {ip}: {value}")]
    InvalidRate {
        ip: String,
        field: &'static str,
        value: f64,
    },
}
