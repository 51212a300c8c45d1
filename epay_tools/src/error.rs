use thiserror::Error;

#[derive(Debug, Error)]
pub enum EpayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid processor URL: {0}")]
    InvalidUrl(String),
    #[error("Could not send request to the processor: {0}")]
    Transport(String),
    #[error("Request to the processor timed out: {0}")]
    Timeout(String),
    #[error("Processor returned HTTP {status}. {body}")]
    ProcessorError { status: u16, body: String },
    #[error("Could not deserialize processor response: {0}")]
    Decode(String),
    #[error("OAuth token exchange failed. {0}")]
    TokenFetch(String),
    #[error("No valid access token is available. {0}")]
    TokenUnavailable(String),
    #[error("Could not fetch the processor public key. {0}")]
    KeyFetch(String),
    #[error("Could not parse the processor public key. {0}")]
    KeyParse(String),
    #[error("Could not encrypt the card payload. {0}")]
    Encryption(String),
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),
}

impl EpayApiError {
    /// The HTTP status code the processor answered with, if the failure came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ProcessorError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Invalid payment order. {0}")]
    Validation(String),
    #[error("Payment failed. {0}")]
    Payment(#[from] EpayApiError),
    #[error("The payment went through, but could not be recorded. {0}")]
    Record(String),
}
