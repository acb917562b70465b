use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntelError {
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Request source error: {0}")]
    RequestSource(String),

    #[error("Provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Provider overloaded: {0}")]
    Overloaded(String),

    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Incomplete analysis: {0}")]
    Incomplete(String),

    #[error("Destination error: {0}")]
    Destination(String),

    #[error("Status marking unsupported: {0}")]
    StatusUnsupported(String),

    #[error("API error: {0}")]
    Api(String),
}
