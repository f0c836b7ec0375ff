use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("quote request timed out")]
    Timeout,

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl QuoteError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}
