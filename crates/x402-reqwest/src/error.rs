//! Client-side error taxonomy for the 402 retry loop.

use reqwest_middleware as rqm;

#[derive(Debug, thiserror::Error)]
pub enum X402Error {
    #[error("could not parse 402 response as PaymentRequired")]
    ParseError,
    #[error("no registered scheme matches any of the server's accepted payment options")]
    NoMatchingPaymentOption,
    #[error("request object is not cloneable, are you passing a streaming body?")]
    RequestNotCloneable,
    #[error("Starknet payment payload missing typedData (required).")]
    StarknetTypedDataMissing,
    #[error("failed to sign payment payload: {0}")]
    Signing(String),
    #[error("failed to encode payment payload to json")]
    JsonEncode(#[source] serde_json::Error),
    #[error("failed to encode payment payload into an HTTP header")]
    HeaderEncode,
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

impl From<X402Error> for rqm::Error {
    fn from(error: X402Error) -> Self {
        rqm::Error::Middleware(error.into())
    }
}
