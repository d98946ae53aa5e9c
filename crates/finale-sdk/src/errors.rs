use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinaleSdkError {
    #[error("Websocket provider error: {0}")]
    WebsocketProviderError(String),

    #[error("HTTP provider error: {0}")]
    HttpProviderError(String),

    #[error("Unsupported RPC url scheme: {0}")]
    UnsupportedRpcUrl(String),
}

pub type Result<T> = std::result::Result<T, FinaleSdkError>;
