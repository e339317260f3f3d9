use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse the url")]
    UrlParseError(#[from] url::ParseError),
    #[error("request not complete")]
    ReqwestError(#[from] reqwest::Error),
    #[error("error when sending telegram message")]
    TeloxideRequestError(#[from] teloxide::RequestError),
    #[error("failed to parse json")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("serde_yaml Error")]
    SerdeYamlError(#[from] serde_yaml::Error),
    #[error("IO Error")]
    IOError(#[from] std::io::Error),
    #[error("kuchikiki error")]
    KuchikiError,
    #[error("portal rejected the login credentials")]
    LoginFailed,
    #[error("csrf token not found after login")]
    MissingCsrfToken,
    #[error("invalid destination `{0}`")]
    InvalidDestination(String),
}

pub type Result<T> = std::result::Result<T, Error>;
