/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the
/// dispatcher can tell fatal startup problems apart from store failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid {var}: {source}")]
    InvalidCredentials {
        var: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("row store error: {0}")]
    Store(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
