use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("telegram bot token is empty")]
    MissingToken,

    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Wrap an error from a dependency whose types teloxide does not expose
    /// through [`teloxide::RequestError`].
    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
