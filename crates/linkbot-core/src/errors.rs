use std::path::PathBuf;

/// Core error type for LinkBot.
///
/// Adapter crates map their specific errors into this type so the consumer
/// loop can handle failures consistently (skip the event vs back off).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no saved pages")]
    NoSavedPages,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("upstream fetch failed: {0}")]
    Upstream(String),

    #[error("reply delivery failed: {0}")]
    Reply(String),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),

    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The innermost error, skipping any context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_no_saved_pages(&self) -> bool {
        matches!(self.root(), Error::NoSavedPages)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attach a short static description of the failed operation ("can't save page").
pub trait Context<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| Error::Context {
            context,
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_chain_renders_outer_to_inner() {
        let res: Result<()> = Err(Error::NoSavedPages);
        let err = res
            .context("can't make page list")
            .context("can't send list")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "can't send list: can't make page list: no saved pages"
        );
        assert!(err.is_no_saved_pages());
    }

    #[test]
    fn io_errors_convert_through_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = res.context("can't save page").unwrap_err();
        assert!(matches!(err.root(), Error::Io(_)));
        assert!(!err.is_no_saved_pages());
    }
}
