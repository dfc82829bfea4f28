/// Failures that end an awscurl run.
///
/// `Display` is exactly what gets printed on stderr before exiting with 1.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The `@file` given to `--data` can't be read.
    #[error("Error opening input file '{path}'")]
    DataFile {
        path: String,
        #[source]
        source: awscurl_core::Error,
    },
    /// The STS `AssumeRole` exchange failed.
    #[error("AssumeRole() failed:\n{0}")]
    AssumeRole(#[source] awscurl_core::Error),
    /// Building, signing or sending the request failed.
    #[error(transparent)]
    Request(#[from] awscurl_core::Error),
}

/// Result of an awscurl run.
pub type Result<T> = std::result::Result<T, Error>;
