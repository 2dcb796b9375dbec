use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BurrowError {
    #[error("served root {0:?} is not a directory")]
    RootNotADirectory(PathBuf),
    #[error("failed to prepare served root {path:?}: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve listen address {0}")]
    ListenAddress(String),
}
