use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The body has already exited; nothing is left to resume.
    #[error("coroutine `{name}` has already exited")]
    Exited { name: String },

    #[error("failed to spawn coroutine thread: {0}")]
    Spawn(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
