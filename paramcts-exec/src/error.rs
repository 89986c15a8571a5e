#[derive(Debug, thiserror::Error)]
pub enum ExecutableError {
    #[error("unable to find executable \"{0}\"")]
    NotFound(String),
    #[error("path \"{0}\" is not a file")]
    NotAFile(String),
    #[error("file \"{0}\" is not executable")]
    NotExecutable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Template(#[from] paramcts_config::CallstringError),
    #[error("cat variable \"{0}\" missing from assignment")]
    MissingCatVariable(String),
    #[error("failed to tokenize command line: {0:?}")]
    Shlex(String),
    #[error("command line resolved to no tokens")]
    EmptyCommand,
    #[error("I/O error running target: {0}")]
    Io(#[from] std::io::Error),
}
