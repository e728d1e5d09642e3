use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("change on {0} has neither an old nor a new revision")]
    BlankRevisions(String),

    #[error("cannot parse change on line {line}: {input:?}")]
    ChangeParsing { line: usize, input: String },

    #[error("duplicate sequence index {0} in push")]
    DuplicateIndex(usize),

    #[error("invalid revision: {0:?}")]
    InvalidRevision(String),

    #[error("{0} is not a branch or tag ref")]
    UnsupportedRef(String),
}
