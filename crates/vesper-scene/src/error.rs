/// Errors that can occur when resolving a node token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed node token '{0}'")]
    Malformed(String),

    #[error("node token '{0}' belongs to a different scene run")]
    ForeignRun(String),

    #[error("node token '{0}' does not name a node minted in this run")]
    Unknown(String),
}
