use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoteError {
    /// The poll was created with a vote type the tabulator does not know.
    #[error("unknown vote type: {0}")]
    UnknownVoteType(String),

    #[error("poll not found: {0}")]
    PollNotFound(String),

    #[error("poll is closed")]
    PollClosed,

    #[error("voter has already cast a ballot in this poll")]
    AlreadyVoted,

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("results for this poll are hidden")]
    ResultsHidden,

    #[error("ballot store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type VoteResult<T> = Result<T, VoteError>;
