/// Broad failure classes. The HTTP boundary maps each to a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Permission,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("you cannot send a pair request to yourself")]
    SelfPairing,

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("user {0} is already in a relationship")]
    AlreadyPaired(i64),

    #[error("a pending pair request already involves user {0}")]
    RequestAlreadyExists(i64),

    #[error("no pending pair request found")]
    NoPendingRequest,

    #[error("user has no active relationship to end")]
    NoActiveRelationship,

    #[error("username '{0}' already exists")]
    UsernameTaken(String),

    #[error("post {0} not found")]
    PostNotFound(i64),

    #[error("comment {0} not found")]
    CommentNotFound(i64),

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SelfPairing | Self::Validation(_) => ErrorKind::Validation,
            Self::UserNotFound(_)
            | Self::NoPendingRequest
            | Self::NoActiveRelationship
            | Self::PostNotFound(_)
            | Self::CommentNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyPaired(_) | Self::RequestAlreadyExists(_) | Self::UsernameTaken(_) => {
                ErrorKind::Conflict
            }
            Self::PermissionDenied => ErrorKind::Permission,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
