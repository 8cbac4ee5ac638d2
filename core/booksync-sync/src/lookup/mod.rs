//! ISBN lookup collaborators.

pub mod douban;
pub mod normalize;

pub use douban::{DoubanConfig, DoubanLookup};

use crate::error::ErrorCategory;
use async_trait::async_trait;
use booksync_types::{BookRecord, Isbn, IsbnError};
use thiserror::Error;

/// Result type for lookups.
pub type LookupResult<T> = Result<T, LookupError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No book page exists for the ISBN.
    #[error("no book found for ISBN {0}")]
    NotFound(String),

    #[error("lookup transport error: {0}")]
    Transport(String),

    #[error("invalid ISBN: {0}")]
    InvalidIsbn(#[from] IsbnError),
}

impl LookupError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Transport(_) => ErrorCategory::Network,
            Self::InvalidIsbn(_) => ErrorCategory::InvalidInput,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Resolves an ISBN to a book record.
#[async_trait]
pub trait BookLookup: Send + Sync {
    async fn fetch_by_isbn(&self, isbn: &Isbn) -> LookupResult<BookRecord>;
}
