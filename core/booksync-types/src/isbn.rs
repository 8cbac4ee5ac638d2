//! ISBN parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons an ISBN string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsbnError {
    #[error("ISBN is empty")]
    Empty,

    #[error("ISBN must have 10 or 13 digits, got {0}")]
    Length(usize),

    #[error("invalid character {0:?} in ISBN")]
    InvalidChar(char),

    #[error("ISBN checksum mismatch")]
    Checksum,
}

/// A validated ISBN-10 or ISBN-13, stored without separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    /// Parses an ISBN, ignoring hyphens and spaces. The ISBN-10 check
    /// character may be `X` (either case).
    pub fn parse(input: &str) -> Result<Self, IsbnError> {
        let compact: String = input
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if compact.is_empty() {
            return Err(IsbnError::Empty);
        }

        match compact.chars().count() {
            10 => check_isbn10(&compact)?,
            13 => check_isbn13(&compact)?,
            n => return Err(IsbnError::Length(n)),
        }

        Ok(Self(compact))
    }

    /// Returns the compact form (digits only, plus a possible trailing `X`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the 13-digit form.
    #[must_use]
    pub fn is_isbn13(&self) -> bool {
        self.0.len() == 13
    }
}

fn check_isbn10(s: &str) -> Result<(), IsbnError> {
    let mut sum = 0u32;
    for (i, c) in s.chars().enumerate() {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'X' if i == 9 => 10,
            other => return Err(IsbnError::InvalidChar(other)),
        };
        sum += value * (10 - i as u32);
    }
    if sum % 11 == 0 {
        Ok(())
    } else {
        Err(IsbnError::Checksum)
    }
}

fn check_isbn13(s: &str) -> Result<(), IsbnError> {
    let mut sum = 0u32;
    for (i, c) in s.chars().enumerate() {
        let digit = c.to_digit(10).ok_or(IsbnError::InvalidChar(c))?;
        sum += if i % 2 == 0 { digit } else { digit * 3 };
    }
    if sum % 10 == 0 {
        Ok(())
    } else {
        Err(IsbnError::Checksum)
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Isbn {
    type Err = IsbnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Isbn {
    type Error = IsbnError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}
