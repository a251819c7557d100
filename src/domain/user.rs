use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier. Never reused, never changed once assigned.
pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Free-form contact string (usually an email address)
    pub contact: String,
    pub created_at: DateTime<Utc>,
}

/// A user that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub contact: String,
}

impl NewUser {
    /// Build a registration request. Surrounding whitespace is dropped from both
    /// fields; returns `None` if the name is empty afterwards.
    pub fn new(name: &str, contact: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            contact: contact.trim().to_string(),
        })
    }
}

/// Parse a store-assigned id as typed by a person ("  3 ").
pub fn parse_id(input: &str) -> Result<i64, ParseIdError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseIdError::Empty);
    }
    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ParseIdError::Invalid(trimmed.to_string())),
    }
}

/// Parse a comma separated participant list ("1, 2,3").
/// Order is preserved; duplicates are left for the caller to judge.
pub fn parse_user_ids(input: &str) -> Result<Vec<UserId>, ParseIdError> {
    if input.trim().is_empty() {
        return Err(ParseIdError::Empty);
    }
    input.split(',').map(parse_id).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    Empty,
    Invalid(String),
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIdError::Empty => write!(f, "missing identifier"),
            ParseIdError::Invalid(raw) => write!(f, "'{}' is not a valid identifier", raw),
        }
    }
}

impl std::error::Error for ParseIdError {}
