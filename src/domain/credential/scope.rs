//! Scope vocabulary

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_SCOPE_LENGTH: usize = 64;

static SCOPE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_]+(:[a-z0-9_.\-]+)*$").expect("scope pattern is a valid regex")
});

/// Errors raised when parsing a scope string
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeParseError {
    #[error("Scope cannot be empty")]
    Empty,

    #[error("Scope exceeds maximum length of {0} characters")]
    TooLong(usize),

    #[error("Scope '{0}' is malformed")]
    Malformed(String),
}

/// A permission scope. Known scopes are closed variants; anything else
/// that is well-formed is carried as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    ReadUsers,
    ReadTeams,
    ReadData,
    WriteUsers,
    WriteTeams,
    WriteData,
    AdminUsers,
    AdminTeams,
    AdminSystem,
    WebhookReceive,
    ExportData,
    Custom(String),
}

impl Scope {
    pub const KNOWN: [Scope; 11] = [
        Self::ReadUsers,
        Self::ReadTeams,
        Self::ReadData,
        Self::WriteUsers,
        Self::WriteTeams,
        Self::WriteData,
        Self::AdminUsers,
        Self::AdminTeams,
        Self::AdminSystem,
        Self::WebhookReceive,
        Self::ExportData,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::ReadUsers => "read:users",
            Self::ReadTeams => "read:teams",
            Self::ReadData => "read:data",
            Self::WriteUsers => "write:users",
            Self::WriteTeams => "write:teams",
            Self::WriteData => "write:data",
            Self::AdminUsers => "admin:users",
            Self::AdminTeams => "admin:teams",
            Self::AdminSystem => "admin:system",
            Self::WebhookReceive => "webhook:receive",
            Self::ExportData => "export:data",
            Self::Custom(raw) => raw,
        }
    }

    /// Human readable description shown on consent screens
    pub fn description(&self) -> &str {
        match self {
            Self::ReadUsers => "Read user information",
            Self::ReadTeams => "Read team information",
            Self::ReadData => "Read application data",
            Self::WriteUsers => "Create and update users",
            Self::WriteTeams => "Create and update teams",
            Self::WriteData => "Create and update application data",
            Self::AdminUsers => "Manage users (delete, roles)",
            Self::AdminTeams => "Manage teams (delete, settings)",
            Self::AdminSystem => "System administration",
            Self::WebhookReceive => "Receive webhook notifications",
            Self::ExportData => "Export data in various formats",
            Self::Custom(_) => "Custom scope",
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ScopeParseError::Empty);
        }

        if s.len() > MAX_SCOPE_LENGTH {
            return Err(ScopeParseError::TooLong(MAX_SCOPE_LENGTH));
        }

        if let Some(known) = Self::KNOWN.iter().find(|scope| scope.as_str() == s) {
            return Ok(known.clone());
        }

        if SCOPE_PATTERN.is_match(s) {
            Ok(Self::Custom(s.to_string()))
        } else {
            Err(ScopeParseError::Malformed(s.to_string()))
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = ScopeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str().to_string()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse an OAuth space-delimited `scope` parameter
pub fn parse_scope_list(raw: &str) -> Result<Vec<Scope>, ScopeParseError> {
    let mut scopes: Vec<Scope> = Vec::new();

    for part in raw.split_whitespace() {
        let scope: Scope = part.parse()?;

        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }

    Ok(scopes)
}
