//! Loading definitions from a declarative rule file.
//!
//! A rule file is a JSON array, read in order:
//!
//! ```json
//! [
//!     { "skip": { "regex": "\\s+" } },
//!     { "token": { "kind": "SELFQ", "literal": "self?" } },
//!     { "token": { "kind": "IDENT", "regex": "[a-z_]\\w*" } }
//! ]
//! ```
//!
//! Token kinds in a rule file are plain strings. Dispatch handlers are code,
//! and can only be added through a [`RegistryBuilder`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::{
    error::RegistryError,
    pattern::Pattern,
    registry::{Registry, RegistryBuilder},
};

/// The pattern half of a rule; exactly one field must be set.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

impl PatternSpec {
    fn to_pattern(&self, index: usize) -> Result<Pattern, RegistryError> {
        match (&self.regex, &self.literal) {
            (Some(regex), None) => Pattern::regex(regex),
            (None, Some(literal)) => Ok(Pattern::from(literal.as_str())),
            _ => Err(RegistryError::AmbiguousRule { index }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Token {
        kind: SmolStr,
        #[serde(flatten)]
        pattern: PatternSpec,
    },
    Skip {
        #[serde(flatten)]
        pattern: PatternSpec,
    },
}

/// An ordered list of rules.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn from_json(json: &str) -> Result<RuleSet, RegistryError> {
        serde_json::from_str(json).map_err(Into::into)
    }

    pub fn load(path: &Path) -> Result<RuleSet, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::FileIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Add every rule, in order, to an existing builder.
    pub fn apply<V>(&self, builder: &mut RegistryBuilder<SmolStr, V>) -> Result<(), RegistryError> {
        for (i, rule) in self.rules.iter().enumerate() {
            match rule {
                Rule::Token { kind, pattern } => {
                    builder.add_token(kind.clone(), pattern.to_pattern(i)?);
                }
                Rule::Skip { pattern } => {
                    builder.add_skip(pattern.to_pattern(i)?);
                }
            }
        }
        Ok(())
    }

    pub fn into_registry(self) -> Result<Registry<SmolStr>, RegistryError> {
        let mut builder = RegistryBuilder::new();
        self.apply(&mut builder)?;
        builder.build()
    }
}
