//! Stream names and selector resolution.
//!
//! A stream name encodes a category, an optional `:command` qualifier and an
//! optional instance id: `category[:command][-instanceId]`. A name without
//! an instance id is a *category selector* denoting the union of every
//! concrete stream sharing that category and qualifier presence.
//!
//! Names are parsed once at the boundary into [`StreamName`]; nothing inside
//! the engines re-parses strings.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Qualifier partitioning a category into disjoint sub-universes.
///
/// A command-qualified selector never matches an unqualified stream and
/// vice versa.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Qualifier {
    Command,
}

impl Qualifier {
    fn as_str(&self) -> &'static str {
        match self {
            Qualifier::Command => "command",
        }
    }
}

/// A parsed stream name, usable both as a concrete stream identity and as a
/// selector.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct StreamName {
    category: String,
    qualifier: Option<Qualifier>,
    id: Option<String>,
}

impl StreamName {
    /// A category selector: matches every concrete stream of `category`
    /// without a qualifier.
    pub fn category(category: impl Into<String>) -> Result<Self> {
        let category = category.into();
        Self::validate_segment(&category, "category")?;
        Ok(Self {
            category,
            qualifier: None,
            id: None,
        })
    }

    /// A concrete instance stream `category-id`.
    pub fn instance(category: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let category = category.into();
        let id = id.into();
        Self::validate_segment(&category, "category")?;
        if id.is_empty() || id.contains(':') {
            return Err(ProtocolError::InvalidStreamName(format!("{category}-{id}")));
        }
        Ok(Self {
            category,
            qualifier: None,
            id: Some(id),
        })
    }

    /// The command-qualified counterpart of this name.
    pub fn into_commands(mut self) -> Self {
        self.qualifier = Some(Qualifier::Command);
        self
    }

    /// Parse a textual stream name.
    ///
    /// The leading segment (up to the first `-`) carries the category and
    /// the optional qualifier; everything after the first `-` is the
    /// instance id and may itself contain dashes.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidStreamName(raw.to_string());

        let (head, id) = match raw.split_once('-') {
            Some((head, id)) => (head, Some(id)),
            None => (raw, None),
        };

        let (category, qualifier) = match head.split_once(':') {
            Some((category, "command")) => (category, Some(Qualifier::Command)),
            Some(_) => return Err(invalid()),
            None => (head, None),
        };

        if category.is_empty() {
            return Err(invalid());
        }
        if let Some(id) = id {
            if id.is_empty() || id.contains(':') {
                return Err(invalid());
            }
        }

        Ok(Self {
            category: category.to_string(),
            qualifier,
            id: id.map(str::to_string),
        })
    }

    fn validate_segment(segment: &str, what: &str) -> Result<()> {
        if segment.is_empty() || segment.contains('-') || segment.contains(':') {
            return Err(ProtocolError::InvalidStreamName(format!(
                "{segment:?} is not a valid {what} segment"
            )));
        }
        Ok(())
    }

    pub fn category_name(&self) -> &str {
        &self.category
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn qualifier(&self) -> Option<Qualifier> {
        self.qualifier
    }

    pub fn is_command(&self) -> bool {
        self.qualifier == Some(Qualifier::Command)
    }

    /// True when this name denotes a category rather than one instance.
    pub fn is_category(&self) -> bool {
        self.id.is_none()
    }

    /// Does this selector admit the given concrete stream?
    ///
    /// Instance selectors match by exact equality. Category selectors match
    /// on the full leading segment (never a string-prefix test) and require
    /// the qualifier presence to agree exactly.
    pub fn matches(&self, concrete: &StreamName) -> bool {
        if self.is_category() {
            self.category == concrete.category && self.qualifier == concrete.qualifier
        } else {
            self == concrete
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category)?;
        if let Some(qualifier) = self.qualifier {
            write!(f, ":{}", qualifier.as_str())?;
        }
        if let Some(id) = &self.id {
            write!(f, "-{id}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamName({self})")
    }
}

impl FromStr for StreamName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<StreamName> for String {
    fn from(name: StreamName) -> String {
        name.to_string()
    }
}

impl TryFrom<String> for StreamName {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn name(raw: &str) -> StreamName {
        StreamName::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_category() {
        let parsed = name("example");
        assert_eq!(parsed.category_name(), "example");
        assert!(parsed.is_category());
        assert!(!parsed.is_command());
    }

    #[test]
    fn test_parse_instance() {
        let parsed = name("example-abc");
        assert_eq!(parsed.category_name(), "example");
        assert_eq!(parsed.instance_id(), Some("abc"));
        assert!(!parsed.is_category());
    }

    #[test]
    fn test_parse_command_instance() {
        let parsed = name("example:command-abc");
        assert_eq!(parsed.category_name(), "example");
        assert_eq!(parsed.instance_id(), Some("abc"));
        assert!(parsed.is_command());
        assert_eq!(parsed.to_string(), "example:command-abc");
    }

    #[test]
    fn test_instance_id_may_contain_dashes() {
        let parsed = name("person-9b2f-41c3");
        assert_eq!(parsed.instance_id(), Some("9b2f-41c3"));
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for raw in [
            "",
            "-abc",
            "example-",
            ":command",
            "example:query-abc",
            "a:b:c-1",
            "example-1:command",
        ] {
            assert!(StreamName::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_category_selector_matches_instances() {
        let selector = name("example");
        assert!(selector.matches(&name("example-abc")));
        assert!(selector.matches(&name("example-def")));
        assert!(selector.matches(&name("example")));
    }

    #[test]
    fn test_category_match_is_exact_segment() {
        let selector = name("example");
        assert!(!selector.matches(&name("exampleWithSuffix-1")));
        assert!(!selector.matches(&name("exam-1")));
    }

    #[test]
    fn test_command_and_event_universes_are_disjoint() {
        let events = name("example");
        let commands = name("example:command");

        let event_stream = name("example-abc");
        let command_stream = name("example:command-abc");

        assert!(events.matches(&event_stream));
        assert!(!events.matches(&command_stream));
        assert!(commands.matches(&command_stream));
        assert!(!commands.matches(&event_stream));
    }

    #[test]
    fn test_instance_selector_is_exact_equality() {
        let selector = name("example-abc");
        assert!(selector.matches(&name("example-abc")));
        assert!(!selector.matches(&name("example-abcd")));
        assert!(!selector.matches(&name("example:command-abc")));
        assert!(!selector.matches(&name("example")));
    }

    #[test]
    fn test_serde_as_string() {
        let parsed: StreamName = serde_json::from_str("\"example:command-abc\"").unwrap();
        assert_eq!(parsed, name("example:command-abc"));
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            "\"example:command-abc\""
        );
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(
            category in "[a-zA-Z][a-zA-Z0-9]{0,12}",
            command in any::<bool>(),
            id in proptest::option::of("[a-z0-9]{1,8}(-[a-z0-9]{1,4}){0,2}"),
        ) {
            let mut built = match &id {
                Some(id) => StreamName::instance(category.clone(), id.clone()).unwrap(),
                None => StreamName::category(category.clone()).unwrap(),
            };
            if command {
                built = built.into_commands();
            }

            let reparsed = StreamName::parse(&built.to_string()).unwrap();
            prop_assert_eq!(reparsed, built);
        }
    }
}
