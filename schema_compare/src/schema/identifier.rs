//! Asset names
//!
//! Every named schema object (table, column, index, sequence) carries an
//! [`Identifier`]. The original casing is kept for display; lookups and
//! equality are case-insensitive.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::utils::naming::{is_identifier_quoted, quote_identifier, trim_quotes};

/// A possibly namespaced, possibly quoted database object name
#[derive(Debug, Clone)]
pub struct Identifier {
    name: String,
    namespace: Option<String>,
    quoted: bool,
}

impl Identifier {
    /// Parse a raw name such as `users`, `audit.events` or `"public"."users"`
    pub fn parse(raw: &str) -> Self {
        let quoted = is_identifier_quoted(raw);
        let unquoted = if quoted { trim_quotes(raw) } else { raw.to_string() };

        match unquoted.split_once('.') {
            Some((namespace, name)) => Self {
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
                quoted,
            },
            None => Self {
                name: unquoted,
                namespace: None,
                quoted,
            },
        }
    }

    /// Name without the namespace, in its original casing
    pub fn local_name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Display name: `namespace.name` when namespaced, otherwise `name`
    pub fn name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}.{}", namespace, self.name),
            None => self.name.clone(),
        }
    }

    /// True when the name has no namespace or its namespace is the default one
    ///
    /// Namespace matching is case-sensitive.
    pub fn is_in_default_namespace(&self, default_namespace: &str) -> bool {
        match &self.namespace {
            None => true,
            Some(namespace) => namespace == default_namespace,
        }
    }

    /// Lower-cased name, dropping the namespace when it is the default one
    pub fn shortest_name(&self, default_namespace: &str) -> String {
        match &self.namespace {
            Some(namespace) if namespace == default_namespace => self.name.to_lowercase(),
            _ => self.name().to_lowercase(),
        }
    }

    /// Lower-cased `namespace.name`, using the default namespace when none is set
    pub fn fully_qualified_name(&self, default_namespace: &str) -> String {
        match &self.namespace {
            Some(_) => self.name().to_lowercase(),
            None => format!("{}.{}", default_namespace, self.name).to_lowercase(),
        }
    }

    /// Name with every part wrapped in `quote` if the original literal was quoted
    pub fn quoted_name(&self, quote: char) -> String {
        if !self.quoted {
            return self.name();
        }

        match &self.namespace {
            Some(namespace) => format!(
                "{}.{}",
                quote_identifier(namespace, quote),
                quote_identifier(&self.name, quote)
            ),
            None => quote_identifier(&self.name, quote),
        }
    }

    /// Key used for case-insensitive lookups
    pub fn normalized(&self) -> String {
        self.name().to_lowercase()
    }
}

impl From<&str> for Identifier {
    fn from(raw: &str) -> Self {
        Identifier::parse(raw)
    }
}

impl From<String> for Identifier {
    fn from(raw: String) -> Self {
        Identifier::parse(&raw)
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted_name('"'))
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Identifier::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("users", None, "users", false)]
    #[case("audit.events", Some("audit"), "events", false)]
    #[case("\"Users\"", None, "Users", true)]
    #[case("`shop`.`orders`", Some("shop"), "orders", true)]
    #[case("[dbo].[Items]", Some("dbo"), "Items", true)]
    fn test_parse(
        #[case] raw: &str,
        #[case] namespace: Option<&str>,
        #[case] local: &str,
        #[case] quoted: bool,
    ) {
        let identifier = Identifier::parse(raw);
        assert_eq!(identifier.namespace(), namespace);
        assert_eq!(identifier.local_name(), local);
        assert_eq!(identifier.is_quoted(), quoted);
    }

    #[test]
    fn test_default_namespace_is_case_sensitive() {
        let identifier = Identifier::parse("Public.users");
        assert!(!identifier.is_in_default_namespace("public"));
        assert!(identifier.is_in_default_namespace("Public"));
        assert!(Identifier::parse("users").is_in_default_namespace("public"));
    }

    #[test]
    fn test_shortest_and_fully_qualified_names() {
        let plain = Identifier::parse("Users");
        assert_eq!(plain.shortest_name("public"), "users");
        assert_eq!(plain.fully_qualified_name("public"), "public.users");

        let namespaced = Identifier::parse("public.Users");
        assert_eq!(namespaced.shortest_name("public"), "users");
        assert_eq!(namespaced.fully_qualified_name("other"), "public.users");

        let foreign = Identifier::parse("audit.Events");
        assert_eq!(foreign.shortest_name("public"), "audit.events");
    }

    #[test]
    fn test_equality_ignores_case() {
        assert_eq!(Identifier::parse("Email"), Identifier::parse("email"));
        assert_eq!(Identifier::parse("\"email\""), Identifier::parse("EMAIL"));
        assert_ne!(Identifier::parse("email"), Identifier::parse("email_address"));
    }

    #[test]
    fn test_quoted_name() {
        assert_eq!(Identifier::parse("users").quoted_name('"'), "users");
        assert_eq!(Identifier::parse("`a`.`b`").quoted_name('['), "[a].[b]");
        assert_eq!(Identifier::parse("\"order\"").to_string(), "\"order\"");
    }
}
