//! Naming utilities for SchemaCompare
//!
//! Identifier quoting, normalization and generated constraint names.

/// Characters that open (or close) a quoted identifier
const QUOTE_CHARS: [char; 4] = ['`', '"', '[', ']'];

/// Check whether an identifier literal starts with a quote character
pub fn is_identifier_quoted(identifier: &str) -> bool {
    matches!(identifier.chars().next(), Some('`') | Some('"') | Some('['))
}

/// Strip every quote character from an identifier
pub fn trim_quotes(identifier: &str) -> String {
    identifier.replace(&QUOTE_CHARS[..], "")
}

/// Normalize an identifier for case-insensitive lookups
pub fn normalize_identifier(identifier: &str) -> String {
    trim_quotes(&identifier.to_lowercase())
}

/// Generate an identifier from a prefix and the names it covers
///
/// Every part contributes the first eight hex digits of its md5 digest, so the
/// result is stable for a given table and column list. The name is uppercased
/// and cut to `max_length`.
pub fn generate_identifier_name(parts: &[&str], prefix: &str, max_length: usize) -> String {
    let hash: String = parts
        .iter()
        .map(|part| {
            let digest = format!("{:x}", md5::compute(part.as_bytes()));
            digest[0..8].to_string()
        })
        .collect();

    let name = format!("{}_{}", prefix, hash).to_uppercase();
    name.chars().take(max_length).collect()
}

/// Wrap an identifier in the given quote style
pub fn quote_identifier(name: &str, quote: char) -> String {
    let close = if quote == '[' { ']' } else { quote };
    format!("{}{}{}", quote, name, close)
}
