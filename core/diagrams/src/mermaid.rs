//! Small helpers for building Mermaid sources.

/// Mermaid-safe node identifier for a logical name.
///
/// Every non-alphanumeric character maps to `_` so identifiers are stable
/// across refreshes and diff-based UI updates stay coherent.
pub fn ident(name: &str) -> String {
    name.chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect()
}
