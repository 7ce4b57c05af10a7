//! Embedded default tag lists.
//! Using include_str! to embed wordlists/environments.txt at compile time.

/// Embedded environment tags from wordlists/environments.txt
const EMBEDDED_ENVIRONMENTS_TXT: &str = include_str!("../wordlists/environments.txt");

/// Return the embedded environment tag list as owned Strings (one per line).
pub fn default_environments() -> Vec<String> {
    EMBEDDED_ENVIRONMENTS_TXT
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .collect()
}
