//! Small string helpers shared by the lifecycle and commerce modules

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Trim `s` and keep at most `max` characters (not bytes)
#[must_use]
pub fn limit_chars(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}

/// First value that is not blank, or an empty string
#[must_use]
pub fn first_non_blank<'a>(values: &[&'a str]) -> &'a str {
    values
        .iter()
        .copied()
        .find(|v| !v.trim().is_empty())
        .unwrap_or_default()
}

/// Lowercase a display name and replace spaces with dashes
///
/// `"Loja Centro"` becomes `"loja-centro"`.
#[must_use]
pub fn slug_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

/// Random alphanumeric token of `len` characters
#[must_use]
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
