//! Price parsing for chat replies ("129,90", "1.234,56", "R$ 12,34")

/// Parse a price typed by a user into integer cents
///
/// With a comma and no period among the last three characters, periods are
/// thousands separators and the comma is the decimal point (`1.234,56`).
/// Otherwise, when both appear, commas are thousands separators
/// (`1,234.56`). Returns `None` for anything that is not a non-negative
/// decimal.
#[must_use]
pub fn parse_price_to_cents(input: &str) -> Option<i64> {
    let lowered = input.trim().to_lowercase();
    let stripped = lowered.strip_prefix("r$").unwrap_or(&lowered).trim();
    if stripped.is_empty() {
        return None;
    }

    let normalized = if stripped.contains(',') && !tail(stripped, 3).contains('.') {
        stripped.replace('.', "").replace(',', ".")
    } else if stripped.contains(',') && stripped.contains('.') {
        stripped.replace(',', "")
    } else {
        stripped.to_string()
    };

    if !is_plain_decimal(&normalized) {
        return None;
    }

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    let cents = value.mul_add(100.0, 0.5).trunc() as i64;
    Some(cents)
}

/// Last `n` characters of `s`
fn tail(s: &str, n: usize) -> &str {
    let start = s
        .char_indices()
        .rev()
        .nth(n.saturating_sub(1))
        .map_or(0, |(i, _)| i);
    &s[start..]
}

/// Digits with at most one decimal point and at least one digit
fn is_plain_decimal(s: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for c in s.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}
