use aliri_braid::braid;
use std::fmt;

/// An opaque bearer token issued by the API backend
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

impl fmt::Debug for AccessTokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            f.write_str("\"")?;
            reveal_prefix(self.as_str(), f, 12)?;
            f.write_str("\"")
        } else {
            f.write_str("***ACCESS TOKEN***")
        }
    }
}

impl fmt::Display for AccessTokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            reveal_prefix(self.as_str(), f, usize::MAX)
        } else {
            f.write_str("***ACCESS TOKEN***")
        }
    }
}

/// A language preference code, as stored by the seller's profile
#[braid(serde)]
pub struct LanguageCode;

// Writes at most `default_len` characters of the secret (or the formatter
// width, when one is given), ending in an ellipsis whenever anything was
// held back. Truncation lands on a char boundary.
fn reveal_prefix(secret: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let budget = f.width().unwrap_or(default_len);
    if budget > secret.len() {
        return f.write_str(secret);
    }
    if budget <= 1 {
        return f.write_str("…");
    }

    // The ellipsis takes the last slot of the budget.
    match secret.char_indices().nth(budget - 1) {
        Some((end, _)) => {
            f.write_str(&secret[..end])?;
            f.write_str("…")
        }
        None => f.write_str(secret),
    }
}
