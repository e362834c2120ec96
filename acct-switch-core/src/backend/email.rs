//! Detecting the signed-in account email from stored state values.

use serde_json::Value;

/// One way of pulling an email out of a stored key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailStrategy {
    /// Parse the value as a JSON object and read `field` (exact match first,
    /// then case-insensitive).
    JsonField { key: String, field: String },
    /// Scan the raw value for the first email-shaped token.
    RawScan { key: String },
}

impl EmailStrategy {
    pub fn json_field(key: &str, field: &str) -> Self {
        EmailStrategy::JsonField {
            key: key.to_string(),
            field: field.to_string(),
        }
    }

    pub fn raw_scan(key: &str) -> Self {
        EmailStrategy::RawScan {
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            EmailStrategy::JsonField { key, .. } | EmailStrategy::RawScan { key } => key,
        }
    }

    /// `raw` is the stored value for `self.key()`.
    pub fn extract(&self, raw: &str) -> Option<String> {
        match self {
            EmailStrategy::JsonField { field, .. } => {
                let value: Value = serde_json::from_str(raw).ok()?;
                let obj = value.as_object()?;
                if let Some(email) = obj.get(field).and_then(Value::as_str) {
                    return non_empty(email);
                }
                obj.iter()
                    .find(|(k, v)| k.eq_ignore_ascii_case(field) && v.is_string())
                    .and_then(|(_, v)| v.as_str())
                    .and_then(non_empty)
            }
            EmailStrategy::RawScan { .. } => scan_email(raw),
        }
    }
}

/// Try each strategy in order; the first hit wins. `lookup` returns the
/// stored value for a key.
pub fn first_email<F>(strategies: &[EmailStrategy], mut lookup: F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    strategies.iter().find_map(|strategy| {
        let email = strategy.extract(&lookup(strategy.key())?)?;
        log::debug!("Detected account email via key {}", strategy.key());
        Some(email)
    })
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn scan_email(raw: &str) -> Option<String> {
    let is_email_char =
        |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-' | '@');

    raw.split(|c: char| !is_email_char(c))
        .map(|token| token.trim_matches('.'))
        .find(|token| looks_like_email(token))
        .map(str::to_string)
}

fn looks_like_email(token: &str) -> bool {
    let mut parts = token.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
