//! Email address syntax validation.
//!
//! Stricter than the HTML5 `type=email` rule:
//! - no consecutive dots anywhere
//! - local part at most 64 characters, no leading or trailing dot
//! - whole address at most 254 characters
//! - TLD is letters only, at least two of them
//! - no domain label starts or ends with a hyphen

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;

/// Check whether `value` is an acceptable email address.
///
/// Leading and trailing whitespace is ignored. Never panics.
pub fn is_valid_email(value: Option<&str>) -> bool {
    let Some(email) = value.map(str::trim) else {
        return false;
    };

    if email.is_empty() || email.chars().count() > MAX_ADDRESS_LEN {
        return false;
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    is_valid_local(local) && is_valid_domain(domain)
}

fn is_valid_local(local: &str) -> bool {
    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        return false;
    }

    if !local
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'+' | b'_' | b'-'))
    {
        return false;
    }

    if local.contains("..") {
        return false;
    }

    // First and last characters must be alphanumeric; this also rules out
    // a leading or trailing dot.
    let bytes = local.as_bytes();
    bytes[0].is_ascii_alphanumeric() && bytes[bytes.len() - 1].is_ascii_alphanumeric()
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.starts_with(['-', '.']) || domain.ends_with(['-', '.']) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    // An empty label also covers ".." in the domain.
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    });
    if !labels_ok {
        return false;
    }

    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic())
}
