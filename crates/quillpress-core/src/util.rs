//! Small shared helpers for identifiers and secrets.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a random alphanumeric identifier of `len` characters.
///
/// Used for unguessable password placeholders on seeded and imported users.
pub fn uid(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate `bytes` random bytes rendered as lowercase hex.
///
/// Client secrets use 6 bytes (12 hex characters).
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    hex::encode(buf)
}

/// Reduce a string to a filename/slug-safe form: lowercase alphanumerics
/// with runs of anything else collapsed to single dashes.
pub fn safe_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = true;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_length_and_charset() {
        let id = uid(50);
        assert_eq!(id.len(), 50);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_hex() {
        let secret = random_hex(6);
        assert_eq!(secret.len(), 12);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_safe_string() {
        assert_eq!(safe_string("My Blog!"), "my-blog");
        assert_eq!(safe_string("  Hello,   World  "), "hello-world");
        assert_eq!(safe_string("already-safe"), "already-safe");
        assert_eq!(safe_string("***"), "");
    }
}
