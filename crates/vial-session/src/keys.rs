//! Storage key formats.
//!
//! ```text
//! [<namespace>:]session:<id>
//! [<namespace>:]user:<user-id>
//! ```

/// Separator between key segments.
pub const DELIMITER: char = ':';

fn build_key(namespace: Option<&str>, kind: &str, id: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}{DELIMITER}{kind}{DELIMITER}{id}"),
        _ => format!("{kind}{DELIMITER}{id}"),
    }
}

/// Key of the hash holding a session's fields.
pub fn session_key(namespace: Option<&str>, id: &str) -> String {
    build_key(namespace, "session", id)
}

/// Key of the set holding every session key bound to a user.
pub fn user_key(namespace: Option<&str>, user: &str) -> String {
    build_key(namespace, "user", user)
}

/// Trailing segment of a storage key, i.e. the session identifier.
pub fn id_from_key(key: &str) -> &str {
    key.rsplit(DELIMITER).next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key() {
        assert_eq!(session_key(None, "abc"), "session:abc");
        assert_eq!(session_key(Some("vial"), "abc"), "vial:session:abc");
        assert_eq!(session_key(Some(""), "abc"), "session:abc");
    }

    #[test]
    fn test_user_key() {
        assert_eq!(user_key(None, "12345"), "user:12345");
        assert_eq!(user_key(Some("app"), "12345"), "app:user:12345");
    }

    #[test]
    fn test_id_from_key() {
        assert_eq!(id_from_key("vial:session:abc="), "abc=");
        assert_eq!(id_from_key("session:xyz"), "xyz");
        assert_eq!(id_from_key("plain"), "plain");
    }
}
