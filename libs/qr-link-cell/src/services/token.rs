use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use rand::{rngs::OsRng, RngCore};

pub const TOKEN_BYTES: usize = 32;

pub fn token_ttl() -> Duration {
    Duration::hours(24)
}

/// 32 random bytes, base64url without padding (43 characters).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn link_url(frontend_url: &str, token: &str) -> String {
    format!("{}/link/{}", frontend_url.trim_end_matches('/'), token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_url_safe_and_unique() {
        let a = generate_token();
        let b = generate_token();

        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_link_url_ignores_trailing_slash() {
        assert_eq!(
            link_url("https://app.example/", "abc"),
            "https://app.example/link/abc"
        );
        assert_eq!(link_url("http://localhost:5173", "abc"), "http://localhost:5173/link/abc");
    }
}
