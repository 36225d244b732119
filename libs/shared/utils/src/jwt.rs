use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

const PLATFORM_ROLES: [&str; 3] = ["doctor", "patient", "admin"];

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, String> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        debug!("Failed to decode {}: {}", what, e);
        format!("Invalid {} encoding", what)
    })
}

fn metadata_role(metadata: Option<&Value>) -> Option<String> {
    metadata
        .and_then(|m| m.get("role"))
        .and_then(Value::as_str)
        .filter(|role| PLATFORM_ROLES.contains(role))
        .map(str::to_string)
}

/// Platform role of the caller. Supabase puts its own database role
/// ("authenticated") in the top-level claim, so the metadata wins.
fn resolve_role(claims: &JwtClaims) -> Option<String> {
    metadata_role(claims.app_metadata.as_ref())
        .or_else(|| metadata_role(claims.user_metadata.as_ref()))
        .or_else(|| claims.role.clone())
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }
    let (header_b64, claims_b64, signature_b64) = (parts[0], parts[1], parts[2]);

    let header: Value = serde_json::from_slice(&decode_segment(header_b64, "header")?)
        .map_err(|_| "Invalid header format".to_string())?;
    if header.get("alg").and_then(Value::as_str) != Some("HS256") {
        return Err("Unsupported token algorithm".to_string());
    }

    let signature = decode_segment(signature_b64, "signature")?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims: JwtClaims = serde_json::from_slice(&decode_segment(claims_b64, "claims")?)
        .map_err(|e| {
            debug!("Failed to parse claims: {}", e);
            "Invalid claims format".to_string()
        })?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        role: resolve_role(&claims),
        id: claims.sub,
        email: claims.email,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn sign(header: Value, payload: Value) -> String {
        let input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        );
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(input.as_bytes());
        format!("{}.{}", input, URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_token_yields_user() {
        let test_user = TestUser::doctor("doc@example.com");
        let token = JwtTestUtils::create_test_token(&test_user, SECRET, Some(1));

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, test_user.id.to_string());
        assert!(user.is_doctor());
    }

    #[test]
    fn test_rejects_expired_and_forged_tokens() {
        let test_user = TestUser::patient("pat@example.com");

        let expired = JwtTestUtils::create_expired_token(&test_user, SECRET);
        assert_eq!(validate_token(&expired, SECRET).unwrap_err(), "Token expired");

        let forged = JwtTestUtils::create_invalid_signature_token(&test_user);
        assert_eq!(
            validate_token(&forged, SECRET).unwrap_err(),
            "Invalid token signature"
        );

        assert!(validate_token(&JwtTestUtils::create_malformed_token(), SECRET).is_err());
    }

    #[test]
    fn test_metadata_role_overrides_database_role() {
        let token = sign(
            json!({"alg": "HS256", "typ": "JWT"}),
            json!({
                "sub": "2b7c7b0e-8d7e-4f7e-9a53-0d1c3f0b2a11",
                "role": "authenticated",
                "user_metadata": {"role": "patient", "name": "Sam"},
                "exp": Utc::now().timestamp() + 60
            }),
        );

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.role.as_deref(), Some("patient"));
        assert_eq!(user.display_name(), "Sam");
    }

    #[test]
    fn test_rejects_non_hs256_header() {
        let token = sign(
            json!({"alg": "none"}),
            json!({"sub": "x", "exp": Utc::now().timestamp() + 60}),
        );
        assert_eq!(
            validate_token(&token, SECRET).unwrap_err(),
            "Unsupported token algorithm"
        );
    }
}
