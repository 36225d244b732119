//! Fixtures shared by the cells' integration tests.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, PersistenceBackend};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub assemblyai_base_url: String,
    pub groq_base_url: String,
    pub frontend_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "teddybridge-test-secret-long-enough-for-hs256".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            assemblyai_base_url: "http://localhost:54322".to_string(),
            groq_base_url: "http://localhost:54323/openai/v1".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

impl TestConfig {
    /// Points the PostgREST client at a mock server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    /// Every external service configured, nothing reachable.
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            persistence_backend: PersistenceBackend::Supabase,
            assemblyai_api_key: "test-assemblyai-key".to_string(),
            assemblyai_base_url: self.assemblyai_base_url.clone(),
            groq_api_key: "test-groq-key".to_string(),
            groq_base_url: self.groq_base_url.clone(),
            groq_model: "openai/gpt-oss-120b".to_string(),
            twilio_account_sid: "ACtest".to_string(),
            twilio_api_key: "SKtest".to_string(),
            twilio_api_secret: "test-twilio-secret".to_string(),
            frontend_url: self.frontend_url.clone(),
            sweeper_enabled: false,
            sweeper_interval_seconds: 60,
            server_port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// A signed-in account. The platform role travels in `user_metadata`, the
/// way Supabase issues it.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub name: Option<String>,
}

impl TestUser {
    pub fn doctor(email: &str) -> Self {
        Self::with_id(Uuid::new_v4(), email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::with_id(Uuid::new_v4(), email, "patient")
    }

    /// A test user whose id is an existing profile's `user_id`.
    pub fn with_id(id: Uuid, email: &str, role: &str) -> Self {
        Self {
            id,
            email: email.to_string(),
            role: role.to_string(),
            name: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    fn user_metadata(&self) -> Value {
        match &self.name {
            Some(name) => json!({ "role": self.role, "name": name }),
            None => json!({ "role": self.role }),
        }
    }

    /// The `User` the auth middleware would produce for this account.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.to_string(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: Some(self.user_metadata()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let claims = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "aud": "authenticated",
            "user_metadata": user.user_metadata(),
            "iat": now.timestamp(),
            "exp": exp.timestamp(),
        });

        Self::sign(&claims, secret)
    }

    pub fn sign(claims: &Value, secret: &str) -> String {
        let header = json!({ "alg": "HS256", "typ": "JWT" });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "not-the-configured-secret", None)
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}
