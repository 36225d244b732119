use std::env;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub persistence_backend: PersistenceBackend,
    pub assemblyai_api_key: String,
    pub assemblyai_base_url: String,
    pub groq_api_key: String,
    pub groq_base_url: String,
    pub groq_model: String,
    pub twilio_account_sid: String,
    pub twilio_api_key: String,
    pub twilio_api_secret: String,
    pub frontend_url: String,
    pub sweeper_enabled: bool,
    pub sweeper_interval_seconds: u64,
    pub server_port: u16,
}

fn optional_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using default", name);
        default.to_string()
    })
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: optional_var("SUPABASE_URL"),
            supabase_anon_key: optional_var("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_service_role_key: optional_var("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: optional_var("SUPABASE_JWT_SECRET"),
            persistence_backend: match env::var("PERSISTENCE_BACKEND").as_deref() {
                Ok("memory") => PersistenceBackend::Memory,
                _ => PersistenceBackend::Supabase,
            },
            assemblyai_api_key: optional_var("ASSEMBLYAI_API_KEY"),
            assemblyai_base_url: var_or("ASSEMBLYAI_BASE_URL", "https://api.assemblyai.com"),
            groq_api_key: optional_var("GROQ_API_KEY"),
            groq_base_url: var_or("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            groq_model: var_or("GROQ_MODEL", "openai/gpt-oss-120b"),
            twilio_account_sid: optional_var("TWILIO_ACCOUNT_SID"),
            twilio_api_key: optional_var("TWILIO_API_KEY"),
            twilio_api_secret: optional_var("TWILIO_API_SECRET"),
            frontend_url: var_or("FRONTEND_URL", "http://localhost:5173"),
            sweeper_enabled: env::var("SWEEPER_ENABLED")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
            sweeper_interval_seconds: env::var("SWEEPER_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_transcription_configured() {
            warn!("Transcription disabled: recordings will close meetings without transcripts");
        }
        if !config.is_llm_configured() {
            warn!("LLM disabled: transcripts will be stored without AI notes");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        match self.persistence_backend {
            PersistenceBackend::Memory => !self.supabase_jwt_secret.is_empty(),
            PersistenceBackend::Supabase => {
                !self.supabase_url.is_empty()
                    && !self.supabase_anon_key.is_empty()
                    && !self.supabase_jwt_secret.is_empty()
            }
        }
    }

    pub fn is_transcription_configured(&self) -> bool {
        !self.assemblyai_api_key.is_empty() && !self.assemblyai_base_url.is_empty()
    }

    pub fn is_llm_configured(&self) -> bool {
        !self.groq_api_key.is_empty() && !self.groq_base_url.is_empty()
    }

    pub fn is_video_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_api_key.is_empty()
            && !self.twilio_api_secret.is_empty()
    }

    /// Key used for server-side PostgREST calls. Falls back to the anon key when
    /// no service role key is configured.
    pub fn supabase_server_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> AppConfig {
        AppConfig {
            supabase_url: String::new(),
            supabase_anon_key: "anon".to_string(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            persistence_backend: PersistenceBackend::Supabase,
            assemblyai_api_key: String::new(),
            assemblyai_base_url: "https://api.assemblyai.com".to_string(),
            groq_api_key: String::new(),
            groq_base_url: "https://api.groq.com/openai/v1".to_string(),
            groq_model: "openai/gpt-oss-120b".to_string(),
            twilio_account_sid: String::new(),
            twilio_api_key: String::new(),
            twilio_api_secret: String::new(),
            frontend_url: "http://localhost:5173".to_string(),
            sweeper_enabled: true,
            sweeper_interval_seconds: 60,
            server_port: 3000,
        }
    }

    #[test]
    fn test_feature_predicates_follow_credentials() {
        let mut config = blank();
        assert!(!config.is_transcription_configured());
        assert!(!config.is_llm_configured());
        assert!(!config.is_video_configured());

        config.assemblyai_api_key = "aai".to_string();
        config.groq_api_key = "gsk".to_string();
        config.twilio_account_sid = "AC1".to_string();
        config.twilio_api_key = "SK1".to_string();
        config.twilio_api_secret = "secret".to_string();

        assert!(config.is_transcription_configured());
        assert!(config.is_llm_configured());
        assert!(config.is_video_configured());
    }

    #[test]
    fn test_server_key_falls_back_to_anon_key() {
        let mut config = blank();
        assert_eq!(config.supabase_server_key(), "anon");

        config.supabase_service_role_key = "service".to_string();
        assert_eq!(config.supabase_server_key(), "service");
    }

    #[test]
    fn test_memory_backend_only_needs_jwt_secret() {
        let mut config = blank();
        config.persistence_backend = PersistenceBackend::Memory;
        assert!(!config.is_configured());

        config.supabase_jwt_secret = "secret".to_string();
        assert!(config.is_configured());
    }
}
