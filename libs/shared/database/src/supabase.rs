use anyhow::{anyhow, Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

pub const RETURN_REPRESENTATION: &str = "return=representation";
pub const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            api_key: config.supabase_server_key().to_string(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>, prefer: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key).context("Invalid Supabase API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "Prefer",
            HeaderValue::from_str(prefer).context("Invalid Prefer header")?,
        );

        // Server-side calls authenticate with the API key itself
        let bearer = auth_token.unwrap_or(&self.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .context("Invalid authorization token")?,
        );

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_prefer(method, path, auth_token, body, RETURN_REPRESENTATION)
            .await
    }

    pub async fn request_with_prefer<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        prefer: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let headers = self.get_headers(auth_token, prefer)?;

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response from {}", path))?;
        Ok(data)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
