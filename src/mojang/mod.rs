//! Signed skin lookup against the Mojang profile and session services.
//!
//! Two calls: the username resolves to a profile id, then the session
//! service returns the profile with its signed `textures` property.

use crate::config::HttpConfig;
use crate::http::{HttpRequest, HttpResponse, HttpType, SecureFetchClient};
use crate::property::{PropertyRecord, TEXTURES_NAME};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Mojang endpoints. Overridable for mirrors.
#[derive(Debug, Clone, Deserialize)]
pub struct MojangConfig {
    /// Username lookup, the name is appended
    #[serde(default = "default_profile_url")]
    pub profile_url: String,
    /// Session profile lookup, the id is appended
    #[serde(default = "default_session_url")]
    pub session_url: String,
}

fn default_profile_url() -> String {
    "https://api.mojang.com/users/profiles/minecraft/".to_string()
}

fn default_session_url() -> String {
    "https://sessionserver.mojang.com/session/minecraft/profile/".to_string()
}

impl Default for MojangConfig {
    fn default() -> Self {
        Self {
            profile_url: default_profile_url(),
            session_url: default_session_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SessionProfile {
    #[serde(default)]
    properties: Vec<PropertyRecord>,
}

/// Fetches signed textures of premium accounts.
#[derive(Clone)]
pub struct MojangFetcher {
    client: SecureFetchClient,
    config: MojangConfig,
    user_agent: String,
    timeout_ms: u64,
}

impl MojangFetcher {
    pub fn new(client: SecureFetchClient, config: MojangConfig, http: &HttpConfig) -> Self {
        Self {
            client,
            config,
            user_agent: http.user_agent.clone(),
            timeout_ms: http.timeout_ms,
        }
    }

    /// Signed textures of the account named `name`, or None when no such account exists.
    pub async fn fetch_profile(&self, name: &str) -> Result<Option<PropertyRecord>> {
        let Some(id) = self.fetch_id(name).await? else {
            return Ok(None);
        };
        self.fetch_textures(&id).await
    }

    /// Profile id (undashed UUID) of the account named `name`.
    pub async fn fetch_id(&self, name: &str) -> Result<Option<String>> {
        if !is_valid_username(name) {
            return Err(anyhow!("invalid player name '{}'", name));
        }

        let url = format!("{}{}", self.config.profile_url, name);
        let response = self.get(&url).await?;
        if is_not_found(&response) {
            debug!(player = %name, "No Mojang account");
            return Ok(None);
        }
        check_response_status(&response)?;

        let profile: ProfileId =
            serde_json::from_str(&response.body).context("Failed to parse profile id response")?;
        Ok(Some(profile.id))
    }

    /// Signed textures of the profile `id`.
    pub async fn fetch_textures(&self, id: &str) -> Result<Option<PropertyRecord>> {
        let url = format!("{}{}?unsigned=false", self.config.session_url, id);
        let response = self.get(&url).await?;
        if is_not_found(&response) {
            return Ok(None);
        }
        check_response_status(&response)?;

        let profile: SessionProfile =
            serde_json::from_str(&response.body).context("Failed to parse session profile response")?;
        Ok(profile
            .properties
            .into_iter()
            .find(|property| property.name() == TEXTURES_NAME))
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let request = HttpRequest::get(url, HttpType::Json, self.user_agent.as_str())
            .with_timeout_ms(self.timeout_ms);
        self.client
            .execute(request)
            .await
            .context(format!("Request to {} failed", url))
    }
}

/// Mojang answers 204 (older API) or 404 for unknown names.
fn is_not_found(response: &HttpResponse) -> bool {
    response.status == 204 || response.status == 404
}

fn check_response_status(response: &HttpResponse) -> Result<()> {
    match response.status {
        429 => Err(anyhow!("Mojang rate limit exceeded")),
        s if !response.is_success() => Err(anyhow!("Mojang API error: HTTP {}", s)),
        _ => Ok(()),
    }
}

/// Minecraft usernames: 1-16 chars of letters, digits and underscore.
fn is_valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 16
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::new_runtime_config;
    use crate::http::{FixedTransport, TransportError};
    use std::sync::Arc;

    const ID: &str = "069a79f444e94726a5befca90e38aaf5";

    fn fetcher(transport: Arc<FixedTransport>) -> MojangFetcher {
        let runtime_config = new_runtime_config();
        runtime_config.write().unwrap().no_connections = false;
        let client = SecureFetchClient::with_transport(runtime_config, transport);
        MojangFetcher::new(client, MojangConfig::default(), &HttpConfig::default())
    }

    fn profile_url(name: &str) -> String {
        format!("{}{}", default_profile_url(), name)
    }

    fn session_url(id: &str) -> String {
        format!("{}{}?unsigned=false", default_session_url(), id)
    }

    #[tokio::test]
    async fn test_fetch_profile() {
        let transport = Arc::new(FixedTransport::new());
        transport
            .route(profile_url("Notch"), 200, format!(r#"{{"id":"{}","name":"Notch"}}"#, ID))
            .route(
                session_url(ID),
                200,
                format!(
                    r#"{{"id":"{}","name":"Notch","properties":[{{"name":"textures","value":"ewogIC","signature":"c2ln"}}]}}"#,
                    ID
                ),
            );

        let record = fetcher(transport.clone()).fetch_profile("Notch").await.unwrap().unwrap();

        assert_eq!(record, PropertyRecord::new("textures", "ewogIC", "c2ln"));
        assert_eq!(transport.opened(), 2);
    }

    #[tokio::test]
    async fn test_unknown_name() {
        let transport = Arc::new(FixedTransport::new());
        transport.route(profile_url("Nobody"), 204, "");

        let record = fetcher(transport.clone()).fetch_profile("Nobody").await.unwrap();

        assert!(record.is_none());
        assert_eq!(transport.opened(), 1);
    }

    #[tokio::test]
    async fn test_unknown_name_404() {
        let transport = Arc::new(FixedTransport::new());
        transport.route(
            profile_url("Nobody"),
            404,
            r#"{"errorMessage":"Couldn't find any profile with name Nobody"}"#,
        );

        assert!(fetcher(transport).fetch_profile("Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_without_textures() {
        let transport = Arc::new(FixedTransport::new());
        transport.route(session_url(ID), 200, format!(r#"{{"id":"{}","name":"Notch","properties":[]}}"#, ID));

        assert!(fetcher(transport).fetch_textures(ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let transport = Arc::new(FixedTransport::new());
        transport.route(profile_url("Notch"), 429, r#"{"error":"TooManyRequestsException"}"#);

        let err = fetcher(transport).fetch_profile("Notch").await.unwrap_err();
        assert!(err.to_string().contains("rate limit"));
    }

    #[tokio::test]
    async fn test_invalid_name_is_not_requested() {
        let transport = Arc::new(FixedTransport::new());

        let err = fetcher(transport.clone()).fetch_profile("../admin").await.unwrap_err();
        assert!(err.to_string().contains("invalid player name"));
        assert_eq!(transport.opened(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_is_kept_as_source() {
        let transport = Arc::new(FixedTransport::new());

        let err = fetcher(transport).fetch_profile("Notch").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<TransportError>(), Some(TransportError::Io(_))));
    }

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("Notch"));
        assert!(is_valid_username("jeb_"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("a_name_that_is_too_long"));
        assert!(!is_valid_username("bad name"));
    }
}
