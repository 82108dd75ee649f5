//! npm registry client, used to find the latest version of a package.

use super::error::PkgError;
use super::spec::encode_name;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Default registry URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.yarnpkg.com/";

/// Environment variable to override the registry URL.
pub const REGISTRY_ENV: &str = "LOCKSTEP_NPM_REGISTRY";

/// Registry client for fetching package metadata.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    auth_token: Option<String>,
    http: Client,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str) -> Result<Self, PkgError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PkgError::registry(format!("Invalid registry URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("lockstep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            auth_token: None,
            http,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<impl Into<String>>) -> Self {
        self.auth_token = token.map(Into::into);
        self
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the packument (package metadata) for a package.
    ///
    /// # Errors
    /// Returns an error if the request fails or the package is not found.
    pub async fn fetch_packument(&self, name: &str) -> Result<serde_json::Value, PkgError> {
        let url = self
            .base_url
            .join(&encode_name(name))
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{name}': {e}")))?;

        let mut request = self.http.get(url.as_str());
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PkgError::registry(format!("Failed to fetch '{name}': {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PkgError::registry(format!(
                "Package '{name}' not found in registry"
            )));
        }

        if !response.status().is_success() {
            return Err(PkgError::registry(format!(
                "Registry returned status {} for '{name}'",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PkgError::registry(format!("Invalid metadata for '{name}': {e}")))
    }

    /// The `latest` dist-tag of a package.
    ///
    /// # Errors
    /// Returns an error if the packument cannot be fetched or has no `latest` tag.
    pub async fn latest_version(&self, name: &str) -> Result<String, PkgError> {
        let packument = self.fetch_packument(name).await?;
        get_latest_version(&packument)
            .map(str::to_string)
            .ok_or_else(|| PkgError::registry(format!("Package '{name}' has no latest version")))
    }
}

/// Extract the latest version from a packument.
#[must_use]
pub fn get_latest_version(packument: &serde_json::Value) -> Option<&str> {
    packument.get("dist-tags")?.get("latest")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_latest_version() {
        let packument = serde_json::json!({
            "name": "has",
            "dist-tags": {
                "latest": "1.0.4",
                "next": "2.0.0-rc.0"
            }
        });

        assert_eq!(get_latest_version(&packument), Some("1.0.4"));
        assert_eq!(get_latest_version(&serde_json::json!({})), None);
    }

    #[test]
    fn test_client_creation() {
        let client = RegistryClient::new(DEFAULT_REGISTRY).unwrap();
        assert_eq!(client.base_url().as_str(), DEFAULT_REGISTRY);
    }

    #[test]
    fn test_client_invalid_url() {
        assert!(RegistryClient::new("not-a-url").is_err());
    }

    #[test]
    fn test_with_auth_token() {
        let client = RegistryClient::new(DEFAULT_REGISTRY)
            .unwrap()
            .with_auth_token(Some("secret"));
        assert_eq!(client.auth_token.as_deref(), Some("secret"));
    }
}
