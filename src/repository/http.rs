// src/repository/http.rs

//! CKAN-style datalake client.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::errors::{PropagatorError, Result};
use crate::types::BoxFuture;

use super::metadata::{DatalakeMetadata, ResourceMetadata};
use super::RepositoryUploader;

/// Envelope of every CKAN action response.
#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpRepository {
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Read the bearer token from `token_env`.
    pub fn from_env(base_url: &str, token_env: &str, timeout: Duration) -> Result<Self> {
        let token = std::env::var(token_env).map_err(|_| {
            PropagatorError::ConfigError(format!(
                "repository token variable '{token_env}' is not set"
            ))
        })?;
        Self::new(base_url, token, timeout)
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/action/{action}", self.base_url)
    }

    async fn read_action(action: &str, response: Response) -> Result<Option<Value>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PropagatorError::Upload(format!(
                "{action} returned {status}: {body}"
            )));
        }
        let parsed: ActionResponse = response
            .json()
            .await
            .with_context(|| format!("parsing {action} response"))?;
        if !parsed.success {
            return Err(PropagatorError::Upload(format!(
                "{action} was not successful: {}",
                parsed.error.unwrap_or(Value::Null)
            )));
        }
        Ok(parsed.result)
    }

    async fn create(&self, metadata: &DatalakeMetadata) -> Result<String> {
        let response = self
            .client
            .post(self.action_url("package_create"))
            .bearer_auth(&self.token)
            .json(metadata)
            .send()
            .await
            .map_err(|e| PropagatorError::Upload(format!("package_create: {e}")))?;

        let result = Self::read_action("package_create", response).await?;
        let id = result
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PropagatorError::Upload("package_create response has no package id".to_string())
            })?;
        info!(package_id = %id, request_code = %metadata.request_code(), "metadata created");
        Ok(id.to_string())
    }

    async fn upload(
        &self,
        package_id: &str,
        file: &Path,
        resource: &ResourceMetadata,
    ) -> Result<Option<String>> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| PropagatorError::Upload(format!("reading {file:?}: {e}")))?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| resource.name.clone());

        let mut form = Form::new();
        for (key, value) in resource.form_fields(package_id) {
            form = form.text(key, value);
        }
        form = form.part("upload", Part::bytes(bytes).file_name(file_name));

        debug!(package_id, path = ?file, "uploading resource");
        let response = self
            .client
            .post(self.action_url("resource_create"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PropagatorError::Upload(format!("resource_create: {e}")))?;

        let result = Self::read_action("resource_create", response).await?;
        let url = result
            .as_ref()
            .and_then(|r| r.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if url.is_none() {
            warn!(package_id, path = ?file, "resource uploaded without a url");
        }
        Ok(url)
    }

    async fn delete(&self, package_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.action_url("package_delete"))
            .bearer_auth(&self.token)
            .json(&json!({ "id": package_id }))
            .send()
            .await
            .map_err(|e| PropagatorError::Upload(format!("package_delete: {e}")))?;
        Self::read_action("package_delete", response).await?;
        info!(package_id, "metadata deleted");
        Ok(())
    }
}

impl RepositoryUploader for HttpRepository {
    fn create_metadata<'a>(
        &'a self,
        metadata: &'a DatalakeMetadata,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.create(metadata))
    }

    fn upload_resource<'a>(
        &'a self,
        package_id: &'a str,
        file: &'a Path,
        resource: &'a ResourceMetadata,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(self.upload(package_id, file, resource))
    }

    fn delete_metadata<'a>(&'a self, package_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.delete(package_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_urls_ignore_trailing_slash() {
        let repo =
            HttpRepository::new("https://datalake.example/", "t".into(), Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            repo.action_url("package_create"),
            "https://datalake.example/api/action/package_create"
        );
    }

    #[test]
    fn missing_token_variable_is_a_config_error() {
        let err = HttpRepository::from_env(
            "https://datalake.example",
            "PROPAGATOR_TEST_TOKEN_THAT_IS_NOT_SET",
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, PropagatorError::ConfigError(_)));
    }
}
