//! Horizon REST API client

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::InventoryService;
use crate::config::ProviderConfig;
use crate::models::{
    BulkOutcome, CreatedPool, EntitlementSet, RemoteCreateRequest, RemotePool,
    RemoteUpdateRequest,
};
use crate::{Error, Result};

const LOGIN_PATH: &str = "/rest/login";
const POOLS_V1: &str = "/rest/inventory/v1/desktop-pools";
const POOLS_V5: &str = "/rest/inventory/v5/desktop-pools";
const ENTITLEMENTS_V1: &str = "/rest/entitlements/v1/desktop-pools";

#[derive(Serialize)]
struct LoginRequest<'a> {
    domain: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntitlementSpec {
    id: String,
    #[serde(default)]
    ad_user_or_group_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    #[serde(default)]
    id: Option<String>,
    status_code: u16,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    error_key: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiError>,
}

fn join_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .filter_map(|e| e.error_message.as_deref().or(e.error_key.as_deref()))
        .collect::<Vec<_>>()
        .join("; ")
}

fn transport(err: reqwest::Error) -> Error {
    Error::Transport(err.to_string())
}

/// Authenticated client for one Horizon connection server
#[derive(Debug, Clone)]
pub struct HorizonClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HorizonClient {
    /// Log in with the configured credentials and keep the bearer token
    pub async fn login(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(!config.ssl_verify);
        if let Some(timeout) = config.call_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(transport)?;
        let base_url = config.base_url();

        let response = http
            .post(format!("{base_url}{LOGIN_PATH}"))
            .json(&LoginRequest {
                domain: &config.domain,
                username: &config.username,
                password: &config.password,
            })
            .send()
            .await
            .map_err(transport)?;
        let login: LoginResponse = decode(response).await?;

        tracing::info!(host = %config.host, user = %config.username, "logged in to Horizon");
        Ok(Self {
            http,
            base_url,
            token: login.access_token,
        })
    }

    /// Use a token obtained elsewhere
    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "horizon request");
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn bulk(
        &self,
        method: Method,
        pool_id: &str,
        refs: &EntitlementSet,
    ) -> Result<BulkOutcome> {
        let body = [EntitlementSpec {
            id: pool_id.to_string(),
            ad_user_or_group_ids: refs.to_vec(),
        }];
        let response = self
            .request(method, ENTITLEMENTS_V1)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let results: Vec<BulkItemResult> = decode(response).await?;

        let failure = results
            .iter()
            .filter(|r| r.id.as_deref().map_or(true, |id| id == pool_id))
            .find(|r| !(200..300).contains(&r.status_code));

        Ok(match failure {
            None => BulkOutcome::all_applied(refs),
            Some(result) => {
                let reason = match join_errors(&result.errors) {
                    reason if reason.is_empty() => format!("HTTP {}", result.status_code),
                    reason => reason,
                };
                BulkOutcome {
                    applied: EntitlementSet::new(),
                    rejected: refs
                        .iter()
                        .map(|identity| (identity.to_string(), reason.clone()))
                        .collect::<BTreeMap<_, _>>(),
                }
            }
        })
    }
}

/// Map a non-2xx response to the crate error taxonomy
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| join_errors(&body.errors))
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(text);

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(url));
    }
    tracing::warn!(status = status.as_u16(), %url, "horizon rejected request");
    Err(Error::rejection(status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    check(response).await?.json().await.map_err(transport)
}

#[async_trait]
impl InventoryService for HorizonClient {
    async fn create_pool(&self, request: &RemoteCreateRequest) -> Result<CreatedPool> {
        let response = self
            .request(Method::POST, POOLS_V1)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn get_pool(&self, id: &str) -> Result<RemotePool> {
        let response = self
            .request(Method::GET, &format!("{POOLS_V5}/{id}"))
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn update_pool(&self, id: &str, request: &RemoteUpdateRequest) -> Result<()> {
        let response = self
            .request(Method::PUT, &format!("{POOLS_V1}/{id}"))
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(drop)
    }

    async fn delete_pool(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("{POOLS_V1}/{id}"))
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(drop)
    }

    async fn get_entitlements(&self, pool_id: &str) -> Result<EntitlementSet> {
        let response = self
            .request(Method::GET, &format!("{ENTITLEMENTS_V1}/{pool_id}"))
            .send()
            .await
            .map_err(transport)?;
        let spec: EntitlementSpec = decode(response).await?;
        Ok(spec.ad_user_or_group_ids.into_iter().collect())
    }

    async fn bulk_add_entitlements(
        &self,
        pool_id: &str,
        refs: &EntitlementSet,
    ) -> Result<BulkOutcome> {
        self.bulk(Method::POST, pool_id, refs).await
    }

    async fn bulk_remove_entitlements(
        &self,
        pool_id: &str,
        refs: &EntitlementSet,
    ) -> Result<BulkOutcome> {
        self.bulk(Method::DELETE, pool_id, refs).await
    }
}
