//! HTTP-backed implementations of the resource-client traits.
//!
//! The backend wraps successful payloads in `{ "success": true, "data": … }`
//! and failures in `{ "success": false, "error": { "message": … } }`; both
//! shapes are unwrapped here so callers only ever see domain types or a
//! `ResourceError`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::client::{
    AgreementClient, CreateAgreementRequest, CreateTenancyRequest, DirectoryClient, ResourceError,
    SignRequest, TenancyClient, TenantQuery,
};
use super::domain::{Agreement, AgreementId, Tenancy, TenantSummary, UnitSummary, UserId};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    success: Option<bool>,
    data: Option<T>,
}

/// Shared JSON transport: base URL joining, optional bearer auth, envelope
/// unwrapping, and status-to-error mapping.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ResourceError> {
        let request = self.authorized(self.http.get(self.url(path)).query(query));
        Self::execute(request).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ResourceError> {
        let request = self.authorized(self.http.post(self.url(path)).json(body));
        Self::execute(request).await
    }

    async fn execute<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<T, ResourceError> {
        let response = request
            .send()
            .await
            .map_err(|err| ResourceError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error)
                .map(|error| error.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(ResourceError::from_status(status.as_u16(), message));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|err| ResourceError::Network(err.to_string()))?;

        // Unwrap the `{success, data}` envelope when present; some routes
        // return the payload bare.
        let payload = match serde_json::from_value::<DataEnvelope<serde_json::Value>>(raw.clone()) {
            Ok(DataEnvelope {
                success: Some(true),
                data: Some(data),
            }) => data,
            _ => raw,
        };

        serde_json::from_value(payload).map_err(|err| ResourceError::Server {
            status: status.as_u16(),
            message: format!("unexpected response shape: {err}"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AgreementEnvelope {
    agreement: Agreement,
}

/// Agreement resource client against `/api/agreements`.
#[derive(Debug, Clone)]
pub struct HttpAgreementClient {
    rest: RestClient,
}

impl HttpAgreementClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl AgreementClient for HttpAgreementClient {
    async fn create_agreement(
        &self,
        request: CreateAgreementRequest,
    ) -> Result<Agreement, ResourceError> {
        let envelope: AgreementEnvelope =
            self.rest.post_json("/api/agreements", &request).await?;
        Ok(envelope.agreement)
    }

    async fn agreement_by_id(&self, id: &AgreementId) -> Result<Agreement, ResourceError> {
        let envelope: AgreementEnvelope = self
            .rest
            .get_json(&format!("/api/agreements/{}", id.0), &[])
            .await?;
        Ok(envelope.agreement)
    }

    async fn sign_agreement(
        &self,
        id: &AgreementId,
        request: SignRequest,
    ) -> Result<Agreement, ResourceError> {
        let envelope: AgreementEnvelope = self
            .rest
            .post_json(&format!("/api/agreements/{}/sign", id.0), &request)
            .await?;
        Ok(envelope.agreement)
    }
}

/// Tenancy resource client against `/api/tenancies`.
#[derive(Debug, Clone)]
pub struct HttpTenancyClient {
    rest: RestClient,
}

impl HttpTenancyClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl TenancyClient for HttpTenancyClient {
    async fn create_tenancy(
        &self,
        request: CreateTenancyRequest,
    ) -> Result<Tenancy, ResourceError> {
        self.rest.post_json("/api/tenancies", &request).await
    }
}

/// Unit and tenant lookups against `/api/units` and `/api/users`.
#[derive(Debug, Clone)]
pub struct HttpDirectoryClient {
    rest: RestClient,
}

impl HttpDirectoryClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn units_for_owner(&self, owner: &UserId) -> Result<Vec<UnitSummary>, ResourceError> {
        self.rest
            .get_json("/api/units", &[("ownerId", owner.0.clone())])
            .await
    }

    async fn tenants(&self, query: TenantQuery) -> Result<Vec<TenantSummary>, ResourceError> {
        let mut params = vec![("role", "tenant".to_string())];
        if let Some(search) = query.search {
            params.push(("search", search));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        self.rest.get_json("/api/users", &params).await
    }
}
