use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{
    Agreement, AgreementId, AgreementStatus, Clause, DepositTerms, RentTerms, SignatureMethod,
    SignerEntry, Tenancy, TenancyId, TenancyStatus, TenantSummary, UnitId, UnitSummary, UserId,
};

/// Failure taxonomy shared by every backend resource operation. A missing
/// resource must stay distinguishable from every other failure: it is the
/// one condition the wizard recovers from automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("resource not found")]
    NotFound,
    #[error("request rejected: {0}")]
    Validation(String),
    #[error("backend error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
}

impl ResourceError {
    /// Map an HTTP response status to an error kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            404 => ResourceError::NotFound,
            400 | 422 => ResourceError::Validation(message.into()),
            _ => ResourceError::Server {
                status,
                message: message.into(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound)
    }
}

/// Inline tenancy data sent with agreement creation when no tenancy
/// exists yet. This is the common path, since the tenancy is only
/// created after the agreement is signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedTenancy {
    pub owner_id: UserId,
    pub tenant_id: UserId,
    pub unit_id: UnitId,
    pub rent: RentTerms,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit: Option<DepositTerms>,
}

/// Payload for `POST /api/agreements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgreementRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    pub clauses: Vec<Clause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AgreementStatus>,
    #[serde(default)]
    pub signers: Vec<SignerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenancy_id: Option<TenancyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenancy_data: Option<ProposedTenancy>,
}

/// Payload for `POST /api/agreements/:id/sign`. The backend stamps
/// `signed_at` and decides when the document flips to `signed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<SignatureMethod>,
}

/// Payload for `POST /api/tenancies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenancyRequest {
    pub unit_id: UnitId,
    pub owner_id: UserId,
    pub tenant_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<AgreementId>,
    pub rent: RentTerms,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit: Option<DepositTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TenancyStatus>,
}

/// Filters for the tenant lookup on the first wizard step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Agreement resource operations. Thin request/response contract; no
/// wizard state machine logic lives behind it.
#[async_trait]
pub trait AgreementClient: Send + Sync {
    async fn create_agreement(
        &self,
        request: CreateAgreementRequest,
    ) -> Result<Agreement, ResourceError>;

    async fn agreement_by_id(&self, id: &AgreementId) -> Result<Agreement, ResourceError>;

    async fn sign_agreement(
        &self,
        id: &AgreementId,
        request: SignRequest,
    ) -> Result<Agreement, ResourceError>;
}

/// Tenancy resource operations.
#[async_trait]
pub trait TenancyClient: Send + Sync {
    async fn create_tenancy(&self, request: CreateTenancyRequest)
        -> Result<Tenancy, ResourceError>;
}

/// Read-only lookups feeding the unit/tenant pickers.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn units_for_owner(&self, owner: &UserId) -> Result<Vec<UnitSummary>, ResourceError>;

    async fn tenants(&self, query: TenantQuery) -> Result<Vec<TenantSummary>, ResourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_keeps_not_found_distinct() {
        assert!(ResourceError::from_status(404, "gone").is_not_found());
        assert_eq!(
            ResourceError::from_status(422, "bad clause"),
            ResourceError::Validation("bad clause".to_string())
        );
        assert_eq!(
            ResourceError::from_status(503, "maintenance"),
            ResourceError::Server {
                status: 503,
                message: "maintenance".to_string()
            }
        );
        assert!(!ResourceError::Network("timed out".to_string()).is_not_found());
    }
}
