use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

use lease_desk::workflows::tenancy::{
    Agreement, AgreementClient, AgreementId, AgreementStatus, CreateAgreementRequest,
    CreateTenancyRequest, DirectoryClient, ResourceError, SignRequest, SignerEntry, Tenancy,
    TenancyAgreementRef, TenancyClient, TenancyId, TenancyStatus, TenantQuery, TenantSummary,
    UnitId, UnitSummary, UserId, UserIdentity, WizardNotice, WizardNotifier,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Seeded in-memory stand-in for the property backend. Serves the wizard
/// when no real backend URL is configured, and backs the terminal demo.
pub(crate) struct InMemoryLeasingBackend {
    agreements: Mutex<HashMap<AgreementId, Agreement>>,
    tenancies: Mutex<Vec<Tenancy>>,
    units: Vec<UnitSummary>,
    tenants: Vec<TenantSummary>,
    sequence: AtomicU64,
}

impl Default for InMemoryLeasingBackend {
    fn default() -> Self {
        Self {
            agreements: Mutex::new(HashMap::new()),
            tenancies: Mutex::new(Vec::new()),
            units: seed_units(),
            tenants: seed_tenants(),
            sequence: AtomicU64::new(1),
        }
    }
}

impl InMemoryLeasingBackend {
    fn next_id(&self, prefix: &str) -> String {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{id:06}")
    }

    pub(crate) fn agreement_count(&self) -> usize {
        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .len()
    }

    /// Drop an agreement as if another actor deleted it server side.
    /// Used by the demo to show the wizard's recovery path.
    pub(crate) fn delete_agreement(&self, id: &AgreementId) {
        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .remove(id);
    }
}

#[async_trait]
impl AgreementClient for InMemoryLeasingBackend {
    async fn create_agreement(
        &self,
        request: CreateAgreementRequest,
    ) -> Result<Agreement, ResourceError> {
        if request.clauses.is_empty() {
            return Err(ResourceError::Validation(
                "an agreement needs at least one clause".to_string(),
            ));
        }

        let id = AgreementId(self.next_id("agr"));
        let mut signers = request.signers;
        if let Some(data) = &request.tenancy_data {
            for user in [&data.owner_id, &data.tenant_id] {
                if !signers.iter().any(|signer| &signer.user_id == user) {
                    signers.push(SignerEntry::pending(user.clone()));
                }
            }
        }

        let now = Utc::now();
        let agreement = Agreement {
            id: id.clone(),
            template_name: request.template_name,
            state_code: request.state_code,
            clauses: request.clauses,
            pdf_url: None,
            version: Some(1),
            created_by: request.created_by,
            tenancy_id: request.tenancy_id,
            tenant_id: request.tenancy_data.as_ref().map(|d| d.tenant_id.clone()),
            status: request.status.unwrap_or(AgreementStatus::PendingSignature),
            signers,
            last_signed_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };

        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .insert(id, agreement.clone());
        Ok(agreement)
    }

    async fn agreement_by_id(&self, id: &AgreementId) -> Result<Agreement, ResourceError> {
        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .get(id)
            .cloned()
            .ok_or(ResourceError::NotFound)
    }

    async fn sign_agreement(
        &self,
        id: &AgreementId,
        request: SignRequest,
    ) -> Result<Agreement, ResourceError> {
        let mut guard = self.agreements.lock().expect("agreement mutex poisoned");
        let agreement = guard.get_mut(id).ok_or(ResourceError::NotFound)?;

        if agreement.status == AgreementStatus::Cancelled {
            return Err(ResourceError::Validation(
                "a cancelled agreement cannot be signed".to_string(),
            ));
        }

        let signed_at = Utc::now();
        match agreement
            .signers
            .iter_mut()
            .find(|signer| signer.user_id == request.user_id)
        {
            Some(signer) => {
                signer.name = request.name;
                signer.method = request.method;
                signer.signed_at = Some(signed_at);
            }
            None => agreement.signers.push(SignerEntry {
                user_id: request.user_id,
                name: request.name,
                method: request.method,
                signed_at: Some(signed_at),
            }),
        }

        // The document completes once no signature is outstanding.
        if agreement.signers.iter().all(SignerEntry::has_signed) {
            agreement.status = AgreementStatus::Signed;
        }
        agreement.last_signed_at = Some(signed_at);
        agreement.updated_at = Some(signed_at);

        Ok(agreement.clone())
    }
}

#[async_trait]
impl TenancyClient for InMemoryLeasingBackend {
    async fn create_tenancy(
        &self,
        request: CreateTenancyRequest,
    ) -> Result<Tenancy, ResourceError> {
        let agreement = match &request.agreement_id {
            Some(agreement_id) => {
                let guard = self.agreements.lock().expect("agreement mutex poisoned");
                Some(guard.get(agreement_id).cloned().ok_or(ResourceError::NotFound)?)
            }
            None => None,
        };

        let now = Utc::now();
        let mut guard = self.tenancies.lock().expect("tenancy mutex poisoned");
        let tenancy = Tenancy {
            id: TenancyId(self.next_id("ten")),
            unit_id: request.unit_id,
            owner_id: request.owner_id,
            tenant_id: request.tenant_id,
            agreement: agreement.map(|agreement| TenancyAgreementRef {
                agreement_id: Some(agreement.id),
                pdf_url: agreement.pdf_url,
                version: agreement.version,
                signed_at: agreement.last_signed_at,
            }),
            rent: request.rent,
            deposit: request.deposit,
            status: request.status.unwrap_or(TenancyStatus::Upcoming),
            created_at: Some(now),
            updated_at: Some(now),
        };
        guard.push(tenancy.clone());
        Ok(tenancy)
    }
}

#[async_trait]
impl DirectoryClient for InMemoryLeasingBackend {
    async fn units_for_owner(&self, _owner: &UserId) -> Result<Vec<UnitSummary>, ResourceError> {
        Ok(self.units.clone())
    }

    async fn tenants(&self, query: TenantQuery) -> Result<Vec<TenantSummary>, ResourceError> {
        let mut tenants = self.tenants.clone();
        if let Some(search) = query.search.as_deref() {
            let needle = search.to_ascii_lowercase();
            tenants.retain(|tenant| tenant.full_name().to_ascii_lowercase().contains(&needle));
        }
        if let Some(limit) = query.limit {
            tenants.truncate(limit as usize);
        }
        Ok(tenants)
    }
}

/// Notifier that renders wizard notices as log lines.
#[derive(Default, Clone)]
pub(crate) struct TracingNotifier;

impl WizardNotifier for TracingNotifier {
    fn notify(&self, notice: WizardNotice) {
        match &notice {
            WizardNotice::WizardReset { .. } | WizardNotice::OperationFailed { .. } => {
                warn!(message = %notice.message(), "wizard notice");
            }
            _ => info!(message = %notice.message(), "wizard notice"),
        }
    }
}

/// Notifier that collects notices for later rendering (demo output).
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<WizardNotice>>,
}

impl RecordingNotifier {
    pub(crate) fn events(&self) -> Vec<WizardNotice> {
        self.notices.lock().expect("notice mutex poisoned").clone()
    }
}

impl WizardNotifier for RecordingNotifier {
    fn notify(&self, notice: WizardNotice) {
        self.notices
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
    }
}

/// The landlord identity the service operates as until a session layer
/// provides real users.
pub(crate) fn service_user() -> UserIdentity {
    UserIdentity {
        id: UserId("user-000001".to_string()),
        first_name: "Avery".to_string(),
        last_name: "Collins".to_string(),
    }
}

fn seed_units() -> Vec<UnitSummary> {
    vec![
        UnitSummary {
            id: UnitId("unit-000001".to_string()),
            title: "Maple Court 2B".to_string(),
            address_line: Some("12 Maple Court, Des Moines, IA 50309".to_string()),
        },
        UnitSummary {
            id: UnitId("unit-000002".to_string()),
            title: "Riverfront Loft 5A".to_string(),
            address_line: Some("401 River St, Des Moines, IA 50316".to_string()),
        },
    ]
}

fn seed_tenants() -> Vec<TenantSummary> {
    vec![
        TenantSummary {
            id: UserId("user-000002".to_string()),
            first_name: "Priya".to_string(),
            last_name: "Sharma".to_string(),
            email: Some("priya.sharma@example.com".to_string()),
        },
        TenantSummary {
            id: UserId("user-000003".to_string()),
            first_name: "Marcus".to_string(),
            last_name: "Webb".to_string(),
            email: Some("marcus.webb@example.com".to_string()),
        },
    ]
}
