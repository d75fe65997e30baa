use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::workflows::tenancy::client::{
    AgreementClient, CreateAgreementRequest, CreateTenancyRequest, DirectoryClient, ResourceError,
    SignRequest, TenancyClient, TenantQuery,
};
use crate::workflows::tenancy::domain::{
    stock_clauses, Agreement, AgreementId, AgreementStatus, Clause, RentCycle, RentTerms,
    SignerEntry, Tenancy, TenancyAgreementRef, TenancyId, TenancyStatus, TenantSummary, UnitId,
    UnitSummary, UserId, UserIdentity,
};
use crate::workflows::tenancy::notify::{WizardNotice, WizardNotifier};
use crate::workflows::tenancy::wizard::TenancyWizard;

/// Agreement backend double: mints sequential ids, derives the required
/// signer list from the inline tenancy data, and completes the document
/// once every signer has signed. Failure knobs apply to the next call.
#[derive(Default)]
pub(super) struct MemoryAgreements {
    agreements: Mutex<HashMap<AgreementId, Agreement>>,
    sequence: AtomicU64,
    create_calls: AtomicU64,
    fetch_calls: AtomicU64,
    sign_calls: AtomicU64,
    pub(super) fail_next_create: Mutex<Option<ResourceError>>,
    pub(super) fail_next_fetch: Mutex<Option<ResourceError>>,
    pub(super) fail_next_sign: Mutex<Option<ResourceError>>,
}

impl MemoryAgreements {
    pub(super) fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub(super) fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::Relaxed)
    }

    pub(super) fn sign_calls(&self) -> u64 {
        self.sign_calls.load(Ordering::Relaxed)
    }

    pub(super) fn stored(&self, id: &AgreementId) -> Option<Agreement> {
        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .get(id)
            .cloned()
    }

    pub(super) fn stored_count(&self) -> usize {
        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .len()
    }

    /// Simulate a server-side deletion between sessions.
    pub(super) fn delete(&self, id: &AgreementId) {
        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .remove(id);
    }

    pub(super) fn mark_signed_by(&self, id: &AgreementId, user: &UserId, name: &str) {
        let mut guard = self.agreements.lock().expect("agreement mutex poisoned");
        if let Some(agreement) = guard.get_mut(id) {
            for signer in &mut agreement.signers {
                if &signer.user_id == user {
                    signer.name = Some(name.to_string());
                    signer.signed_at = Some(Utc::now());
                }
            }
        }
    }
}

#[async_trait]
impl AgreementClient for MemoryAgreements {
    async fn create_agreement(
        &self,
        request: CreateAgreementRequest,
    ) -> Result<Agreement, ResourceError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self
            .fail_next_create
            .lock()
            .expect("knob mutex poisoned")
            .take()
        {
            return Err(error);
        }

        let id = AgreementId(format!(
            "agr-{:06}",
            self.sequence.fetch_add(1, Ordering::Relaxed) + 1
        ));
        let mut signers = request.signers;
        if let Some(tenancy_data) = &request.tenancy_data {
            for user in [&tenancy_data.owner_id, &tenancy_data.tenant_id] {
                if !signers.iter().any(|signer| &signer.user_id == user) {
                    signers.push(SignerEntry::pending((*user).clone()));
                }
            }
        }

        let agreement = Agreement {
            id: id.clone(),
            template_name: request.template_name,
            state_code: request.state_code,
            clauses: request.clauses,
            pdf_url: None,
            version: Some(1),
            created_by: request.created_by,
            tenancy_id: request.tenancy_id,
            tenant_id: request
                .tenancy_data
                .as_ref()
                .map(|data| data.tenant_id.clone()),
            status: request.status.unwrap_or(AgreementStatus::PendingSignature),
            signers,
            last_signed_at: None,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };

        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .insert(id, agreement.clone());
        Ok(agreement)
    }

    async fn agreement_by_id(&self, id: &AgreementId) -> Result<Agreement, ResourceError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self
            .fail_next_fetch
            .lock()
            .expect("knob mutex poisoned")
            .take()
        {
            return Err(error);
        }

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
        self.sign_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self
            .fail_next_sign
            .lock()
            .expect("knob mutex poisoned")
            .take()
        {
            return Err(error);
        }

        let mut guard = self.agreements.lock().expect("agreement mutex poisoned");
        let agreement = guard.get_mut(id).ok_or(ResourceError::NotFound)?;

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

        if agreement.signers.iter().all(SignerEntry::has_signed) {
            agreement.status = AgreementStatus::Signed;
        }
        agreement.last_signed_at = Some(signed_at);
        agreement.updated_at = Some(signed_at);

        Ok(agreement.clone())
    }
}

/// Tenancy backend double.
#[derive(Default)]
pub(super) struct MemoryTenancies {
    tenancies: Mutex<Vec<Tenancy>>,
    create_calls: AtomicU64,
    pub(super) fail_next_create: Mutex<Option<ResourceError>>,
}

impl MemoryTenancies {
    pub(super) fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub(super) fn stored(&self) -> Vec<Tenancy> {
        self.tenancies
            .lock()
            .expect("tenancy mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl TenancyClient for MemoryTenancies {
    async fn create_tenancy(
        &self,
        request: CreateTenancyRequest,
    ) -> Result<Tenancy, ResourceError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self
            .fail_next_create
            .lock()
            .expect("knob mutex poisoned")
            .take()
        {
            return Err(error);
        }

        let mut guard = self.tenancies.lock().expect("tenancy mutex poisoned");
        let tenancy = Tenancy {
            id: TenancyId(format!("ten-{:06}", guard.len() + 1)),
            unit_id: request.unit_id,
            owner_id: request.owner_id,
            tenant_id: request.tenant_id,
            agreement: request.agreement_id.map(|agreement_id| TenancyAgreementRef {
                agreement_id: Some(agreement_id),
                pdf_url: None,
                version: Some(1),
                signed_at: Some(Utc::now()),
            }),
            rent: request.rent,
            deposit: request.deposit,
            status: request.status.unwrap_or(TenancyStatus::Upcoming),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        guard.push(tenancy.clone());
        Ok(tenancy)
    }
}

/// Unit/tenant lookup double for the router tests.
pub(super) struct MemoryDirectory {
    pub(super) units: Vec<UnitSummary>,
    pub(super) tenants: Vec<TenantSummary>,
    pub(super) fail_next_units: Mutex<Option<ResourceError>>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self {
            units: vec![unit_fixture()],
            tenants: vec![tenant_fixture()],
            fail_next_units: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
    async fn units_for_owner(&self, _owner: &UserId) -> Result<Vec<UnitSummary>, ResourceError> {
        if let Some(error) = self
            .fail_next_units
            .lock()
            .expect("knob mutex poisoned")
            .take()
        {
            return Err(error);
        }
        Ok(self.units.clone())
    }

    async fn tenants(&self, _query: TenantQuery) -> Result<Vec<TenantSummary>, ResourceError> {
        Ok(self.tenants.clone())
    }
}

/// Notifier double capturing every emitted notice.
#[derive(Default)]
pub(super) struct RecordingNotifier {
    notices: Mutex<Vec<WizardNotice>>,
}

impl RecordingNotifier {
    pub(super) fn events(&self) -> Vec<WizardNotice> {
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

pub(super) fn landlord() -> UserIdentity {
    UserIdentity {
        id: UserId("user-owner".to_string()),
        first_name: "John".to_string(),
        last_name: "Smith".to_string(),
    }
}

pub(super) fn unit_fixture() -> UnitSummary {
    UnitSummary {
        id: UnitId("unit-201".to_string()),
        title: "Maple Court 2B".to_string(),
        address_line: Some("12 Maple Court, Des Moines, IA".to_string()),
    }
}

pub(super) fn tenant_fixture() -> TenantSummary {
    TenantSummary {
        id: UserId("user-tenant".to_string()),
        first_name: "Priya".to_string(),
        last_name: "Sharma".to_string(),
        email: Some("priya.sharma@example.com".to_string()),
    }
}

pub(super) fn rent_fixture() -> RentTerms {
    RentTerms {
        amount: 15_000.0,
        cycle: RentCycle::Monthly,
        due_date_day: Some(5),
        utilities_included: Some(false),
    }
}

pub(super) fn clause_fixture() -> Vec<Clause> {
    stock_clauses()
}

pub(super) struct Harness {
    pub(super) agreements: Arc<MemoryAgreements>,
    pub(super) tenancies: Arc<MemoryTenancies>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) wizard: TenancyWizard<MemoryAgreements, MemoryTenancies, RecordingNotifier>,
}

pub(super) fn harness() -> Harness {
    let agreements = Arc::new(MemoryAgreements::default());
    let tenancies = Arc::new(MemoryTenancies::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let wizard = TenancyWizard::new(
        landlord(),
        agreements.clone(),
        tenancies.clone(),
        notifier.clone(),
    );
    Harness {
        agreements,
        tenancies,
        notifier,
        wizard,
    }
}

/// Harness advanced through parties and rent, sitting on the clauses step.
pub(super) fn harness_at_clauses() -> Harness {
    let mut harness = harness();
    harness.wizard.select_unit(Some(unit_fixture()));
    harness.wizard.select_tenant(Some(tenant_fixture()));
    harness.wizard.confirm_parties().expect("parties confirmed");
    harness
        .wizard
        .submit_rent_terms(rent_fixture(), None)
        .expect("rent accepted");
    harness
}

/// Harness with an agreement created, sitting on the signing step.
pub(super) async fn harness_at_signing() -> Harness {
    let mut harness = harness_at_clauses();
    harness
        .wizard
        .submit_clauses(clause_fixture(), None, None)
        .await
        .expect("clauses accepted");
    harness
}
