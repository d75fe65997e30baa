use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use lease_desk::workflows::tenancy::{
    stock_clauses, Agreement, AgreementClient, AgreementId, AgreementStatus,
    CreateAgreementRequest, CreateTenancyRequest, FinishOutcome, RentCycle, RentTerms,
    ResourceError, SignRequest, SignatureAttempt, SignerEntry, SigningPhase, StepOutcome, Tenancy,
    TenancyAgreementRef, TenancyClient, TenancyId, TenancyStatus, TenancyWizard, TenantSummary,
    UnitId, UnitSummary, UserId, UserIdentity, WizardDraft, WizardNotice, WizardNotifier,
    WizardStep, WizardStore,
};

/// Combined agreement + tenancy backend used to drive the wizard end to
/// end without a network.
#[derive(Default)]
struct LeasingBackend {
    agreements: Mutex<HashMap<AgreementId, Agreement>>,
    tenancies: Mutex<Vec<Tenancy>>,
    sequence: AtomicU64,
}

impl LeasingBackend {
    fn delete_agreement(&self, id: &AgreementId) {
        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .remove(id);
    }

    fn agreement_count(&self) -> usize {
        self.agreements
            .lock()
            .expect("agreement mutex poisoned")
            .len()
    }
}

#[async_trait]
impl AgreementClient for LeasingBackend {
    async fn create_agreement(
        &self,
        request: CreateAgreementRequest,
    ) -> Result<Agreement, ResourceError> {
        let id = AgreementId(format!(
            "agr-{:06}",
            self.sequence.fetch_add(1, Ordering::Relaxed) + 1
        ));
        let mut signers = request.signers;
        if let Some(data) = &request.tenancy_data {
            for user in [&data.owner_id, &data.tenant_id] {
                if !signers.iter().any(|signer| &signer.user_id == user) {
                    signers.push(SignerEntry::pending(user.clone()));
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
            tenant_id: request.tenancy_data.as_ref().map(|d| d.tenant_id.clone()),
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
        Ok(agreement.clone())
    }
}

#[async_trait]
impl TenancyClient for LeasingBackend {
    async fn create_tenancy(
        &self,
        request: CreateTenancyRequest,
    ) -> Result<Tenancy, ResourceError> {
        if let Some(agreement_id) = &request.agreement_id {
            let known = self
                .agreements
                .lock()
                .expect("agreement mutex poisoned")
                .contains_key(agreement_id);
            if !known {
                return Err(ResourceError::NotFound);
            }
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

#[derive(Default)]
struct CollectedNotices {
    notices: Mutex<Vec<WizardNotice>>,
}

impl WizardNotifier for CollectedNotices {
    fn notify(&self, notice: WizardNotice) {
        self.notices
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
    }
}

fn owner() -> UserIdentity {
    UserIdentity {
        id: UserId("user-owner".to_string()),
        first_name: "John".to_string(),
        last_name: "Smith".to_string(),
    }
}

fn unit() -> UnitSummary {
    UnitSummary {
        id: UnitId("unit-201".to_string()),
        title: "Maple Court 2B".to_string(),
        address_line: None,
    }
}

fn tenant() -> TenantSummary {
    TenantSummary {
        id: UserId("user-tenant".to_string()),
        first_name: "Priya".to_string(),
        last_name: "Sharma".to_string(),
        email: None,
    }
}

fn rent() -> RentTerms {
    RentTerms {
        amount: 15_000.0,
        cycle: RentCycle::Monthly,
        due_date_day: Some(5),
        utilities_included: Some(false),
    }
}

fn wizard(
    backend: &Arc<LeasingBackend>,
    notices: &Arc<CollectedNotices>,
) -> TenancyWizard<LeasingBackend, LeasingBackend, CollectedNotices> {
    TenancyWizard::new(owner(), backend.clone(), backend.clone(), notices.clone())
}

#[tokio::test]
async fn onboarding_runs_from_selection_to_tenancy() {
    let backend = Arc::new(LeasingBackend::default());
    let notices = Arc::new(CollectedNotices::default());
    let mut wizard = wizard(&backend, &notices);

    wizard.select_unit(Some(unit()));
    wizard.select_tenant(Some(tenant()));
    wizard.confirm_parties().expect("parties confirmed");
    wizard
        .submit_rent_terms(rent(), None)
        .expect("rent accepted");

    let outcome = wizard
        .submit_clauses(stock_clauses(), None, None)
        .await
        .expect("clauses accepted");
    assert_eq!(outcome, StepOutcome::Advanced);
    assert_eq!(wizard.step(), WizardStep::SignAgreement);

    wizard
        .proceed_to_sign(SignatureAttempt::new("John Smith", true))
        .expect("attempt valid");
    assert_eq!(wizard.signing_phase(), SigningPhase::AwaitingConfirmation);
    let outcome = wizard.confirm_sign().await.expect("sign handled");
    assert_eq!(outcome, StepOutcome::Advanced);
    assert_eq!(wizard.step(), WizardStep::ReviewAndCreate);

    let outcome = wizard.create_tenancy().await.expect("tenancy handled");
    let tenancy = match outcome {
        FinishOutcome::Created(tenancy) => tenancy,
        other => panic!("expected a created tenancy, got {other:?}"),
    };
    assert_eq!(tenancy.status, TenancyStatus::Upcoming);
    assert_eq!(tenancy.rent, rent());
    assert_eq!(wizard.draft(), &WizardDraft::default());
}

#[tokio::test]
async fn clause_edits_supersede_and_orphan_the_first_agreement() {
    let backend = Arc::new(LeasingBackend::default());
    let notices = Arc::new(CollectedNotices::default());
    let mut wizard = wizard(&backend, &notices);

    wizard.select_unit(Some(unit()));
    wizard.select_tenant(Some(tenant()));
    wizard.confirm_parties().expect("parties confirmed");
    wizard
        .submit_rent_terms(rent(), None)
        .expect("rent accepted");
    wizard
        .submit_clauses(stock_clauses(), None, None)
        .await
        .expect("clauses accepted");
    let first = wizard
        .store()
        .agreement_id()
        .cloned()
        .expect("first agreement");

    wizard.back_to_clauses().expect("back to clauses");
    let mut clauses = stock_clauses();
    clauses[0].text.push_str(" Payment by bank transfer only.");
    wizard
        .submit_clauses(clauses, None, None)
        .await
        .expect("clauses accepted");

    let second = wizard
        .store()
        .agreement_id()
        .cloned()
        .expect("replacement agreement");
    assert_ne!(first, second);
    assert_eq!(backend.agreement_count(), 2, "superseded document remains");
}

#[tokio::test]
async fn resumed_session_with_deleted_agreement_starts_over() {
    let backend = Arc::new(LeasingBackend::default());
    let notices = Arc::new(CollectedNotices::default());
    let mut wizard = wizard(&backend, &notices);

    wizard.select_unit(Some(unit()));
    wizard.select_tenant(Some(tenant()));
    wizard.confirm_parties().expect("parties confirmed");
    wizard
        .submit_rent_terms(rent(), None)
        .expect("rent accepted");
    wizard
        .submit_clauses(stock_clauses(), None, None)
        .await
        .expect("clauses accepted");
    let agreement_id = wizard
        .store()
        .agreement_id()
        .cloned()
        .expect("agreement attached");

    let persisted = serde_json::to_string(wizard.draft()).expect("draft serializes");
    backend.delete_agreement(&agreement_id);

    let draft: WizardDraft = serde_json::from_str(&persisted).expect("draft parses");
    let mut resumed = TenancyWizard::resume(
        WizardStore::from_draft(draft),
        owner(),
        backend.clone(),
        backend.clone(),
        notices.clone(),
    );
    assert_eq!(resumed.step(), WizardStep::SignAgreement);

    resumed.enter_signing().await.expect("entry handled");
    assert_eq!(resumed.step(), WizardStep::SelectParties);
    assert_eq!(resumed.draft(), &WizardDraft::default());
}
