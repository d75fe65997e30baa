use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::client::{
    AgreementClient, CreateAgreementRequest, CreateTenancyRequest, ProposedTenancy, SignRequest,
    TenancyClient,
};
use super::domain::{
    Agreement, AgreementSnapshot, AgreementStatus, Clause, DepositTerms, RentTerms, SignatureMethod,
    Tenancy, TenantSummary, UnitSummary, UserIdentity, WizardDraft, WizardStep,
};
use super::notify::{WizardNotice, WizardNotifier};
use super::signature::{validate_signature, SignatureAttempt, SignatureRejection, SigningPhase};
use super::store::{TermsPatch, WizardStore};

/// Local failures surfaced to the caller. Backend failures never appear
/// here: the wizard absorbs them, emits one notice, and reports what it
/// did through [`StepOutcome`] / [`FinishOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("this action is not available on the current step")]
    StepMismatch,
    #[error("select a unit and a tenant before continuing")]
    IncompleteSelection,
    #[error("rent details are invalid: {0}")]
    InvalidRentTerms(String),
    #[error("at least one clause with text is required")]
    EmptyClauses,
    #[error(transparent)]
    Signature(#[from] SignatureRejection),
    #[error("no agreement is attached to this draft")]
    MissingAgreement,
    #[error("this agreement has already been signed")]
    AlreadySigned,
    #[error("the signing flow is not awaiting confirmation")]
    NotAwaitingConfirmation,
    #[error("another request is still in flight")]
    OperationInFlight,
    #[error("missing required information to create the tenancy")]
    IncompleteDraft,
}

/// What a backend-touching transition did to the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The transition completed and the wizard moved forward.
    Advanced,
    /// The call failed recoverably; the wizard stayed where it was and a
    /// notice was emitted.
    Stayed,
    /// A referenced resource no longer exists; the wizard performed its
    /// full reset back to the first step.
    Reset,
    /// The response arrived for a generation that has since been reset
    /// and was dropped without touching the draft.
    Superseded,
}

/// What the signing step shows for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningView {
    /// The form is open and a signature is being collected.
    Collecting,
    /// The current user already holds a recorded signature; the form is
    /// replaced by a status message and signing is never re-invoked.
    AlreadySignedByUser,
    /// Every party has signed; the document is final.
    FullySigned,
}

/// Result of reconciling the signing step against the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningEntry {
    Ready(SigningView),
    /// The agreement could not be fetched for a transient reason; the
    /// step is unchanged and the user may retry.
    Unavailable,
    Reset,
}

/// Terminal submission result.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    /// The tenancy exists; the wizard has reset and the host should
    /// navigate away.
    Created(Tenancy),
    Stayed,
    Reset,
}

/// Drives one tenancy-onboarding session across its five steps: party
/// selection, rent terms, clause authoring with conditional agreement
/// creation, two-phase signing, and the terminal tenancy submission.
///
/// The store is owned and injected, never global. A missing backend
/// resource (404) always funnels through [`Self::handle_not_found`]: the
/// draft is discarded wholesale rather than repaired piecemeal.
pub struct TenancyWizard<A, T, N> {
    store: WizardStore,
    user: UserIdentity,
    agreements: Arc<A>,
    tenancies: Arc<T>,
    notifier: Arc<N>,
    agreement: Option<Agreement>,
    attempt: SignatureAttempt,
    phase: SigningPhase,
    in_flight: bool,
    generation: u64,
}

impl<A, T, N> TenancyWizard<A, T, N>
where
    A: AgreementClient,
    T: TenancyClient,
    N: WizardNotifier,
{
    pub fn new(
        user: UserIdentity,
        agreements: Arc<A>,
        tenancies: Arc<T>,
        notifier: Arc<N>,
    ) -> Self {
        Self::resume(WizardStore::new(), user, agreements, tenancies, notifier)
    }

    /// Attach to a store rehydrated from persistence. Call
    /// [`Self::enter_signing`] afterwards when the draft resumes on the
    /// signing step, so a deleted agreement is caught immediately.
    pub fn resume(
        store: WizardStore,
        user: UserIdentity,
        agreements: Arc<A>,
        tenancies: Arc<T>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            store,
            user,
            agreements,
            tenancies,
            notifier,
            agreement: None,
            attempt: SignatureAttempt::default(),
            phase: SigningPhase::default(),
            in_flight: false,
            generation: 0,
        }
    }

    pub fn store(&self) -> &WizardStore {
        &self.store
    }

    pub fn draft(&self) -> &WizardDraft {
        self.store.draft()
    }

    pub fn step(&self) -> WizardStep {
        self.store.step()
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn agreement(&self) -> Option<&Agreement> {
        self.agreement.as_ref()
    }

    pub fn signing_phase(&self) -> SigningPhase {
        self.phase
    }

    pub fn signature_attempt(&self) -> &SignatureAttempt {
        &self.attempt
    }

    /// Bumped on every reset; stale responses from an earlier generation
    /// are dropped instead of applied.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn select_unit(&mut self, unit: Option<UnitSummary>) {
        self.store.set_selected_unit(unit);
    }

    pub fn select_tenant(&mut self, tenant: Option<TenantSummary>) {
        self.store.set_selected_tenant(tenant);
    }

    /// Step 1 -> 2. Requires both selections; no backend call.
    pub fn confirm_parties(&mut self) -> Result<(), WizardError> {
        if self.step() != WizardStep::SelectParties {
            return Err(WizardError::StepMismatch);
        }
        if self.store.selected_unit().is_none() || self.store.selected_tenant().is_none() {
            return Err(WizardError::IncompleteSelection);
        }

        self.store.set_step(WizardStep::RentDetails);
        Ok(())
    }

    /// Step 2 -> 3. Schema validation only; no backend call.
    pub fn submit_rent_terms(
        &mut self,
        rent: RentTerms,
        deposit: Option<DepositTerms>,
    ) -> Result<(), WizardError> {
        if self.step() != WizardStep::RentDetails {
            return Err(WizardError::StepMismatch);
        }
        validate_rent_terms(&rent, deposit.as_ref())?;

        self.store.apply_terms(TermsPatch::rent(rent, deposit));
        self.store.set_step(WizardStep::Clauses);
        Ok(())
    }

    /// Step 3 -> 4, creating an agreement when the draft needs one.
    ///
    /// An attached agreement is reused as long as the clause/template/state
    /// snapshot recorded at its creation still matches the submission;
    /// otherwise a replacement is created and the old id is overwritten.
    pub async fn submit_clauses(
        &mut self,
        clauses: Vec<Clause>,
        template_name: Option<String>,
        state_code: Option<String>,
    ) -> Result<StepOutcome, WizardError> {
        if self.step() != WizardStep::Clauses {
            return Err(WizardError::StepMismatch);
        }
        if self.in_flight {
            return Err(WizardError::OperationInFlight);
        }
        let (unit, tenant) = match (self.store.selected_unit(), self.store.selected_tenant()) {
            (Some(unit), Some(tenant)) => (unit.clone(), tenant.clone()),
            _ => return Err(WizardError::IncompleteSelection),
        };

        let clauses = sanitize_clauses(clauses);
        if clauses.is_empty() {
            return Err(WizardError::EmptyClauses);
        }
        let template_name = template_name
            .or_else(|| {
                self.store
                    .terms()
                    .and_then(|terms| terms.template_name.clone())
            })
            .or_else(|| Some("standard".to_string()));

        self.store
            .apply_terms(TermsPatch::clauses(clauses, template_name, state_code));
        let terms = self
            .store
            .terms()
            .cloned()
            .unwrap_or_default();

        // Unchanged since the attached agreement was created: plain
        // continue, no new document.
        if self.store.agreement_id().is_some() {
            if let Some(snapshot) = self.store.agreement_snapshot() {
                if snapshot.matches(&terms) {
                    self.store.set_step(WizardStep::SignAgreement);
                    return Ok(StepOutcome::Advanced);
                }
            }
        }

        let request = CreateAgreementRequest {
            template_name: terms.template_name.clone(),
            state_code: terms.state_code.clone(),
            clauses: terms.clauses.clone(),
            created_by: Some(self.user.id.clone()),
            status: Some(AgreementStatus::PendingSignature),
            signers: Vec::new(),
            tenancy_id: None,
            tenancy_data: Some(ProposedTenancy {
                owner_id: self.user.id.clone(),
                tenant_id: tenant.id.clone(),
                unit_id: unit.id.clone(),
                rent: terms.rent.clone(),
                deposit: terms.deposit.clone(),
            }),
        };

        let generation = self.generation;
        self.in_flight = true;
        let result = self.agreements.create_agreement(request).await;
        self.in_flight = false;
        if self.generation != generation {
            return Ok(StepOutcome::Superseded);
        }

        match result {
            Ok(agreement) => {
                let superseded = self.store.agreement_id().cloned();
                if let Some(old_id) = superseded {
                    info!(old = %old_id.0, new = %agreement.id.0, "agreement superseded after clause edit");
                }
                self.store.set_agreement_id(Some(agreement.id.clone()));
                self.store
                    .record_agreement_snapshot(AgreementSnapshot::of_terms(&terms));
                self.notifier.notify(WizardNotice::AgreementCreated {
                    agreement_id: agreement.id.clone(),
                });
                self.agreement = Some(agreement);
                self.store.set_step(WizardStep::SignAgreement);
                Ok(StepOutcome::Advanced)
            }
            Err(error) if error.is_not_found() => {
                self.handle_not_found("Resource not found");
                Ok(StepOutcome::Reset)
            }
            Err(error) => {
                self.notifier.notify(WizardNotice::OperationFailed {
                    operation: "create agreement",
                    message: error.to_string(),
                });
                Ok(StepOutcome::Stayed)
            }
        }
    }

    /// Reconcile the signing step with the backend. Fetches the agreement
    /// when none is cached (fresh entry or resumed session) and pre-fills
    /// the signature inputs for a user who already signed. The pre-fill is
    /// display only and is never submitted.
    pub async fn enter_signing(&mut self) -> Result<SigningEntry, WizardError> {
        if self.step() != WizardStep::SignAgreement {
            return Err(WizardError::StepMismatch);
        }
        let agreement_id = self
            .store
            .agreement_id()
            .cloned()
            .ok_or(WizardError::MissingAgreement)?;

        let cached = self
            .agreement
            .as_ref()
            .map(|agreement| agreement.id == agreement_id)
            .unwrap_or(false);
        if !cached {
            let generation = self.generation;
            self.in_flight = true;
            let result = self.agreements.agreement_by_id(&agreement_id).await;
            self.in_flight = false;
            if self.generation != generation {
                return Ok(SigningEntry::Unavailable);
            }

            match result {
                Ok(agreement) => self.agreement = Some(agreement),
                Err(error) if error.is_not_found() => {
                    self.handle_not_found("Agreement not found");
                    return Ok(SigningEntry::Reset);
                }
                Err(error) => {
                    self.notifier.notify(WizardNotice::OperationFailed {
                        operation: "fetch agreement",
                        message: error.to_string(),
                    });
                    return Ok(SigningEntry::Unavailable);
                }
            }
        }

        let prefill = self.agreement.as_ref().and_then(|agreement| {
            agreement.signer_for(&self.user.id).and_then(|signer| {
                signer
                    .has_signed()
                    .then(|| signer.name.clone().unwrap_or_else(|| self.user.full_name()))
            })
        });
        self.attempt = match prefill {
            Some(name) => SignatureAttempt::prefilled(name),
            None => SignatureAttempt::default(),
        };

        Ok(SigningEntry::Ready(self.current_signing_view()))
    }

    fn current_signing_view(&self) -> SigningView {
        match self.agreement.as_ref() {
            Some(agreement) if agreement.is_fully_signed() => SigningView::FullySigned,
            Some(agreement) if agreement.is_signed_by(&self.user.id) => {
                SigningView::AlreadySignedByUser
            }
            _ => SigningView::Collecting,
        }
    }

    /// Signing phase A: validate the attempt and, on success, ask for the
    /// explicit confirmation. No backend call happens here.
    pub fn proceed_to_sign(&mut self, attempt: SignatureAttempt) -> Result<(), WizardError> {
        if self.step() != WizardStep::SignAgreement {
            return Err(WizardError::StepMismatch);
        }
        let agreement = self.agreement.as_ref().ok_or(WizardError::MissingAgreement)?;
        if agreement.is_fully_signed() || agreement.is_signed_by(&self.user.id) {
            return Err(WizardError::AlreadySigned);
        }

        if let Err(rejection) = validate_signature(&attempt, &self.user.full_name()) {
            self.notifier.notify(WizardNotice::SignatureRejected {
                reason: rejection.to_string(),
            });
            return Err(rejection.into());
        }

        self.attempt = attempt;
        self.phase = SigningPhase::AwaitingConfirmation;
        Ok(())
    }

    /// Signing phase B, cancelled: back to input with the attempt intact.
    pub fn cancel_confirmation(&mut self) {
        self.phase = SigningPhase::AwaitingInput;
    }

    /// Signing phase B, confirmed: the one place the sign call is made.
    pub async fn confirm_sign(&mut self) -> Result<StepOutcome, WizardError> {
        if self.phase != SigningPhase::AwaitingConfirmation {
            return Err(WizardError::NotAwaitingConfirmation);
        }
        if self.in_flight {
            return Err(WizardError::OperationInFlight);
        }
        let agreement_id = self
            .store
            .agreement_id()
            .cloned()
            .ok_or(WizardError::MissingAgreement)?;

        let request = SignRequest {
            user_id: self.user.id.clone(),
            name: Some(self.attempt.typed_name.trim().to_string()),
            method: Some(SignatureMethod::Manual),
        };

        let generation = self.generation;
        self.in_flight = true;
        let result = self.agreements.sign_agreement(&agreement_id, request).await;
        self.in_flight = false;
        self.phase = SigningPhase::AwaitingInput;
        if self.generation != generation {
            return Ok(StepOutcome::Superseded);
        }

        match result {
            Ok(agreement) => {
                info!(agreement = %agreement.id.0, signer = %self.user.id.0, "agreement signed");
                self.notifier.notify(WizardNotice::AgreementSigned {
                    agreement_id: agreement.id.clone(),
                });
                self.agreement = Some(agreement);
                self.attempt.clear();
                self.store.set_step(WizardStep::ReviewAndCreate);
                Ok(StepOutcome::Advanced)
            }
            Err(error) if error.is_not_found() => {
                self.handle_not_found("Agreement not found");
                Ok(StepOutcome::Reset)
            }
            Err(error) => {
                self.notifier.notify(WizardNotice::OperationFailed {
                    operation: "sign agreement",
                    message: error.to_string(),
                });
                Ok(StepOutcome::Stayed)
            }
        }
    }

    /// Step 4 -> 5. Free once an agreement exists; no re-validation.
    pub fn continue_to_review(&mut self) -> Result<(), WizardError> {
        if self.step() != WizardStep::SignAgreement {
            return Err(WizardError::StepMismatch);
        }
        if self.store.agreement_id().is_none() {
            return Err(WizardError::MissingAgreement);
        }

        self.leave_signing_step();
        self.store.set_step(WizardStep::ReviewAndCreate);
        Ok(())
    }

    /// Step 5 -> 4. Free in both directions.
    pub fn back_to_signing(&mut self) -> Result<(), WizardError> {
        if self.step() != WizardStep::ReviewAndCreate {
            return Err(WizardError::StepMismatch);
        }
        self.store.set_step(WizardStep::SignAgreement);
        Ok(())
    }

    /// Step 4 -> 3.
    pub fn back_to_clauses(&mut self) -> Result<(), WizardError> {
        if self.step() != WizardStep::SignAgreement {
            return Err(WizardError::StepMismatch);
        }
        self.leave_signing_step();
        self.store.set_step(WizardStep::Clauses);
        Ok(())
    }

    /// Step 3 -> 2.
    pub fn back_to_rent_details(&mut self) -> Result<(), WizardError> {
        if self.step() != WizardStep::Clauses {
            return Err(WizardError::StepMismatch);
        }
        self.store.set_step(WizardStep::RentDetails);
        Ok(())
    }

    /// Step 2 -> 1.
    pub fn back_to_parties(&mut self) -> Result<(), WizardError> {
        if self.step() != WizardStep::RentDetails {
            return Err(WizardError::StepMismatch);
        }
        self.store.set_step(WizardStep::SelectParties);
        Ok(())
    }

    /// Terminal submission: create the tenancy from the signed draft.
    pub async fn create_tenancy(&mut self) -> Result<FinishOutcome, WizardError> {
        if self.step() != WizardStep::ReviewAndCreate {
            return Err(WizardError::StepMismatch);
        }
        if self.in_flight {
            return Err(WizardError::OperationInFlight);
        }

        let (unit, tenant, terms, agreement_id) = match (
            self.store.selected_unit(),
            self.store.selected_tenant(),
            self.store.terms(),
            self.store.agreement_id(),
        ) {
            (Some(unit), Some(tenant), Some(terms), Some(agreement_id)) => (
                unit.clone(),
                tenant.clone(),
                terms.clone(),
                agreement_id.clone(),
            ),
            _ => return Err(WizardError::IncompleteDraft),
        };

        let request = CreateTenancyRequest {
            unit_id: unit.id,
            owner_id: self.user.id.clone(),
            tenant_id: tenant.id,
            agreement_id: Some(agreement_id),
            rent: terms.rent,
            deposit: terms.deposit,
            status: None,
        };

        let generation = self.generation;
        self.in_flight = true;
        let result = self.tenancies.create_tenancy(request).await;
        self.in_flight = false;
        if self.generation != generation {
            return Ok(FinishOutcome::Stayed);
        }

        match result {
            Ok(tenancy) => {
                info!(tenancy = %tenancy.id.0, "tenancy created, wizard complete");
                self.notifier.notify(WizardNotice::TenancyCreated {
                    tenancy_id: tenancy.id.clone(),
                });
                self.reset_state();
                Ok(FinishOutcome::Created(tenancy))
            }
            Err(error) if error.is_not_found() => {
                self.handle_not_found("Resource not found");
                Ok(FinishOutcome::Reset)
            }
            Err(error) => {
                self.notifier.notify(WizardNotice::OperationFailed {
                    operation: "create tenancy",
                    message: error.to_string(),
                });
                Ok(FinishOutcome::Stayed)
            }
        }
    }

    /// Discard the draft and start over. Available from every step and
    /// always offered next to the regular controls.
    pub fn discard(&mut self) {
        self.reset_state();
        self.notifier.notify(WizardNotice::WizardReset {
            reason: "Form reset".to_string(),
        });
    }

    /// The single recovery path for a dangling backend reference: discard
    /// everything, return to the first step, say so once. Public so hosts
    /// running their own lookups (unit/tenant pickers) funnel a missing
    /// resource through the same policy.
    pub fn handle_not_found(&mut self, reason: &str) {
        warn!(%reason, "referenced resource missing, resetting wizard");
        self.reset_state();
        self.notifier.notify(WizardNotice::WizardReset {
            reason: reason.to_string(),
        });
    }

    fn reset_state(&mut self) {
        self.generation += 1;
        self.store.reset();
        self.agreement = None;
        self.attempt.clear();
        self.phase = SigningPhase::AwaitingInput;
    }

    fn leave_signing_step(&mut self) {
        self.attempt.clear();
        self.phase = SigningPhase::AwaitingInput;
    }
}

fn sanitize_clauses(clauses: Vec<Clause>) -> Vec<Clause> {
    clauses
        .into_iter()
        .filter_map(|clause| {
            let text = clause.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Clause {
                key: clause
                    .key
                    .and_then(|key| {
                        let key = key.trim();
                        (!key.is_empty()).then(|| key.to_string())
                    }),
                text: text.to_string(),
            })
        })
        .collect()
}

fn validate_rent_terms(
    rent: &RentTerms,
    deposit: Option<&DepositTerms>,
) -> Result<(), WizardError> {
    if !rent.amount.is_finite() || rent.amount <= 0.0 {
        return Err(WizardError::InvalidRentTerms(
            "rent amount must be greater than 0".to_string(),
        ));
    }
    if let Some(day) = rent.due_date_day {
        if !(1..=28).contains(&day) {
            return Err(WizardError::InvalidRentTerms(
                "due date day must be between 1 and 28".to_string(),
            ));
        }
    }
    if let Some(amount) = deposit.and_then(|deposit| deposit.amount) {
        if !amount.is_finite() || amount < 0.0 {
            return Err(WizardError::InvalidRentTerms(
                "deposit amount must be 0 or greater".to_string(),
            ));
        }
    }

    Ok(())
}
