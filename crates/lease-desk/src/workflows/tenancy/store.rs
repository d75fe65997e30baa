use serde::{Deserialize, Serialize};

use super::domain::{
    AgreementId, AgreementSnapshot, AgreementTerms, Clause, DepositTerms, RentTerms, TenantSummary,
    UnitSummary, WizardDraft, WizardStep,
};

/// Partial update for the draft's agreement terms. `None` fields leave the
/// stored value untouched; set fields replace it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent: Option<RentTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit: Option<DepositTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clauses: Option<Vec<Clause>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
}

impl TermsPatch {
    pub fn rent(rent: RentTerms, deposit: Option<DepositTerms>) -> Self {
        Self {
            rent: Some(rent),
            deposit,
            ..Self::default()
        }
    }

    pub fn clauses(
        clauses: Vec<Clause>,
        template_name: Option<String>,
        state_code: Option<String>,
    ) -> Self {
        Self {
            clauses: Some(clauses),
            template_name,
            state_code,
            ..Self::default()
        }
    }
}

/// Session-scoped owner of the wizard draft. Injected into the
/// orchestrator; never reached through a global. All mutations are
/// synchronous and local, no I/O originates here.
#[derive(Debug, Default)]
pub struct WizardStore {
    draft: WizardDraft,
}

impl WizardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate a store from a previously serialized draft. This is the
    /// reload-survival path; the caller owns where the bytes live.
    pub fn from_draft(draft: WizardDraft) -> Self {
        Self { draft }
    }

    /// The current draft, which is also the serialization boundary.
    pub fn draft(&self) -> &WizardDraft {
        &self.draft
    }

    pub fn step(&self) -> WizardStep {
        self.draft.step
    }

    pub fn selected_unit(&self) -> Option<&UnitSummary> {
        self.draft.selected_unit.as_ref()
    }

    pub fn selected_tenant(&self) -> Option<&TenantSummary> {
        self.draft.selected_tenant.as_ref()
    }

    pub fn terms(&self) -> Option<&AgreementTerms> {
        self.draft.terms.as_ref()
    }

    pub fn agreement_id(&self) -> Option<&AgreementId> {
        self.draft.agreement_id.as_ref()
    }

    pub fn agreement_snapshot(&self) -> Option<&AgreementSnapshot> {
        self.draft.agreement_snapshot.as_ref()
    }

    /// Reachability is the orchestrator's concern; the store records
    /// whatever step it is told.
    pub fn set_step(&mut self, step: WizardStep) {
        self.draft.step = step;
    }

    pub fn set_selected_unit(&mut self, unit: Option<UnitSummary>) {
        self.draft.selected_unit = unit;
    }

    pub fn set_selected_tenant(&mut self, tenant: Option<TenantSummary>) {
        self.draft.selected_tenant = tenant;
    }

    /// Shallow-merge the patch into the stored terms, materializing the
    /// default rent/deposit/clauses scaffolding on first write.
    pub fn apply_terms(&mut self, patch: TermsPatch) {
        let terms = self.draft.terms.get_or_insert_with(AgreementTerms::default);

        if let Some(rent) = patch.rent {
            terms.rent = rent;
        }
        if let Some(deposit) = patch.deposit {
            terms.deposit = Some(deposit);
        }
        if let Some(clauses) = patch.clauses {
            terms.clauses = clauses;
        }
        if let Some(template_name) = patch.template_name {
            terms.template_name = Some(template_name);
        }
        if let Some(state_code) = patch.state_code {
            terms.state_code = Some(state_code);
        }
    }

    pub fn set_agreement_id(&mut self, agreement_id: Option<AgreementId>) {
        self.draft.agreement_id = agreement_id;
    }

    pub fn record_agreement_snapshot(&mut self, snapshot: AgreementSnapshot) {
        self.draft.agreement_snapshot = Some(snapshot);
    }

    pub fn clear_agreement_snapshot(&mut self) {
        self.draft.agreement_snapshot = None;
    }

    /// Restore the initial empty draft. The single supported recovery
    /// action when a referenced backend resource has disappeared.
    pub fn reset(&mut self) {
        self.draft = WizardDraft::default();
    }
}
