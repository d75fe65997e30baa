//! Tenancy onboarding: the five-step wizard that selects the parties,
//! captures rent terms and agreement clauses, collects e-signatures, and
//! finally creates the tenancy. The orchestrator treats the backend as a
//! set of narrow resource clients and recovers from any dangling
//! reference by discarding the draft.

pub mod client;
pub mod domain;
pub mod http;
pub(crate) mod notify;
pub mod router;
pub(crate) mod signature;
pub mod store;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use client::{
    AgreementClient, CreateAgreementRequest, CreateTenancyRequest, DirectoryClient,
    ProposedTenancy, ResourceError, SignRequest, TenancyClient, TenantQuery,
};
pub use domain::{
    stock_clauses, Agreement, AgreementId, AgreementSnapshot, AgreementStatus, AgreementTerms,
    Clause, DepositStatus, DepositTerms, RentCycle, RentTerms, SignatureMethod, SignerEntry,
    Tenancy, TenancyAgreementRef, TenancyId, TenancyStatus, TenantSummary, UnitId, UnitSummary,
    UserId, UserIdentity, WizardDraft, WizardStep,
};
pub use http::{HttpAgreementClient, HttpDirectoryClient, HttpTenancyClient, RestClient};
pub use notify::{WizardNotice, WizardNotifier};
pub use router::{wizard_router, WizardSessions};
pub use signature::{
    legal_name, validate_signature, SignatureAttempt, SignatureRejection, SigningPhase,
};
pub use store::{TermsPatch, WizardStore};
pub use wizard::{
    FinishOutcome, SigningEntry, SigningView, StepOutcome, TenancyWizard, WizardError,
};
