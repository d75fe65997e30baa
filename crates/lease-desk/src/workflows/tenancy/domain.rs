use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for property units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub String);

/// Identifier wrapper for user accounts (owners, tenants, signers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for agreement documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgreementId(pub String);

/// Identifier wrapper for finalized tenancies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenancyId(pub String);

/// The five stations of the tenancy onboarding wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    SelectParties,
    RentDetails,
    Clauses,
    SignAgreement,
    ReviewAndCreate,
}

impl WizardStep {
    pub const fn index(self) -> u8 {
        match self {
            WizardStep::SelectParties => 1,
            WizardStep::RentDetails => 2,
            WizardStep::Clauses => 3,
            WizardStep::SignAgreement => 4,
            WizardStep::ReviewAndCreate => 5,
        }
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(WizardStep::SelectParties),
            2 => Some(WizardStep::RentDetails),
            3 => Some(WizardStep::Clauses),
            4 => Some(WizardStep::SignAgreement),
            5 => Some(WizardStep::ReviewAndCreate),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            WizardStep::SelectParties => "Select Unit & Tenant",
            WizardStep::RentDetails => "Rent Details",
            WizardStep::Clauses => "Agreement Clauses",
            WizardStep::SignAgreement => "Sign Agreement",
            WizardStep::ReviewAndCreate => "Review & Create",
        }
    }
}

impl Default for WizardStep {
    fn default() -> Self {
        WizardStep::SelectParties
    }
}

/// Billing cadence for rent collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentCycle {
    Monthly,
    Quarterly,
    Yearly,
}

impl RentCycle {
    pub const fn label(self) -> &'static str {
        match self {
            RentCycle::Monthly => "monthly",
            RentCycle::Quarterly => "quarterly",
            RentCycle::Yearly => "yearly",
        }
    }
}

/// Rent terms collected on the second wizard step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentTerms {
    pub amount: f64,
    pub cycle: RentCycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_day: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilities_included: Option<bool>,
}

impl Default for RentTerms {
    fn default() -> Self {
        Self {
            amount: 0.0,
            cycle: RentCycle::Monthly,
            due_date_day: Some(1),
            utilities_included: Some(false),
        }
    }
}

/// Lifecycle of a security deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Upcoming,
    Held,
    Returned,
    Disputed,
}

impl DepositStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DepositStatus::Upcoming => "upcoming",
            DepositStatus::Held => "held",
            DepositStatus::Returned => "returned",
            DepositStatus::Disputed => "disputed",
        }
    }
}

/// Security deposit terms, optional on a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositTerms {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub status: DepositStatus,
}

impl Default for DepositTerms {
    fn default() -> Self {
        Self {
            amount: Some(0.0),
            status: DepositStatus::Upcoming,
        }
    }
}

/// A single agreement clause. The key is an optional short handle
/// (`rent_payment`, `termination`); the text is the binding content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub text: String,
}

impl Clause {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            text: text.into(),
        }
    }
}

/// Starter clauses offered when a draft has none of its own.
pub fn stock_clauses() -> Vec<Clause> {
    vec![
        Clause::new(
            "rent_payment",
            "The tenant agrees to pay the rent in full on or before the due date of each \
             billing cycle. Late payments accrue the penalty stated in the payment schedule.",
        ),
        Clause::new(
            "maintenance",
            "The tenant is responsible for keeping the property in good condition and for \
             reporting damages or necessary repairs to the landlord promptly. Normal wear \
             and tear is expected.",
        ),
    ]
}

/// Everything the wizard collects about the future tenancy agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementTerms {
    pub rent: RentTerms,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit: Option<DepositTerms>,
    pub clauses: Vec<Clause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
}

impl Default for AgreementTerms {
    fn default() -> Self {
        Self {
            rent: RentTerms::default(),
            deposit: Some(DepositTerms::default()),
            clauses: Vec::new(),
            template_name: None,
            state_code: None,
        }
    }
}

/// The agreement-relevant fields captured when an agreement was created.
/// A structural mismatch against the current terms means the attached
/// agreement no longer reflects the draft and must be superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementSnapshot {
    pub clauses: Vec<Clause>,
    pub template_name: Option<String>,
    pub state_code: Option<String>,
}

impl AgreementSnapshot {
    pub fn of_terms(terms: &AgreementTerms) -> Self {
        Self {
            clauses: terms.clauses.clone(),
            template_name: terms.template_name.clone(),
            state_code: terms.state_code.clone(),
        }
    }

    pub fn matches(&self, terms: &AgreementTerms) -> bool {
        self.clauses == terms.clauses
            && self.template_name == terms.template_name
            && self.state_code == terms.state_code
    }
}

/// Unit projection the wizard needs for selection and review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSummary {
    #[serde(alias = "_id")]
    pub id: UnitId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line: Option<String>,
}

/// Tenant projection the wizard needs for selection and review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl TenantSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The authenticated user driving the wizard. Supplied by the session
/// collaborator; the wizard only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl UserIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Server-side lifecycle of an agreement document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Draft,
    PendingSignature,
    Signed,
    Cancelled,
}

impl AgreementStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AgreementStatus::Draft => "draft",
            AgreementStatus::PendingSignature => "pending_signature",
            AgreementStatus::Signed => "signed",
            AgreementStatus::Cancelled => "cancelled",
        }
    }
}

/// How a signature was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureMethod {
    Esign,
    Otp,
    Manual,
}

/// One party on an agreement's signer list. A missing `signed_at`
/// denotes a signature still outstanding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerEntry {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<SignatureMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

impl SignerEntry {
    pub fn pending(user_id: UserId) -> Self {
        Self {
            user_id,
            name: None,
            method: None,
            signed_at: None,
        }
    }

    pub fn has_signed(&self) -> bool {
        self.signed_at.is_some()
    }
}

/// Agreement document as owned by the backend; the wizard only holds a
/// fetched copy and never mutates it locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    #[serde(rename = "_id")]
    pub id: AgreementId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenancy_id: Option<TenancyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<UserId>,
    pub status: AgreementStatus,
    #[serde(default)]
    pub signers: Vec<SignerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_signed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Agreement {
    pub fn signer_for(&self, user_id: &UserId) -> Option<&SignerEntry> {
        self.signers.iter().find(|signer| &signer.user_id == user_id)
    }

    /// Whether the given user has a recorded signature on this agreement.
    pub fn is_signed_by(&self, user_id: &UserId) -> bool {
        self.signer_for(user_id)
            .map(SignerEntry::has_signed)
            .unwrap_or(false)
    }

    pub fn is_fully_signed(&self) -> bool {
        self.status == AgreementStatus::Signed
    }
}

/// Lifecycle of a finalized tenancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TenancyStatus {
    Upcoming,
    Active,
    Terminated,
    PendingRenewal,
}

impl TenancyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TenancyStatus::Upcoming => "upcoming",
            TenancyStatus::Active => "active",
            TenancyStatus::Terminated => "terminated",
            TenancyStatus::PendingRenewal => "pendingRenewal",
        }
    }
}

/// Embedded pointer from a tenancy back to its signed agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenancyAgreementRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<AgreementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

/// The finalized link between a unit, an owner, and a tenant. Created by
/// the backend only after the agreement is signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenancy {
    #[serde(rename = "_id")]
    pub id: TenancyId,
    pub unit_id: UnitId,
    pub owner_id: UserId,
    pub tenant_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement: Option<TenancyAgreementRef>,
    pub rent: RentTerms,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit: Option<DepositTerms>,
    pub status: TenancyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The wizard's cross-step draft. One instance per onboarding session;
/// serializable so a session can survive a reload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardDraft {
    pub step: WizardStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_unit: Option<UnitSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_tenant: Option<TenantSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<AgreementTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<AgreementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_snapshot: Option<AgreementSnapshot>,
}
