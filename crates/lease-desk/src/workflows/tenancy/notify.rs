use serde::Serialize;

use super::domain::{AgreementId, TenancyId};

/// Semantic events the wizard emits for user-facing feedback. Rendering
/// (toasts, log lines, response payloads) belongs to the host; the wizard
/// guarantees exactly one notice per failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WizardNotice {
    AgreementCreated { agreement_id: AgreementId },
    AgreementSigned { agreement_id: AgreementId },
    SignatureRejected { reason: String },
    TenancyCreated { tenancy_id: TenancyId },
    WizardReset { reason: String },
    OperationFailed { operation: &'static str, message: String },
}

impl WizardNotice {
    /// One-line rendering for hosts that only show text.
    pub fn message(&self) -> String {
        match self {
            WizardNotice::AgreementCreated { .. } => "Agreement created successfully".to_string(),
            WizardNotice::AgreementSigned { .. } => "Agreement signed successfully".to_string(),
            WizardNotice::SignatureRejected { reason } => reason.clone(),
            WizardNotice::TenancyCreated { .. } => "Tenancy created successfully".to_string(),
            WizardNotice::WizardReset { reason } => {
                format!("{reason}. The wizard has been reset.")
            }
            WizardNotice::OperationFailed { operation, message } => {
                format!("{operation} failed: {message}")
            }
        }
    }
}

/// Outbound hook for wizard notices.
pub trait WizardNotifier: Send + Sync {
    fn notify(&self, notice: WizardNotice);
}
