use serde::{Deserialize, Serialize};

/// What the signer has typed so far. Transient: cleared after every
/// successful sign and on navigation away from the signing step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureAttempt {
    pub typed_name: String,
    pub has_read_confirmation: bool,
}

impl SignatureAttempt {
    pub fn new(typed_name: impl Into<String>, has_read_confirmation: bool) -> Self {
        Self {
            typed_name: typed_name.into(),
            has_read_confirmation,
        }
    }

    /// Pre-filled attempt shown when the user has already signed. Display
    /// only; the orchestrator never submits a pre-filled attempt.
    pub fn prefilled(name: impl Into<String>) -> Self {
        Self {
            typed_name: name.into(),
            has_read_confirmation: true,
        }
    }

    pub fn clear(&mut self) {
        self.typed_name.clear();
        self.has_read_confirmation = false;
    }
}

/// Reasons a signature attempt is refused before any server call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureRejection {
    #[error("confirm that you have read and understood the agreement before signing")]
    ConsentMissing,
    #[error("the typed name must match your legal name exactly")]
    NameMismatch,
}

/// Decide whether a signature attempt is acceptable. Pure: the same
/// inputs always produce the same verdict.
///
/// Consent is checked first; the name must then match the signer's legal
/// name exactly after trimming, case included. The strict match stands in
/// for a handwritten signature.
pub fn validate_signature(
    attempt: &SignatureAttempt,
    legal_full_name: &str,
) -> Result<(), SignatureRejection> {
    if !attempt.has_read_confirmation {
        return Err(SignatureRejection::ConsentMissing);
    }

    let typed = attempt.typed_name.trim();
    if typed.is_empty() || typed != legal_full_name.trim() {
        return Err(SignatureRejection::NameMismatch);
    }

    Ok(())
}

/// Join a first and last name the way the signer list stores it.
pub fn legal_name(first_name: &str, last_name: &str) -> String {
    format!("{first_name} {last_name}")
}

/// The two-phase commit for signing: a valid attempt moves the flow to
/// `AwaitingConfirmation`, and only an explicit confirmation from there
/// reaches the backend. Cancelling falls back to `AwaitingInput` with the
/// attempt untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningPhase {
    #[default]
    AwaitingInput,
    AwaitingConfirmation,
}
