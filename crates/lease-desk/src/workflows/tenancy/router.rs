use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use super::client::{AgreementClient, DirectoryClient, TenancyClient, TenantQuery};
use super::domain::{
    Clause, DepositTerms, RentTerms, Tenancy, UserIdentity, WizardDraft, WizardStep,
};
use super::notify::WizardNotifier;
use super::signature::{SignatureAttempt, SigningPhase};
use super::wizard::{FinishOutcome, SigningEntry, StepOutcome, TenancyWizard, WizardError};

/// One wizard per session id, created lazily for the configured user.
/// Sessions live for the process lifetime; a reset leaves the session in
/// place with an empty draft.
pub struct WizardSessions<A, T, D, N> {
    user: UserIdentity,
    agreements: Arc<A>,
    tenancies: Arc<T>,
    directory: Arc<D>,
    notifier: Arc<N>,
    sessions: Mutex<HashMap<String, TenancyWizard<A, T, N>>>,
}

impl<A, T, D, N> WizardSessions<A, T, D, N>
where
    A: AgreementClient,
    T: TenancyClient,
    D: DirectoryClient,
    N: WizardNotifier,
{
    pub fn new(
        user: UserIdentity,
        agreements: Arc<A>,
        tenancies: Arc<T>,
        directory: Arc<D>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            user,
            agreements,
            tenancies,
            directory,
            notifier,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn new_wizard(&self) -> TenancyWizard<A, T, N> {
        TenancyWizard::new(
            self.user.clone(),
            self.agreements.clone(),
            self.tenancies.clone(),
            self.notifier.clone(),
        )
    }
}

/// Router builder exposing the wizard over HTTP, one session per path id.
pub fn wizard_router<A, T, D, N>(sessions: Arc<WizardSessions<A, T, D, N>>) -> Router
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    Router::new()
        .route("/api/v1/wizard/:session", get(state_handler::<A, T, D, N>))
        .route(
            "/api/v1/wizard/:session/parties",
            post(parties_handler::<A, T, D, N>),
        )
        .route(
            "/api/v1/wizard/:session/rent",
            post(rent_handler::<A, T, D, N>),
        )
        .route(
            "/api/v1/wizard/:session/clauses",
            post(clauses_handler::<A, T, D, N>),
        )
        .route(
            "/api/v1/wizard/:session/signature",
            post(signature_handler::<A, T, D, N>),
        )
        .route(
            "/api/v1/wizard/:session/signature/confirm",
            post(confirm_handler::<A, T, D, N>),
        )
        .route(
            "/api/v1/wizard/:session/signature/cancel",
            post(cancel_handler::<A, T, D, N>),
        )
        .route(
            "/api/v1/wizard/:session/tenancy",
            post(tenancy_handler::<A, T, D, N>),
        )
        .route(
            "/api/v1/wizard/:session/back",
            post(back_handler::<A, T, D, N>),
        )
        .route(
            "/api/v1/wizard/:session/reset",
            post(reset_handler::<A, T, D, N>),
        )
        .with_state(sessions)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WizardStateView {
    step: u8,
    step_label: &'static str,
    draft: WizardDraft,
    #[serde(skip_serializing_if = "Option::is_none")]
    agreement_status: Option<&'static str>,
    signing_phase: SigningPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TenancyCreatedView {
    tenancy: Tenancy,
    notice: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PartiesRequest {
    unit_id: String,
    tenant_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RentRequest {
    rent: RentTerms,
    #[serde(default)]
    deposit: Option<DepositTerms>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClausesRequest {
    clauses: Vec<Clause>,
    #[serde(default)]
    template_name: Option<String>,
    #[serde(default)]
    state_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignatureRequest {
    typed_name: String,
    #[serde(default)]
    has_read_confirmation: bool,
}

fn view<A, T, N>(wizard: &TenancyWizard<A, T, N>, notice: Option<String>) -> WizardStateView
where
    A: AgreementClient,
    T: TenancyClient,
    N: WizardNotifier,
{
    WizardStateView {
        step: wizard.step().index(),
        step_label: wizard.step().label(),
        draft: wizard.draft().clone(),
        agreement_status: wizard.agreement().map(|agreement| agreement.status.label()),
        signing_phase: wizard.signing_phase(),
        notice,
    }
}

fn validation_error(error: WizardError) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        axum::Json(json!({ "error": error.to_string() })),
    )
        .into_response()
}

fn backend_error(message: &str) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        axum::Json(json!({ "error": message })),
    )
        .into_response()
}

const RESOURCE_RESET_NOTICE: &str = "Resource not found. Wizard has been reset.";
const AGREEMENT_RESET_NOTICE: &str = "Agreement not found. Wizard has been reset.";

pub(crate) async fn state_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    // A resumed draft sitting on the signing step is reconciled eagerly so
    // a deleted agreement is caught before the user interacts.
    let notice = if wizard.step() == WizardStep::SignAgreement && wizard.agreement().is_none() {
        match wizard.enter_signing().await {
            Ok(SigningEntry::Reset) => Some(AGREEMENT_RESET_NOTICE.to_string()),
            Ok(_) => None,
            Err(_) => None,
        }
    } else {
        None
    };

    (StatusCode::OK, axum::Json(view(wizard, notice))).into_response()
}

pub(crate) async fn parties_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
    axum::Json(request): axum::Json<PartiesRequest>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let units = sessions.directory.units_for_owner(&sessions.user.id).await;
    let tenants = sessions
        .directory
        .tenants(TenantQuery {
            search: None,
            limit: Some(100),
        })
        .await;

    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    let (units, tenants) = match (units, tenants) {
        (Ok(units), Ok(tenants)) => (units, tenants),
        (Err(error), _) | (_, Err(error)) if error.is_not_found() => {
            wizard.handle_not_found("Resource not found");
            return (
                StatusCode::OK,
                axum::Json(view(wizard, Some(RESOURCE_RESET_NOTICE.to_string()))),
            )
                .into_response();
        }
        (Err(error), _) | (_, Err(error)) => return backend_error(&error.to_string()),
    };

    let unit = units.into_iter().find(|unit| unit.id.0 == request.unit_id);
    let tenant = tenants
        .into_iter()
        .find(|tenant| tenant.id.0 == request.tenant_id);
    let (unit, tenant) = match (unit, tenant) {
        (Some(unit), Some(tenant)) => (unit, tenant),
        _ => {
            return validation_error(WizardError::IncompleteSelection);
        }
    };

    wizard.select_unit(Some(unit));
    wizard.select_tenant(Some(tenant));
    match wizard.confirm_parties() {
        Ok(()) => (StatusCode::OK, axum::Json(view(wizard, None))).into_response(),
        Err(error) => validation_error(error),
    }
}

pub(crate) async fn rent_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
    axum::Json(request): axum::Json<RentRequest>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    match wizard.submit_rent_terms(request.rent, request.deposit) {
        Ok(()) => (StatusCode::OK, axum::Json(view(wizard, None))).into_response(),
        Err(error) => validation_error(error),
    }
}

pub(crate) async fn clauses_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
    axum::Json(request): axum::Json<ClausesRequest>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    match wizard
        .submit_clauses(request.clauses, request.template_name, request.state_code)
        .await
    {
        Ok(StepOutcome::Advanced) => {
            (StatusCode::OK, axum::Json(view(wizard, None))).into_response()
        }
        Ok(StepOutcome::Reset) => (
            StatusCode::OK,
            axum::Json(view(wizard, Some(RESOURCE_RESET_NOTICE.to_string()))),
        )
            .into_response(),
        Ok(StepOutcome::Stayed) | Ok(StepOutcome::Superseded) => {
            backend_error("failed to create agreement")
        }
        Err(error) => validation_error(error),
    }
}

pub(crate) async fn signature_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
    axum::Json(request): axum::Json<SignatureRequest>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    // The signing step may be entered cold (resumed session); make sure
    // the agreement is in memory before validating against it.
    if wizard.agreement().is_none() {
        match wizard.enter_signing().await {
            Ok(SigningEntry::Reset) => {
                return (
                    StatusCode::OK,
                    axum::Json(view(wizard, Some(AGREEMENT_RESET_NOTICE.to_string()))),
                )
                    .into_response();
            }
            Ok(SigningEntry::Unavailable) => return backend_error("failed to fetch agreement"),
            Ok(SigningEntry::Ready(_)) => {}
            Err(error) => return validation_error(error),
        }
    }

    let attempt = SignatureAttempt::new(request.typed_name, request.has_read_confirmation);
    match wizard.proceed_to_sign(attempt) {
        Ok(()) => (StatusCode::OK, axum::Json(view(wizard, None))).into_response(),
        Err(error) => validation_error(error),
    }
}

pub(crate) async fn confirm_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    match wizard.confirm_sign().await {
        Ok(StepOutcome::Advanced) => (
            StatusCode::OK,
            axum::Json(view(
                wizard,
                Some("Agreement signed successfully!".to_string()),
            )),
        )
            .into_response(),
        Ok(StepOutcome::Reset) => (
            StatusCode::OK,
            axum::Json(view(wizard, Some(AGREEMENT_RESET_NOTICE.to_string()))),
        )
            .into_response(),
        Ok(StepOutcome::Stayed) | Ok(StepOutcome::Superseded) => {
            backend_error("failed to sign agreement")
        }
        Err(error) => validation_error(error),
    }
}

pub(crate) async fn cancel_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    wizard.cancel_confirmation();
    (StatusCode::OK, axum::Json(view(wizard, None))).into_response()
}

pub(crate) async fn tenancy_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    match wizard.create_tenancy().await {
        Ok(FinishOutcome::Created(tenancy)) => (
            StatusCode::CREATED,
            axum::Json(TenancyCreatedView {
                tenancy,
                notice: "Tenancy created successfully!".to_string(),
            }),
        )
            .into_response(),
        Ok(FinishOutcome::Reset) => (
            StatusCode::OK,
            axum::Json(view(wizard, Some(RESOURCE_RESET_NOTICE.to_string()))),
        )
            .into_response(),
        Ok(FinishOutcome::Stayed) => backend_error("failed to create tenancy"),
        Err(error) => validation_error(error),
    }
}

pub(crate) async fn back_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    let result = match wizard.step() {
        WizardStep::RentDetails => wizard.back_to_parties(),
        WizardStep::Clauses => wizard.back_to_rent_details(),
        WizardStep::SignAgreement => wizard.back_to_clauses(),
        WizardStep::ReviewAndCreate => wizard.back_to_signing(),
        WizardStep::SelectParties => Err(WizardError::StepMismatch),
    };

    match result {
        Ok(()) => (StatusCode::OK, axum::Json(view(wizard, None))).into_response(),
        Err(error) => validation_error(error),
    }
}

pub(crate) async fn reset_handler<A, T, D, N>(
    State(sessions): State<Arc<WizardSessions<A, T, D, N>>>,
    Path(session): Path<String>,
) -> Response
where
    A: AgreementClient + 'static,
    T: TenancyClient + 'static,
    D: DirectoryClient + 'static,
    N: WizardNotifier + 'static,
{
    let mut guard = sessions.sessions.lock().await;
    let wizard = guard
        .entry(session)
        .or_insert_with(|| sessions.new_wizard());

    wizard.discard();
    (
        StatusCode::OK,
        axum::Json(view(
            wizard,
            Some("Form reset. Starting from the beginning.".to_string()),
        )),
    )
        .into_response()
}
