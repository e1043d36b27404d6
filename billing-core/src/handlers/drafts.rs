//! Invoice draft workflow: open, edit, credit-check and submit.
//!
//! Remote calls are made outside the draft store lock; every mutation of a
//! draft happens inside a single `DraftStore::update` call.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::AppState;
use crate::auth::AuthContext;
use crate::draft::state_machine::TransitionError;
use crate::draft::{CreditDecision, DraftError, DraftSession, DraftState, DraftView, ProductCatalog};
use crate::error::AppError;
use crate::models::invoice::InvoiceSubmission;
use crate::models::{Client, PaymentType};
use crate::permissions::{Action, ModuleId};

const SUBMIT_FAILED: &str = "The invoice could not be saved. Please try again.";

#[derive(Debug, Deserialize)]
pub struct SelectClientRequest {
    pub client_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentTypeRequest {
    pub payment_type: PaymentType,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub product_id: Option<i64>,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CreditCheckResponse {
    pub decision: CreditDecision,
    pub message: String,
    pub draft: DraftView,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub invoice_id: i64,
    pub draft: DraftView,
}

fn draft_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Draft {} does not exist", id))
}

/// Applies `edit` to the caller's draft and renders the result.
async fn edit_draft<F>(state: &AppState, auth: &AuthContext, id: Uuid, edit: F) -> Result<Json<DraftView>, AppError>
where
    F: FnOnce(&mut DraftSession) -> Result<(), DraftError>,
{
    let view = state
        .drafts
        .update(id, &auth.username, |session| {
            edit(session)?;
            Ok::<_, DraftError>(session.view())
        })
        .await
        .ok_or_else(|| draft_not_found(id))??;
    Ok(Json(view))
}

/// `POST /api/drafts`
///
/// Snapshots active clients, sellable products and client types, and opens a
/// cash draft with one empty line.
pub async fn open(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<(StatusCode, Json<DraftView>), AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    let (clients, products, client_types) = tokio::join!(
        state.billing.list_clients(),
        state.catalog.list_products(),
        state.billing.list_client_types()
    );
    let clients: Vec<Client> = clients?.into_iter().filter(Client::is_active).collect();
    let catalog = ProductCatalog::sellable(products?);

    let session = DraftSession::new(auth.username.as_str(), catalog, clients, client_types?);
    let view = session.view();
    state.drafts.insert(session).await;

    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/drafts/:id`
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftView>, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    let session = state
        .drafts
        .get(id, &auth.username)
        .await
        .ok_or_else(|| draft_not_found(id))?;
    Ok(Json(session.view()))
}

/// `DELETE /api/drafts/:id`
pub async fn discard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    if state.drafts.remove(id, &auth.username).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(draft_not_found(id))
    }
}

/// `PUT /api/drafts/:id/client`
pub async fn select_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectClientRequest>,
) -> Result<Json<DraftView>, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    edit_draft(&state, &auth, id, |s| s.draft.select_client(request.client_id, &s.clients)).await
}

/// `PUT /api/drafts/:id/payment`
pub async fn set_payment_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentTypeRequest>,
) -> Result<Json<DraftView>, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    edit_draft(&state, &auth, id, |s| s.draft.set_payment_type(request.payment_type)).await
}

/// `POST /api/drafts/:id/lines`
pub async fn add_line(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftView>, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    edit_draft(&state, &auth, id, |s| s.draft.add_line(&s.catalog).map(|_| ())).await
}

/// `PUT /api/drafts/:id/lines/:index`
pub async fn update_line(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(request): Json<UpdateLineRequest>,
) -> Result<Json<DraftView>, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    edit_draft(&state, &auth, id, |s| {
        s.draft.update_line(&s.catalog, index, request.product_id, request.quantity)
    })
    .await
}

/// `DELETE /api/drafts/:id/lines/:index`
pub async fn remove_line(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<DraftView>, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    edit_draft(&state, &auth, id, |s| s.draft.remove_line(index)).await
}

/// `POST /api/drafts/:id/credit-check`
///
/// Fetches the client's current debt and evaluates the credit limit. A
/// rejection is a normal response carrying the decision. If the debt cannot
/// be read, or the client is changed while it is being read, the check fails
/// and the draft is left untouched.
pub async fn credit_check(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<CreditCheckResponse>, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    let snapshot = state
        .drafts
        .get(id, &auth.username)
        .await
        .ok_or_else(|| draft_not_found(id))?;
    if snapshot.draft.payment_type() != PaymentType::Credit {
        return Err(DraftError::from(TransitionError::CreditCheckNotApplicable).into());
    }
    let client_id = snapshot.draft.client_id().ok_or(DraftError::NoClientSelected)?;

    let current_debt = state.receivables.current_debt(client_id).await.map_err(|e| {
        error!("Could not read debt of client {}: {}", client_id, e);
        AppError::Upstream("The client's current debt could not be retrieved. Please try again.".to_string())
    })?;

    let (decision, view) = state
        .drafts
        .update(id, &auth.username, |s| {
            let decision =
                s.draft
                    .run_credit_check(&s.catalog, &s.clients, &s.client_types, client_id, current_debt)?;
            Ok::<_, DraftError>((decision, s.view()))
        })
        .await
        .ok_or_else(|| draft_not_found(id))??;

    Ok(Json(CreditCheckResponse {
        message: decision.message(),
        decision,
        draft: view,
    }))
}

/// `POST /api/drafts/:id/submit`
///
/// Credit drafts are re-checked against a fresh debt figure before the
/// invoice is created. On a remote failure the draft returns to editing
/// with the error recorded on it.
pub async fn submit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmitResponse>, AppError> {
    auth.require(ModuleId::Invoices, Action::Create)?;

    let snapshot = state
        .drafts
        .get(id, &auth.username)
        .await
        .ok_or_else(|| draft_not_found(id))?;

    let fresh_debt = match (snapshot.draft.state(), snapshot.draft.client_id()) {
        (DraftState::CreditApproved, Some(client_id)) => {
            let debt = state.receivables.current_debt(client_id).await.map_err(|e| {
                error!("Could not re-verify debt of client {}: {}", client_id, e);
                AppError::Upstream("The client's current debt could not be verified. Please try again.".to_string())
            })?;
            Some((client_id, debt))
        }
        _ => None,
    };

    let submission = state
        .drafts
        .update(id, &auth.username, |s| -> Result<InvoiceSubmission, AppError> {
            if let (Some((client_id, debt)), DraftState::CreditApproved) = (fresh_debt, s.draft.state()) {
                let decision =
                    s.draft
                        .run_credit_check(&s.catalog, &s.clients, &s.client_types, client_id, debt)?;
                if !decision.is_approved() {
                    return Err(AppError::conflict(decision.message()));
                }
            }
            Ok(s.draft.begin_submission(&s.catalog, &s.clients)?)
        })
        .await
        .ok_or_else(|| draft_not_found(id))??;

    // The draft is now `Submitting`; it must settle even if this request is dropped.
    let owner = auth.username.clone();
    tokio::spawn(persist_submission(state, owner, id, submission))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Submission task of draft {} failed: {}", id, e)))?
}

/// Sends a draft marked `Submitting` to the billing API and records the
/// outcome on it.
async fn persist_submission(
    state: AppState,
    owner: String,
    id: Uuid,
    submission: InvoiceSubmission,
) -> Result<Json<SubmitResponse>, AppError> {
    match state.billing.create_invoice(&submission).await {
        Ok(invoice_id) => {
            let view = state
                .drafts
                .update(id, &owner, |s| {
                    s.draft.complete_submission(invoice_id)?;
                    Ok::<_, DraftError>(s.view())
                })
                .await
                .ok_or_else(|| draft_not_found(id))??;
            info!("{} saved draft {} as invoice {}", owner, id, invoice_id);
            Ok(Json(SubmitResponse { invoice_id, draft: view }))
        }
        Err(e) => {
            error!("Failed to save draft {}: {}", id, e);
            state
                .drafts
                .update(id, &owner, |s| s.draft.fail_submission(SUBMIT_FAILED))
                .await
                .ok_or_else(|| draft_not_found(id))??;
            Err(AppError::Upstream(SUBMIT_FAILED.to_string()))
        }
    }
}
