use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AppState, UserOut, path_id};
use crate::auth::UserContext;
use crate::db::{
    FICHE_LAPIN_TABLE, FicheLapinChanges, FicheLapinDetails, FicheLapinRecord, NewFicheLapin,
    QueryBuilder, USER_TABLE, WithAuthor,
};
use crate::error::ApiError;
use crate::types::parse_record_id;

/// Rabbit sheet as returned to clients: details flattened next to the
/// required fields, plus the author when known.
#[derive(Debug, Serialize)]
pub(super) struct FicheLapinOut {
    id: String,
    nom: String,
    numero_arrivee_association: i64,
    date_creation_fiche: DateTime<Utc>,
    auteur_id: String,
    #[serde(flatten)]
    details: FicheLapinDetails,
    auteur: Option<UserOut>,
}

impl From<FicheLapinRecord> for FicheLapinOut {
    fn from(fiche: FicheLapinRecord) -> Self {
        Self {
            id: fiche.id.to_string(),
            nom: fiche.nom,
            numero_arrivee_association: fiche.numero_arrivee_association,
            date_creation_fiche: fiche.date_creation_fiche,
            auteur_id: fiche.auteur_id.to_string(),
            details: fiche.details,
            auteur: None,
        }
    }
}

impl From<WithAuthor<FicheLapinRecord>> for FicheLapinOut {
    fn from(with: WithAuthor<FicheLapinRecord>) -> Self {
        Self {
            auteur: with.author.map(UserOut::from),
            ..Self::from(with.record)
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct FicheFilter {
    auteur_id: Option<String>,
}

pub(super) async fn create_fiche(
    State(state): State<AppState>,
    caller: UserContext,
    Json(data): Json<NewFicheLapin>,
) -> Result<(StatusCode, Json<FicheLapinOut>), ApiError> {
    let author = caller.record_id().ok_or(ApiError::Unauthorized)?;
    let fiche = QueryBuilder::create_fiche(&state.db, &author, data).await?;
    Ok((StatusCode::CREATED, Json(fiche.into())))
}

pub(super) async fn list_fiches(
    State(state): State<AppState>,
    _caller: UserContext,
    Query(filter): Query<FicheFilter>,
) -> Result<Json<Vec<FicheLapinOut>>, ApiError> {
    let author = match filter.auteur_id.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(raw) => match parse_record_id(USER_TABLE, raw) {
            Some(id) => Some(id),
            // No user can own sheets under an id from another table.
            None => return Ok(Json(Vec::new())),
        },
        None => None,
    };

    let fiches = QueryBuilder::list_fiches(&state.db, author.as_ref()).await?;
    Ok(Json(fiches.into_iter().map(FicheLapinOut::from).collect()))
}

pub(super) async fn get_fiche(
    State(state): State<AppState>,
    _caller: UserContext,
    Path(id): Path<String>,
) -> Result<Json<FicheLapinOut>, ApiError> {
    let id = path_id(FICHE_LAPIN_TABLE, &id, "fiche lapin")?;
    let fiche = QueryBuilder::get_fiche(&state.db, &id).await?;
    Ok(Json(fiche.into()))
}

pub(super) async fn update_fiche(
    State(state): State<AppState>,
    caller: UserContext,
    Path(id): Path<String>,
    Json(changes): Json<FicheLapinChanges>,
) -> Result<Json<FicheLapinOut>, ApiError> {
    let id = path_id(FICHE_LAPIN_TABLE, &id, "fiche lapin")?;
    let subject = caller.record_id().ok_or(ApiError::Unauthorized)?;
    let fiche = QueryBuilder::update_fiche(&state.db, &id, changes, &subject).await?;
    Ok(Json(fiche.into()))
}

pub(super) async fn delete_fiche(
    State(state): State<AppState>,
    caller: UserContext,
    Path(id): Path<String>,
) -> Result<Json<FicheLapinOut>, ApiError> {
    let id = path_id(FICHE_LAPIN_TABLE, &id, "fiche lapin")?;
    let subject = caller.record_id().ok_or(ApiError::Unauthorized)?;
    let fiche = QueryBuilder::delete_fiche(&state.db, &id, &subject).await?;
    Ok(Json(fiche.into()))
}
