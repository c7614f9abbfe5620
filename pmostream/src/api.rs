//! API REST de gestion des streams
//!
//! Routes montées sous `/api/streams` :
//! - lister les jobs
//! - soumettre une requête
//! - consulter le statut d'un job
//! - évincer un job

use crate::job::{Job, JobHandle, MediaKind, MediaMetadata};
use crate::service::StreamService;
use crate::stream::JobStatus;
use crate::StreamError;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

/// État partagé par les handlers HTTP
#[derive(Clone)]
pub struct StreamHttpState {
    pub service: Arc<StreamService>,
    /// Clé exigée sur les routes de soumission (aucune si `None`)
    pub api_key: Option<String>,
    /// URL publique du serveur ; dérivée de l'en-tête `Host` si absente
    pub base_url: Option<String>,
}

impl StreamHttpState {
    pub fn new(service: Arc<StreamService>) -> Self {
        Self {
            service,
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        self
    }

    /// Vérifie la clé d'API fournie par le client
    pub(crate) fn authorize(&self, provided: Option<&str>) -> Result<(), Response> {
        match &self.api_key {
            Some(expected) if provided.map(str::trim) != Some(expected.as_str()) => Err((
                StatusCode::UNAUTHORIZED,
                Json(SimpleError::new("Invalid API key")),
            )
                .into_response()),
            _ => Ok(()),
        }
    }

    /// URL publique de base pour construire les liens
    pub(crate) fn public_base(&self, headers: &HeaderMap) -> String {
        if let Some(base) = &self.base_url {
            return base.clone();
        }
        headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| format!("http://{}", host))
            .unwrap_or_default()
    }

    pub(crate) fn stream_url(&self, headers: &HeaderMap, handle: &JobHandle) -> String {
        format!("{}/stream/{}", self.public_base(headers), handle)
    }

    pub(crate) fn check_url(&self, headers: &HeaderMap, handle: &JobHandle) -> String {
        format!("{}/status/{}", self.public_base(headers), handle)
    }
}

/// Paramètre `api_key` des routes protégées
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeyQuery {
    pub api_key: Option<String>,
}

/// Requête de soumission
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// URL, identifiant ou recherche libre
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    pub query: String,
    /// Format demandé (audio par défaut)
    #[serde(default)]
    pub kind: Option<MediaKind>,
}

/// Réponse après soumission
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub success: bool,
    /// Handle opaque du job
    #[schema(example = "0f6c2a4e-8d7b-4c1e-9a53-2f4d1b7e6c90")]
    pub stream_id: String,
    /// État du job au moment de la réponse
    #[schema(example = "pending")]
    pub status: String,
    /// URL de lecture du fichier
    pub stream_url: String,
    /// URL de suivi du statut
    pub check_url: String,
}

/// Statut d'un job
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "ready")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
}

/// Réponse d'éviction
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvictResponse {
    #[schema(example = "Stream '0f6c2a4e' evicted")]
    pub message: String,
}

/// Erreur au format des routes historiques : `{"error": "..."}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SimpleError {
    #[schema(example = "Invalid stream ID")]
    pub error: String,
}

impl SimpleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Réponse d'erreur de l'API REST
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Code d'erreur
    #[schema(example = "NOT_FOUND")]
    pub error: String,
    /// Message descriptif
    #[schema(example = "Stream not found")]
    pub message: String,
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: message.into(),
        }),
    )
        .into_response()
}

/// Construit la réponse de statut partagée par `/status/{id}` et l'API REST
pub(crate) async fn build_status(
    state: &StreamHttpState,
    headers: &HeaderMap,
    handle: &JobHandle,
) -> Option<StatusResponse> {
    let status = state.service.query_status(handle).await;
    let mut response = StatusResponse {
        status: status.as_str().to_string(),
        stream_url: None,
        message: None,
        error: None,
        metadata: None,
    };

    match status {
        JobStatus::NotFound => return None,
        JobStatus::Pending | JobStatus::InProgress => {
            response.message = Some("Download in progress".to_string());
        }
        JobStatus::Ready => {
            response.stream_url = Some(state.stream_url(headers, handle));
            response.metadata = state
                .service
                .job(handle)
                .await
                .and_then(|job| job.metadata);
        }
        JobStatus::Failed(error) => {
            response.error = Some(error);
        }
    }

    Some(response)
}

/// Soumet une requête et construit la réponse, en commun avec `/youtube`
pub(crate) async fn submit(
    state: &StreamHttpState,
    headers: &HeaderMap,
    query: &str,
    kind: MediaKind,
) -> Result<SubmitResponse, StreamError> {
    let handle = state.service.submit_query(query, kind).await?;
    let status = match state.service.job(&handle).await {
        Some(job) => job.state.as_str().to_string(),
        None => "pending".to_string(),
    };

    Ok(SubmitResponse {
        success: true,
        stream_id: handle.to_string(),
        status,
        stream_url: state.stream_url(headers, &handle),
        check_url: state.check_url(headers, &handle),
    })
}

/// Liste tous les jobs connus, du plus ancien au plus récent
#[utoipa::path(
    get,
    path = "/",
    tag = "streams",
    responses(
        (status = 200, description = "Liste des jobs", body = [Job]),
    )
)]
pub async fn list_streams(State(state): State<StreamHttpState>) -> impl IntoResponse {
    Json(state.service.list().await)
}

/// Soumet une requête de téléchargement
///
/// Retourne immédiatement le handle du job ; le téléchargement se poursuit
/// en arrière-plan.
#[utoipa::path(
    post,
    path = "/",
    tag = "streams",
    params(
        ("api_key" = Option<String>, Query, description = "Clé d'API si le serveur en exige une")
    ),
    request_body = SubmitRequest,
    responses(
        (status = 202, description = "Job créé ou réutilisé", body = SubmitResponse),
        (status = 400, description = "Requête vide", body = ErrorResponse),
        (status = 401, description = "Clé d'API invalide", body = SimpleError),
        (status = 404, description = "Aucun résultat pour la requête", body = ErrorResponse),
        (status = 500, description = "Erreur interne", body = ErrorResponse),
    )
)]
pub async fn submit_stream(
    State(state): State<StreamHttpState>,
    Query(auth): Query<ApiKeyQuery>,
    headers: HeaderMap,
    Json(request): Json<SubmitRequest>,
) -> Response {
    if let Err(denied) = state.authorize(auth.api_key.as_deref()) {
        return denied;
    }

    let query = request.query.trim();
    if query.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "MISSING_QUERY", "Missing query parameter");
    }

    let kind = request.kind.unwrap_or(MediaKind::Audio);
    match submit(&state, &headers, query, kind).await {
        Ok(response) => (StatusCode::ACCEPTED, Json(response)).into_response(),
        Err(StreamError::Resolve(e)) => {
            error_response(StatusCode::NOT_FOUND, "NO_RESULTS", format!("No results found: {}", e))
        }
        Err(e) => {
            warn!("Cannot submit stream request '{}': {}", query, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "SUBMIT_FAILED", e.to_string())
        }
    }
}

/// Statut d'un job
#[utoipa::path(
    get,
    path = "/{handle}",
    tag = "streams",
    params(
        ("handle" = String, Path, description = "Handle du job")
    ),
    responses(
        (status = 200, description = "Statut courant", body = StatusResponse),
        (status = 404, description = "Handle inconnu ou évincé", body = ErrorResponse),
    )
)]
pub async fn get_stream_status(
    State(state): State<StreamHttpState>,
    Path(handle): Path<String>,
    headers: HeaderMap,
) -> Response {
    let handle = JobHandle::from(handle);
    match build_status(&state, &headers, &handle).await {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Stream '{}' not found", handle),
        ),
    }
}

/// Évince un job et supprime son fichier
#[utoipa::path(
    delete,
    path = "/{handle}",
    tag = "streams",
    params(
        ("handle" = String, Path, description = "Handle du job")
    ),
    responses(
        (status = 200, description = "Job évincé", body = EvictResponse),
        (status = 404, description = "Handle inconnu", body = ErrorResponse),
    )
)]
pub async fn delete_stream(
    State(state): State<StreamHttpState>,
    Path(handle): Path<String>,
) -> Response {
    let handle = JobHandle::from(handle);
    match state.service.evict(&handle).await {
        Ok(_) => (
            StatusCode::OK,
            Json(EvictResponse {
                message: format!("Stream '{}' evicted", handle),
            }),
        )
            .into_response(),
        Err(_) => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Stream '{}' not found", handle),
        ),
    }
}
