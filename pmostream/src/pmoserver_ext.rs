//! Extension pmoserver pour exposer le service de streaming en HTTP
//!
//! ## Routes générées
//!
//! - `GET /youtube?query=...&video=true|false&api_key=...` - Soumission
//! - `GET /status/{id}` - Statut d'un job
//! - `GET /stream/{id}` - Lecture du fichier (support de `Range`)
//! - `/api/streams/*` - API REST (voir [`crate::api`])
//!
//! Seuls les fichiers complets sont servis : un job encore en cours répond
//! `425 Too Early`, le client doit réessayer après avoir consulté le statut.

use crate::api::{self, SimpleError, StreamHttpState};
use crate::job::{JobHandle, MediaKind};
use crate::service::StreamService;
use crate::stream::MediaStream;
use crate::StreamError;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Paramètres de `/youtube`
#[derive(Debug, Deserialize)]
pub struct YoutubeQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn too_early() -> StatusCode {
    StatusCode::from_u16(425).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
}

/// Handler pour GET /youtube
async fn youtube(
    State(state): State<StreamHttpState>,
    Query(params): Query<YoutubeQuery>,
    headers: HeaderMap,
) -> Response {
    let query = params.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(SimpleError::new("Missing query parameter")),
        )
            .into_response();
    }

    if let Err(denied) = state.authorize(params.api_key.as_deref()) {
        return denied;
    }

    let video = params
        .video
        .as_deref()
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    let kind = MediaKind::from_video_flag(video);

    match api::submit(&state, &headers, query, kind).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(StreamError::Resolve(e)) => {
            debug!("No result for query '{}': {}", query, e);
            (StatusCode::NOT_FOUND, Json(SimpleError::new("No results found"))).into_response()
        }
        Err(e) => {
            warn!("Cannot submit stream request '{}': {}", query, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SimpleError::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Handler pour GET /status/{id}
async fn status(
    State(state): State<StreamHttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let handle = JobHandle::from(id);
    match api::build_status(&state, &headers, &handle).await {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(SimpleError::new("Invalid stream ID"))).into_response(),
    }
}

/// Handler pour GET /stream/{id}
async fn stream(
    State(state): State<StreamHttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let handle = JobHandle::from(id);
    match state.service.read_stream(&handle).await {
        Ok(media) => {
            let range = headers
                .get(header::RANGE)
                .and_then(|value| value.to_str().ok());
            serve_media(media, range).await
        }
        Err(StreamError::NotReady(_)) => (
            too_early(),
            Json(serde_json::json!({
                "status": "downloading",
                "message": "File not ready yet"
            })),
        )
            .into_response(),
        Err(StreamError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(SimpleError::new("Invalid stream ID"))).into_response()
        }
        Err(e) => {
            warn!("Error opening stream {}: {}", handle, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SimpleError::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Sert un fichier complet ou une plage d'octets
async fn serve_media(media: MediaStream, range: Option<&str>) -> Response {
    let MediaStream {
        mut file,
        len: size,
        content_type,
        path,
        ..
    } = media;

    // Un en-tête Range invalide est ignoré : le fichier complet est servi
    let Some((start, end)) = range.and_then(|r| parse_range_header(r, size)) else {
        let body = Body::from_stream(ReaderStream::new(file));
        return (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CONTENT_LENGTH, size.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            body,
        )
            .into_response();
    };

    if start >= size {
        return (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [
                (header::CONTENT_RANGE, format!("bytes */{}", size)),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
        )
            .into_response();
    }

    let end = end.min(size.saturating_sub(1));
    let length = end - start + 1;
    if let Err(e) = file.seek(SeekFrom::Start(start)).await {
        warn!("Cannot seek in {:?}: {}", path, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error reading file").into_response();
    }

    let body = Body::from_stream(ReaderStream::new(file.take(length)));
    (
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, size)),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        body,
    )
        .into_response()
}

/// Analyse un en-tête `Range: bytes=...` à plage unique
///
/// Retourne `(début, fin)` inclusifs, la fin pouvant dépasser la taille
/// (elle est bornée par l'appelant). Les plages multiples et les unités
/// autres que `bytes` ne sont pas supportées.
pub fn parse_range_header(value: &str, size: u64) -> Option<(u64, u64)> {
    let (unit, range) = value.trim().split_once('=')?;
    if unit.trim() != "bytes" {
        return None;
    }
    let range = range.trim();
    if range.is_empty() || range.contains(',') {
        return None;
    }
    let (start_str, end_str) = range.split_once('-')?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        // Suffixe : "-N" = les N derniers octets
        let suffix_len: u64 = end_str.parse().ok()?;
        if suffix_len == 0 {
            return None;
        }
        if suffix_len >= size {
            return Some((0, size.saturating_sub(1)));
        }
        return Some((size - suffix_len, size - 1));
    }

    let start: u64 = start_str.parse().ok()?;
    let end = if end_str.is_empty() {
        size.saturating_sub(1).max(start)
    } else {
        end_str.parse().ok()?
    };
    if end < start {
        return None;
    }
    Some((start, end))
}

/// Crée le router des routes publiques (`/youtube`, `/status`, `/stream`)
pub fn create_stream_router(state: StreamHttpState) -> Router {
    Router::new()
        .route("/youtube", get(youtube))
        .route("/status/{id}", get(status))
        .route("/stream/{id}", get(stream))
        .with_state(state)
}

/// Crée le router de l'API REST
///
/// # Routes créées
///
/// - `GET /` - Liste des jobs
/// - `POST /` - Soumettre une requête
/// - `GET /{handle}` - Statut d'un job
/// - `DELETE /{handle}` - Évincer un job
pub fn create_api_router(state: StreamHttpState) -> Router {
    Router::new()
        .route("/", get(api::list_streams).post(api::submit_stream))
        .route(
            "/{handle}",
            get(api::get_stream_status).delete(api::delete_stream),
        )
        .with_state(state)
}

/// Trait d'extension pour pmoserver::Server
///
/// Enregistre les routes du service de streaming sur le serveur.
#[async_trait]
pub trait StreamServiceExt {
    /// Monte les routes publiques et l'API REST
    ///
    /// # Routes créées
    ///
    /// - Publiques: `/youtube`, `/status/{id}`, `/stream/{id}`
    /// - API: `/api/streams/*`
    /// - Swagger: `/swagger-ui/streams`
    async fn init_stream_service(
        &mut self,
        service: Arc<StreamService>,
        api_key: Option<String>,
    ) -> anyhow::Result<()>;

    /// Construit le service depuis la configuration puis monte ses routes
    async fn init_stream_service_configured(
        &mut self,
        fetcher: Arc<dyn crate::Fetcher>,
        resolver: Arc<dyn crate::SourceResolver>,
    ) -> anyhow::Result<Arc<StreamService>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_range() {
        assert_eq!(parse_range_header("bytes=0-99", 1000), Some((0, 99)));
        assert_eq!(parse_range_header("bytes=500-", 1000), Some((500, 999)));
        assert_eq!(parse_range_header(" bytes = 10 - 20 ", 1000), Some((10, 20)));
    }

    #[test]
    fn test_parse_suffix_range() {
        assert_eq!(parse_range_header("bytes=-100", 1000), Some((900, 999)));
        assert_eq!(parse_range_header("bytes=-5000", 1000), Some((0, 999)));
        assert_eq!(parse_range_header("bytes=-0", 1000), None);
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert_eq!(parse_range_header("items=0-1", 1000), None);
        assert_eq!(parse_range_header("bytes=0-1,5-9", 1000), None);
        assert_eq!(parse_range_header("bytes=20-10", 1000), None);
        assert_eq!(parse_range_header("bytes=abc-", 1000), None);
        assert_eq!(parse_range_header("bytes=", 1000), None);
    }

    #[test]
    fn test_parse_open_range_past_end() {
        // Rejeté en 416 au moment de servir
        assert_eq!(parse_range_header("bytes=2000-", 1000), Some((2000, 2000)));
    }

    #[test]
    fn test_parse_end_beyond_size_is_kept() {
        // La fin est bornée au moment de servir
        assert_eq!(parse_range_header("bytes=900-5000", 1000), Some((900, 5000)));
    }
}
