//! Documentation OpenAPI pour l'API de streaming

use utoipa::OpenApi;

/// Documentation OpenAPI pour l'API PMOStream
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::list_streams,
        crate::api::submit_stream,
        crate::api::get_stream_status,
        crate::api::delete_stream,
    ),
    components(
        schemas(
            crate::job::Job,
            crate::job::JobState,
            crate::job::MediaKind,
            crate::job::MediaMetadata,
            crate::api::SubmitRequest,
            crate::api::SubmitResponse,
            crate::api::StatusResponse,
            crate::api::EvictResponse,
            crate::api::ErrorResponse,
            crate::api::SimpleError,
        )
    ),
    tags(
        (name = "streams", description = "Téléchargement et streaming de médias à la demande")
    ),
    info(
        title = "PMOStream API",
        version = "0.1.0",
        description = r#"
# API de gestion des streams

Chaque requête crée un job de téléchargement en arrière-plan. Le client
reçoit immédiatement un handle, interroge le statut puis lit le fichier
via `/stream/{handle}` une fois le job `ready`.

## Cycle de vie d'un job

`pending` → `in_progress` → `ready` | `failed`

Un job inactif pendant plus de `host.streams.ttl_secs` est évincé et son
fichier supprimé ; son handle répond alors 404.

## Endpoints principaux

### GET /api/streams
Liste tous les jobs connus

### POST /api/streams
Soumet une requête (URL, identifiant ou recherche libre)

### GET /api/streams/{handle}
Statut d'un job

### DELETE /api/streams/{handle}
Évince un job et supprime son fichier
"#,
        contact(
            name = "PMOStream",
        ),
        license(
            name = "MIT",
        ),
    )
)]
pub struct ApiDoc;
