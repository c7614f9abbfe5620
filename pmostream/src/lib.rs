//! # pmostream - Téléchargement et streaming de médias à la demande
//!
//! Cette crate transforme une requête (URL ou recherche) en fichier audio ou
//! vidéo téléchargé en arrière-plan, puis servi en streaming une fois prêt.
//! Les fichiers sont temporaires : un janitor les supprime après une période
//! d'inactivité.
//!
//! ## Vue d'ensemble
//!
//! Le client soumet une requête et reçoit immédiatement un handle opaque. Il
//! interroge ensuite le statut du job jusqu'à ce qu'il soit `ready`, puis lit
//! le fichier. Deux requêtes identiques pendant un téléchargement partagent le
//! même job.
//!
//! ## Architecture
//!
//! ```text
//! StreamService (façade)
//!     ├── coordinator.rs - Déduplication et lancement des fetchs
//!     ├── registry.rs    - Map handle → job, transitions d'état
//!     ├── stream.rs      - Statut et ouverture des fichiers prêts
//!     ├── janitor.rs     - Éviction périodique
//!     └── filestore.rs   - Répertoire de travail
//! ```
//!
//! La récupération proprement dite est déléguée à un [`Fetcher`] (voir
//! `pmoytdlp` pour l'implémentation yt-dlp).
//!
//! ## Utilisation
//!
//! ```rust,ignore
//! use pmostream::{MediaKind, StreamService, StreamSettings};
//! use std::sync::Arc;
//!
//! let service = StreamService::new(StreamSettings::new("/tmp/streams"), Arc::new(my_fetcher))?;
//! let handle = service.submit_fetch("dQw4w9WgXcQ", MediaKind::Audio).await?;
//!
//! // Plus tard
//! let status = service.query_status(&handle).await;
//! let stream = service.read_stream(&handle).await?;
//! ```
//!
//! ## Structure des fichiers
//!
//! ```text
//! streams/
//! ├── 0f6c2a4e-....mp3
//! └── 9b1d77e0-....mp4
//! ```
//!
//! Le registre n'est pas persistant : au redémarrage le répertoire est vidé.

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod filestore;
pub mod janitor;
pub mod job;
pub mod registry;
pub mod service;
pub mod stream;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

#[cfg(feature = "pmoserver")]
pub mod pmoserver_ext;

#[cfg(feature = "pmoserver")]
pub mod api;

#[cfg(feature = "pmoserver")]
pub mod openapi;

#[cfg(feature = "pmoserver")]
pub mod pmoserver_impl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CoordinatorOptions, FetchCoordinator};
pub use error::{Result, StreamError};
pub use fetcher::{FetchedMedia, Fetcher, IdentityResolver, SourceResolver};
pub use filestore::FileStore;
pub use janitor::{Janitor, JanitorHandle, JanitorOptions, SweepReport};
pub use job::{Job, JobHandle, JobState, MediaKind, MediaMetadata};
pub use registry::{Claim, Committed, JobRegistry, Transition};
pub use service::{StreamService, StreamSettings};
pub use stream::{JobStatus, MediaStream, StreamServer};

#[cfg(feature = "pmoconfig")]
pub use config_ext::StreamConfigExt;

#[cfg(feature = "pmoserver")]
pub use pmoserver_ext::{create_api_router, create_stream_router};

#[cfg(feature = "pmoserver")]
pub use pmoserver_ext::StreamServiceExt;
