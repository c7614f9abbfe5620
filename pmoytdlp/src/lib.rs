//! # pmoytdlp - Récupération de médias avec yt-dlp
//!
//! Fournit les deux collaborateurs externes de `pmostream` :
//!
//! - [`YtDlpResolver`] : URL, identifiant ou recherche libre → identifiant YouTube
//! - [`YtDlpFetcher`] : téléchargement audio (mp3) ou vidéo (mp4) vers le
//!   chemin alloué au job
//!
//! Le binaire `yt-dlp` (et `ffmpeg` pour la conversion) doit être installé.
//!
//! ## Utilisation
//!
//! ```rust,ignore
//! use pmostream::{StreamService, StreamSettings};
//! use pmoytdlp::{YtDlpFetcher, YtDlpResolver};
//! use std::sync::Arc;
//!
//! let service = StreamService::with_parts(
//!     StreamSettings::new("/tmp/streams"),
//!     Arc::new(YtDlpFetcher::new("yt-dlp")),
//!     Arc::new(YtDlpResolver::new("yt-dlp")),
//!     Arc::new(pmostream::SystemClock),
//! )?;
//! ```

mod command;
pub mod error;
pub mod fetcher;
pub mod info;
pub mod resolver;

pub use error::{Result, YtDlpError};
pub use fetcher::{YtDlpFetcher, download_args, source_url};
pub use info::VideoInfo;
pub use resolver::{YtDlpResolver, extract_video_id};
