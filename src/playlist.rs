//! Exportación de colas como playlists. La persistencia real (Mongo, JSON,
//! lo que sea) vive fuera del núcleo, detrás de [`PlaylistStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::TrackItem;
use crate::gateway::UserId;

/// Una pista exportada, sin estado de reproducción: solo lo necesario para
/// volver a resolverla más tarde.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub identifier: String,
    pub title: String,
    pub duration_ms: u64,
}

impl From<&TrackItem> for PlaylistEntry {
    fn from(item: &TrackItem) -> Self {
        Self {
            identifier: item.identifier().to_string(),
            title: item.title().to_string(),
            duration_ms: item.duration().as_millis() as u64,
        }
    }
}

/// Colaborador externo que persiste playlists por (usuario, nombre).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    async fn save(
        &self,
        user: UserId,
        name: &str,
        entries: Vec<PlaylistEntry>,
    ) -> anyhow::Result<()>;

    /// Recupera una playlist guardada, o `None` si el usuario no tiene
    /// ninguna con ese nombre.
    async fn load(&self, user: UserId, name: &str) -> anyhow::Result<Option<Vec<PlaylistEntry>>>;
}
