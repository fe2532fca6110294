use thiserror::Error;

use crate::gateway::GuildId;

/// Errores del núcleo de audio. Todos quedan confinados al guild que los
/// produjo: los handlers los convierten en notificaciones, nunca tumban la
/// sesión.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no se pudo unir al canal de voz: {0}")]
    VoiceJoin(String),

    #[error("no se pudo resolver la fuente <{uri}>: {message}")]
    Load { uri: String, message: String },

    #[error("la cola está llena (máximo {max} pistas)")]
    QueueFull { max: usize },

    #[error("no hay sesión de audio activa en el guild <{0}>")]
    NoActiveSession(GuildId),
}

impl AudioError {
    pub fn load(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            uri: uri.into(),
            message: message.into(),
        }
    }
}
