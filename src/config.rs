use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Máximo de pistas pendientes por guild. Al llegar al límite, encolar
    /// falla en vez de descartar en silencio.
    pub max_queue_size: usize,

    /// Gracia antes de destruir una sesión marcada como saliente.
    pub leave_grace_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_queue_size: 250,
            leave_grace_secs: 120,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Self {
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "250".to_string())
                .parse()?,
            leave_grace_secs: std::env::var("LEAVE_GRACE_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
        };

        Ok(settings)
    }

    pub fn leave_grace(&self) -> Duration {
        Duration::from_secs(self.leave_grace_secs)
    }
}
