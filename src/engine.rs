//! Frontera con el motor de streaming/decodificación.
//!
//! El motor resuelve URIs a pistas, reproduce una pista por player y emite
//! eventos de ciclo de vida. Los eventos de un player llegan por un único
//! canal `mpsc`, de modo que la sesión dueña los observa en el orden exacto
//! de emisión.
//!
//! Contrato de eventos:
//! - `play` produce un `TrackStarted`.
//! - una pista detenida con `stop_track` termina con razón `Stopped`.
//! - una pista que revienta emite `TrackException` en lugar de `TrackEnded`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::AudioError;

/// Una unidad reproducible: título, duración y una posición en milisegundos
/// compartida con el motor (el scheduler hace seek escribiéndola, el motor la
/// lee en su propia cadencia).
#[derive(Debug, Clone)]
pub struct TrackItem {
    identifier: String,
    title: String,
    duration: Duration,
    position_ms: Arc<AtomicU64>,
}

impl TrackItem {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>, duration: Duration) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            duration,
            position_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms.load(Ordering::Acquire))
    }

    pub fn set_position(&self, position: Duration) {
        self.position_ms
            .store(position.as_millis() as u64, Ordering::Release);
    }

    /// Copia con la misma identidad de fuente pero posición nueva en cero.
    /// Es la operación que usan los modos de loop para re-encolar una pista
    /// ya terminada sin arrastrar su posición final.
    pub fn clone_reset(&self) -> Self {
        Self {
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            duration: self.duration,
            position_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn same_source(&self, other: &TrackItem) -> bool {
        self.identifier == other.identifier
    }
}

/// Frame de audio opaco (20 ms) que el transporte de voz extrae con
/// [`PlayerHandle::provide`] en su propia cadencia.
#[derive(Debug, Clone)]
pub struct AudioFrame(pub Vec<u8>);

/// Razón con la que terminó una pista.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl EndReason {
    /// Solo un final natural o una carga rota deben arrancar la siguiente
    /// pista; un stop explícito ya dejó la cola en el estado que quería.
    pub fn may_start_next(self) -> bool {
        matches!(self, EndReason::Finished | EndReason::LoadFailed)
    }
}

/// Eventos que emite el motor para un player concreto.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    TrackStarted(TrackItem),
    TrackEnded { item: TrackItem, reason: EndReason },
    TrackException { item: TrackItem, message: String },
    TrackStuck { item: TrackItem, threshold: Duration },
    Paused,
    Resumed,
}

/// Stream ordenado de eventos de un player.
pub type PlayerEvents = UnboundedReceiver<PlayerEvent>;

/// Un player del motor. Las llamadas son síncronas y baratas; el trabajo real
/// ocurre dentro del motor.
pub trait PlayerHandle: Send + Sync {
    fn play(&self, item: TrackItem);
    fn stop_track(&self);
    fn set_paused(&self, paused: bool);
    fn provide(&self) -> Option<AudioFrame>;
}

#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Crea un player nuevo junto con su stream de eventos.
    fn create_player(&self) -> (Arc<dyn PlayerHandle>, PlayerEvents);

    /// Resuelve una URI a una pista reproducible.
    async fn load_item(&self, uri: &str) -> Result<TrackItem, AudioError>;
}
