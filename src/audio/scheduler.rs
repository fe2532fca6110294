use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::engine::{PlayerHandle, TrackItem};
use crate::error::AudioError;

/// Política aplicada a una pista que termina de forma natural.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Off,
    Track,
    Queue,
}

impl LoopMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "off" | "none" => Some(LoopMode::Off),
            "track" | "song" => Some(LoopMode::Track),
            "queue" | "all" => Some(LoopMode::Queue),
            _ => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            LoopMode::Off => "repetición desactivada",
            LoopMode::Track => "repitiendo la pista actual",
            LoopMode::Queue => "repitiendo la cola completa",
        }
    }
}

/// Pista pendiente con su momento de encolado.
#[derive(Debug, Clone)]
pub struct QueuedItem {
    pub item: TrackItem,
    pub enqueued_at: DateTime<Utc>,
}

impl From<TrackItem> for QueuedItem {
    fn from(item: TrackItem) -> Self {
        Self {
            item,
            enqueued_at: Utc::now(),
        }
    }
}

/// Resultado de una petición de reproducción.
#[derive(Debug, Clone)]
pub enum Enqueued {
    /// No había nada sonando: la pista arrancó de inmediato.
    Started(TrackItem),
    /// Había algo sonando: quedó pendiente en esta posición (base 1).
    Queued { item: TrackItem, position: usize },
}

/// Vista ordenada de la sesión: lo que suena ahora seguido de lo pendiente.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub now_playing: Option<TrackItem>,
    pub upcoming: Vec<TrackItem>,
    pub loop_mode: LoopMode,
    pub paused: bool,
    pub total_duration: Duration,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.now_playing.is_none() && self.upcoming.is_empty()
    }
}

/// Scheduler de pistas de una sesión. Dueño de la cola pendiente, del modo
/// de loop y de todas las operaciones de control de reproducción.
///
/// Todas las operaciones son síncronas y se ejecutan bajo el mutex de la
/// sesión: un único escritor por guild, sin secciones críticas que esperen.
pub struct TrackScheduler {
    player: Arc<dyn PlayerHandle>,
    queue: VecDeque<QueuedItem>,
    current: Option<TrackItem>,
    loop_mode: LoopMode,
    paused: bool,
    max_queue_size: usize,
}

impl TrackScheduler {
    pub fn new(player: Arc<dyn PlayerHandle>, max_queue_size: usize) -> Self {
        Self {
            player,
            queue: VecDeque::new(),
            current: None,
            loop_mode: LoopMode::Off,
            paused: false,
            max_queue_size,
        }
    }

    /// Arranca la pista de inmediato si no hay nada sonando; si no, la añade
    /// al final de la cola. Con la cola al límite falla sin tocar nada.
    pub fn enqueue_or_play(&mut self, item: TrackItem) -> Result<Enqueued, AudioError> {
        if self.current.is_none() {
            self.start(item.clone());
            return Ok(Enqueued::Started(item));
        }

        if self.queue.len() >= self.max_queue_size {
            return Err(AudioError::QueueFull {
                max: self.max_queue_size,
            });
        }

        self.queue.push_back(QueuedItem::from(item.clone()));
        debug!("➕ Pista <{}> encolada en posición {}", item.title(), self.queue.len());
        Ok(Enqueued::Queued {
            item,
            position: self.queue.len(),
        })
    }

    /// Avance por final natural: aplica el modo de loop y arranca la
    /// siguiente pista, o queda inactivo si no hay nada pendiente.
    ///
    /// `Track` reinserta un clon reseteado en cabeza antes de sacar, así la
    /// misma fuente vuelve a sonar incluso con la cola vacía. `Queue` saca y
    /// después reapendiza el clon al final; si la cola estaba vacía el clon
    /// recién añadido es el que vuelve a sonar.
    pub fn advance(&mut self) -> Option<TrackItem> {
        let finished = self.current.take();

        let next = match self.loop_mode {
            LoopMode::Track => {
                if let Some(done) = &finished {
                    self.queue.push_front(QueuedItem::from(done.clone_reset()));
                }
                self.queue.pop_front()
            }
            LoopMode::Queue => {
                let next = self.queue.pop_front();
                if let Some(done) = &finished {
                    self.queue.push_back(QueuedItem::from(done.clone_reset()));
                }
                next.or_else(|| self.queue.pop_front())
            }
            LoopMode::Off => self.queue.pop_front(),
        };

        match next {
            Some(queued) => {
                self.start(queued.item.clone());
                Some(queued.item)
            }
            None => {
                debug!("📭 Cola vacía, el scheduler queda inactivo");
                None
            }
        }
    }

    /// Corta la pista actual y saca la siguiente tal cual. Una pista saltada
    /// no se vuelve a reproducir, da igual el modo de loop.
    pub fn skip(&mut self) -> Option<TrackItem> {
        if self.current.take().is_some() {
            self.player.stop_track();
        }

        let queued = self.queue.pop_front()?;
        self.start(queued.item.clone());
        Some(queued.item)
    }

    /// Detiene la reproducción y vacía la cola por completo.
    pub fn stop(&mut self) {
        if self.current.take().is_some() {
            self.player.stop_track();
        }
        self.queue.clear();
        info!("⏹️ Reproducción detenida y cola limpiada");
    }

    /// Pausa si no estaba pausado. Devuelve el flag resultante.
    pub fn pause(&mut self) -> bool {
        if !self.paused {
            self.paused = true;
            self.player.set_paused(true);
        }
        self.paused
    }

    /// Reanuda si estaba pausado. Devuelve el flag resultante.
    pub fn resume(&mut self) -> bool {
        if self.paused {
            self.paused = false;
            self.player.set_paused(false);
        }
        self.paused
    }

    /// Adelanta la posición de la pista actual. El destino queda acotado a
    /// la duración de la pista.
    pub fn seek_forward(&mut self, delta: Duration) -> Option<Duration> {
        let current = self.current.as_ref()?;
        let target = current
            .position()
            .saturating_add(delta)
            .min(current.duration());
        current.set_position(target);
        Some(target)
    }

    /// Retrocede la posición de la pista actual, nunca por debajo de cero.
    pub fn seek_backward(&mut self, delta: Duration) -> Option<Duration> {
        let current = self.current.as_ref()?;
        let target = current.position().saturating_sub(delta);
        current.set_position(target);
        Some(target)
    }

    /// Mezcla la cola pendiente in situ. No toca la pista en reproducción.
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.queue.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} pistas)", self.queue.len());
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        info!("🔁 Modo de loop: {}", mode.describe());
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn now_playing(&self) -> Option<&TrackItem> {
        self.current.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Vista ordenada {pista actual, pendientes} con la duración total.
    pub fn snapshot(&self) -> QueueSnapshot {
        let upcoming: Vec<TrackItem> = self.queue.iter().map(|q| q.item.clone()).collect();
        let total_duration = self
            .current
            .iter()
            .chain(self.queue.iter().map(|q| &q.item))
            .map(TrackItem::duration)
            .sum();

        QueueSnapshot {
            now_playing: self.current.clone(),
            upcoming,
            loop_mode: self.loop_mode,
            paused: self.paused,
            total_duration,
        }
    }

    fn start(&mut self, item: TrackItem) {
        info!("🎵 Arrancando pista <{}>", item.title());
        self.current = Some(item.clone());
        self.player.play(item);
    }
}
