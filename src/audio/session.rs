use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::audio::scheduler::TrackScheduler;
use crate::engine::PlayerHandle;
use crate::gateway::{ChannelRef, ConnectionHandle, GuildId};

/// Sesión de audio viva de un guild: un player del motor, su scheduler, el
/// canal de respuesta vigente y el temporizador de salida diferida.
///
/// Ciclo de vida: ACTIVE desde que el join tiene éxito; LEAVING cuando se
/// programa la salida (cola vaciada, timer armado); DESTROYED cuando el timer
/// dispara, un leave explícito completa la desconexión o el proceso se apaga.
/// Cualquier actividad nueva mientras está LEAVING desarma el timer y la
/// devuelve a ACTIVE.
pub struct Session {
    guild_id: GuildId,
    player: Arc<dyn PlayerHandle>,
    connection: Arc<dyn ConnectionHandle>,
    scheduler: Mutex<TrackScheduler>,
    reply_channel: Mutex<ChannelRef>,
    leaving: AtomicBool,
    teardown: Mutex<Option<CancellationToken>>,
    bridge: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(
        guild_id: GuildId,
        player: Arc<dyn PlayerHandle>,
        connection: Arc<dyn ConnectionHandle>,
        scheduler: TrackScheduler,
        reply_channel: ChannelRef,
    ) -> Self {
        Self {
            guild_id,
            player,
            connection,
            scheduler: Mutex::new(scheduler),
            reply_channel: Mutex::new(reply_channel),
            leaving: AtomicBool::new(false),
            teardown: Mutex::new(None),
            bridge: Mutex::new(None),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Ejecuta una operación del scheduler bajo el lock de la sesión. Las
    /// secciones críticas son cortas y nunca esperan.
    pub fn with_scheduler<R>(&self, op: impl FnOnce(&mut TrackScheduler) -> R) -> R {
        op(&mut self.scheduler.lock())
    }

    /// Canal al que van las notificaciones de reproducción.
    pub fn reply_channel(&self) -> ChannelRef {
        *self.reply_channel.lock()
    }

    /// Cada petición de reproducción reancla el canal de respuesta al canal
    /// desde el que llegó.
    pub fn bind_reply_channel(&self, channel: ChannelRef) {
        *self.reply_channel.lock() = channel;
    }

    pub fn is_leaving(&self) -> bool {
        self.leaving.load(Ordering::Acquire)
    }

    /// Arma el temporizador de salida. Si había uno pendiente lo reemplaza:
    /// nunca hay más de un timer armado por sesión.
    pub(crate) fn arm_teardown(&self, token: CancellationToken) {
        self.leaving.store(true, Ordering::Release);
        if let Some(previous) = self.teardown.lock().replace(token) {
            previous.cancel();
        }
    }

    /// Hay una salida diferida pendiente de disparar.
    pub fn teardown_armed(&self) -> bool {
        self.teardown.lock().is_some()
    }

    /// Actividad nueva sobre la sesión: desarma cualquier salida pendiente y
    /// la devuelve a ACTIVE. Sin esto, un `play` durante la gracia acabaría
    /// desconectando al bot en mitad de la reproducción.
    pub fn mark_active(&self) {
        if let Some(token) = self.teardown.lock().take() {
            debug!("⏱️ Salida pendiente cancelada por nueva actividad en guild <{}>", self.guild_id);
            token.cancel();
        }
        self.leaving.store(false, Ordering::Release);
    }

    pub(crate) fn attach_bridge(&self, handle: JoinHandle<()>) {
        *self.bridge.lock() = Some(handle);
    }

    /// Destruye la sesión: para el puente de eventos, cancela el timer, corta
    /// la pista en curso y lanza la desconexión en su propia task. Una
    /// desconexión colgada jamás bloquea al que llama ni a otros guilds.
    pub fn destroy(&self) {
        info!("💥 Destruyendo sesión de audio en guild <{}>", self.guild_id);

        if let Some(bridge) = self.bridge.lock().take() {
            bridge.abort();
        }
        if let Some(token) = self.teardown.lock().take() {
            token.cancel();
        }
        self.with_scheduler(|scheduler| scheduler.stop());
        self.player.stop_track();

        let connection = Arc::clone(&self.connection);
        let guild_id = self.guild_id;
        tokio::spawn(async move {
            if let Err(cause) = connection.disconnect().await {
                error!("Fallo al desconectar la sesión del guild <{guild_id}>: {cause:#}");
            } else {
                debug!("Sesión del guild <{guild_id}> desconectada");
            }
        });
    }
}
