use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::events;
use crate::audio::scheduler::TrackScheduler;
use crate::audio::session::Session;
use crate::config::Settings;
use crate::engine::AudioEngine;
use crate::error::AudioError;
use crate::gateway::{ChannelRef, GuildId, MessagingGateway};

type SessionCell = Arc<OnceCell<Arc<Session>>>;

/// Tabla de sesiones por guild. Es el único objeto que tocan varios guilds a
/// la vez; crear, consultar y quitar son atómicos entre sí, y el interior de
/// cada sesión queda en manos de su único escritor una vez creada.
///
/// El handle es clonable y barato: todos los clones comparten la misma tabla.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: DashMap<GuildId, SessionCell>,
    gateway: Arc<dyn MessagingGateway>,
    engine: Arc<dyn AudioEngine>,
    settings: Settings,
}

impl SessionRegistry {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        engine: Arc<dyn AudioEngine>,
        settings: Settings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: DashMap::new(),
                gateway,
                engine,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Devuelve la sesión del guild o la crea uniéndose al canal de voz.
    ///
    /// Llamadas concurrentes para un mismo guild sin sesión colapsan en
    /// exactamente un join y una sesión: la celda se instala de forma atómica
    /// en la tabla y el `OnceCell` serializa la inicialización. Si el join
    /// falla, la celda vacía se retira para que el siguiente intento vuelva a
    /// unirse.
    pub async fn get_or_create(
        &self,
        guild_id: GuildId,
        voice: ChannelRef,
    ) -> Result<Arc<Session>, AudioError> {
        let cell: SessionCell = self
            .inner
            .sessions
            .entry(guild_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let session = cell
            .get_or_try_init(|| self.create_session(guild_id, voice))
            .await;

        match session {
            Ok(session) => Ok(Arc::clone(session)),
            Err(cause) => {
                self.inner
                    .sessions
                    .remove_if(&guild_id, |_, existing| {
                        Arc::ptr_eq(existing, &cell) && existing.get().is_none()
                    });
                Err(cause)
            }
        }
    }

    async fn create_session(
        &self,
        guild_id: GuildId,
        voice: ChannelRef,
    ) -> Result<Arc<Session>, AudioError> {
        let join = self.inner.gateway.join(guild_id, voice).await?;
        let (player, player_events) = self.inner.engine.create_player();
        let scheduler = TrackScheduler::new(Arc::clone(&player), self.inner.settings.max_queue_size);

        let session = Arc::new(Session::new(
            guild_id,
            player,
            join.connection,
            scheduler,
            join.reply_channel,
        ));
        let bridge = events::spawn_bridge(&session, player_events, Arc::clone(&self.inner.gateway));
        session.attach_bridge(bridge);

        info!("🔊 Sesión de audio creada en guild <{guild_id}>");
        Ok(session)
    }

    pub fn lookup(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.inner
            .sessions
            .get(&guild_id)
            .and_then(|cell| cell.get().cloned())
    }

    /// Saca la sesión de la tabla sin destruirla.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.inner
            .sessions
            .remove(&guild_id)
            .and_then(|(_, cell)| cell.get().cloned())
    }

    /// Quita la sesión de la tabla y la destruye. La entrada desaparece de
    /// inmediato mientras la desconexión sigue por su cuenta.
    pub fn destroy(&self, guild_id: GuildId) -> bool {
        match self.remove(guild_id) {
            Some(session) => {
                session.destroy();
                true
            }
            None => false,
        }
    }

    /// Vacía la cola, marca la sesión como saliente y arma la salida
    /// diferida. Volver a llamarlo reemplaza el timer pendiente, nunca lo
    /// duplica.
    pub fn schedule_leave(&self, guild_id: GuildId) -> Result<(), AudioError> {
        let session = self
            .lookup(guild_id)
            .ok_or(AudioError::NoActiveSession(guild_id))?;

        session.with_scheduler(|scheduler| scheduler.stop());

        let grace = self.inner.settings.leave_grace();
        info!(
            "⏱️ Salida del guild <{guild_id}> programada en {}",
            humantime::format_duration(grace)
        );

        let token = CancellationToken::new();
        let fired = token.clone();
        let registry = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = fired.cancelled() => {
                    debug!("Timer de salida del guild <{guild_id}> cancelado");
                }
                _ = tokio::time::sleep(grace) => {
                    registry.destroy(guild_id);
                }
            }
        });
        session.arm_teardown(token);

        Ok(())
    }

    /// Apagado del proceso: destruye todas las sesiones. Cada desconexión
    /// corre en su propia task; una colgada no frena a las demás.
    pub fn destroy_all(&self) {
        let guilds: Vec<GuildId> = self
            .inner
            .sessions
            .iter()
            .map(|entry| *entry.key())
            .collect();

        info!("Apagando el registro: {} sesiones de audio", guilds.len());
        for guild_id in guilds {
            if !self.destroy(guild_id) {
                warn!("La sesión del guild <{guild_id}> desapareció durante el apagado");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }
}
