//! Puente entre los eventos del motor y el scheduler de la sesión.
//!
//! Una task por sesión consume el stream del player en orden de emisión y lo
//! traduce a transiciones del scheduler y notificaciones al canal de
//! respuesta. La task guarda una referencia débil a la sesión: los eventos
//! que llegan para una sesión ya destruida se descartan sin más.

use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::session::Session;
use crate::engine::{PlayerEvent, PlayerEvents};
use crate::gateway::MessagingGateway;

pub(crate) fn spawn_bridge(
    session: &Arc<Session>,
    mut events: PlayerEvents,
    gateway: Arc<dyn MessagingGateway>,
) -> JoinHandle<()> {
    let weak: Weak<Session> = Arc::downgrade(session);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(session) = weak.upgrade() else {
                break;
            };
            apply(&session, gateway.as_ref(), event);
        }
    })
}

fn apply(session: &Session, gateway: &dyn MessagingGateway, event: PlayerEvent) {
    let guild_id = session.guild_id();
    let reply = session.reply_channel();

    match event {
        PlayerEvent::TrackStarted(item) => {
            info!("🎵 Pista <{}> arrancó en guild <{guild_id}>", item.title());
            gateway.send(
                reply,
                format!(":musical_note: Reproduciendo ahora: **{}**", item.title()),
            );
        }
        PlayerEvent::TrackEnded { item, reason } => {
            info!(
                "Pista <{}> terminó en guild <{guild_id}> con razón <{reason:?}>",
                item.title()
            );
            if reason.may_start_next() {
                advance(session);
            }
        }
        PlayerEvent::TrackException { item, message } => {
            error!(
                "Pista <{}> falló en guild <{guild_id}>: {message}",
                item.title()
            );
            gateway.send(
                reply,
                format!(":warning: La pista **{}** falló, saltando a la siguiente", item.title()),
            );
            // una pista rota cuenta como terminada: la cola sigue avanzando
            advance(session);
        }
        PlayerEvent::TrackStuck { item, threshold } => {
            warn!(
                "Pista <{}> atascada {} en guild <{guild_id}>",
                item.title(),
                humantime::format_duration(threshold)
            );
            gateway.send(
                reply,
                format!(":warning: La pista **{}** se atascó, saltando a la siguiente", item.title()),
            );
            if session.with_scheduler(|scheduler| scheduler.skip()).is_none() {
                debug!("Guild <{guild_id}> sin más pistas tras el atasco");
            }
        }
        PlayerEvent::Paused => {
            gateway.send(
                reply,
                ":pause_button: Reproducción pausada. Usa `resume` para continuar".to_string(),
            );
        }
        PlayerEvent::Resumed => {
            gateway.send(reply, ":arrow_forward: Reproducción reanudada".to_string());
        }
    }
}

fn advance(session: &Session) {
    if session.with_scheduler(|scheduler| scheduler.advance()).is_none() {
        debug!("Guild <{}> quedó sin pistas pendientes", session.guild_id());
    }
}
