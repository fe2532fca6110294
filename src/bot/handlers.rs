//! Handlers de comandos. Todos siguen la misma regla: un fallo de dominio
//! (join, carga, cola llena, sesión ausente) se convierte en una notificación
//! al usuario y el handler devuelve `Ok` — nunca corrompe la cola ni tumba la
//! sesión del guild.

use anyhow::{bail, Result};
use tracing::{debug, error, warn};

use crate::audio::scheduler::{Enqueued, QueueSnapshot};
use crate::bot::commands::SeekDirection;
use crate::bot::{Command, CommandRouter};
use crate::error::AudioError;
use crate::playlist::PlaylistEntry;

pub(super) async fn play(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Play {
        guild,
        user,
        source,
        reply,
    } = command
    else {
        bail!("comando inesperado para el handler de play");
    };

    let Some(voice) = router.gateway().voice_channel_of(guild, user).await else {
        router.notify(reply, ":x: Tienes que estar en un canal de voz para pedir música");
        return Ok(());
    };

    let session = match router.registry().get_or_create(guild, voice).await {
        Ok(session) => session,
        Err(cause) => {
            error!("Fallo al unirse al canal de voz en guild <{guild}>: {cause}");
            router.notify(reply, ":x: No pude unirme a tu canal de voz");
            return Ok(());
        }
    };
    session.mark_active();
    session.bind_reply_channel(reply);

    let item = match router.engine().load_item(&source).await {
        Ok(item) => item,
        Err(cause) => {
            warn!("Fuente <{source}> irresoluble en guild <{guild}>: {cause}");
            router.notify(reply, format!(":x: No pude resolver la fuente <{source}>"));
            return Ok(());
        }
    };

    match session.with_scheduler(|scheduler| scheduler.enqueue_or_play(item)) {
        Ok(Enqueued::Started(_)) => {
            // la notificación de "reproduciendo ahora" llega por el puente
            // de eventos cuando el motor emite TrackStarted
        }
        Ok(Enqueued::Queued { item, position }) => {
            router.notify(
                reply,
                format!(":notes: **{}** en cola (posición {position})", item.title()),
            );
        }
        Err(cause) => {
            router.notify(reply, format!(":x: {cause}"));
        }
    }

    Ok(())
}

pub(super) async fn leave(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Leave { guild, reply } = command else {
        bail!("comando inesperado para el handler de leave");
    };

    if router.registry().destroy(guild) {
        router.notify(reply, ":wave: Hasta la próxima");
    } else {
        router.notify(reply, ":x: No estoy en ningún canal de voz de este server");
    }
    Ok(())
}

pub(super) async fn stop(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Stop { guild, reply } = command else {
        bail!("comando inesperado para el handler de stop");
    };

    match router.registry().schedule_leave(guild) {
        Ok(()) => {
            let grace = router.registry().settings().leave_grace();
            router.notify(
                reply,
                format!(
                    ":stop_button: Cola detenida. Me iré en {} si nadie pide nada más",
                    humantime::format_duration(grace)
                ),
            );
        }
        Err(cause) => router.notify(reply, format!(":x: {cause}")),
    }
    Ok(())
}

pub(super) async fn skip(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Skip { guild, reply } = command else {
        bail!("comando inesperado para el handler de skip");
    };

    let session = match router.active_session(guild) {
        Ok(session) => session,
        Err(cause) => return notify_domain_error(router, reply, cause),
    };

    if session.with_scheduler(|scheduler| scheduler.skip()).is_none() {
        router.notify(reply, ":track_next: No quedan más pistas en la cola");
    }
    Ok(())
}

pub(super) async fn pause(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Pause { guild, reply } = command else {
        bail!("comando inesperado para el handler de pause");
    };

    let session = match router.active_session(guild) {
        Ok(session) => session,
        Err(cause) => return notify_domain_error(router, reply, cause),
    };

    let paused = session.with_scheduler(|scheduler| scheduler.pause());
    debug!("Guild <{guild}> pausado: {paused}");
    Ok(())
}

pub(super) async fn resume(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Resume { guild, reply } = command else {
        bail!("comando inesperado para el handler de resume");
    };

    let session = match router.active_session(guild) {
        Ok(session) => session,
        Err(cause) => return notify_domain_error(router, reply, cause),
    };

    let paused = session.with_scheduler(|scheduler| scheduler.resume());
    debug!("Guild <{guild}> pausado: {paused}");
    Ok(())
}

pub(super) async fn seek(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Seek {
        guild,
        delta,
        direction,
        reply,
    } = command
    else {
        bail!("comando inesperado para el handler de seek");
    };

    let session = match router.active_session(guild) {
        Ok(session) => session,
        Err(cause) => return notify_domain_error(router, reply, cause),
    };

    let position = session.with_scheduler(|scheduler| match direction {
        SeekDirection::Forward => scheduler.seek_forward(delta),
        SeekDirection::Backward => scheduler.seek_backward(delta),
    });

    match position {
        Some(position) => router.notify(
            reply,
            format!(
                ":fast_forward: Posición: {}",
                humantime::format_duration(position)
            ),
        ),
        None => router.notify(reply, ":x: No hay ninguna pista reproduciéndose"),
    }
    Ok(())
}

pub(super) async fn shuffle(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Shuffle { guild, reply } = command else {
        bail!("comando inesperado para el handler de shuffle");
    };

    let session = match router.active_session(guild) {
        Ok(session) => session,
        Err(cause) => return notify_domain_error(router, reply, cause),
    };

    session.with_scheduler(|scheduler| scheduler.shuffle());
    router.notify(reply, ":twisted_rightwards_arrows: Cola mezclada");
    Ok(())
}

pub(super) async fn set_loop(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::SetLoop { guild, mode, reply } = command else {
        bail!("comando inesperado para el handler de loop");
    };

    let session = match router.active_session(guild) {
        Ok(session) => session,
        Err(cause) => return notify_domain_error(router, reply, cause),
    };

    session.with_scheduler(|scheduler| scheduler.set_loop_mode(mode));
    router.notify(reply, format!(":repeat: Ahora {}", mode.describe()));
    Ok(())
}

pub(super) async fn queue(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::Queue { guild, reply } = command else {
        bail!("comando inesperado para el handler de queue");
    };

    let session = match router.active_session(guild) {
        Ok(session) => session,
        Err(cause) => return notify_domain_error(router, reply, cause),
    };

    let snapshot = session.with_scheduler(|scheduler| scheduler.snapshot());
    router.notify(reply, render_snapshot(&snapshot));
    Ok(())
}

pub(super) async fn save_playlist(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::SavePlaylist {
        guild,
        user,
        name,
        reply,
    } = command
    else {
        bail!("comando inesperado para el handler de saveplaylist");
    };

    let session = match router.active_session(guild) {
        Ok(session) => session,
        Err(cause) => return notify_domain_error(router, reply, cause),
    };

    let snapshot = session.with_scheduler(|scheduler| scheduler.snapshot());
    if snapshot.is_empty() {
        router.notify(reply, ":x: No hay nada sonando ni en cola que guardar");
        return Ok(());
    }

    let entries: Vec<PlaylistEntry> = snapshot
        .now_playing
        .iter()
        .chain(snapshot.upcoming.iter())
        .map(PlaylistEntry::from)
        .collect();
    let total = entries.len();

    match router.playlists().save(user, &name, entries).await {
        Ok(()) => router.notify(
            reply,
            format!(":floppy_disk: Playlist **{name}** guardada con {total} pistas"),
        ),
        Err(cause) => {
            error!("Fallo al guardar la playlist <{name}> del usuario <{user}>: {cause:#}");
            router.notify(reply, ":x: No pude guardar la playlist");
        }
    }
    Ok(())
}

pub(super) async fn load_playlist(router: &CommandRouter, command: Command) -> Result<()> {
    let Command::LoadPlaylist {
        guild,
        user,
        name,
        reply,
    } = command
    else {
        bail!("comando inesperado para el handler de loadplaylist");
    };

    let entries = match router.playlists().load(user, &name).await {
        Ok(Some(entries)) if !entries.is_empty() => entries,
        Ok(_) => {
            router.notify(
                reply,
                format!(":x: No encontré ninguna playlist **{name}** tuya"),
            );
            return Ok(());
        }
        Err(cause) => {
            error!("Fallo al cargar la playlist <{name}> del usuario <{user}>: {cause:#}");
            router.notify(reply, ":x: No pude cargar la playlist");
            return Ok(());
        }
    };

    let Some(voice) = router.gateway().voice_channel_of(guild, user).await else {
        router.notify(reply, ":x: Tienes que estar en un canal de voz para pedir música");
        return Ok(());
    };

    let session = match router.registry().get_or_create(guild, voice).await {
        Ok(session) => session,
        Err(cause) => {
            error!("Fallo al unirse al canal de voz en guild <{guild}>: {cause}");
            router.notify(reply, ":x: No pude unirme a tu canal de voz");
            return Ok(());
        }
    };
    session.mark_active();
    session.bind_reply_channel(reply);

    let mut loaded = 0usize;
    let mut total = std::time::Duration::ZERO;
    for entry in &entries {
        let item = match router.engine().load_item(&entry.identifier).await {
            Ok(item) => item,
            Err(cause) => {
                warn!(
                    "Pista <{}> de la playlist <{name}> irresoluble: {cause}",
                    entry.identifier
                );
                continue;
            }
        };
        let duration = item.duration();
        match session.with_scheduler(|scheduler| scheduler.enqueue_or_play(item)) {
            Ok(_) => {
                loaded += 1;
                total += duration;
            }
            Err(cause) => {
                router.notify(reply, format!(":x: {cause}"));
                break;
            }
        }
    }

    if loaded == 0 {
        router.notify(
            reply,
            format!(":x: No pude resolver ninguna pista de la playlist **{name}**"),
        );
        return Ok(());
    }

    router.notify(
        reply,
        format!(
            ":notes: Playlist **{name}** cargada: **{loaded}** pistas con una duración total de {}",
            humantime::format_duration(total)
        ),
    );
    Ok(())
}

fn notify_domain_error(
    router: &CommandRouter,
    reply: crate::gateway::ChannelRef,
    cause: AudioError,
) -> Result<()> {
    router.notify(reply, format!(":x: {cause}"));
    Ok(())
}

fn render_snapshot(snapshot: &QueueSnapshot) -> String {
    if snapshot.is_empty() {
        return ":mailbox_with_no_mail: La cola está vacía".to_string();
    }

    let mut lines = Vec::with_capacity(snapshot.upcoming.len() + 2);
    if let Some(now) = &snapshot.now_playing {
        lines.push(format!(
            ":musical_note: Sonando: **{}** [{}]",
            now.title(),
            humantime::format_duration(now.duration())
        ));
    }
    for (index, item) in snapshot.upcoming.iter().enumerate() {
        lines.push(format!(
            "`{}.` {} [{}]",
            index + 1,
            item.title(),
            humantime::format_duration(item.duration())
        ));
    }
    lines.push(format!(
        "Duración total: {}",
        humantime::format_duration(snapshot.total_duration)
    ));
    lines.join("\n")
}
