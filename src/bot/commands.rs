use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::audio::scheduler::LoopMode;
use crate::bot::{handlers, CommandRouter};
use crate::gateway::{ChannelRef, GuildId, UserId};

/// Sentido de un seek relativo sobre la pista en reproducción.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// Comando ya parseado por el frontend. Todos llevan el canal desde el que
/// llegaron para poder responder ahí mismo.
#[derive(Debug, Clone)]
pub enum Command {
    Play {
        guild: GuildId,
        user: UserId,
        source: String,
        reply: ChannelRef,
    },
    Leave {
        guild: GuildId,
        reply: ChannelRef,
    },
    Skip {
        guild: GuildId,
        reply: ChannelRef,
    },
    Pause {
        guild: GuildId,
        reply: ChannelRef,
    },
    Resume {
        guild: GuildId,
        reply: ChannelRef,
    },
    Seek {
        guild: GuildId,
        delta: Duration,
        direction: SeekDirection,
        reply: ChannelRef,
    },
    Shuffle {
        guild: GuildId,
        reply: ChannelRef,
    },
    SetLoop {
        guild: GuildId,
        mode: LoopMode,
        reply: ChannelRef,
    },
    Queue {
        guild: GuildId,
        reply: ChannelRef,
    },
    /// Detiene la cola y programa la salida tras la gracia configurada.
    Stop {
        guild: GuildId,
        reply: ChannelRef,
    },
    /// Exporta la cola actual al almacén de playlists externo.
    SavePlaylist {
        guild: GuildId,
        user: UserId,
        name: String,
        reply: ChannelRef,
    },
    /// Recupera una playlist guardada y encola sus pistas una a una.
    LoadPlaylist {
        guild: GuildId,
        user: UserId,
        name: String,
        reply: ChannelRef,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Play { .. } => CommandKind::Play,
            Command::Leave { .. } => CommandKind::Leave,
            Command::Skip { .. } => CommandKind::Skip,
            Command::Pause { .. } => CommandKind::Pause,
            Command::Resume { .. } => CommandKind::Resume,
            Command::Seek { .. } => CommandKind::Seek,
            Command::Shuffle { .. } => CommandKind::Shuffle,
            Command::SetLoop { .. } => CommandKind::SetLoop,
            Command::Queue { .. } => CommandKind::Queue,
            Command::Stop { .. } => CommandKind::Stop,
            Command::SavePlaylist { .. } => CommandKind::SavePlaylist,
            Command::LoadPlaylist { .. } => CommandKind::LoadPlaylist,
        }
    }

    pub fn guild(&self) -> GuildId {
        match self {
            Command::Play { guild, .. }
            | Command::Leave { guild, .. }
            | Command::Skip { guild, .. }
            | Command::Pause { guild, .. }
            | Command::Resume { guild, .. }
            | Command::Seek { guild, .. }
            | Command::Shuffle { guild, .. }
            | Command::SetLoop { guild, .. }
            | Command::Queue { guild, .. }
            | Command::Stop { guild, .. }
            | Command::SavePlaylist { guild, .. }
            | Command::LoadPlaylist { guild, .. } => *guild,
        }
    }
}

/// Etiqueta de comando, la palabra con la que se invoca en el chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Play,
    Leave,
    Skip,
    Pause,
    Resume,
    Seek,
    Shuffle,
    SetLoop,
    Queue,
    Stop,
    SavePlaylist,
    LoadPlaylist,
}

impl CommandKind {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "play" => Some(Self::Play),
            "leave" => Some(Self::Leave),
            "skip" => Some(Self::Skip),
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            "seek" => Some(Self::Seek),
            "shuffle" => Some(Self::Shuffle),
            "loop" => Some(Self::SetLoop),
            "queue" => Some(Self::Queue),
            "stop" => Some(Self::Stop),
            "saveplaylist" => Some(Self::SavePlaylist),
            "loadplaylist" => Some(Self::LoadPlaylist),
            _ => None,
        }
    }
}

pub type CommandHandler =
    for<'a> fn(&'a CommandRouter, Command) -> BoxFuture<'a, anyhow::Result<()>>;

macro_rules! handler {
    ($name:path) => {{
        fn boxed(router: &CommandRouter, command: Command) -> BoxFuture<'_, anyhow::Result<()>> {
            $name(router, command).boxed()
        }
        boxed as CommandHandler
    }};
}

/// Tabla estática de despacho: cada etiqueta con su handler, construida una
/// vez en compilación.
pub const DISPATCH_TABLE: &[(CommandKind, CommandHandler)] = &[
    (CommandKind::Play, handler!(handlers::play)),
    (CommandKind::Leave, handler!(handlers::leave)),
    (CommandKind::Skip, handler!(handlers::skip)),
    (CommandKind::Pause, handler!(handlers::pause)),
    (CommandKind::Resume, handler!(handlers::resume)),
    (CommandKind::Seek, handler!(handlers::seek)),
    (CommandKind::Shuffle, handler!(handlers::shuffle)),
    (CommandKind::SetLoop, handler!(handlers::set_loop)),
    (CommandKind::Queue, handler!(handlers::queue)),
    (CommandKind::Stop, handler!(handlers::stop)),
    (CommandKind::SavePlaylist, handler!(handlers::save_playlist)),
    (CommandKind::LoadPlaylist, handler!(handlers::load_playlist)),
];
