//! Frontera con el gateway de mensajería/voz.
//!
//! El núcleo nunca habla con Discord directamente: resuelve canales de voz,
//! se une a ellos y envía respuestas a través de estos traits. El frontend
//! del bot (serenity, discord4j, lo que sea) los implementa.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AudioError;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype! {
    /// Identificador de guild (server). Clave única del registro de sesiones.
    GuildId
}

id_newtype! {
    /// Referencia a un canal, de voz o de texto según el contexto.
    ChannelRef
}

id_newtype! {
    /// Identificador de usuario, usado al resolver su canal de voz y al
    /// exportar playlists.
    UserId
}

/// Resultado de unirse a un canal de voz: la conexión viva más el canal de
/// texto al que responder por defecto.
pub struct VoiceJoin {
    pub connection: Arc<dyn ConnectionHandle>,
    pub reply_channel: ChannelRef,
}

/// Conexión de voz viva. Desconectar es asíncrono y puede colgarse; el
/// registro nunca lo espera dentro de un lock.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    async fn disconnect(&self) -> anyhow::Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Canal de voz en el que está el miembro ahora mismo, si está en alguno.
    async fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelRef>;

    /// Se une al canal de voz indicado y devuelve la conexión.
    async fn join(&self, guild: GuildId, voice: ChannelRef) -> Result<VoiceJoin, AudioError>;

    /// Envía un mensaje de texto. Fire-and-forget: el núcleo no espera ni
    /// reintenta.
    fn send(&self, channel: ChannelRef, content: String);
}
