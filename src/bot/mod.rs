//! Superficie de comandos del núcleo.
//!
//! El [`CommandRouter`] es el punto de entrada del frontend: recibe comandos
//! ya parseados y los despacha contra el registro de sesiones a través de una
//! tabla estática construida una sola vez. Sin globals: el router se
//! construye explícitamente con sus colaboradores y se inyecta donde haga
//! falta.

pub mod commands;
pub mod handlers;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::audio::registry::SessionRegistry;
use crate::audio::session::Session;
use crate::engine::AudioEngine;
use crate::error::AudioError;
use crate::gateway::{ChannelRef, GuildId, MessagingGateway};
use crate::playlist::PlaylistStore;

pub use commands::{Command, CommandKind, SeekDirection};

pub struct CommandRouter {
    registry: SessionRegistry,
    gateway: Arc<dyn MessagingGateway>,
    engine: Arc<dyn AudioEngine>,
    playlists: Arc<dyn PlaylistStore>,
}

impl CommandRouter {
    pub fn new(
        registry: SessionRegistry,
        gateway: Arc<dyn MessagingGateway>,
        engine: Arc<dyn AudioEngine>,
        playlists: Arc<dyn PlaylistStore>,
    ) -> Self {
        Self {
            registry,
            gateway,
            engine,
            playlists,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub(crate) fn gateway(&self) -> &dyn MessagingGateway {
        self.gateway.as_ref()
    }

    pub(crate) fn engine(&self) -> &dyn AudioEngine {
        self.engine.as_ref()
    }

    pub(crate) fn playlists(&self) -> &dyn PlaylistStore {
        self.playlists.as_ref()
    }

    /// Despacha un comando por la tabla estática. Los fallos de dominio se
    /// notifican al usuario dentro del handler; un `Err` aquí es un bug de
    /// cableado, no un fallo de reproducción.
    pub async fn dispatch(&self, command: Command) -> Result<()> {
        let kind = command.kind();
        debug!("Despachando <{kind:?}> para guild <{}>", command.guild());
        let handler = commands::DISPATCH_TABLE
            .iter()
            .find(|(registered, _)| *registered == kind)
            .map(|(_, handler)| handler)
            .ok_or_else(|| anyhow!("comando <{kind:?}> sin handler registrado"))?;

        handler(self, command).await
    }

    /// Sesión viva del guild. Cualquier comando sobre una sesión saliente la
    /// devuelve a ACTIVE y desarma la salida pendiente.
    pub(crate) fn active_session(&self, guild_id: GuildId) -> Result<Arc<Session>, AudioError> {
        let session = self
            .registry
            .lookup(guild_id)
            .ok_or(AudioError::NoActiveSession(guild_id))?;
        session.mark_active();
        Ok(session)
    }

    pub(crate) fn notify(&self, channel: ChannelRef, content: impl Into<String>) {
        self.gateway.send(channel, content.into());
    }
}
