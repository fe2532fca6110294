//! # Open Music Core
//!
//! Per-guild audio session manager and track scheduler for Discord music
//! bots. The crate owns the hard part of a music bot: one live session per
//! guild with a bounded pending queue, playback control (skip, pause, seek,
//! shuffle, loop) and automatic teardown of idle sessions after a grace
//! period.
//!
//! Everything Discord- or codec-specific stays outside, behind two traits:
//! [`gateway::MessagingGateway`] (resolve voice channels, join, send replies)
//! and [`engine::AudioEngine`] (resolve URIs, play tracks, emit lifecycle
//! events). A frontend builds a [`audio::registry::SessionRegistry`] plus a
//! [`bot::CommandRouter`] and feeds parsed commands in; independent guilds
//! proceed fully in parallel, while each session's state is driven by a
//! single writer.

pub mod audio;
pub mod bot;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod playlist;

pub use audio::registry::SessionRegistry;
pub use audio::scheduler::{Enqueued, LoopMode, QueueSnapshot, TrackScheduler};
pub use audio::session::Session;
pub use bot::{Command, CommandKind, CommandRouter, SeekDirection};
pub use config::Settings;
pub use engine::{AudioEngine, EndReason, PlayerEvent, PlayerHandle, TrackItem};
pub use error::AudioError;
pub use gateway::{ChannelRef, ConnectionHandle, GuildId, MessagingGateway, UserId, VoiceJoin};
pub use playlist::{PlaylistEntry, PlaylistStore};
