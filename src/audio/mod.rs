//! # Audio Module
//!
//! Per-guild audio session management for Open Music.
//!
//! This module provides the core playback functionality:
//! - One live [`session::Session`] per guild, created on demand and torn
//!   down when idle
//! - Bounded pending-track queue with loop and shuffle support
//! - Deferred, cancelable leave with a fixed grace period
//!
//! ## Architecture
//!
//! ### [`registry`] - Session Registry
//! - Atomic create/lookup/remove across guilds
//! - Collapses concurrent joins for the same guild into one session
//! - Owns the deferred-leave timers and process shutdown
//!
//! ### [`session`] - Session Lifecycle
//! - ACTIVE → LEAVING → DESTROYED state machine
//! - Rebindable reply channel and single-writer scheduler access
//!
//! ### [`scheduler`] - Track Scheduler
//! - Queue management with loop modes (off/track/queue)
//! - Playback control: skip, stop, pause, resume, seek, shuffle
//!
//! ### [`events`] - Playback Event Bridge
//! - Applies engine events to the scheduler in emission order
//! - Converts lifecycle events into user-facing notifications

pub mod events;
pub mod registry;
pub mod scheduler;
pub mod session;
