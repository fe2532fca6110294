//! Flujo completo contra el router: gateway y motor falsos, reloj de tokio
//! pausado para los timers de salida.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc::{self, UnboundedSender};

use open_music_core::{
    AudioEngine, AudioError, ChannelRef, Command, CommandRouter, ConnectionHandle, EndReason,
    GuildId, LoopMode, MessagingGateway, PlayerEvent, PlayerHandle, PlaylistEntry, PlaylistStore,
    SessionRegistry, Settings, TrackItem, UserId,
};

const GUILD: GuildId = GuildId(7);
const USER: UserId = UserId(42);
const TEXT: ChannelRef = ChannelRef(100);
const VOICE: ChannelRef = ChannelRef(200);

struct FakeConnection {
    disconnects: Arc<AtomicUsize>,
}

#[async_trait]
impl ConnectionHandle for FakeConnection {
    async fn disconnect(&self) -> anyhow::Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FakeGateway {
    joins: AtomicUsize,
    disconnects: Arc<AtomicUsize>,
    sent: Mutex<Vec<(ChannelRef, String)>>,
}

impl FakeGateway {
    fn messages(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    fn last_message(&self) -> Option<String> {
        self.sent.lock().last().map(|(_, m)| m.clone())
    }
}

#[async_trait]
impl MessagingGateway for FakeGateway {
    async fn voice_channel_of(&self, _guild: GuildId, _user: UserId) -> Option<ChannelRef> {
        Some(VOICE)
    }

    async fn join(
        &self,
        _guild: GuildId,
        _voice: ChannelRef,
    ) -> Result<open_music_core::gateway::VoiceJoin, AudioError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        Ok(open_music_core::gateway::VoiceJoin {
            connection: Arc::new(FakeConnection {
                disconnects: Arc::clone(&self.disconnects),
            }),
            reply_channel: TEXT,
        })
    }

    fn send(&self, channel: ChannelRef, content: String) {
        self.sent.lock().push((channel, content));
    }
}

struct FakePlayer {
    events: UnboundedSender<PlayerEvent>,
    playing: Mutex<Option<TrackItem>>,
    paused: AtomicBool,
}

impl FakePlayer {
    /// Simula el final natural de la pista en curso.
    fn finish_current(&self) {
        if let Some(item) = self.playing.lock().take() {
            let _ = self.events.send(PlayerEvent::TrackEnded {
                item,
                reason: EndReason::Finished,
            });
        }
    }

    /// Simula que la pista en curso revienta en el motor.
    fn fail_current(&self, message: &str) {
        if let Some(item) = self.playing.lock().take() {
            let _ = self.events.send(PlayerEvent::TrackException {
                item,
                message: message.to_string(),
            });
        }
    }

    /// Simula que la pista en curso se queda colgada sin producir audio.
    fn stick_current(&self) {
        if let Some(item) = self.playing.lock().take() {
            let _ = self.events.send(PlayerEvent::TrackStuck {
                item,
                threshold: Duration::from_secs(10),
            });
        }
    }

    fn playing_title(&self) -> Option<String> {
        self.playing.lock().as_ref().map(|t| t.title().to_string())
    }
}

impl PlayerHandle for FakePlayer {
    fn play(&self, item: TrackItem) {
        *self.playing.lock() = Some(item.clone());
        let _ = self.events.send(PlayerEvent::TrackStarted(item));
    }

    fn stop_track(&self) {
        if let Some(item) = self.playing.lock().take() {
            let _ = self.events.send(PlayerEvent::TrackEnded {
                item,
                reason: EndReason::Stopped,
            });
        }
    }

    fn set_paused(&self, paused: bool) {
        if self.paused.swap(paused, Ordering::SeqCst) != paused {
            let event = if paused {
                PlayerEvent::Paused
            } else {
                PlayerEvent::Resumed
            };
            let _ = self.events.send(event);
        }
    }

    fn provide(&self) -> Option<open_music_core::engine::AudioFrame> {
        None
    }
}

#[derive(Default)]
struct FakeEngine {
    players: Mutex<Vec<Arc<FakePlayer>>>,
}

impl FakeEngine {
    fn player(&self) -> Arc<FakePlayer> {
        self.players.lock().last().cloned().expect("sin player creado")
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    fn create_player(&self) -> (Arc<dyn PlayerHandle>, open_music_core::engine::PlayerEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Arc::new(FakePlayer {
            events: tx,
            playing: Mutex::new(None),
            paused: AtomicBool::new(false),
        });
        self.players.lock().push(Arc::clone(&player));
        (player, rx)
    }

    async fn load_item(&self, uri: &str) -> Result<TrackItem, AudioError> {
        if let Some(rest) = uri.strip_prefix("fail:") {
            return Err(AudioError::load(uri, format!("fuente rota: {rest}")));
        }
        Ok(TrackItem::new(uri, uri.to_string(), Duration::from_secs(180)))
    }
}

#[derive(Default)]
struct RecordingPlaylists {
    saved: Mutex<Vec<(UserId, String, Vec<PlaylistEntry>)>>,
    stored: Mutex<Vec<(UserId, String, Vec<PlaylistEntry>)>>,
}

impl RecordingPlaylists {
    fn preload(&self, user: UserId, name: &str, entries: Vec<PlaylistEntry>) {
        self.stored.lock().push((user, name.to_string(), entries));
    }
}

#[async_trait]
impl PlaylistStore for RecordingPlaylists {
    async fn save(
        &self,
        user: UserId,
        name: &str,
        entries: Vec<PlaylistEntry>,
    ) -> anyhow::Result<()> {
        self.saved.lock().push((user, name.to_string(), entries));
        Ok(())
    }

    async fn load(
        &self,
        user: UserId,
        name: &str,
    ) -> anyhow::Result<Option<Vec<PlaylistEntry>>> {
        Ok(self
            .stored
            .lock()
            .iter()
            .find(|(owner, stored_name, _)| *owner == user && stored_name == name)
            .map(|(_, _, entries)| entries.clone()))
    }
}

struct Harness {
    router: CommandRouter,
    gateway: Arc<FakeGateway>,
    engine: Arc<FakeEngine>,
    playlists: Arc<RecordingPlaylists>,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let gateway = Arc::new(FakeGateway::default());
    let engine = Arc::new(FakeEngine::default());
    let playlists = Arc::new(RecordingPlaylists::default());
    let registry = SessionRegistry::new(
        gateway.clone(),
        engine.clone(),
        Settings::default(),
    );
    let router = CommandRouter::new(
        registry,
        gateway.clone(),
        engine.clone(),
        playlists.clone(),
    );
    Harness {
        router,
        gateway,
        engine,
        playlists,
    }
}

/// Deja drenar el puente de eventos y las tasks en segundo plano.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn play(source: &str) -> Command {
    Command::Play {
        guild: GUILD,
        user: USER,
        source: source.to_string(),
        reply: TEXT,
    }
}

#[tokio::test(start_paused = true)]
async fn play_queue_advance_and_scheduled_leave() {
    let h = harness();

    // play A sin sesión previa: join + arranque inmediato
    h.router.dispatch(play("A")).await.unwrap();
    settle().await;
    assert_eq!(h.gateway.joins.load(Ordering::SeqCst), 1);
    let player = h.engine.player();
    assert_eq!(player.playing_title().as_deref(), Some("A"));
    assert!(h
        .gateway
        .messages()
        .iter()
        .any(|m| m.contains("Reproduciendo ahora: **A**")));

    let session = h.router.registry().lookup(GUILD).unwrap();
    assert_eq!(session.with_scheduler(|s| s.queue_len()), 0);

    // play B mientras suena A: queda en cola, sin segundo join
    h.router.dispatch(play("B")).await.unwrap();
    settle().await;
    assert_eq!(h.gateway.joins.load(Ordering::SeqCst), 1);
    assert_eq!(session.with_scheduler(|s| s.queue_len()), 1);
    assert!(h
        .gateway
        .last_message()
        .unwrap()
        .contains("**B** en cola (posición 1)"));

    // A termina de forma natural con loop OFF: B pasa a sonar, cola vacía
    player.finish_current();
    settle().await;
    assert_eq!(player.playing_title().as_deref(), Some("B"));
    assert_eq!(session.with_scheduler(|s| s.queue_len()), 0);

    // stop: cola limpia, sesión saliente, timer de 120s armado
    h.router
        .dispatch(Command::Stop {
            guild: GUILD,
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;
    assert!(session.is_leaving());
    assert!(player.playing_title().is_none());
    assert_eq!(session.with_scheduler(|s| s.queue_len()), 0);

    // sin más actividad, pasada la gracia la sesión muere y sale de la tabla
    tokio::time::sleep(Duration::from_secs(121)).await;
    settle().await;
    assert!(h.router.registry().lookup(GUILD).is_none());
    assert_eq!(h.gateway.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn play_during_grace_period_cancels_the_leave() {
    let h = harness();

    h.router.dispatch(play("A")).await.unwrap();
    h.router
        .dispatch(Command::Stop {
            guild: GUILD,
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    h.router.dispatch(play("C")).await.unwrap();
    settle().await;

    let session = h.router.registry().lookup(GUILD).unwrap();
    assert!(!session.is_leaving());
    assert_eq!(h.engine.player().playing_title().as_deref(), Some("C"));

    // la gracia original ya venció y la sesión sigue viva
    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;
    assert!(h.router.registry().lookup(GUILD).is_some());
    assert_eq!(h.gateway.disconnects.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn load_failure_notifies_without_corrupting_the_queue() {
    let h = harness();

    h.router.dispatch(play("A")).await.unwrap();
    settle().await;
    h.router.dispatch(play("fail:boom")).await.unwrap();
    settle().await;

    assert!(h
        .gateway
        .last_message()
        .unwrap()
        .contains("No pude resolver la fuente"));

    let session = h.router.registry().lookup(GUILD).unwrap();
    assert_eq!(session.with_scheduler(|s| s.queue_len()), 0);
    assert_eq!(h.engine.player().playing_title().as_deref(), Some("A"));
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_notify_through_the_bridge() {
    let h = harness();
    h.router.dispatch(play("A")).await.unwrap();
    settle().await;

    h.router
        .dispatch(Command::Pause {
            guild: GUILD,
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;
    assert!(h.gateway.last_message().unwrap().contains("pausada"));

    // pausar dos veces no duplica la notificación
    h.router
        .dispatch(Command::Pause {
            guild: GUILD,
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;
    let paused_notices = h
        .gateway
        .messages()
        .iter()
        .filter(|m| m.contains("pausada"))
        .count();
    assert_eq!(paused_notices, 1);

    h.router
        .dispatch(Command::Resume {
            guild: GUILD,
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;
    assert!(h.gateway.last_message().unwrap().contains("reanudada"));
}

#[tokio::test(start_paused = true)]
async fn commands_without_session_notify_no_active_session() {
    let h = harness();

    h.router
        .dispatch(Command::Skip {
            guild: GUILD,
            reply: TEXT,
        })
        .await
        .unwrap();
    assert!(h
        .gateway
        .last_message()
        .unwrap()
        .contains("no hay sesión de audio activa"));
}

#[tokio::test(start_paused = true)]
async fn loop_queue_end_to_end_rotation() {
    let h = harness();

    h.router.dispatch(play("X")).await.unwrap();
    h.router.dispatch(play("A")).await.unwrap();
    h.router.dispatch(play("B")).await.unwrap();
    h.router
        .dispatch(Command::SetLoop {
            guild: GUILD,
            mode: LoopMode::Queue,
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;

    let player = h.engine.player();
    player.finish_current();
    settle().await;

    assert_eq!(player.playing_title().as_deref(), Some("A"));
    let session = h.router.registry().lookup(GUILD).unwrap();
    let upcoming: Vec<String> = session.with_scheduler(|s| {
        s.snapshot()
            .upcoming
            .iter()
            .map(|t| t.title().to_string())
            .collect()
    });
    assert_eq!(upcoming, ["B", "X"]);
}

#[tokio::test(start_paused = true)]
async fn save_playlist_exports_now_playing_then_queue() {
    let h = harness();

    h.router.dispatch(play("A")).await.unwrap();
    h.router.dispatch(play("B")).await.unwrap();
    settle().await;
    h.router
        .dispatch(Command::SavePlaylist {
            guild: GUILD,
            user: USER,
            name: "favoritas".to_string(),
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;

    let saved = h.playlists.saved.lock();
    assert_eq!(saved.len(), 1);
    let (user, name, entries) = &saved[0];
    assert_eq!(*user, USER);
    assert_eq!(name, "favoritas");
    let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["A", "B"]);
    drop(saved);

    assert!(h
        .gateway
        .last_message()
        .unwrap()
        .contains("Playlist **favoritas** guardada con 2 pistas"));
}

#[tokio::test(start_paused = true)]
async fn leave_destroys_immediately_and_late_events_are_ignored() {
    let h = harness();

    h.router.dispatch(play("A")).await.unwrap();
    settle().await;
    let player = h.engine.player();

    h.router
        .dispatch(Command::Leave {
            guild: GUILD,
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;
    assert!(h.router.registry().lookup(GUILD).is_none());
    assert_eq!(h.gateway.disconnects.load(Ordering::SeqCst), 1);

    // un evento tardío del player difunto no hace nada
    let before = h.gateway.messages().len();
    let _ = player.events.send(PlayerEvent::TrackStarted(TrackItem::new(
        "uri:ghost",
        "ghost",
        Duration::from_secs(10),
    )));
    settle().await;
    assert_eq!(h.gateway.messages().len(), before);
}

#[tokio::test(start_paused = true)]
async fn track_exception_warns_and_plays_the_next_track() {
    let h = harness();

    h.router.dispatch(play("A")).await.unwrap();
    h.router.dispatch(play("B")).await.unwrap();
    settle().await;

    let player = h.engine.player();
    player.fail_current("códec roto");
    settle().await;

    assert!(h
        .gateway
        .messages()
        .iter()
        .any(|m| m.contains("**A** falló")));
    assert_eq!(player.playing_title().as_deref(), Some("B"));

    let session = h.router.registry().lookup(GUILD).unwrap();
    assert_eq!(session.with_scheduler(|s| s.queue_len()), 0);
}

#[tokio::test(start_paused = true)]
async fn stuck_track_is_skipped_even_under_track_loop() {
    let h = harness();

    h.router.dispatch(play("A")).await.unwrap();
    h.router.dispatch(play("B")).await.unwrap();
    h.router
        .dispatch(Command::SetLoop {
            guild: GUILD,
            mode: LoopMode::Track,
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;

    let player = h.engine.player();
    player.stick_current();
    settle().await;

    // una pista colgada no se repite ni bajo loop de pista: se salta
    assert!(h
        .gateway
        .messages()
        .iter()
        .any(|m| m.contains("**A** se atascó")));
    assert_eq!(player.playing_title().as_deref(), Some("B"));
}

#[tokio::test(start_paused = true)]
async fn load_playlist_resolves_and_enqueues_every_entry() {
    let h = harness();
    h.playlists.preload(
        USER,
        "favoritas",
        vec![
            PlaylistEntry {
                identifier: "uri:a".to_string(),
                title: "A".to_string(),
                duration_ms: 180_000,
            },
            PlaylistEntry {
                identifier: "uri:b".to_string(),
                title: "B".to_string(),
                duration_ms: 180_000,
            },
            PlaylistEntry {
                identifier: "uri:c".to_string(),
                title: "C".to_string(),
                duration_ms: 180_000,
            },
        ],
    );

    h.router
        .dispatch(Command::LoadPlaylist {
            guild: GUILD,
            user: USER,
            name: "favoritas".to_string(),
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;

    // la primera pista arranca, el resto queda en cola
    assert_eq!(h.gateway.joins.load(Ordering::SeqCst), 1);
    assert_eq!(h.engine.player().playing_title().as_deref(), Some("uri:a"));
    let session = h.router.registry().lookup(GUILD).unwrap();
    assert_eq!(session.with_scheduler(|s| s.queue_len()), 2);

    assert!(h
        .gateway
        .messages()
        .iter()
        .any(|m| m.contains("Playlist **favoritas** cargada: **3** pistas")
            && m.contains("9m")));
}

#[tokio::test(start_paused = true)]
async fn load_playlist_skips_broken_entries_and_reports_the_rest() {
    let h = harness();
    h.playlists.preload(
        USER,
        "mixta",
        vec![
            PlaylistEntry {
                identifier: "uri:a".to_string(),
                title: "A".to_string(),
                duration_ms: 180_000,
            },
            PlaylistEntry {
                identifier: "fail:borrada".to_string(),
                title: "borrada".to_string(),
                duration_ms: 180_000,
            },
            PlaylistEntry {
                identifier: "uri:c".to_string(),
                title: "C".to_string(),
                duration_ms: 180_000,
            },
        ],
    );

    h.router
        .dispatch(Command::LoadPlaylist {
            guild: GUILD,
            user: USER,
            name: "mixta".to_string(),
            reply: TEXT,
        })
        .await
        .unwrap();
    settle().await;

    let session = h.router.registry().lookup(GUILD).unwrap();
    assert_eq!(session.with_scheduler(|s| s.queue_len()), 1);
    assert!(h
        .gateway
        .messages()
        .iter()
        .any(|m| m.contains("Playlist **mixta** cargada: **2** pistas")));
}

#[tokio::test(start_paused = true)]
async fn load_unknown_playlist_only_notifies() {
    let h = harness();

    h.router
        .dispatch(Command::LoadPlaylist {
            guild: GUILD,
            user: USER,
            name: "inexistente".to_string(),
            reply: TEXT,
        })
        .await
        .unwrap();

    assert!(h
        .gateway
        .last_message()
        .unwrap()
        .contains("No encontré ninguna playlist **inexistente**"));
    // sin playlist no hay join ni sesión
    assert_eq!(h.gateway.joins.load(Ordering::SeqCst), 0);
    assert!(h.router.registry().lookup(GUILD).is_none());
}
