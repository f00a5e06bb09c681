//! Background producer tests against a fake backend

mod helpers;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use helpers::{enabled_scheduler, pending_names, spawn_backend, ScriptedSink};
use serde_json::{json, Value};
use soms_voice::producers::{AnnouncementWatcher, VoiceEventPoller};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct FakeBackend {
    tasks: Arc<Mutex<Vec<Value>>>,
    voice_events: Arc<Mutex<Vec<Value>>>,
    requests: Arc<AtomicUsize>,
}

impl FakeBackend {
    fn router(&self) -> Router {
        Router::new()
            .route(
                "/api/tasks/",
                get(|State(backend): State<FakeBackend>| async move {
                    backend.requests.fetch_add(1, Ordering::SeqCst);
                    Json(Value::Array(backend.tasks.lock().unwrap().clone()))
                }),
            )
            .route(
                "/api/voice-events/recent",
                get(|State(backend): State<FakeBackend>| async move {
                    backend.requests.fetch_add(1, Ordering::SeqCst);
                    Json(Value::Array(backend.voice_events.lock().unwrap().clone()))
                }),
            )
            .with_state(self.clone())
    }

    fn add_task(&self, id: i64, completed: bool, url: &str) {
        self.tasks.lock().unwrap().push(json!({
            "id": id,
            "title": format!("task {}", id),
            "is_completed": completed,
            "announcement_audio_url": url,
        }));
    }

    fn add_voice_event(&self, id: i64, url: &str) {
        self.voice_events.lock().unwrap().push(json!({
            "id": id,
            "message": "speak",
            "audio_url": url,
            "tone": "neutral",
        }));
    }
}

#[tokio::test]
async fn test_announcements_skip_initial_tasks() {
    let backend = FakeBackend::default();
    backend.add_task(1, false, "/audio/t1.mp3");
    let base_url = spawn_backend(backend.router()).await;

    let sink = ScriptedSink::new();
    let scheduler = enabled_scheduler(&sink, 20);
    let mut watcher = AnnouncementWatcher::new(
        reqwest::Client::new(),
        base_url.clone(),
        scheduler.clone(),
        Duration::from_secs(60),
    );

    assert_eq!(watcher.poll_once().await.unwrap(), 0);

    backend.add_task(2, false, "/audio/t2.mp3");
    backend.add_task(3, true, "/audio/t3.mp3");
    assert_eq!(watcher.poll_once().await.unwrap(), 1);

    assert_eq!(
        sink.wait_for_started(1).await,
        vec![format!("{}/audio/t2.mp3", base_url)]
    );

    // Nothing new on the next poll
    assert_eq!(watcher.poll_once().await.unwrap(), 0);
}

#[tokio::test]
async fn test_announcements_paused_while_disabled() {
    let backend = FakeBackend::default();
    backend.add_task(1, false, "/audio/t1.mp3");
    let base_url = spawn_backend(backend.router()).await;

    let sink = ScriptedSink::new();
    let scheduler = enabled_scheduler(&sink, 20);
    scheduler.set_enabled(false);

    let mut watcher = AnnouncementWatcher::new(
        reqwest::Client::new(),
        base_url,
        scheduler,
        Duration::from_secs(60),
    );

    assert_eq!(watcher.poll_once().await.unwrap(), 0);
    assert_eq!(backend.requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_voice_events_played_once() {
    let backend = FakeBackend::default();
    backend.add_voice_event(10, "/audio/v10.mp3");
    backend.add_voice_event(11, "");
    let base_url = spawn_backend(backend.router()).await;

    let sink = ScriptedSink::new();
    let scheduler = enabled_scheduler(&sink, 20);
    let mut poller = VoiceEventPoller::new(
        reqwest::Client::new(),
        base_url.clone(),
        scheduler.clone(),
        Duration::from_secs(60),
    );

    assert_eq!(poller.poll_once().await.unwrap(), 1);
    assert_eq!(poller.poll_once().await.unwrap(), 0);

    backend.add_voice_event(12, "http://cdn.local/v12.mp3");
    assert_eq!(poller.poll_once().await.unwrap(), 1);

    sink.wait_for_started(1).await;
    let mut seen = sink.started();
    seen.extend(pending_names(&scheduler));
    assert_eq!(
        seen,
        vec![
            format!("{}/audio/v10.mp3", base_url),
            "http://cdn.local/v12.mp3".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_poll_reports_backend_errors() {
    let base_url = spawn_backend(Router::new()).await;

    let sink = ScriptedSink::new();
    let scheduler = enabled_scheduler(&sink, 20);
    let mut poller = VoiceEventPoller::new(
        reqwest::Client::new(),
        base_url,
        scheduler,
        Duration::from_secs(60),
    );

    assert!(poller.poll_once().await.is_err());
}
