//! Session Manager (spec §4.7).
//!
//! Generalizes the teacher's `CallManager` (`call_server.rs`) from a
//! multi-participant audio-mixing map to a single-owner session map, and
//! adds the idle-TTL sweeper the spec requires — `CallManager` retires a
//! call immediately when its last participant leaves rather than on a
//! timer, so the sweeper here is new code grounded in the same
//! "background `tokio::spawn` loop holding a write lock on the map"
//! shape `start_audio_loop` uses.
//!
//! Each session lives behind its own `Arc<tokio::sync::Mutex<Session>>`,
//! mirroring `CallManager::push_audio`
//! (`call_server.rs:380-391`): the map's `RwLock` is only ever held long
//! enough to look up or insert an `Arc`, never for the duration of a
//! pipeline call, so sessions decode concurrently with one another (spec
//! §5, §9) instead of serializing on one global lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::decoder::StreamingDecoder;
use crate::error::GatewayError;
use crate::session::Session;
use crate::session_id::SessionId;
use crate::vad::{VadGate, VoiceActivityModel};

struct Entry<M: VoiceActivityModel, D: StreamingDecoder> {
    session: Arc<Mutex<Session<M, D>>>,
    // Plain sync mutex: bumped under the map's read lock, never across
    // an `.await`, so it never contends with a session's pipeline work.
    last_activity: Arc<SyncMutex<Instant>>,
}

pub struct SessionManager<M: VoiceActivityModel, D: StreamingDecoder> {
    sessions: RwLock<HashMap<SessionId, Entry<M, D>>>,
    vad_gate: Arc<VadGate<M>>,
    decoder: Arc<D>,
    vad_frame_size: usize,
    decode_timeout: Duration,
    max_sessions: usize,
    idle_ttl: Duration,
    max_buffered_samples: Option<usize>,
}

impl<M: VoiceActivityModel + 'static, D: StreamingDecoder + 'static> SessionManager<M, D> {
    pub fn new(
        vad_gate: Arc<VadGate<M>>,
        decoder: Arc<D>,
        vad_frame_size: usize,
        decode_timeout: Duration,
        max_sessions: usize,
        idle_ttl: Duration,
    ) -> Arc<Self> {
        Self::with_max_buffered(
            vad_gate,
            decoder,
            vad_frame_size,
            decode_timeout,
            max_sessions,
            idle_ttl,
            None,
        )
    }

    /// As `new`, but bounds each session's unframed inbound remainder to
    /// `max_buffered_samples` (spec §5 backpressure).
    pub fn with_max_buffered(
        vad_gate: Arc<VadGate<M>>,
        decoder: Arc<D>,
        vad_frame_size: usize,
        decode_timeout: Duration,
        max_sessions: usize,
        idle_ttl: Duration,
        max_buffered_samples: Option<usize>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            vad_gate,
            decoder,
            vad_frame_size,
            decode_timeout,
            max_sessions,
            idle_ttl,
            max_buffered_samples,
        });
        manager.clone().spawn_idle_sweeper();
        manager
    }

    fn spawn_idle_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                self.sweep_idle_sessions().await;
            }
        });
    }

    async fn sweep_idle_sessions(&self) {
        let mut sessions = self.sessions.write().await;
        let idle_ttl = self.idle_ttl;
        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, entry)| entry.last_activity.lock().elapsed() >= idle_ttl)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(entry) = sessions.remove(id) {
                entry.session.lock().await.close();
                info!(session = %id, "session closed: idle TTL exceeded");
            }
        }
    }

    /// Creates a session and returns its id, or `ServerBusy` if the
    /// process is already at `max_sessions` (spec §4.7, §7).
    pub async fn create_session(self: &Arc<Self>) -> Result<SessionId, GatewayError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(GatewayError::ServerBusy);
        }

        let session = Session::with_max_buffered(
            self.vad_gate.clone(),
            self.decoder.clone(),
            self.vad_frame_size,
            self.decode_timeout,
            self.max_buffered_samples,
        );
        let id = session.id();
        sessions.insert(
            id,
            Entry {
                session: Arc::new(Mutex::new(session)),
                last_activity: Arc::new(SyncMutex::new(Instant::now())),
            },
        );
        info!(session = %id, "session created");
        Ok(id)
    }

    /// Runs `f` against the session. The map lock is held only long
    /// enough to clone the session's `Arc` and bump its last-activity
    /// timestamp; `f` then runs against that session's own mutex, so
    /// concurrent calls against different sessions never block each
    /// other (spec §5, §9). Returns `SessionClosed` if the id is unknown
    /// (already retired by the sweeper or never created).
    pub async fn with_session<R, F, Fut>(&self, id: SessionId, f: F) -> Result<R, GatewayError>
    where
        F: FnOnce(&mut Session<M, D>) -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let entry = {
            let sessions = self.sessions.read().await;
            sessions
                .get(&id)
                .map(|entry| (entry.session.clone(), entry.last_activity.clone()))
        };
        let (session, last_activity) = entry.ok_or(GatewayError::SessionClosed)?;
        *last_activity.lock() = Instant::now();

        let mut session = session.lock().await;
        Ok(f(&mut session).await)
    }

    pub async fn retire_session(&self, id: SessionId) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.remove(&id) {
            entry.session.lock().await.close();
            info!(session = %id, "session retired");
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::StubDecoder;
    use crate::vad::EnergyVad;

    fn manager(max_sessions: usize) -> Arc<SessionManager<EnergyVad, StubDecoder>> {
        SessionManager::new(
            Arc::new(VadGate::new(EnergyVad::new(), 0.5)),
            Arc::new(StubDecoder::new()),
            512,
            Duration::from_secs(5),
            max_sessions,
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn create_and_retire_session() {
        let manager = manager(4);
        let id = manager.create_session().await.unwrap();
        assert_eq!(manager.session_count().await, 1);
        manager.retire_session(id).await;
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn server_busy_past_max_sessions() {
        let manager = manager(1);
        manager.create_session().await.unwrap();
        let err = manager.create_session().await.unwrap_err();
        assert!(matches!(err, GatewayError::ServerBusy));
    }

    #[tokio::test]
    async fn unknown_session_id_is_session_closed() {
        let manager = manager(4);
        let err = manager
            .with_session(SessionId::new(), |_s| async {})
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::SessionClosed));
    }

    #[tokio::test]
    async fn isolated_sessions_do_not_affect_each_other() {
        let manager = manager(4);
        let a = manager.create_session().await.unwrap();
        let b = manager.create_session().await.unwrap();
        manager.retire_session(a).await;
        assert_eq!(manager.session_count().await, 1);
        assert!(manager.with_session(b, |_s| async {}).await.is_ok());
    }

    /// A slow pipeline call against one session must not block a
    /// concurrent call against a different session -- under a single map
    /// lock held for the whole pipeline call's duration, this would
    /// serialize and the `timeout` below would fire.
    #[tokio::test]
    async fn concurrent_sessions_do_not_serialize_on_the_map_lock() {
        let manager = manager(4);
        let a = manager.create_session().await.unwrap();
        let b = manager.create_session().await.unwrap();

        let manager_a = manager.clone();
        let slow_task = tokio::spawn(async move {
            manager_a
                .with_session(a, |_s| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            manager.with_session(b, |_s| async {}),
        )
        .await;
        assert!(result.is_ok(), "session b was blocked by session a's in-flight call");

        slow_task.await.unwrap().unwrap();
    }
}
