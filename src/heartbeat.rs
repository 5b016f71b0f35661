//! Keep-alive scheduler.
//!
//! Once the server acknowledges the greeting, the client must send a
//! heartbeat packet every 30 seconds or the room subscription is dropped.
//! [`HeartbeatScheduler`] owns that background task: at most one timer per
//! connection, started on the greeting ack, stopped on close.
//!
//! The timer task and `stop()` race by construction: the timer fires from
//! its own tokio task while close arrives from the consumer or the reader
//! loop. `stop()` therefore flips a liveness flag before aborting the task,
//! and the task re-checks the flag immediately before each send, so no
//! heartbeat goes out after `stop()` has returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

/// Destination for heartbeat packets.
///
/// The client implements this over the shared socket writer; tests install
/// a recording sink.
#[async_trait]
pub trait HeartbeatSink: Send + Sync + 'static {
    /// Deliver one heartbeat packet. Failures are the sink's problem to
    /// log; the scheduler keeps ticking either way.
    async fn send_packet(&self, packet: Vec<u8>);
}

/// Timer state while running.
struct ActiveTimer {
    live: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Periodic sender of a fixed keep-alive packet.
pub struct HeartbeatScheduler {
    interval: Duration,
    packet: Vec<u8>,
    sink: Arc<dyn HeartbeatSink>,
    timer: Mutex<Option<ActiveTimer>>,
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl HeartbeatScheduler {
    /// New idle scheduler that will push `packet` through `sink` every
    /// `interval` once started.
    pub fn new(interval: Duration, packet: Vec<u8>, sink: Arc<dyn HeartbeatSink>) -> Self {
        Self {
            interval,
            packet,
            sink,
            timer: Mutex::new(None),
        }
    }

    /// Whether a timer is currently active.
    pub fn is_running(&self) -> bool {
        self.timer.lock().expect("heartbeat timer lock poisoned").is_some()
    }

    /// Begin firing. No-op if already running, so the greeting ack arriving
    /// more than once cannot stack timers.
    pub fn start(&self) {
        let mut timer = self.timer.lock().expect("heartbeat timer lock poisoned");
        if timer.is_some() {
            log::debug!("Heartbeat already running, ignoring start");
            return;
        }

        let live = Arc::new(AtomicBool::new(true));
        let task_live = Arc::clone(&live);
        let sink = Arc::clone(&self.sink);
        let packet = self.packet.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval completes immediately; the
            // protocol expects the first heartbeat one full interval after
            // the greeting ack, so consume it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !task_live.load(Ordering::SeqCst) {
                    break;
                }
                log::trace!("Sending heartbeat packet ({} bytes)", packet.len());
                sink.send_packet(packet.clone()).await;
            }
        });

        log::debug!("Heartbeat started, interval {:?}", interval);
        *timer = Some(ActiveTimer { live, handle });
    }

    /// Cancel the timer. Idempotent when already idle; after this returns,
    /// no further packet reaches the sink.
    pub fn stop(&self) {
        let mut timer = self.timer.lock().expect("heartbeat timer lock poisoned");
        if let Some(active) = timer.take() {
            active.live.store(false, Ordering::SeqCst);
            active.handle.abort();
            log::debug!("Heartbeat stopped");
        }
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
