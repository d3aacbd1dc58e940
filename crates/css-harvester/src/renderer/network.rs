// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! CDP network plumbing: response events and network-idle tracking.
//!
//! A single pump task per page listens to the Network domain. It counts
//! in-flight requests for idle detection and emits a [`ResponseEvent`] only
//! once the response has been received and has finished loading, in
//! whichever order those two events show up, so the body is readable by the
//! time a consumer sees the event.

use super::ResponseEvent;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::page::Page;
use futures::stream::{self, Stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How often `wait_for_idle` re-checks the in-flight set.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// In-flight request bookkeeping for network-idle detection.
#[derive(Debug)]
pub struct NetworkActivity {
    state: Mutex<ActivityState>,
}

#[derive(Debug)]
struct ActivityState {
    inflight: HashSet<String>,
    last_change: Instant,
}

impl Default for NetworkActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkActivity {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ActivityState {
                inflight: HashSet::new(),
                last_change: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActivityState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A request started (redirect hops reuse the id and count once).
    pub fn request_started(&self, request_id: &str) {
        let mut state = self.lock();
        state.inflight.insert(request_id.to_string());
        state.last_change = Instant::now();
    }

    /// A request finished or failed.
    pub fn request_settled(&self, request_id: &str) {
        let mut state = self.lock();
        if state.inflight.remove(request_id) {
            state.last_change = Instant::now();
        }
    }

    pub fn inflight(&self) -> usize {
        self.lock().inflight.len()
    }

    /// True when nothing is in flight and nothing changed for `window`.
    pub fn is_idle(&self, window: Duration) -> bool {
        let state = self.lock();
        state.inflight.is_empty() && state.last_change.elapsed() >= window
    }
}

/// Sleep until `activity` reports idle for `window`.
pub async fn wait_for_idle(activity: &NetworkActivity, window: Duration) {
    while !activity.is_idle(window) {
        tokio::time::sleep(IDLE_POLL_INTERVAL).await;
    }
}

/// Decode a `Network.getResponseBody` payload into text.
pub fn decode_body(body: &str, base64_encoded: bool) -> Result<String> {
    if !base64_encoded {
        return Ok(body.to_string());
    }
    let bytes = STANDARD
        .decode(body.as_bytes())
        .context("response body was not valid base64")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One Network-domain event, reduced to what the pump needs.
#[derive(Debug, Clone)]
pub enum NetworkSignal {
    Started(String),
    Responded(ResponseEvent),
    Finished(String),
    Failed(String),
}

/// Per-page request bookkeeping that tolerates any interleaving of signals.
///
/// The four CDP event types arrive on separate listeners, so their relative
/// order is not preserved. A finish may be seen before its response or its
/// start; an id that has settled never counts as in flight again.
#[derive(Debug, Default)]
pub struct PumpState {
    pending: HashMap<String, ResponseEvent>,
    finished_early: HashSet<String>,
    settled: HashSet<String>,
}

impl PumpState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one signal; returns a response once it is both received and finished.
    pub fn apply(
        &mut self,
        signal: NetworkSignal,
        activity: &NetworkActivity,
    ) -> Option<ResponseEvent> {
        match signal {
            NetworkSignal::Started(id) => {
                if !self.settled.contains(&id) {
                    activity.request_started(&id);
                }
                None
            }
            NetworkSignal::Responded(event) => {
                if self.finished_early.remove(&event.request_id) {
                    Some(event)
                } else if self.settled.contains(&event.request_id) {
                    // Failed before its response was seen.
                    None
                } else {
                    self.pending.insert(event.request_id.clone(), event);
                    None
                }
            }
            NetworkSignal::Finished(id) => {
                activity.request_settled(&id);
                let ready = self.pending.remove(&id);
                if ready.is_none() {
                    self.finished_early.insert(id.clone());
                }
                self.settled.insert(id);
                ready
            }
            NetworkSignal::Failed(id) => {
                activity.request_settled(&id);
                self.pending.remove(&id);
                self.settled.insert(id);
                None
            }
        }
    }

    /// Responses waiting for their `loadingFinished`.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Drive `signals` through a [`PumpState`], forwarding finished responses to `tx`.
pub async fn run_pump<S>(
    mut signals: S,
    activity: Arc<NetworkActivity>,
    tx: mpsc::UnboundedSender<ResponseEvent>,
) where
    S: Stream<Item = NetworkSignal> + Unpin,
{
    let mut state = PumpState::new();
    while let Some(signal) = signals.next().await {
        if let Some(event) = state.apply(signal, &activity) {
            // Receiver gone just means nobody is harvesting.
            let _ = tx.send(event);
        }
    }
}

/// Subscribe to the page's network events and spawn the pump task.
///
/// Returns the receiving end of the response channel and the task handle;
/// abort the handle when the page closes.
pub async fn spawn_network_pump(
    page: &Page,
    activity: Arc<NetworkActivity>,
) -> Result<(mpsc::UnboundedReceiver<ResponseEvent>, JoinHandle<()>)> {
    let started = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .context("failed to subscribe to requestWillBeSent")?;
    let responded = page
        .event_listener::<EventResponseReceived>()
        .await
        .context("failed to subscribe to responseReceived")?;
    let finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .context("failed to subscribe to loadingFinished")?;
    let failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .context("failed to subscribe to loadingFailed")?;

    let signals = stream::select_all(vec![
        started
            .map(|ev| NetworkSignal::Started(ev.request_id.inner().clone()))
            .boxed(),
        responded
            .map(|ev| NetworkSignal::Responded(response_event(&ev)))
            .boxed(),
        finished
            .map(|ev| NetworkSignal::Finished(ev.request_id.inner().clone()))
            .boxed(),
        failed
            .map(|ev| NetworkSignal::Failed(ev.request_id.inner().clone()))
            .boxed(),
    ]);

    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_pump(signals, activity, tx));

    Ok((rx, handle))
}

fn response_event(ev: &EventResponseReceived) -> ResponseEvent {
    let headers = ev
        .response
        .headers
        .inner()
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default();

    ResponseEvent {
        request_id: ev.request_id.inner().clone(),
        url: ev.response.url.clone(),
        status: u16::try_from(ev.response.status).unwrap_or(0),
        headers,
        resource_type: Some(ev.r#type.as_ref().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_requires_empty_inflight() {
        let activity = NetworkActivity::new();
        activity.request_started("1");
        assert_eq!(activity.inflight(), 1);
        assert!(!activity.is_idle(Duration::ZERO));

        activity.request_settled("1");
        assert_eq!(activity.inflight(), 0);
        assert!(activity.is_idle(Duration::ZERO));
    }

    #[test]
    fn test_redirect_hops_count_once() {
        let activity = NetworkActivity::new();
        activity.request_started("7");
        activity.request_started("7");
        activity.request_settled("7");
        assert_eq!(activity.inflight(), 0);
    }

    #[test]
    fn test_idle_window_not_elapsed() {
        let activity = NetworkActivity::new();
        activity.request_started("1");
        activity.request_settled("1");
        assert!(!activity.is_idle(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_wait_for_idle_returns_after_settle() {
        let activity = Arc::new(NetworkActivity::new());
        activity.request_started("1");

        let background = Arc::clone(&activity);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            background.request_settled("1");
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            wait_for_idle(&activity, Duration::from_millis(10)),
        )
        .await
        .expect("network never went idle");
    }

    #[test]
    fn test_decode_plain_and_base64_bodies() {
        assert_eq!(decode_body("a{}", false).unwrap(), "a{}");
        assert_eq!(decode_body("LngJe2NvbG9yOnJlZH0=", true).unwrap(), ".x\t{color:red}");
        assert!(decode_body("!!!", true).is_err());
    }

    fn responded(id: &str) -> NetworkSignal {
        NetworkSignal::Responded(ResponseEvent {
            request_id: id.to_string(),
            url: format!("https://example.com/{id}.css"),
            status: 200,
            headers: vec![("content-type".into(), "text/css".into())],
            resource_type: Some("Stylesheet".into()),
        })
    }

    fn started(id: &str) -> NetworkSignal {
        NetworkSignal::Started(id.to_string())
    }

    fn finished(id: &str) -> NetworkSignal {
        NetworkSignal::Finished(id.to_string())
    }

    async fn pump(signals: Vec<NetworkSignal>) -> (Vec<String>, Arc<NetworkActivity>) {
        let activity = Arc::new(NetworkActivity::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_pump(stream::iter(signals), Arc::clone(&activity), tx).await;

        let mut emitted = Vec::new();
        while let Ok(event) = rx.try_recv() {
            emitted.push(event.request_id);
        }
        (emitted, activity)
    }

    #[tokio::test]
    async fn test_pump_in_wire_order() {
        let (emitted, activity) = pump(vec![
            started("A"),
            responded("A"),
            finished("A"),
        ])
        .await;
        assert_eq!(emitted, vec!["A"]);
        assert_eq!(activity.inflight(), 0);
    }

    #[tokio::test]
    async fn test_pump_interleaved_across_listeners() {
        // Wire order was started A,B,C / responded A,B,C / finished C,A,B;
        // the merged listeners can hand C's finish over first.
        let (mut emitted, activity) = pump(vec![
            started("A"),
            responded("A"),
            finished("C"),
            started("B"),
            responded("B"),
            finished("A"),
            started("C"),
            responded("C"),
            finished("B"),
        ])
        .await;
        emitted.sort();
        assert_eq!(emitted, vec!["A", "B", "C"]);
        assert_eq!(activity.inflight(), 0);
    }

    #[test]
    fn test_finish_before_start_does_not_stick_inflight() {
        let activity = NetworkActivity::new();
        let mut state = PumpState::new();

        assert!(state.apply(finished("X"), &activity).is_none());
        assert!(state.apply(started("X"), &activity).is_none());
        assert_eq!(activity.inflight(), 0);

        let event = state.apply(responded("X"), &activity);
        assert_eq!(event.map(|e| e.request_id), Some("X".to_string()));
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn test_failed_request_is_dropped() {
        let activity = NetworkActivity::new();
        let mut state = PumpState::new();

        state.apply(started("F"), &activity);
        state.apply(responded("F"), &activity);
        assert_eq!(state.pending(), 1);

        assert!(state.apply(NetworkSignal::Failed("F".into()), &activity).is_none());
        assert_eq!(state.pending(), 0);
        assert_eq!(activity.inflight(), 0);

        assert!(state.apply(NetworkSignal::Failed("G".into()), &activity).is_none());
        assert!(state.apply(responded("G"), &activity).is_none());
        assert_eq!(state.pending(), 0);
    }
}
