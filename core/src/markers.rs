//! Progress markers embedded in the chat widget's event stream.
//!
//! The widget does not report "a long-running tool is in progress" through
//! its callbacks, so the page watches the raw stream for two sentinel
//! values and turns them into active/inactive toggles.

use serde_json::Value;

use crate::sse::{SseFramer, SseRecord};

/// `type` tag of records that carry a progress marker.
pub const PROGRESS_UPDATE_TYPE: &str = "progress_update";
pub const SEARCH_START_MARKER: &str = "search_animation:start";
pub const SEARCH_STOP_MARKER: &str = "search_animation:stop";

const EVENT_STREAM_MIME: &str = "text/event-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMarker {
    Start,
    Stop,
}

impl ProgressMarker {
    pub fn from_value(marker: &str) -> Option<Self> {
        match marker {
            SEARCH_START_MARKER => Some(Self::Start),
            SEARCH_STOP_MARKER => Some(Self::Stop),
            _ => None,
        }
    }

    /// Extract a marker from a stream record.
    ///
    /// Two payload shapes are in circulation, `{"type", "text"}` and
    /// `{"type", "data": {"event"}}`; both are accepted.
    pub fn from_record(record: &SseRecord) -> Option<Self> {
        let payload: Value = match serde_json::from_str(&record.data) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(error = %err, "Skipping unparseable stream record");
                return None;
            }
        };

        if payload.get("type").and_then(Value::as_str) != Some(PROGRESS_UPDATE_TYPE) {
            return None;
        }

        let marker = payload
            .get("text")
            .and_then(Value::as_str)
            .or_else(|| payload.pointer("/data/event").and_then(Value::as_str));

        match marker {
            Some(marker) => Self::from_value(marker),
            None => {
                tracing::debug!("progress_update record without a marker value");
                None
            }
        }
    }
}

/// Whether a response should be inspected for progress markers.
pub fn should_watch(method: &str, path: &str, content_type: Option<&str>, chat_path: &str) -> bool {
    let is_event_stream = content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with(EVENT_STREAM_MIME))
        .unwrap_or(false);
    method.eq_ignore_ascii_case("POST") && is_event_stream && path == chat_path
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatcherState {
    #[default]
    Idle,
    Watching,
    Animating,
}

/// Per-stream state machine turning markers into toggles.
///
/// Repeated start markers each emit `true`; suppressing repeats is the job
/// of [`ProgressSignal`].
#[derive(Debug, Default)]
pub struct MarkerWatcher {
    state: WatcherState,
}

impl MarkerWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn begin(&mut self) {
        self.state = WatcherState::Watching;
    }

    pub fn observe(&mut self, marker: ProgressMarker) -> bool {
        match marker {
            ProgressMarker::Start => {
                self.state = WatcherState::Animating;
                true
            }
            ProgressMarker::Stop => {
                self.state = WatcherState::Watching;
                false
            }
        }
    }

    /// Leave the stream. Returns the forced `false` toggle when a start
    /// marker was never matched by a stop.
    pub fn end(&mut self) -> Option<bool> {
        let was_animating = self.state == WatcherState::Animating;
        self.state = WatcherState::Idle;
        was_animating.then_some(false)
    }
}

/// Framer, watcher and toggle sink for one intercepted response body.
///
/// Feed it the same chunks the real consumer reads. Closing it, explicitly
/// or by dropping it, guarantees the indicator is switched off.
pub struct MarkerTap<F: FnMut(bool)> {
    framer: SseFramer,
    watcher: MarkerWatcher,
    on_toggle: F,
    closed: bool,
}

impl<F: FnMut(bool)> MarkerTap<F> {
    pub fn new(on_toggle: F) -> Self {
        let mut watcher = MarkerWatcher::new();
        watcher.begin();
        Self {
            framer: SseFramer::new(),
            watcher,
            on_toggle,
            closed: false,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        if self.closed {
            return;
        }
        for record in self.framer.push(chunk) {
            if let Some(marker) = ProgressMarker::from_record(&record) {
                let active = self.watcher.observe(marker);
                (self.on_toggle)(active);
            }
        }
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(active) = self.watcher.end() {
            (self.on_toggle)(active);
        }
    }

    pub fn state(&self) -> WatcherState {
        self.watcher.state()
    }
}

impl<F: FnMut(bool)> Drop for MarkerTap<F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// UI-side progress indicator. Applying the current value again is a no-op.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSignal {
    active: bool,
}

impl ProgressSignal {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns whether the visible state changed.
    pub fn apply(&mut self, active: bool) -> bool {
        let changed = self.active != active;
        self.active = active;
        changed
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn record(data: &str) -> SseRecord {
        SseRecord {
            event: None,
            data: data.to_string(),
        }
    }

    fn collect_toggles(chunks: &[&[u8]]) -> Vec<bool> {
        let toggles = Rc::new(RefCell::new(Vec::new()));
        {
            let sink = Rc::clone(&toggles);
            let mut tap = MarkerTap::new(move |active| sink.borrow_mut().push(active));
            for chunk in chunks {
                tap.feed(chunk);
            }
            tap.close();
        }
        toggles.take()
    }

    #[test]
    fn reads_marker_from_text_field() {
        let r = record(r#"{"type":"progress_update","text":"search_animation:start"}"#);
        assert_eq!(ProgressMarker::from_record(&r), Some(ProgressMarker::Start));
    }

    #[test]
    fn reads_marker_from_nested_data_event() {
        let r = record(r#"{"type":"progress_update","data":{"event":"search_animation:stop"}}"#);
        assert_eq!(ProgressMarker::from_record(&r), Some(ProgressMarker::Stop));
    }

    #[test]
    fn ignores_other_types_and_values() {
        let other_type = record(r#"{"type":"thread.item.added","text":"search_animation:start"}"#);
        let other_value = record(r#"{"type":"progress_update","text":"Searching..."}"#);
        assert_eq!(ProgressMarker::from_record(&other_type), None);
        assert_eq!(ProgressMarker::from_record(&other_value), None);
    }

    #[test]
    fn start_then_stop_emits_true_then_false() {
        let toggles = collect_toggles(&[
            b"data: {\"type\":\"progress_update\",\"text\":\"search_animation:start\"}\n\n",
            b"data: {\"type\":\"thread.item.done\"}\n\n",
            b"data: {\"type\":\"progress_update\",\"text\":\"search_animation:stop\"}\n\n",
        ]);
        assert_eq!(toggles, vec![true, false]);
    }

    #[test]
    fn stream_ending_mid_animation_forces_false() {
        let toggles = collect_toggles(&[
            b"data: {\"type\":\"progress_update\",\"data\":{\"event\":\"search_animation:start\"}}\n\n",
            b"data: {\"type\":\"progress_upd",
        ]);
        assert_eq!(toggles, vec![true, false]);
    }

    #[test]
    fn unparseable_record_emits_nothing() {
        let toggles = collect_toggles(&[b"data: {not json\n\n", b"data: \n\n"]);
        assert!(toggles.is_empty());
    }

    #[test]
    fn malformed_record_does_not_block_later_markers() {
        let toggles = collect_toggles(&[
            b"data: {oops\n\n",
            b"data: {\"type\":\"progress_update\",\"text\":\"search_animation:start\"}\n\n",
        ]);
        assert_eq!(toggles, vec![true, false]);
    }

    #[test]
    fn dropping_the_tap_forces_false() {
        let toggles = Rc::new(RefCell::new(Vec::new()));
        {
            let sink = Rc::clone(&toggles);
            let mut tap = MarkerTap::new(move |active| sink.borrow_mut().push(active));
            tap.feed(b"data: {\"type\":\"progress_update\",\"text\":\"search_animation:start\"}\n\n");
            assert_eq!(tap.state(), WatcherState::Animating);
        }
        assert_eq!(toggles.take(), vec![true, false]);
    }

    #[test]
    fn close_is_idempotent() {
        let toggles = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&toggles);
        let mut tap = MarkerTap::new(move |active| sink.borrow_mut().push(active));
        tap.feed(b"data: {\"type\":\"progress_update\",\"text\":\"search_animation:start\"}\n\n");
        tap.close();
        tap.close();
        drop(tap);
        assert_eq!(toggles.take(), vec![true, false]);
    }

    #[test]
    fn watcher_state_transitions() {
        let mut watcher = MarkerWatcher::new();
        assert_eq!(watcher.state(), WatcherState::Idle);
        watcher.begin();
        assert_eq!(watcher.state(), WatcherState::Watching);
        assert!(watcher.observe(ProgressMarker::Start));
        assert_eq!(watcher.state(), WatcherState::Animating);
        assert!(!watcher.observe(ProgressMarker::Stop));
        assert_eq!(watcher.end(), None);
        assert_eq!(watcher.state(), WatcherState::Idle);
    }

    #[test]
    fn repeated_start_is_a_no_op_for_the_signal() {
        let mut signal = ProgressSignal::default();
        assert!(signal.apply(true));
        assert!(!signal.apply(true));
        assert!(signal.is_active());
        assert!(signal.apply(false));
    }

    #[test]
    fn should_watch_requires_post_event_stream_on_chat_path() {
        let sse = Some("text/event-stream; charset=utf-8");
        assert!(should_watch("POST", "/api/chatkit", sse, "/api/chatkit"));
        assert!(!should_watch("GET", "/api/chatkit", sse, "/api/chatkit"));
        assert!(!should_watch("POST", "/api/agents", sse, "/api/chatkit"));
        assert!(!should_watch("POST", "/api/chatkit", Some("application/json"), "/api/chatkit"));
        assert!(!should_watch("POST", "/api/chatkit", None, "/api/chatkit"));
    }
}
