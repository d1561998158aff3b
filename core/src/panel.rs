//! Event routing between the chat widget runtime and the hosting page.
//!
//! `ChatPanel` performs no I/O. The caller feeds it widget events and
//! carries out the effects it returns (loading profiles, clearing them,
//! answering a tool call).

use serde_json::Value;

use crate::thread::ThreadStore;
use crate::tools::{ClientTool, ProfileLoadOutcome};

pub const PLACEHOLDER_INPUT: &str = "How can I help you today?";
pub const BUSY_PLACEHOLDER: &str = "Hang tight, the assistant is responding\u{2026}";

pub const THREAD_RESTORE_FAILED: &str =
    "We could not restore your chat history. Start a new conversation to continue.";
pub const THREAD_SAVE_FAILED: &str =
    "We could not save your conversation locally. New messages may reset the thread.";
pub const CHAT_ERROR: &str = "The chat encountered an error. Please try again.";
pub const SESSION_EXPIRED: &str = "Your session expired. Please sign in again.";

/// Signals surfaced by the chat widget runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    ClientTool { name: String, params: Value },
    ResponseStart,
    ResponseEnd,
    ThreadChange { thread_id: Option<String> },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEffect {
    /// Fetch these profiles and answer the pending tool call with the outcome.
    LoadProfiles(Vec<String>),
    ClearProfiles,
    /// Answer the pending tool call directly.
    ToolOutput(ProfileLoadOutcome),
}

pub struct ChatPanel<S: ThreadStore> {
    store: S,
    user_id: Option<String>,
    thread_id: Option<String>,
    thread_ready: bool,
    busy: bool,
    thread_error: Option<&'static str>,
    auth_error: Option<&'static str>,
}

impl<S: ThreadStore> ChatPanel<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            user_id: None,
            thread_id: None,
            thread_ready: false,
            busy: false,
            thread_error: None,
            auth_error: None,
        }
    }

    /// Bind the panel to the signed-in user and restore their thread.
    pub fn establish_session(&mut self, user_id: Option<&str>) {
        let Some(user_id) = user_id else {
            self.user_id = None;
            self.thread_id = None;
            self.thread_ready = false;
            return;
        };

        self.user_id = Some(user_id.to_string());
        match self.store.read(user_id) {
            Ok(thread_id) => {
                self.thread_id = thread_id;
                self.thread_error = None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Unable to read stored thread id");
                self.thread_id = None;
                self.thread_error = Some(THREAD_RESTORE_FAILED);
            }
        }
        self.thread_ready = true;
    }

    pub fn handle(&mut self, event: WidgetEvent) -> Vec<PanelEffect> {
        match event {
            WidgetEvent::ClientTool { name, params } => {
                match ClientTool::from_invocation(&name, &params) {
                    Ok(ClientTool::DisplayAgentProfiles { agent_ids }) => {
                        vec![PanelEffect::LoadProfiles(agent_ids)]
                    }
                    Ok(ClientTool::WaitForSearchConfirmation) => {
                        vec![PanelEffect::ToolOutput(ProfileLoadOutcome::rejected())]
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Rejected client tool call");
                        vec![PanelEffect::ToolOutput(ProfileLoadOutcome::rejected())]
                    }
                }
            }
            WidgetEvent::ResponseStart => {
                self.busy = true;
                Vec::new()
            }
            WidgetEvent::ResponseEnd => {
                self.busy = false;
                Vec::new()
            }
            WidgetEvent::ThreadChange { thread_id } => {
                // Metadata updates repeat the current id; only a new thread counts.
                if thread_id == self.thread_id {
                    return Vec::new();
                }
                self.busy = false;
                self.thread_error = None;
                self.thread_id = thread_id;

                if let Some(user_id) = &self.user_id {
                    if let Err(err) = self.store.write(user_id, self.thread_id.as_deref()) {
                        tracing::warn!(error = %err, "Unable to persist thread id");
                        self.thread_error = Some(THREAD_SAVE_FAILED);
                    }
                }
                vec![PanelEffect::ClearProfiles]
            }
            WidgetEvent::Error { message } => {
                tracing::error!(error = %message, "Chat widget error");
                self.busy = false;
                self.thread_error = Some(CHAT_ERROR);
                Vec::new()
            }
        }
    }

    /// Track the status of each authenticated chat request.
    pub fn note_response_status(&mut self, status: u16) {
        self.auth_error = (status == 401).then_some(SESSION_EXPIRED);
    }

    pub fn composer_placeholder(&self) -> &'static str {
        if self.busy {
            BUSY_PLACEHOLDER
        } else {
            PLACEHOLDER_INPUT
        }
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Thread to resume with, once the session has been established.
    pub fn initial_thread(&self) -> Option<&str> {
        if self.thread_ready {
            self.thread_id.as_deref()
        } else {
            None
        }
    }

    pub fn thread_error(&self) -> Option<&'static str> {
        self.thread_error
    }

    pub fn auth_error(&self) -> Option<&'static str> {
        self.auth_error
    }

    pub fn can_render(&self) -> bool {
        self.user_id.is_some() && self.thread_ready
    }
}
