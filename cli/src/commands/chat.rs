use std::io::Write;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use merak_core::markers::ProgressSignal;
use merak_core::panel::{ChatPanel, PanelEffect, WidgetEvent};
use merak_core::sse::SseFramer;
use serde_json::json;

use crate::commands::profiles::load_profiles;
use crate::threads::FileThreadStore;
use crate::transport::{ChatTransport, MarkerInterceptor};
use crate::util::{client, exit_code_for, print_connection_error};
use crate::widget::{StreamUpdate, decode_record, user_message_envelope};

pub struct ChatArgs<'a> {
    pub api_url: &'a str,
    pub chat_path: &'a str,
    pub access_token: Option<&'a str>,
    pub user_id: &'a str,
    pub message: &'a str,
    pub new_thread: bool,
}

pub async fn run(args: ChatArgs<'_>) -> i32 {
    let url = match chat_url(args.api_url, args.chat_path) {
        Ok(url) => url,
        Err(err) => {
            eprintln!(
                "{}",
                json!({ "error": "cli_error", "message": format!("Invalid chat URL: {err}") })
            );
            return 4;
        }
    };

    let mut panel = ChatPanel::new(FileThreadStore::default_location());
    panel.establish_session(Some(args.user_id));
    if let Some(notice) = panel.thread_error() {
        eprintln!("{notice}");
    }

    let thread_id = if args.new_thread {
        None
    } else {
        panel.initial_thread().map(str::to_string)
    };

    let transport = chat_transport(
        client(),
        url,
        args.access_token,
        progress_reporter(|line| eprintln!("{line}")),
    );

    panel.handle(WidgetEvent::ResponseStart);
    eprintln!("{}", panel.composer_placeholder());

    let envelope = user_message_envelope(thread_id.as_deref(), args.message);
    let response = match transport.post(&envelope).await {
        Ok(response) => response,
        Err(err) => {
            panel.handle(WidgetEvent::ResponseEnd);
            print_connection_error(&err);
            return 3;
        }
    };

    panel.note_response_status(response.status);
    if let Some(notice) = panel.auth_error() {
        panel.handle(WidgetEvent::ResponseEnd);
        eprintln!("{}", json!({ "error": "unauthorized", "message": notice }));
        return 1;
    }

    let exit_code = exit_code_for(response.status);
    if exit_code != 0 {
        panel.handle(WidgetEvent::ResponseEnd);
        eprintln!("{}", response.text().await);
        return exit_code;
    }

    let mut body = response.body;
    let mut framer = SseFramer::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                panel.handle(WidgetEvent::Error {
                    message: err.to_string(),
                });
                break;
            }
        };
        for record in framer.push(&chunk) {
            match decode_record(&record) {
                Some(StreamUpdate::Text(delta)) => {
                    print!("{delta}");
                    let _ = std::io::stdout().flush();
                }
                Some(StreamUpdate::Widget(event)) => {
                    for effect in panel.handle(event) {
                        apply_effect(args.api_url, effect).await;
                    }
                }
                None => {}
            }
        }
    }
    drop(body);
    println!();

    panel.handle(WidgetEvent::ResponseEnd);
    match panel.thread_error() {
        Some(notice) => {
            eprintln!("{notice}");
            2
        }
        None => 0,
    }
}

async fn apply_effect(api_url: &str, effect: PanelEffect) {
    match effect {
        PanelEffect::LoadProfiles(agent_ids) => {
            let (profiles, outcome) = load_profiles(api_url, &agent_ids).await;
            if !profiles.is_empty() {
                let out = json!({ "profiles": profiles });
                println!("\n{}", serde_json::to_string_pretty(&out).unwrap_or_default());
            }
            tracing::info!(
                success = outcome.success,
                count = ?outcome.count,
                error = ?outcome.error,
                "display_agent_profiles answered"
            );
        }
        PanelEffect::ClearProfiles => {
            tracing::debug!("Profile list cleared for new thread");
        }
        PanelEffect::ToolOutput(outcome) => {
            tracing::info!(
                success = outcome.success,
                error = ?outcome.error,
                "Client tool answered"
            );
        }
    }
}

/// Resolve the chat endpoint below the API base URL, keeping any base path.
fn chat_url(api_url: &str, chat_path: &str) -> Result<reqwest::Url, url::ParseError> {
    let base = reqwest::Url::parse(&format!("{}/", api_url.trim_end_matches('/')))?;
    base.join(chat_path.trim_start_matches('/'))
}

/// Transport for `url` with the progress-marker watcher keyed on the path
/// the requests actually go to.
fn chat_transport(
    client: reqwest::Client,
    url: reqwest::Url,
    access_token: Option<&str>,
    on_toggle: Arc<dyn Fn(bool) + Send + Sync>,
) -> ChatTransport {
    let chat_path = url.path().to_string();
    ChatTransport::new(client, url, access_token.map(str::to_string))
        .with_interceptor(Arc::new(MarkerInterceptor::new(chat_path, on_toggle)))
}

/// Toggle sink that shows the search indicator, once per change.
fn progress_reporter<W>(write_line: W) -> Arc<dyn Fn(bool) + Send + Sync>
where
    W: Fn(&str) + Send + Sync + 'static,
{
    let signal = Mutex::new(ProgressSignal::default());
    Arc::new(move |active: bool| {
        let Ok(mut signal) = signal.lock() else {
            return;
        };
        if signal.apply(active) {
            write_line(if active {
                "[searching\u{2026}]"
            } else {
                "[search finished]"
            });
        }
    })
}
