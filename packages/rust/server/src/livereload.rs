//! Live-reload hub and client script.

use std::sync::LazyLock;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use regex::Regex;
use tokio::sync::broadcast;
use tracing::debug;

/// WebSocket endpoint the injected script connects to.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Reconnects after a server restart; reloads the page on any message.
pub const CLIENT_SCRIPT: &str = r#"<script>(function(){var p=location.protocol==="https:"?"wss://":"ws://";function c(){var s=new WebSocket(p+location.host+"/__livereload");s.onmessage=function(){location.reload()};s.onclose=function(){setTimeout(c,1000)}}c()})();</script>"#;

static BODY_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</body\s*>").expect("valid regex")
});

/// Fan-out of reload notifications to every connected browser.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<()>,
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tell every connected client to reload. Returns how many were notified.
    pub fn reload(&self) -> usize {
        let clients = self.tx.send(()).unwrap_or(0);
        debug!(clients, "reload broadcast");
        clients
    }
}

/// Insert [`CLIENT_SCRIPT`] before the last `</body>`, or append it.
pub fn inject(html: &str) -> String {
    match BODY_CLOSE.find_iter(html).last() {
        Some(m) => {
            let mut out = String::with_capacity(html.len() + CLIENT_SCRIPT.len());
            out.push_str(&html[..m.start()]);
            out.push_str(CLIENT_SCRIPT);
            out.push_str(&html[m.start()..]);
            out
        }
        None => format!("{html}{CLIENT_SCRIPT}"),
    }
}

pub(crate) async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(reload): State<LiveReload>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, reload))
}

async fn handle_socket(socket: WebSocket, reload: LiveReload) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = reload.subscribe();

    // Drain client frames so close is noticed.
    let mut incoming = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            notice = rx.recv() => match notice {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    if sender.send(Message::Text("reload".into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut incoming => break,
        }
    }
    debug!("live-reload client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_before_closing_body() {
        let html = "<html><body><p>x</p></BODY></html>";
        let out = inject(html);
        assert!(out.ends_with(&format!("{CLIENT_SCRIPT}</BODY></html>")));
    }

    #[test]
    fn appends_without_body() {
        let out = inject("<p>fragment</p>");
        assert_eq!(out, format!("<p>fragment</p>{CLIENT_SCRIPT}"));
    }

    #[tokio::test]
    async fn reload_reaches_subscribers() {
        let hub = LiveReload::new();
        assert_eq!(hub.reload(), 0);

        let mut a = hub.subscribe();
        let mut b = hub.clone().subscribe();
        assert_eq!(hub.reload(), 2);
        a.recv().await.unwrap();
        b.recv().await.unwrap();
    }
}
