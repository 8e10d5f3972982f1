//! Scope web server implementation.
//!
//! Uses axum for routing with tower middleware support. Two routes carry the
//! whole surface:
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | The embedded scope page |
//! | `/audio` | Live `audio/mpeg` stream relayed from the encoder process |
//!
//! Each `/audio` request spawns its own encoder process; requests share no
//! state with each other.

use crate::config::EncoderConfig;
use crate::encoder::EncoderStream;
use crate::server::page;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use eyre::{Context, Result};
use std::net::SocketAddr;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{error, info};

/// Web server that serves the scope page and relays the audio stream.
pub struct ScopeServer {
    /// The address to bind the server to
    bind_addr: SocketAddr,
    /// Encoder invocation handed to every stream request
    encoder: EncoderConfig,
}

impl ScopeServer {
    pub fn new(bind_addr: SocketAddr, encoder: EncoderConfig) -> Self {
        Self { bind_addr, encoder }
    }

    /// Build the application router with all routes.
    fn build_router(&self) -> Router {
        // Unmatched paths fall through to axum's default 404 fallback.
        Router::new()
            .route("/", get(page::serve_page))
            .route("/audio", get(handle_audio_stream))
            .with_state(self.encoder.clone())
            .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
    }

    /// Runs the server until Ctrl+C.
    pub async fn run(&self) -> Result<()> {
        info!("Starting scope server on http://{}", self.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.bind_addr)
            .await
            .context("Failed to bind to address")?;

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to listen for ctrl+c");
                info!("Shutting down scope server...");
            })
            .await
            .context("Server error")?;

        Ok(())
    }
}

/// Handles requests to `/audio`.
///
/// Spawns the encoder process and returns a chunked response that relays its
/// stdout. The response body owns the process; when the body is dropped (end
/// of stream, error, or client disconnect) the process is killed.
async fn handle_audio_stream(State(encoder): State<EncoderConfig>) -> Response {
    let body = match EncoderStream::spawn(&encoder) {
        Ok(stream) => {
            info!("Stream session started: encoder pid={:?}", stream.pid());
            Body::from_stream(stream)
        }
        Err(e) => {
            // The 200/audio status is committed regardless; a failed launch
            // reaches the client as a stream that never starts. Logged here
            // for operational visibility.
            error!("Failed to launch encoder process: {}", e);
            Body::empty()
        }
    };

    ([(header::CONTENT_TYPE, "audio/mpeg")], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::page::PAGE_HTML;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tracing_test::traced_test;

    /// Writes an executable stub script standing in for the encoder binary.
    /// The script ignores the ffmpeg argument vector it is invoked with.
    fn stub_encoder(name: &str, script: &str) -> EncoderConfig {
        let path = std::env::temp_dir().join(format!("soundnet_scope_stub_{name}.sh"));
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        EncoderConfig {
            program: path.to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    /// True once the process is gone or left only as an unreaped zombie.
    fn process_terminated(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat.split_whitespace().nth(2) == Some("Z"),
            Err(_) => true,
        }
    }

    /// Serves the router on an ephemeral port and returns its base URL.
    async fn start_server(encoder: EncoderConfig) -> String {
        let server = ScopeServer::new("127.0.0.1:0".parse().unwrap(), encoder);
        let router = server.build_router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_root_serves_page_verbatim() {
        let base = start_server(EncoderConfig::default()).await;

        let resp = reqwest::get(format!("{base}/")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));

        let body = resp.text().await.unwrap();
        assert_eq!(body, PAGE_HTML);
        assert!(body.contains("SoundNet"));
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let base = start_server(EncoderConfig::default()).await;

        let resp = reqwest::get(format!("{base}/nope")).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_audio_stream_relays_stub_output() {
        let config = stub_encoder("relay_4096", "head -c 4096 /dev/zero");
        let base = start_server(config).await;

        let resp = reqwest::get(format!("{base}/audio")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/mpeg");
        // Streamed, not sized up front.
        assert!(resp.headers().get(header::CONTENT_LENGTH).is_none());

        let body = resp.bytes().await.unwrap();
        assert_eq!(body.len(), 4096);
        assert!(body.iter().all(|&b| b == 0));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_launch_failure_does_not_crash_server() {
        let config = EncoderConfig {
            program: "/nonexistent/soundnet-test-encoder".to_string(),
            ..Default::default()
        };
        let base = start_server(config).await;

        // The stream appears to the client as one that never starts.
        let resp = reqwest::get(format!("{base}/audio")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.bytes().await.unwrap().is_empty());
        assert!(logs_contain("Failed to launch encoder process"));

        // The server keeps serving afterwards.
        let resp = reqwest::get(format!("{base}/")).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_concurrent_streams_spawn_independent_processes() {
        // The stub reports its own pid as the stream payload.
        let config = stub_encoder("concurrent_pids", "echo $$");
        let base = start_server(config).await;

        let url = format!("{base}/audio");
        let (a, b) = tokio::join!(reqwest::get(url.as_str()), reqwest::get(url.as_str()));

        let a = a.unwrap().text().await.unwrap();
        let b = b.unwrap().text().await.unwrap();
        let pid_a: u32 = a.trim().parse().unwrap();
        let pid_b: u32 = b.trim().parse().unwrap();

        assert_ne!(pid_a, pid_b);
    }

    #[tokio::test]
    async fn test_client_disconnect_kills_encoder() {
        // Reports its pid, then holds the session open without producing
        // more output.
        let config = stub_encoder("disconnect", "echo $$\nexec sleep 30");
        let base = start_server(config).await;

        let mut resp = reqwest::get(format!("{base}/audio")).await.unwrap();
        let first = resp.chunk().await.unwrap().expect("expected pid line");
        let pid: u32 = String::from_utf8_lossy(&first).trim().parse().unwrap();

        // Dropping the response mid-stream closes the connection.
        drop(resp);

        let mut terminated = false;
        for _ in 0..50 {
            if process_terminated(pid) {
                terminated = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(terminated, "encoder process {pid} outlived its client");
    }
}
