//! Encoder process management and the stdout relay stream.
//!
//! Each stream request launches its own capture-and-encode process and owns
//! it exclusively. [`EncoderStream`] wraps the child process together with
//! its piped stdout; dropping the stream kills the process, which is the one
//! cleanup that must happen on every exit path. A leaked encoder keeps the
//! capture device open and, on exclusive-access hardware, blocks every later
//! stream request.

use crate::config::EncoderConfig;
use bytes::Bytes;
use futures_util::Stream;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Size of a single read from the encoder's stdout. Chunk boundaries carry
/// no meaning for the consumer; this only bounds per-read buffering.
const READ_CHUNK_SIZE: usize = 1024;

/// Builds the fixed argument vector for the encoder invocation.
///
/// Ordering matters to ffmpeg: the capture backend and device select the
/// input, the trailing `-` directs output to stdout.
pub fn encoder_args(config: &EncoderConfig) -> Vec<String> {
    vec![
        "-f".to_string(),
        config.backend.clone(),
        "-i".to_string(),
        config.device.clone(),
        "-ar".to_string(),
        config.sample_rate.to_string(),
        "-ac".to_string(),
        config.channels.to_string(),
        "-b:a".to_string(),
        config.bitrate.clone(),
        "-f".to_string(),
        config.format.clone(),
        "-".to_string(),
    ]
}

/// A live encoder subprocess exposed as a byte stream.
///
/// Yields chunks read from the child's stdout in production order. The
/// stream ends on EOF (the process exited or closed its pipe) or on a read
/// error, which is logged rather than surfaced; by the time the relay is
/// running the HTTP response is already committed and cannot carry an error.
pub struct EncoderStream {
    child: Child,
    stdout: ReaderStream<ChildStdout>,
}

impl EncoderStream {
    /// Spawns the encoder process and wires up its stdout for relaying.
    ///
    /// stderr is discarded; the encoder's own diagnostics are not part of
    /// the stream. `kill_on_drop` is set so the runtime reaps the process
    /// after the drop-time kill.
    pub fn spawn(config: &EncoderConfig) -> io::Result<Self> {
        let mut child = Command::new(&config.program)
            .args(encoder_args(config))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("encoder stdout was not piped"))?;

        debug!("Spawned encoder process: pid={:?}", child.id());

        Ok(Self {
            child,
            stdout: ReaderStream::with_capacity(stdout, READ_CHUNK_SIZE),
        })
    }

    /// OS process ID of the encoder, if it has not been reaped yet.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

impl Stream for EncoderStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.stdout).poll_next(cx) {
            Poll::Ready(Some(Err(e))) => {
                // End the relay instead of propagating: the response status
                // is committed, so the error can only be logged server-side.
                warn!("Encoder read error, ending stream: {}", e);
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for EncoderStream {
    fn drop(&mut self) {
        // Every exit path of a stream session funnels through this drop:
        // normal EOF, read error, and client disconnect.
        match self.child.start_kill() {
            Ok(()) => debug!("Killed encoder process: pid={:?}", self.child.id()),
            Err(e) => debug!("Encoder process already finished: {}", e),
        }
    }
}
