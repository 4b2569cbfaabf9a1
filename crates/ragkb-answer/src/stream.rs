//! Incremental answer delivery over a channel.
//!
//! The producer side of a server-sent-events style response: a `Meta` event,
//! then `Delta` pieces interleaved with `Heartbeat`s, then `Done` or `Error`.
//! Production stops as soon as the receiver goes away or the request is
//! cancelled.

use futures::StreamExt;
use regex::Regex;
use serde::Serialize;
use std::future::pending;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, timeout, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ragkb_core::config::{RagSettings, StreamSplit};
use ragkb_core::error::{Error, Result};
use ragkb_core::traits::GenerationProvider;

static WORD_PIECES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+|\S+").ok());

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    Meta { request_id: String, split: StreamSplit, delay_ms: u64 },
    Delta(String),
    Heartbeat,
    Done { full: String, duration_ms: u64 },
    Error { code: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub split: StreamSplit,
    /// Pause between pieces in `word` and `char` modes.
    pub delay: Duration,
    /// Zero disables heartbeats.
    pub heartbeat: Duration,
    /// Bound on obtaining the provider stream. Heartbeats already run while waiting.
    pub start_timeout: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            split: StreamSplit::Chunk,
            delay: Duration::ZERO,
            heartbeat: Duration::from_secs(15),
            start_timeout: Duration::from_secs(45),
        }
    }
}

impl StreamOptions {
    pub fn from_settings(settings: &RagSettings) -> Self {
        Self {
            split: settings.stream.split,
            delay: Duration::from_millis(settings.stream.delay_ms),
            heartbeat: Duration::from_millis(settings.stream.heartbeat_ms),
            start_timeout: Duration::from_millis(settings.request_timeout_ms),
        }
    }
}

/// Cut a provider delta into the pieces sent to the client.
///
/// `word` keeps the whitespace runs as their own pieces so the concatenation
/// of all pieces is the original text.
pub fn split_text(text: &str, split: StreamSplit) -> Vec<&str> {
    match split {
        StreamSplit::Chunk => vec![text],
        StreamSplit::Word => match WORD_PIECES.as_ref() {
            Some(re) => re.find_iter(text).map(|m| m.as_str()).collect(),
            None => vec![text],
        },
        StreamSplit::Char => text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect(),
    }
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Stream the completion of `prompt` into `tx`.
///
/// Returns the text delivered so far. A provider failure is reported both as
/// an `Error` event and as the returned error; cancellation and a dropped
/// receiver end the stream quietly without a `Done` event.
pub async fn stream_answer(
    provider: &dyn GenerationProvider,
    prompt: &str,
    opts: &StreamOptions,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<String> {
    let started = Instant::now();
    let request_id = Uuid::new_v4().simple().to_string();
    let meta = StreamEvent::Meta {
        request_id: request_id.clone(),
        split: opts.split,
        delay_ms: u64::try_from(opts.delay.as_millis()).unwrap_or(u64::MAX),
    };
    if tx.send(meta).await.is_err() {
        return Ok(String::new());
    }

    let mut heartbeat = (!opts.heartbeat.is_zero()).then(|| {
        let mut iv = interval_at(tokio::time::Instant::now() + opts.heartbeat, opts.heartbeat);
        iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
        iv
    });

    let open = timeout(opts.start_timeout, provider.generate_stream(prompt));
    tokio::pin!(open);
    let opened = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(String::new()),
            _ = tx.closed() => {
                debug!(request_id = %request_id, "stream receiver dropped before provider answered");
                return Ok(String::new());
            }
            _ = next_heartbeat(&mut heartbeat) => {
                if tx.send(StreamEvent::Heartbeat).await.is_err() {
                    return Ok(String::new());
                }
            }
            opened = &mut open => break opened,
        }
    };
    let mut deltas = match opened {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(report(&tx, &request_id, e).await),
        Err(_) => {
            let timeout_ms = u64::try_from(opts.start_timeout.as_millis()).unwrap_or(u64::MAX);
            return Err(report(&tx, &request_id, Error::GenerationTimeout { timeout_ms }).await);
        }
    };

    let mut full = String::new();
    let mut finished = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(request_id = %request_id, "stream cancelled");
                break;
            }
            _ = tx.closed() => {
                debug!(request_id = %request_id, "stream receiver dropped");
                break;
            }
            _ = next_heartbeat(&mut heartbeat) => {
                if tx.send(StreamEvent::Heartbeat).await.is_err() {
                    break;
                }
            }
            item = deltas.next() => match item {
                None => {
                    finished = true;
                    break;
                }
                Some(Err(e)) => return Err(report(&tx, &request_id, e).await),
                Some(Ok(delta)) => {
                    if let Flow::Stop = forward(&delta, opts, &tx, &cancel, &mut full).await {
                        break;
                    }
                }
            },
        }
    }

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if finished {
        let _ = tx.send(StreamEvent::Done { full: full.clone(), duration_ms }).await;
    }
    info!(
        target: "ragkb::chat",
        request_id = %request_id,
        ok = finished,
        mode = %format!("stream:{}", opts.split.as_str()),
        duration_ms,
        a_chars = full.chars().count(),
        "chat"
    );
    Ok(full)
}

async fn forward(
    delta: &str,
    opts: &StreamOptions,
    tx: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
    full: &mut String,
) -> Flow {
    if delta.is_empty() {
        return Flow::Continue;
    }
    for piece in split_text(delta, opts.split) {
        if cancel.is_cancelled() {
            return Flow::Stop;
        }
        full.push_str(piece);
        if tx.send(StreamEvent::Delta(piece.to_string())).await.is_err() {
            return Flow::Stop;
        }
        if opts.split != StreamSplit::Chunk && !opts.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Flow::Stop,
                _ = sleep(opts.delay) => {}
            }
        }
    }
    Flow::Continue
}

async fn report(tx: &mpsc::Sender<StreamEvent>, request_id: &str, err: Error) -> Error {
    warn!(request_id, code = err.code(), error = %err, "stream failed");
    let _ = tx.send(StreamEvent::Error { code: err.code().to_string() }).await;
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_split_keeps_whitespace() {
        let pieces = split_text("Hello  world\n!", StreamSplit::Word);
        assert_eq!(pieces, vec!["Hello", "  ", "world", "\n", "!"]);
        assert_eq!(pieces.concat(), "Hello  world\n!");
    }

    #[test]
    fn char_split_is_unicode_aware() {
        assert_eq!(split_text("dé!", StreamSplit::Char), vec!["d", "é", "!"]);
        assert_eq!(split_text("as is", StreamSplit::Chunk), vec!["as is"]);
    }
}
