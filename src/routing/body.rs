//! Bounded body buffering with replay.
//!
//! Sniffing an `/rpc` body consumes it, so whatever was read is stitched back
//! in front of the unread remainder before the request is forwarded.

use axum::body::{Body, Bytes};
use futures_util::{stream, StreamExt};
use http_body_util::BodyExt;
use std::time::Duration;

/// Why a body could not be fully buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Complete,
    TooLarge,
    TimedOut,
    Failed,
}

/// Result of buffering a request body for inspection.
#[derive(Debug)]
pub struct SniffedBody {
    /// Full body, present only when it was read completely within the limit.
    pub bytes: Option<Bytes>,
    /// Body to forward upstream, carrying the same bytes as the original.
    pub body: Body,
    pub outcome: ReadOutcome,
}

/// Buffer up to `limit` bytes of `body`, bounded by `read_timeout`.
///
/// `declared_len` is the request's `Content-Length`, used to skip reading a
/// body that is already known to be oversized.
pub async fn sniff_body(
    body: Body,
    declared_len: Option<u64>,
    limit: usize,
    read_timeout: Duration,
) -> SniffedBody {
    if declared_len.is_some_and(|len| len > limit as u64) {
        return SniffedBody {
            bytes: None,
            body,
            outcome: ReadOutcome::TooLarge,
        };
    }

    let mut body = body;
    let mut chunks: Vec<Bytes> = Vec::new();
    let outcome = match tokio::time::timeout(read_timeout, read_prefix(&mut body, &mut chunks, limit)).await {
        Ok(outcome) => outcome,
        Err(_) => ReadOutcome::TimedOut,
    };

    if outcome == ReadOutcome::Complete {
        let bytes = concat(chunks);
        return SniffedBody {
            bytes: Some(bytes.clone()),
            body: Body::from(bytes),
            outcome,
        };
    }

    tracing::debug!(?outcome, buffered = chunks.len(), "Body not fully buffered, replaying prefix");
    let prefix = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
    SniffedBody {
        bytes: None,
        body: Body::from_stream(prefix.chain(body.into_data_stream())),
        outcome,
    }
}

async fn read_prefix(body: &mut Body, chunks: &mut Vec<Bytes>, limit: usize) -> ReadOutcome {
    let mut total = 0usize;
    loop {
        match body.frame().await {
            None => return ReadOutcome::Complete,
            Some(Ok(frame)) => {
                // Trailers carry nothing the classifier looks at.
                if let Ok(data) = frame.into_data() {
                    total += data.len();
                    chunks.push(data);
                    if total > limit {
                        return ReadOutcome::TooLarge;
                    }
                }
            }
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return ReadOutcome::Failed;
            }
        }
    }
}

fn concat(chunks: Vec<Bytes>) -> Bytes {
    match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.into_iter().next().unwrap_or_default(),
        _ => {
            let mut buf = Vec::with_capacity(chunks.iter().map(Bytes::len).sum());
            for chunk in chunks {
                buf.extend_from_slice(&chunk);
            }
            Bytes::from(buf)
        }
    }
}
