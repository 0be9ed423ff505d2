//! Shared streaming-relay loop.
//!
//! Both relays have the same shape once the upstream connection is open and
//! the handshake is sent: pull tagged frames, forward any payload they carry,
//! and stop on the frame (or end-of-stream) that marks the end of the exchange.
//! [`drain`] implements that loop once, with an optional idle deadline on
//! every receive.

use crate::error::RelayError;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

/// How an upstream signals that no further meaningful frames will follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The exchange ends when the frame stream itself ends.
    EndOfStream,
    /// The exchange ends on a frame flagged as final; an early end-of-stream
    /// is a protocol error.
    FinalFrame,
}

/// A message received from an upstream provider.
pub trait RelayFrame {
    type Payload;

    /// Whether this frame is the last meaningful one of the exchange.
    fn is_final(&self) -> bool {
        false
    }

    /// Extracts the payload to forward, if the frame carries one.
    fn into_payload(self) -> Result<Option<Self::Payload>, RelayError>;
}

/// Forwards payloads from `frames` in receipt order until the exchange terminates.
///
/// With `idle_timeout` set, waiting longer than that for any single frame
/// aborts with [`RelayError::Timeout`]. Without it the relay waits
/// indefinitely for the provider.
pub fn drain<S, F>(
    frames: S,
    termination: Termination,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<F::Payload, RelayError>>
where
    S: Stream<Item = Result<F, RelayError>>,
    F: RelayFrame,
{
    try_stream! {
        let mut frames = Box::pin(frames);
        let mut received = 0usize;
        loop {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, frames.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(received, ?limit, "Upstream idle timeout elapsed");
                        Err::<(), _>(RelayError::Timeout(limit))?;
                        break;
                    }
                },
                None => frames.next().await,
            };

            let Some(frame) = next else {
                if termination == Termination::FinalFrame {
                    Err::<(), _>(RelayError::Protocol(
                        "upstream closed before signalling the final message".to_string(),
                    ))?;
                }
                break;
            };

            let frame = frame?;
            received += 1;
            let last = frame.is_final();
            if let Some(payload) = frame.into_payload()? {
                yield payload;
            }
            if last {
                break;
            }
        }
        debug!(received, "Upstream exchange complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[derive(Debug)]
    struct Frame {
        data: Option<u8>,
        last: bool,
    }

    impl RelayFrame for Frame {
        type Payload = u8;

        fn is_final(&self) -> bool {
            self.last
        }

        fn into_payload(self) -> Result<Option<u8>, RelayError> {
            Ok(self.data)
        }
    }

    fn frame(data: Option<u8>, last: bool) -> Result<Frame, RelayError> {
        Ok(Frame { data, last })
    }

    #[tokio::test]
    async fn test_stops_at_final_frame_without_polling_further() {
        let frames = stream::iter(vec![
            frame(Some(1), false),
            frame(None, false),
            frame(Some(2), true),
            frame(Some(3), false),
        ]);
        let out: Vec<_> = drain(frames, Termination::FinalFrame, None)
            .collect::<Vec<_>>()
            .await;
        let out: Vec<u8> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(out, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_end_of_stream_is_terminal_when_configured() {
        let frames = stream::iter(vec![frame(Some(1), false), frame(Some(2), false)]);
        let out: Vec<_> = drain(frames, Termination::EndOfStream, None)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_early_end_of_stream_is_protocol_error_for_final_frame_upstreams() {
        let frames = stream::iter(vec![frame(Some(1), false)]);
        let out: Vec<_> = drain(frames, Termination::FinalFrame, None)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(*out[0].as_ref().unwrap(), 1);
        assert!(matches!(out[1], Err(RelayError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_upstream_error_stops_the_relay() {
        let frames = stream::iter(vec![
            frame(Some(1), false),
            Err(RelayError::Transport("socket dropped".into())),
            frame(Some(2), true),
        ]);
        let out: Vec<_> = drain(frames, Termination::FinalFrame, None)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], Err(RelayError::Transport(_))));
    }

    #[tokio::test]
    async fn test_idle_timeout_aborts_a_stalled_upstream() {
        let frames = stream::iter(vec![frame(Some(1), false)]).chain(stream::pending());
        let out: Vec<_> = drain(
            frames,
            Termination::FinalFrame,
            Some(Duration::from_millis(20)),
        )
        .collect::<Vec<_>>()
        .await;
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], Err(RelayError::Timeout(_))));
    }
}
