//! Store-and-forward relaying between workers.
//!
//! Each worker connection gets one relay task that owns the connection's
//! read side. Write sides live in a shared [`RouteTable`]; a relay forwards a
//! frame by locking the destination writer, so whole frames never interleave
//! on one connection.

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{JobError, Result};
use crate::shared::{Address, Envelope, FrameReader, FrameWriter};

/// Write sides of every worker connection, indexed by worker id. Workers
/// closed during dispatch have no entry.
#[derive(Debug)]
pub struct RouteTable<W> {
    routes: Vec<Option<Mutex<FrameWriter<W>>>>,
}

impl<W: AsyncWrite + Unpin> RouteTable<W> {
    /// Builds the table from per-worker writers.
    pub fn new(writers: Vec<Option<FrameWriter<W>>>) -> Self {
        Self {
            routes: writers.into_iter().map(|w| w.map(Mutex::new)).collect(),
        }
    }

    /// Number of slots, including closed workers.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Whether `worker` can receive frames.
    pub fn is_routable(&self, worker: usize) -> bool {
        matches!(self.routes.get(worker), Some(Some(_)))
    }

    /// Writes `envelope` unchanged to worker `target`.
    pub async fn forward(&self, from: usize, target: usize, envelope: &Envelope) -> Result<()> {
        let Some(Some(route)) = self.routes.get(target) else {
            return Err(JobError::UnknownTarget {
                from,
                target: envelope.target,
            }
            .into());
        };
        let mut writer = route.lock().await;
        writer.write(envelope).await
    }
}

/// How a relay task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The worker finished without a result.
    Done,
    /// The worker delivered the final result; the payload is an encoded
    /// module.
    Result(Bytes),
}

/// Forwards frames from `worker` until it sends a terminal frame.
pub async fn relay<R, W>(
    worker: usize,
    mut reader: FrameReader<R>,
    routes: &RouteTable<W>,
) -> Result<RelayOutcome>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut forwarded = 0usize;
    loop {
        let envelope = reader.read().await?;
        match envelope.address()? {
            Address::Worker(target) => {
                debug!(
                    from = worker,
                    to = target,
                    bytes = envelope.payload.len(),
                    "forwarding frame"
                );
                routes.forward(worker, target, &envelope).await?;
                forwarded += 1;
            }
            Address::Done => {
                info!(worker, forwarded, "worker finished");
                return Ok(RelayOutcome::Done);
            }
            Address::Result => {
                info!(worker, forwarded, "worker delivered the result");
                return Ok(RelayOutcome::Result(envelope.payload));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{Connection, Payload};
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    type Halves = (FrameReader<ReadHalf<DuplexStream>>, FrameWriter<WriteHalf<DuplexStream>>);

    fn pair() -> (Halves, Halves) {
        let (a, b) = tokio::io::duplex(1024);
        (Connection::new(a).into_split(), Connection::new(b).into_split())
    }

    #[tokio::test]
    async fn forwards_until_done() {
        // worker 0 talks to the relay through `w0`; worker 1 listens on `w1`.
        let ((relay_in0, _relay_out0), (_w0_in, mut w0_out)) = pair();
        let ((_relay_in1, relay_out1), (mut w1_in, _w1_out)) = pair();
        let routes = RouteTable::new(vec![None, Some(relay_out1)]);

        let frame = Envelope::new(Address::Worker(1), Payload::Int(9).encode());
        w0_out.write(&frame).await.unwrap();
        w0_out
            .write(&Envelope::new(Address::Done, Payload::Int(0).encode()))
            .await
            .unwrap();

        let outcome = relay(0, relay_in0, &routes).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Done);
        assert_eq!(w1_in.read().await.unwrap(), frame);
    }

    #[tokio::test]
    async fn result_payload_is_surfaced() {
        let ((relay_in, _relay_out), (_w_in, mut w_out)) = pair();
        let routes: RouteTable<WriteHalf<DuplexStream>> = RouteTable::new(vec![None]);

        let payload = Payload::Text("R".into()).encode();
        w_out
            .write(&Envelope::new(Address::Result, payload.clone()))
            .await
            .unwrap();
        assert_eq!(
            relay(0, relay_in, &routes).await.unwrap(),
            RelayOutcome::Result(payload)
        );
    }

    #[tokio::test]
    async fn closed_worker_is_not_routable() {
        let ((relay_in, _relay_out), (_w_in, mut w_out)) = pair();
        let routes: RouteTable<WriteHalf<DuplexStream>> = RouteTable::new(vec![None, None]);
        assert!(!routes.is_routable(1));

        w_out
            .write(&Envelope::new(Address::Worker(1), Bytes::new()))
            .await
            .unwrap();
        let err = relay(0, relay_in, &routes).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Job(JobError::UnknownTarget { from: 0, target: 1 })
        ));
    }

    #[tokio::test]
    async fn peer_hangup_fails_the_relay() {
        let ((relay_in, _relay_out), (w_in, w_out)) = pair();
        drop((w_in, w_out));
        let routes: RouteTable<WriteHalf<DuplexStream>> = RouteTable::new(vec![None]);
        let err = relay(0, relay_in, &routes).await.unwrap_err();
        assert!(err.is_connection_lost(), "{err}");
    }
}
