//! TCP acceptance of worker connections.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{info, warn};

use crate::error::{JobError, Result, TransportError};
use crate::shared::Connection;

use super::MAX_WORKERS;

/// Listening socket that hands out worker connections.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

/// Binds the coordinator's listening socket.
pub async fn bind(addr: impl ToSocketAddrs) -> Result<Listener> {
    let inner = TcpListener::bind(addr)
        .await
        .map_err(TransportError::from)?;
    Ok(Listener { inner })
}

impl Listener {
    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr().map_err(TransportError::from)?)
    }

    /// Accepts exactly `count` workers. Worker ids follow accept order.
    ///
    /// A failed accept is logged and retried.
    pub async fn accept_workers(&self, count: usize) -> Result<Vec<Connection<TcpStream>>> {
        if count == 0 {
            return Err(JobError::NoWorkers.into());
        }
        if count > MAX_WORKERS {
            warn!(count, max = MAX_WORKERS, "worker count above the supported maximum");
        }

        let mut workers = Vec::with_capacity(count);
        while workers.len() < count {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        warn!(%peer, error = %err, "could not disable Nagle");
                    }
                    info!(
                        worker = workers.len(),
                        %peer,
                        "worker connected ({}/{count})",
                        workers.len() + 1
                    );
                    workers.push(Connection::new(stream));
                }
                Err(err) => warn!(error = %err, "accept failed, retrying"),
            }
        }
        Ok(workers)
    }
}
