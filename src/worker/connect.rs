use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::info;

use crate::error::{Result, TransportError};
use crate::shared::Connection;

/// Connects to the coordinator.
pub async fn connect(addr: impl ToSocketAddrs) -> Result<Connection<TcpStream>> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(TransportError::from)?;
    stream.set_nodelay(true).map_err(TransportError::from)?;
    if let Ok(peer) = stream.peer_addr() {
        info!(%peer, "connected to coordinator");
    }
    Ok(Connection::new(stream))
}
