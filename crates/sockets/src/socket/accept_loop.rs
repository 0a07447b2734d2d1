use tracing::{error, info};

use crate::error::SelectError;
use crate::socket::{AsyncServerSocket, AsyncSocket};

/// Accepts connections until the listener or its selector is closed.
///
/// Each accepted socket is handed to `on_accept` on its own; the callback
/// usually spawns a task per connection. Accept failures other than a closed
/// listener are logged and the loop goes on.
pub async fn accept_loop<F>(server: &AsyncServerSocket, mut on_accept: F)
where
    F: FnMut(AsyncSocket),
{
    loop {
        match server.accept().await {
            Ok(socket) => on_accept(socket),
            Err(e) if server.is_closed() || SelectError::is_terminal(&e) => {
                info!(cause = %e, "listener closed, accept loop stopped");
                break;
            }
            Err(e) => {
                error!(cause = %e, "failed to accept");
            }
        }
    }
}
