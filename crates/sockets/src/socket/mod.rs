//! Non-blocking TCP sockets suspending on a selector.

mod accept_loop;
mod async_socket;
mod options;
mod server_socket;

pub use accept_loop::accept_loop;
pub use async_socket::AsyncSocket;
pub use async_socket::ReadHalf;
pub use async_socket::SocketState;
pub use async_socket::WriteHalf;
pub use options::SocketOptions;
pub use server_socket::AsyncServerSocket;
pub use server_socket::ServerState;
