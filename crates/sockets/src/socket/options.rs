/// Options applied to sockets created by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketOptions {
    /// Sets TCP_NODELAY on connected and accepted sockets.
    pub nodelay: bool,
    /// Listen backlog of server sockets.
    pub backlog: i32,
    /// Sets SO_REUSEADDR on server sockets.
    pub reuse_address: bool,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self { nodelay: true, backlog: 1024, reuse_address: true }
    }
}
