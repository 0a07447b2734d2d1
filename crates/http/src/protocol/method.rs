/// The request method.
///
/// The six well known methods are matched without allocating. Any other
/// token parses to [`HttpMethod::Custom`]; its text is available through
/// [`Request::method_name`](crate::protocol::Request::method_name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Custom,
}

impl HttpMethod {
    /// Every method with a fixed name, in matching order.
    pub const KNOWN: [HttpMethod; 6] =
        [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete, HttpMethod::Head, HttpMethod::Options];

    /// The canonical name, `None` for [`HttpMethod::Custom`].
    pub const fn known_name(self) -> Option<&'static str> {
        match self {
            HttpMethod::Get => Some("GET"),
            HttpMethod::Post => Some("POST"),
            HttpMethod::Put => Some("PUT"),
            HttpMethod::Delete => Some("DELETE"),
            HttpMethod::Head => Some("HEAD"),
            HttpMethod::Options => Some("OPTIONS"),
            HttpMethod::Custom => None,
        }
    }

    /// Requests with these methods never carry a body on this server.
    pub const fn is_bodyless(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Head | HttpMethod::Options)
    }
}
