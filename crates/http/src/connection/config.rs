/// Tuning of the per connection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Responses that may wait in the output queue. The reader stops parsing
    /// new requests while the queue is full.
    pub max_in_flight: usize,
    /// Capacity in bytes of each response pipe and request body pipe.
    pub pipe_capacity: usize,
    /// Capacity of the buffered reader over the socket.
    pub read_buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_in_flight: 5, pipe_capacity: 64 * 1024, read_buffer_size: 8 * 1024 }
    }
}
