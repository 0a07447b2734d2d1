//! Fixtures shared by the benchmarks.

/// A request fixture embedded with `include_str!`.
#[derive(Debug, Copy, Clone)]
pub struct RequestFixture {
    name: &'static str,
    file_name: &'static str,
    content: &'static str,
}

impl RequestFixture {
    pub const fn new(name: &'static str, file_name: &'static str, content: &'static str) -> Self {
        Self { name, file_name, content }
    }

    /// The benchmark id.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.content.as_bytes()
    }

    /// The number of header lines, the request line and the final empty
    /// line excluded.
    pub fn header_count(&self) -> usize {
        self.content.lines().skip(1).take_while(|line| !line.is_empty()).count()
    }

    /// The fixture repeated `times` times, as a client pipelining it would
    /// send it.
    pub fn pipelined(&self, times: usize) -> Vec<u8> {
        self.bytes().repeat(times)
    }
}
