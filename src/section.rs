//! Bounded extraction of an HTML fragment out of a streamed body.
//!
//! The body is cut into fixed [`CHUNK_SIZE`] chunks and each chunk is scanned
//! on its own, so a marker that straddles two chunks is not seen. Markers are
//! expected to sit well inside a chunk in practice.

pub const CHUNK_SIZE: usize = 2048;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectionState {
    Searching,
    Capturing,
    Done,
}

pub struct SectionExtractor<'m> {
    start: &'m [u8],
    end: &'m [u8],
    state: SectionState,
    buffer: Vec<u8>,
    pending: Vec<u8>,
}

impl<'m> SectionExtractor<'m> {
    pub fn new(start: &'m str, end: &'m str) -> Self {
        Self {
            start: start.as_bytes(),
            end: end.as_bytes(),
            state: SectionState::Searching,
            buffer: Vec::new(),
            pending: Vec::with_capacity(CHUNK_SIZE * 2),
        }
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    /// Accepts bytes as they arrive from the network and feeds them through in
    /// fixed-size chunks. Returns `true` once the section is complete and the
    /// rest of the body can be discarded.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        self.pending.extend_from_slice(bytes);
        while self.pending.len() >= CHUNK_SIZE {
            let chunk: Vec<u8> = self.pending.drain(..CHUNK_SIZE).collect();
            if self.feed(&chunk) {
                self.pending.clear();
                return true;
            }
        }
        false
    }

    /// Runs a single chunk through the state machine.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        match self.state {
            SectionState::Done => true,
            SectionState::Searching => {
                let Some(idx) = find(chunk, self.start) else {
                    return false;
                };
                self.state = SectionState::Capturing;
                // the end marker can only follow the start marker
                self.capture(&chunk[idx..], self.start.len())
            },
            SectionState::Capturing => self.capture(chunk, 0),
        }
    }

    fn capture(&mut self, chunk: &[u8], skip: usize) -> bool {
        match find(&chunk[skip..], self.end) {
            Some(idx) => {
                self.buffer.extend_from_slice(&chunk[..skip + idx]);
                self.state = SectionState::Done;
                true
            },
            None => {
                self.buffer.extend_from_slice(chunk);
                false
            },
        }
    }

    /// Flushes a trailing partial chunk and decodes what was captured. Empty if
    /// the start marker never showed up.
    pub fn finish(mut self) -> String {
        if self.state != SectionState::Done && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.feed(&rest);
        }
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
