use bytes::{Buf, BytesMut};

/// Per-connection inbound line framing.
///
/// TCP reads arrive in arbitrary chunks. Each chunk is appended here, every
/// complete line is handed out exactly once, and a trailing partial line is
/// retained until the rest of it arrives. Protocol messages are bounded in
/// length, so the buffer carries a hard cap as a safety net; when a peer
/// pushes past it the oldest bytes are dropped and the caller is told how
/// many, so it can log the event.
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
    limit: usize,
}

impl LineBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
        }
    }

    /// Append a read chunk, enforcing the cap. Returns the number of bytes
    /// dropped from the front of the buffer, normally zero.
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let total = self.buf.len() + bytes.len();
        let overflow = total.saturating_sub(self.limit);

        if overflow >= self.buf.len() + bytes.len() {
            // Degenerate cap, nothing can be retained.
            self.buf.clear();
            return total;
        }

        if overflow > self.buf.len() {
            let skip = overflow - self.buf.len();
            self.buf.clear();
            self.buf.extend_from_slice(&bytes[skip..]);
        } else {
            self.buf.advance(overflow);
            self.buf.extend_from_slice(bytes);
        }

        overflow
    }

    /// Pop the next complete line, stripped of its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|it| *it == b'\n')?;
        let line = self.buf.split_to(pos + 1);
        let mut end = line.len() - 1;
        if end > 0 && line[end - 1] == b'\r' {
            end -= 1;
        }

        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
