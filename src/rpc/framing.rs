//! LSP base-protocol framing
//!
//! Every message on the wire is `Content-Length: N\r\n\r\n` followed by
//! exactly N bytes of JSON. Encoding is a pure prefix; decoding accumulates
//! raw bytes and yields complete payloads as they become available, keeping
//! any trailing partial message for the next read.

const CONTENT_LEN_HEADER: &str = "Content-Length:";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Frame a JSON payload for the wire.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\r\n\r\n", CONTENT_LEN_HEADER, payload.len());
    let mut wire = Vec::with_capacity(header.len() + payload.len());
    wire.extend_from_slice(header.as_bytes());
    wire.extend_from_slice(payload);
    wire
}

/// Accumulator for bytes read off the server's stdout.
///
/// Messages can arrive split at any byte boundary (including inside the
/// header) or several to a single read; `feed` handles both.
#[derive(Debug, Default)]
pub struct ReadBuffer {
    buf: Vec<u8>,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes and extract every complete payload.
    ///
    /// A header block without a `Content-Length` key stops extraction
    /// without consuming anything, matching the tolerant framing of
    /// stream-based LSP clients; an unparsable length consumes the header
    /// and skips it so the buffer cannot wedge on one bad block.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        loop {
            let Some(terminator) = find(&self.buf, HEADER_TERMINATOR) else {
                break;
            };
            let header_len = terminator + HEADER_TERMINATOR.len();

            let Some(key) = find(&self.buf[..header_len], CONTENT_LEN_HEADER.as_bytes()) else {
                break;
            };

            let content_length = match parse_length(&self.buf[key..header_len]) {
                Some(len) => len,
                None => {
                    tracing::warn!("unparsable Content-Length header, skipping block");
                    self.buf.drain(..header_len);
                    continue;
                }
            };

            if self.buf.len() < header_len + content_length {
                break; // body not fully buffered yet
            }

            payloads.push(self.buf[header_len..header_len + content_length].to_vec());
            self.buf.drain(..header_len + content_length);
        }
        payloads
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse the decimal value following the `Content-Length:` key. The slice
/// starts at the key itself and runs to the end of the header block.
fn parse_length(header: &[u8]) -> Option<usize> {
    let value = &header[CONTENT_LEN_HEADER.len()..];
    let end = value
        .iter()
        .position(|&b| b == b'\r')
        .unwrap_or(value.len());
    std::str::from_utf8(&value[..end])
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn test_encode_prefixes_content_length() {
        let wire = encode(b"{\"a\":1}");
        assert_eq!(wire, b"Content-Length: 7\r\n\r\n{\"a\":1}");
    }

    #[test]
    fn test_round_trip_single_feed() {
        let body = payload(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#);
        let mut buf = ReadBuffer::new();
        let out = buf.feed(&encode(&body));
        assert_eq!(out, vec![body]);
    }

    #[test]
    fn test_split_at_every_byte_boundary() {
        let body = payload(r#"{"jsonrpc":"2.0","method":"x","params":{"k":"v"}}"#);
        let wire = encode(&body);

        for split in 1..wire.len() {
            let mut buf = ReadBuffer::new();
            let first = buf.feed(&wire[..split]);
            assert!(
                first.is_empty(),
                "payload emitted prematurely at split {}",
                split
            );
            let second = buf.feed(&wire[split..]);
            assert_eq!(second, vec![body.clone()], "split {}", split);
        }
    }

    #[test]
    fn test_multiple_messages_per_read() {
        let x = payload(r#"{"id":1}"#);
        let y = payload(r#"{"id":2}"#);
        let mut wire = encode(&x);
        wire.extend_from_slice(&encode(&y));

        let mut buf = ReadBuffer::new();
        assert_eq!(buf.feed(&wire), vec![x, y]);
    }

    #[test]
    fn test_trailing_partial_kept_for_next_read() {
        let x = payload(r#"{"id":1}"#);
        let y = payload(r#"{"id":2}"#);
        let wire_y = encode(&y);

        let mut wire = encode(&x);
        wire.extend_from_slice(&wire_y[..5]);

        let mut buf = ReadBuffer::new();
        assert_eq!(buf.feed(&wire), vec![x]);
        assert_eq!(buf.feed(&wire_y[5..]), vec![y]);
    }

    #[test]
    fn test_extra_headers_are_tolerated() {
        let body = payload(r#"{"id":3}"#);
        let wire = format!(
            "Content-Type: application/vscode-jsonrpc\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        let mut buf = ReadBuffer::new();
        assert!(buf.feed(wire.as_bytes()).is_empty());
        assert_eq!(buf.feed(&body), vec![body.clone()]);
    }

    #[test]
    fn test_header_without_content_length_is_not_consumed() {
        let mut buf = ReadBuffer::new();
        assert!(buf.feed(b"X-Custom: 1\r\n\r\n").is_empty());
        // The bad block still heads the buffer, so later messages stay queued.
        assert!(buf.feed(&encode(b"{}")).is_empty());
    }

    #[test]
    fn test_unparsable_length_skips_header_block() {
        let mut buf = ReadBuffer::new();
        assert!(buf.feed(b"Content-Length: zzz\r\n\r\n").is_empty());
        // The malformed block was consumed; framing resumes.
        let body = payload(r#"{"id":4}"#);
        assert_eq!(buf.feed(&encode(&body)), vec![body]);
    }

    #[test]
    fn test_body_split_inside_multibyte_character() {
        let body = payload(r#"{"text":"héllo"}"#);
        let wire = encode(&body);
        // Split in the middle of the two-byte 'é'.
        let mid = wire.len() - 8;
        let mut buf = ReadBuffer::new();
        assert!(buf.feed(&wire[..mid]).is_empty());
        assert_eq!(buf.feed(&wire[mid..]), vec![body]);
    }
}
