use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field carries information for us. Comment lines (starting
/// with a colon) and the `event`, `id` and `retry` fields are skipped.
pub struct Sse {
    buf: String,
    // Trailing bytes of an UTF-8 sequence split across two chunks.
    undecoded: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            undecoded: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain what is already buffered before reading more data.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            self.undecoded.extend_from_slice(&bytes);
            self.decode()?;
        }
    }

    fn decode(&mut self) -> Result<(), Error> {
        let valid_len = match str::from_utf8(&self.undecoded) {
            Ok(_) => self.undecoded.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(Error::InvalidPayload),
        };
        let decoded = str::from_utf8(&self.undecoded[..valid_len])
            .map_err(|_| Error::InvalidPayload)?;
        self.buf.push_str(decoded);
        self.undecoded.drain(..valid_len);

        if self.buf.contains('\r') {
            self.buf = self.buf.replace("\r\n", "\n");
        }
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        while let Some(eol_idx) = self.buf.find("\n\n") {
            let block: String = self.buf.drain(0..eol_idx + 2).collect();

            let mut data_lines = vec![];
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => {
                        (field, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match field {
                    "data" => data_lines.push(value),
                    "event" | "id" | "retry" => {}
                    _ => return Err(Error::InvalidPayload),
                }
            }

            // A block with comments only (e.g. keep-alive), try the next one.
            if !data_lines.is_empty() {
                return Ok(Some(data_lines.join("\n")));
            }
        }
        Ok(None)
    }
}
