//! Line reassembly for tool output streams.
//!
//! `ossutil` redraws its progress bar with bare `\r`, writes diagnostics with
//! `\n`, and flushes at arbitrary byte boundaries. Either terminator ends a
//! line; bytes are only decoded once a full line is available so multi-byte
//! characters split across reads survive.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::READ_CHUNK_SIZE;

/// Incremental splitter turning byte chunks into trimmed, non-empty lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.pending[start..]
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
        {
            let end = start + pos;
            if let Some(line) = clean(&self.pending[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flushes the trailing partial line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        clean(&rest)
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn clean(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Reads `reader` to the end in fixed-size chunks and sends each line to `tx`.
///
/// Returns early without error if the receiver goes away. A read error
/// other than end-of-stream stops splitting and is returned; the partial
/// line is dropped in that case.
pub async fn read_lines<R>(mut reader: R, tx: mpsc::Sender<String>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for line in splitter.push(&buf[..n]) {
            if tx.send(line).await.is_err() {
                return Ok(());
            }
        }
    }

    if let Some(line) = splitter.finish() {
        let _ = tx.send(line).await;
    }
    Ok(())
}
