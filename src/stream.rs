//! Pull-based transport for a render: the walk runs on its own named
//! thread behind a rendezvous channel, so a chunk is only produced
//! when the consumer asks for the next one.

use std::io::{self, Read};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;

use anyhow::{anyhow, Result};
use kstring::KString;

use crate::render::{ChunkSink, Renderer};
use crate::value::Value;

impl Renderer {
    /// Start rendering `template` and return the chunk stream. Reading
    /// paces the renderer; dropping the stream aborts it at the next
    /// chunk, though already-spawned async subtrees still run to
    /// completion.
    pub fn stream(&self, template: impl Into<Value>) -> ChunkStream {
        let value = template.into();
        let renderer = self.clone();
        let (tx, rx) = sync_channel(0);
        thread::Builder::new()
            .name("atpl-render".into())
            .spawn(move || {
                let mut sink = SenderSink { tx: tx.clone() };
                if let Err(e) = renderer.render(value, &mut sink) {
                    let _ = tx.send(Err(e));
                }
            })
            .expect("can spawn the render thread");
        ChunkStream { rx, buffered: Vec::new(), offset: 0 }
    }
}

struct SenderSink {
    tx: SyncSender<Result<KString>>,
}

impl ChunkSink for SenderSink {
    fn chunk(&mut self, chunk: &str) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Ok(KString::from_ref(chunk)))
            .map_err(|_| anyhow!("chunk consumer went away"))
    }
}

/// The consuming end of a streamed render. Iterate over chunks, or use
/// it as a `Read` to hand an HTTP response body to a server.
pub struct ChunkStream {
    rx: Receiver<Result<KString>>,
    buffered: Vec<u8>,
    offset: usize,
}

impl Iterator for ChunkStream {
    type Item = Result<KString>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

impl Read for ChunkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.offset < self.buffered.len() {
                let n = buf.len().min(self.buffered.len() - self.offset);
                buf[..n].copy_from_slice(&self.buffered[self.offset..self.offset + n]);
                self.offset += n;
                return Ok(n);
            }
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    self.buffered = chunk.as_bytes().to_vec();
                    self.offset = 0;
                }
                Ok(Err(e)) => {
                    return Err(io::Error::new(io::ErrorKind::Other, format!("{e:#}")))
                }
                // Renderer finished and hung up.
                Err(_) => return Ok(0),
            }
        }
    }
}
