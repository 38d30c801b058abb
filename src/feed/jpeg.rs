use bytes::{Bytes, BytesMut};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
const MAX_PENDING_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct JpegFrameAccumulator {
    pending: BytesMut,
    frames: u64,
}

impl JpegFrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) -> Option<Bytes> {
        self.pending.extend_from_slice(chunk);
        if self.pending.len() > MAX_PENDING_BYTES {
            let overflow = self.pending.len() - MAX_PENDING_BYTES;
            let _ = self.pending.split_to(overflow);
        }

        let mut newest = None;
        loop {
            let Some(start) = find_marker(&self.pending, &JPEG_SOI) else {
                // Keep a trailing 0xFF, it may open the next SOI.
                let keep = usize::from(self.pending.last() == Some(&0xFF));
                let _ = self.pending.split_to(self.pending.len() - keep);
                break;
            };
            let _ = self.pending.split_to(start);

            let Some(end) = find_marker(&self.pending[2..], &JPEG_EOI) else {
                break;
            };
            let frame = self.pending.split_to(2 + end + 2).freeze();
            self.frames += 1;
            newest = Some(frame);
        }

        newest
    }
}

fn find_marker(buffer: &[u8], marker: &[u8; 2]) -> Option<usize> {
    buffer.windows(2).position(|w| w == marker)
}
