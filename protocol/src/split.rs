//! Reassembly of SPLIT packets
//!
//! Oversized messages arrive as numbered fragments sharing one sequence
//! number. Fragments are buffered per sequence number until the final index
//! is present and every index before it has arrived, then handed out as a
//! single payload exactly once.
//!
//! Incomplete messages stay buffered: there is no timeout and no resend
//! request for missing chunks.

use crate::error::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SplitReassembler {
    buffers: HashMap<u16, HashMap<u16, Bytes>>,
}

impl SplitReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one fragment, returning the whole message once it is complete.
    pub fn insert(
        &mut self,
        seq: u16,
        chunk_count: u16,
        chunk_index: u16,
        data: Bytes,
    ) -> Result<Option<Bytes>> {
        if chunk_index >= chunk_count {
            return Err(ProtocolError::MalformedSplit {
                count: chunk_count,
                index: chunk_index,
            });
        }

        let chunks = self.buffers.entry(seq).or_default();
        chunks.insert(chunk_index, data);

        if !chunks.contains_key(&(chunk_count - 1)) {
            return Ok(None);
        }

        let mut complete = BytesMut::new();
        for index in 0..chunk_count {
            match chunks.get(&index) {
                Some(chunk) => complete.put_slice(chunk),
                None => {
                    debug!("Split {} missing chunk {} of {}", seq, index, chunk_count);
                    return Ok(None);
                }
            }
        }

        self.buffers.remove(&seq);
        debug!("Reassembled split {} from {} chunks", seq, chunk_count);
        Ok(Some(complete.freeze()))
    }

    pub fn is_pending(&self, seq: u16) -> bool {
        self.buffers.contains_key(&seq)
    }

    pub fn pending(&self) -> usize {
        self.buffers.len()
    }
}
