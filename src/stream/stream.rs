use std::collections::VecDeque;

use super::block::StreamBlock;
use crate::config::StreamConfig;
use crate::errinput;
use crate::error::Result;
use crate::fault;
use crate::Error;

/// Buffers committed row changes into fixed-capacity blocks handed to an
/// external consumer.
///
/// Change payloads are opaque bytes. Every append advances the universal
/// stream offset (uso) and returns the offset *before* the append, which
/// is the mark a transaction rolls back to if it aborts. Committed data
/// ages out of the stream through [`ChangeStream::periodic_flush`], which is
/// tick-driven by the owning execution site; the consumer pulls closed
/// blocks with [`ChangeStream::poll_committed`] and returns them with
/// [`ChangeStream::release_until`]. Blocks are recycled through a free
/// list.
pub struct ChangeStream {
    partition_id: u32,
    site_id: u32,
    table_id: u32,
    config: StreamConfig,

    /// Total bytes ever appended to this stream.
    uso: u64,
    current: StreamBlock,
    /// Closed blocks not yet released by the consumer.
    pending: VecDeque<StreamBlock>,
    free: Vec<StreamBlock>,

    /// Transaction id of the current (possibly uncommitted) transaction.
    open_txn: Option<i64>,
    /// Stream offset when the open transaction started.
    open_uso: u64,
    committed_txn: Option<i64>,
    committed_uso: u64,

    /// Timestamp of the most recent flush, in milliseconds.
    last_flush: i64,
    /// Offset below which blocks have already been polled.
    first_unpolled_uso: u64,
}

impl ChangeStream {
    pub fn new(partition_id: u32, site_id: u32, table_id: u32, create_time: i64) -> Self {
        Self::with_config(
            partition_id,
            site_id,
            table_id,
            create_time,
            StreamConfig::default(),
        )
    }

    pub fn with_config(
        partition_id: u32,
        site_id: u32,
        table_id: u32,
        create_time: i64,
        config: StreamConfig,
    ) -> Self {
        Self {
            partition_id,
            site_id,
            table_id,
            current: StreamBlock::new(config.block_capacity, 0),
            config,
            uso: 0,
            pending: VecDeque::new(),
            free: Vec::new(),
            open_txn: None,
            open_uso: 0,
            committed_txn: None,
            committed_uso: 0,
            last_flush: create_time,
            first_unpolled_uso: 0,
        }
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub fn site_id(&self) -> u32 {
        self.site_id
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    /// Total bytes appended over the life of the stream.
    pub fn bytes_used(&self) -> u64 {
        self.uso
    }

    /// Offset of the last committed byte.
    pub fn committed_uso(&self) -> u64 {
        self.committed_uso
    }

    /// Id of the last committed transaction, if any.
    pub fn committed_txn(&self) -> Option<i64> {
        self.committed_txn
    }

    /// The open transaction and the stream offset it started at.
    pub fn open_transaction(&self) -> Option<(i64, u64)> {
        self.open_txn.map(|txn| (txn, self.open_uso))
    }

    /// Closed blocks not yet released.
    pub fn pending_blocks(&self) -> usize {
        self.pending.len()
    }

    /// Reconfigures the block capacity. Only allowed while the stream is
    /// still empty; tests use small blocks to exercise rollover.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if self.uso != 0 {
            return errinput!("stream capacity can only change before the first append");
        }
        self.config.block_capacity = capacity;
        self.current = StreamBlock::new(capacity, 0);
        self.free.clear();
        Ok(())
    }

    /// Appends one change for transaction `txn`, returning the stream
    /// offset before the append: the rollback mark for this change.
    pub fn append_change(
        &mut self,
        last_committed_txn: i64,
        txn: i64,
        payload: &[u8],
    ) -> Result<u64> {
        if payload.len() > self.config.block_capacity {
            return Err(Error::ChangeTooLarge {
                size: payload.len(),
                capacity: self.config.block_capacity,
            });
        }
        self.commit(last_committed_txn, txn);

        let mark = self.uso;
        if self.current.remaining() < payload.len() {
            self.extend_chain();
        }
        self.current.append(payload);
        self.uso += payload.len() as u64;
        Ok(mark)
    }

    /// Truncates the stream back to `mark`, discarding every byte
    /// appended after it. Rolling back committed data is an error.
    pub fn rollback_to(&mut self, mark: u64) -> Result<()> {
        if mark < self.committed_uso {
            return Err(Error::RollbackPastCommit {
                mark,
                committed: self.committed_uso,
            });
        }
        if mark > self.uso {
            return errinput!("rollback mark {mark} past end of stream at {}", self.uso);
        }

        // Walk back whole blocks past the mark.
        while self.current.start_uso() > mark {
            let reinstated = match self.pending.pop_back() {
                Some(block) => block,
                None => return fault!("rollback mark {mark} precedes the retained stream"),
            };
            let dropped = std::mem::replace(&mut self.current, reinstated);
            self.free.push(dropped);
        }
        self.current.truncate_to_uso(mark);
        self.uso = mark;
        if self.open_uso > mark {
            self.open_uso = mark;
        }
        Ok(())
    }

    /// Ages out committed data. When the flush interval has elapsed, or
    /// unconditionally when `now` is negative (the forced flush at
    /// shutdown), the current block is closed into the pending queue once
    /// all of its bytes are committed.
    pub fn periodic_flush(&mut self, now: i64, last_committed_txn: i64, current_txn: i64) {
        self.commit(last_committed_txn, current_txn);

        let forced = now < 0;
        if !forced {
            if now - self.last_flush < self.config.flush_interval_ms {
                return;
            }
            self.last_flush = now;
        }

        if !self.current.is_empty() && self.current.end_uso() <= self.committed_uso {
            tracing::debug!(
                partition = self.partition_id,
                site = self.site_id,
                table = self.table_id,
                bytes = self.current.len(),
                "closing committed stream block"
            );
            self.extend_chain();
        }
    }

    /// The oldest closed block that is fully committed and has not been
    /// polled yet.
    pub fn poll_committed(&mut self) -> Option<&StreamBlock> {
        let idx = self
            .pending
            .iter()
            .position(|b| b.start_uso() >= self.first_unpolled_uso)?;
        if self.pending[idx].end_uso() > self.committed_uso {
            return None;
        }
        self.first_unpolled_uso = self.pending[idx].end_uso();
        Some(&self.pending[idx])
    }

    /// Releases polled blocks wholly below `uso`, recycling their
    /// buffers. Returns false when the offset reaches past the polled
    /// region.
    pub fn release_until(&mut self, uso: u64) -> bool {
        if uso > self.first_unpolled_uso {
            return false;
        }
        while self
            .pending
            .front()
            .is_some_and(|block| block.end_uso() <= uso)
        {
            if let Some(block) = self.pending.pop_front() {
                self.free.push(block);
            }
        }
        true
    }

    /// Transaction bookkeeping shared by appends and flushes: when the
    /// open transaction changes or is reported committed, the committed
    /// offset advances to cover its bytes.
    fn commit(&mut self, last_committed_txn: i64, current_txn: i64) {
        if self.open_txn != Some(current_txn) {
            if let Some(open) = self.open_txn {
                if open <= last_committed_txn {
                    self.committed_txn = Some(open);
                    self.committed_uso = self.uso;
                }
            }
            self.open_txn = Some(current_txn);
            self.open_uso = self.uso;
        } else if current_txn <= last_committed_txn {
            self.committed_txn = Some(current_txn);
            self.committed_uso = self.uso;
        }
    }

    /// Closes the current block into the pending queue and opens a fresh
    /// one, reusing a free-list block when available.
    fn extend_chain(&mut self) {
        let next_start = self.uso;
        let mut fresh = self
            .free
            .pop()
            .unwrap_or_else(|| StreamBlock::new(self.config.block_capacity, next_start));
        fresh.recycle(next_start);
        let closed = std::mem::replace(&mut self.current, fresh);
        self.pending.push_back(closed);
    }
}
