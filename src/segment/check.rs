//! Streaming checks applied to every batch the reader emits.
//!
//! Structural checks (validity, position and offset monotonicity, leader
//! epoch monotonicity) run on every segment. Transaction-state segments
//! additionally run the coordinator's state machine per producer session
//! and must not contain transactional batches.

use std::collections::HashMap;

use crate::segment::error::DumpError;
use crate::segment::model::{BaseMessage, Batch, ProducerSession, SegmentType, TxnState};

#[derive(Debug)]
pub(crate) struct BatchChecks {
    segment_type: SegmentType,
    prev: Option<PrevBatch>,
    txn_states: HashMap<ProducerSession, TxnState>,
}

#[derive(Debug)]
struct PrevBatch {
    position: i64,
    size: i32,
    last_offset: i64,
    leader_epoch: i32,
}

impl BatchChecks {
    pub(crate) fn new(segment_type: SegmentType) -> BatchChecks {
        BatchChecks {
            segment_type,
            prev: None,
            txn_states: HashMap::new(),
        }
    }

    pub(crate) fn check(&mut self, batch: &Batch) -> Result<(), DumpError> {
        if !batch.is_valid {
            return Err(DumpError::invariant(
                &batch.file,
                batch.line,
                "batch is marked invalid (isvalid: false)",
            ));
        }

        if let Some(prev) = &self.prev {
            let prev_end = prev.position + i64::from(prev.size);
            if batch.position < prev_end {
                return Err(DumpError::invariant(
                    &batch.file,
                    batch.line,
                    format!(
                        "batch at position {} begins before the end of the previous batch ({} + {} bytes)",
                        batch.position, prev.position, prev.size
                    ),
                ));
            }
            if batch.base_offset <= prev.last_offset {
                return Err(DumpError::invariant(
                    &batch.file,
                    batch.line,
                    format!(
                        "baseOffset {} does not advance past the previous batch's lastOffset {}",
                        batch.base_offset, prev.last_offset
                    ),
                ));
            }
            if batch.partition_leader_epoch < prev.leader_epoch {
                return Err(DumpError::invariant(
                    &batch.file,
                    batch.line,
                    format!(
                        "partitionLeaderEpoch {} regressed (previous batch had {})",
                        batch.partition_leader_epoch, prev.leader_epoch
                    ),
                ));
            }
        }
        self.prev = Some(PrevBatch {
            position: batch.position,
            size: batch.size,
            last_offset: batch.last_offset,
            leader_epoch: batch.partition_leader_epoch,
        });

        if self.segment_type == SegmentType::TransactionState {
            for message in &batch.messages {
                if let BaseMessage::StateChange(change) = message {
                    self.check_transition(change.session(), change.state, message)?;
                }
            }
            if batch.is_transactional {
                return Err(DumpError::invariant(
                    &batch.file,
                    batch.line,
                    "transactional batch in a transaction-state segment",
                ));
            }
        }

        Ok(())
    }

    fn check_transition(
        &mut self,
        session: ProducerSession,
        state: TxnState,
        message: &BaseMessage,
    ) -> Result<(), DumpError> {
        if let Some(&prev) = self.txn_states.get(&session) {
            if !state.valid_previous(prev) {
                return Err(DumpError::invariant(
                    message.file(),
                    message.line(),
                    format!("Illegal state change from {prev} to {state}"),
                ));
            }
        }
        self.txn_states.insert(session, state);
        Ok(())
    }
}
