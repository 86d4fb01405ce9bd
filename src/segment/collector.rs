//! Folding a batch stream into a transactional activity summary.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::segment::error::DumpError;
use crate::segment::model::{serialize_sessions, BaseMessage, Batch, ControlMessage, ProducerSession};
use crate::segment::stats::SummaryStats;

/// The first data batch seen for a producer session, with a running count
/// of the session's data batches. Held only while the transaction is
/// open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirstBatchInTxn {
    pub first_batch: Batch,
    pub num_data_batches: u32,
}

/// A commit or abort marker for a session that wrote no data batches in
/// this segment. Usually a transaction whose data predates the segment,
/// or a coordinator retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmptyTransaction {
    pub batch: Batch,
    pub control: ControlMessage,
}

/// Transactional summary of one segment.
#[derive(Debug, Clone, Serialize)]
pub struct TxnInfo {
    pub first_batch: Option<Batch>,
    pub last_batch: Option<Batch>,
    /// Sessions whose transactions were never closed within this segment.
    #[serde(serialize_with = "serialize_sessions")]
    pub open_transactions: HashMap<ProducerSession, FirstBatchInTxn>,
    pub empty_transactions: Vec<EmptyTransaction>,
    pub committed: u64,
    pub aborted: u64,
    /// Data batches per completed transaction.
    pub txn_size_stats: SummaryStats,
    /// Milliseconds between a transaction's first data batch and its
    /// marker, per completed transaction.
    pub txn_duration_stats: SummaryStats,
}

impl fmt::Display for TxnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.first_batch {
            Some(batch) => writeln!(f, "First batch: {batch}")?,
            None => writeln!(f, "First batch: (none)")?,
        }
        for empty in &self.empty_transactions {
            writeln!(
                f,
                "Empty txn: session {} {} at baseOffset {} (line {})",
                empty.batch.session(),
                if empty.control.commit { "COMMIT" } else { "ABORT" },
                empty.batch.base_offset,
                empty.batch.line,
            )?;
        }
        match &self.last_batch {
            Some(batch) => writeln!(f, "Last batch: {batch}")?,
            None => writeln!(f, "Last batch: (none)")?,
        }
        let mut open: Vec<_> = self.open_transactions.iter().collect();
        open.sort_by_key(|(session, _)| (session.producer_id, session.producer_epoch));
        for (session, txn) in open {
            writeln!(
                f,
                "Open transaction: session {} with {} data batches from baseOffset {} (line {})",
                session, txn.num_data_batches, txn.first_batch.base_offset, txn.first_batch.line,
            )?;
        }
        writeln!(f, "#committed: {}", self.committed)?;
        writeln!(f, "#aborted: {}", self.aborted)?;
        writeln!(f, "Txn sizes: {}", self.txn_size_stats)?;
        write!(f, "Txn durations(ms): {}", self.txn_duration_stats)
    }
}

/// Terminal fold over a validated batch stream.
///
/// Strictly sequential: sessions may span any split point, so partial
/// summaries from pieces of one segment cannot be merged. Feed batches in
/// file order from a single consumer.
#[derive(Debug, Default)]
pub struct TxnInfoCollector {
    first_batch: Option<Batch>,
    last_batch: Option<Batch>,
    open_transactions: HashMap<ProducerSession, FirstBatchInTxn>,
    empty_transactions: Vec<EmptyTransaction>,
    committed: u64,
    aborted: u64,
    txn_size_stats: SummaryStats,
    txn_duration_stats: SummaryStats,
}

impl TxnInfoCollector {
    pub fn new() -> TxnInfoCollector {
        TxnInfoCollector::default()
    }

    /// Fold an entire batch stream and finish.
    pub fn collect<I>(batches: I) -> Result<TxnInfo, DumpError>
    where
        I: IntoIterator<Item = Result<Batch, DumpError>>,
    {
        let mut collector = TxnInfoCollector::new();
        for batch in batches {
            collector.accept(batch?)?;
        }
        Ok(collector.finish())
    }

    pub fn accept(&mut self, batch: Batch) -> Result<(), DumpError> {
        if self.first_batch.is_none() {
            self.first_batch = Some(batch.clone());
        }

        let session = batch.session();
        if batch.is_transactional {
            if batch.is_control {
                if batch.count != 1 {
                    return Err(DumpError::invariant(
                        &batch.file,
                        batch.line,
                        format!("control batch with {} records, expected exactly 1", batch.count),
                    ));
                }
                // The session closes when the marker record below is seen,
                // so that header-only dumps leave it open rather than
                // miscounting.
            } else {
                self.open_transactions
                    .entry(session)
                    .and_modify(|txn| txn.num_data_batches += 1)
                    .or_insert_with(|| FirstBatchInTxn {
                        first_batch: batch.clone(),
                        num_data_batches: 1,
                    });
            }
        }

        for message in &batch.messages {
            match message {
                BaseMessage::Control(control) => {
                    if control.commit {
                        self.committed += 1;
                    } else {
                        self.aborted += 1;
                    }
                    match self.open_transactions.remove(&session) {
                        None => self.empty_transactions.push(EmptyTransaction {
                            batch: batch.clone(),
                            control: control.clone(),
                        }),
                        Some(txn) => {
                            self.txn_size_stats.accept(i64::from(txn.num_data_batches));
                            self.txn_duration_stats
                                .accept(batch.create_time - txn.first_batch.create_time);
                        }
                    }
                }
                BaseMessage::Data(_)
                | BaseMessage::StateChange(_)
                | BaseMessage::StateDeletion(_) => {}
            }
        }

        self.last_batch = Some(batch);
        Ok(())
    }

    pub fn finish(self) -> TxnInfo {
        TxnInfo {
            first_batch: self.first_batch,
            last_batch: self.last_batch,
            open_transactions: self.open_transactions,
            empty_transactions: self.empty_transactions,
            committed: self.committed,
            aborted: self.aborted,
            txn_size_stats: self.txn_size_stats,
            txn_duration_stats: self.txn_duration_stats,
        }
    }
}
