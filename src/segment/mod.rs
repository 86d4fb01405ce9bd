pub mod collector;
pub mod error;
pub mod model;
pub mod reader;
pub mod stats;

mod check;
mod pattern;

pub use collector::{EmptyTransaction, FirstBatchInTxn, TxnInfo, TxnInfoCollector};
pub use error::DumpError;
pub use model::{
    topic_name, BaseMessage, Batch, ControlMessage, DataMessage, ProducerSession, SegmentType,
    TransactionStateChange, TransactionStateDeletion, TxnState,
};
pub use reader::{Batches, Segment};
pub use stats::SummaryStats;
