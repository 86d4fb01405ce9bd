use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Serialize;

/// What kind of partition the dumped segment belongs to, derived from the
/// parent directory of the path recorded on the `Dumping` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentType {
    Data,
    TransactionState,
    ConsumerOffsets,
}

impl SegmentType {
    /// Classify a segment by the directory its log file lives in.
    /// `__transaction_state-<n>` and `__consumer_offsets-<n>` are the two
    /// internal topics with dedicated record formats; everything else is a
    /// normal data partition.
    pub fn classify(segment_path: &Path) -> SegmentType {
        match parent_dir_name(segment_path) {
            Some(dir) if is_partition_dir_of(dir, "__transaction_state") => {
                SegmentType::TransactionState
            }
            Some(dir) if is_partition_dir_of(dir, "__consumer_offsets") => {
                SegmentType::ConsumerOffsets
            }
            _ => SegmentType::Data,
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentType::Data => write!(f, "data"),
            SegmentType::TransactionState => write!(f, "transaction-state"),
            SegmentType::ConsumerOffsets => write!(f, "consumer-offsets"),
        }
    }
}

/// Topic name for a segment path, if the parent directory looks like a
/// `<topic>-<partition>` log directory. The trailing partition suffix is
/// stripped, so `/logs/__transaction_state-4/0.log` yields
/// `__transaction_state` and `/logs/foo-0/0.log` yields `foo`.
pub fn topic_name(segment_path: &Path) -> Option<String> {
    let dir = parent_dir_name(segment_path)?;
    let (topic, partition) = dir.rsplit_once('-')?;
    if topic.is_empty() || partition.is_empty() || !partition.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !topic
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
    {
        return None;
    }
    Some(topic.to_string())
}

fn parent_dir_name(segment_path: &Path) -> Option<&str> {
    segment_path.parent()?.file_name()?.to_str()
}

fn is_partition_dir_of(dir: &str, topic: &str) -> bool {
    match dir.strip_prefix(topic) {
        Some(rest) => match rest.strip_prefix('-') {
            Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        },
        None => false,
    }
}

/// One incarnation of a transactional producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProducerSession {
    pub producer_id: i64,
    pub producer_epoch: i16,
}

impl fmt::Display for ProducerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.producer_id, self.producer_epoch)
    }
}

/// One record batch as printed by the dump tool.
///
/// `messages` is empty unless the dump was produced with per-record detail.
/// `file` and `line` locate the batch header line in the dump for error
/// reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub file: String,
    pub line: usize,
    pub base_offset: i64,
    pub last_offset: i64,
    pub count: i32,
    pub base_sequence: i32,
    pub last_sequence: i32,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub partition_leader_epoch: i32,
    pub is_transactional: bool,
    pub is_control: bool,
    pub delete_horizon_ms: Option<i64>,
    pub position: i64,
    pub create_time: i64,
    pub size: i32,
    pub magic: i8,
    pub compress_codec: String,
    pub crc: u32,
    pub is_valid: bool,
    pub messages: Vec<BaseMessage>,
}

impl Batch {
    pub fn session(&self) -> ProducerSession {
        ProducerSession {
            producer_id: self.producer_id,
            producer_epoch: self.producer_epoch,
        }
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "baseOffset: {} lastOffset: {} count: {} producerId: {} producerEpoch: {} \
             partitionLeaderEpoch: {} isTransactional: {} isControl: {} position: {} \
             CreateTime: {} size: {} compresscodec: {} crc: {} isvalid: {}",
            self.base_offset,
            self.last_offset,
            self.count,
            self.producer_id,
            self.producer_epoch,
            self.partition_leader_epoch,
            self.is_transactional,
            self.is_control,
            self.position,
            fmt_epoch_ms(self.create_time),
            self.size,
            self.compress_codec,
            self.crc,
            self.is_valid,
        )
    }
}

/// A record inside a batch. The dump prints one line per record; the four
/// shapes that line can take map onto the four variants here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BaseMessage {
    Data(DataMessage),
    Control(ControlMessage),
    StateChange(TransactionStateChange),
    StateDeletion(TransactionStateDeletion),
}

impl BaseMessage {
    pub fn file(&self) -> &str {
        match self {
            BaseMessage::Data(m) => &m.file,
            BaseMessage::Control(m) => &m.file,
            BaseMessage::StateChange(m) => &m.file,
            BaseMessage::StateDeletion(m) => &m.file,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            BaseMessage::Data(m) => m.line,
            BaseMessage::Control(m) => m.line,
            BaseMessage::StateChange(m) => m.line,
            BaseMessage::StateDeletion(m) => m.line,
        }
    }
}

impl fmt::Display for BaseMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseMessage::Data(m) => m.fmt(f),
            BaseMessage::Control(m) => m.fmt(f),
            BaseMessage::StateChange(m) => m.fmt(f),
            BaseMessage::StateDeletion(m) => m.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataMessage {
    pub file: String,
    pub line: usize,
    pub offset: i64,
    pub create_time: i64,
    pub key_size: i32,
    pub value_size: i32,
    pub sequence: i32,
    pub header_keys: String,
}

impl fmt::Display for DataMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset: {} CreateTime: {} keySize: {} valueSize: {} sequence: {} headerKeys: [{}]",
            self.offset,
            fmt_epoch_ms(self.create_time),
            self.key_size,
            self.value_size,
            self.sequence,
            self.header_keys,
        )
    }
}

/// End-of-transaction marker written by the transaction coordinator.
/// `commit` is true for COMMIT markers and false for ABORT markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlMessage {
    pub file: String,
    pub line: usize,
    pub offset: i64,
    pub create_time: i64,
    pub key_size: i32,
    pub value_size: i32,
    pub sequence: i32,
    pub header_keys: String,
    pub commit: bool,
    pub coordinator_epoch: i32,
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset: {} CreateTime: {} keySize: {} valueSize: {} sequence: {} headerKeys: [{}] \
             endTxnMarker: {} coordinatorEpoch: {}",
            self.offset,
            fmt_epoch_ms(self.create_time),
            self.key_size,
            self.value_size,
            self.sequence,
            self.header_keys,
            if self.commit { "COMMIT" } else { "ABORT" },
            self.coordinator_epoch,
        )
    }
}

/// A state transition in the transaction coordinator's log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionStateChange {
    pub file: String,
    pub line: usize,
    pub offset: i64,
    pub create_time: i64,
    pub key_size: i32,
    pub value_size: i32,
    pub sequence: i32,
    pub header_keys: String,
    pub transactional_id: String,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub state: TxnState,
    pub partitions: String,
    pub txn_last_update_timestamp: i64,
    pub txn_timeout_ms: i64,
}

impl TransactionStateChange {
    pub fn session(&self) -> ProducerSession {
        ProducerSession {
            producer_id: self.producer_id,
            producer_epoch: self.producer_epoch,
        }
    }
}

impl fmt::Display for TransactionStateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset: {} CreateTime: {} transactionalId: {} producerId: {} producerEpoch: {} \
             state: {} partitions: [{}] lastUpdate: {} timeoutMs: {}",
            self.offset,
            fmt_epoch_ms(self.create_time),
            self.transactional_id,
            self.producer_id,
            self.producer_epoch,
            self.state,
            self.partitions,
            fmt_epoch_ms(self.txn_last_update_timestamp),
            self.txn_timeout_ms,
        )
    }
}

/// A `<DELETE>` tombstone for a transactional id in the coordinator's log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionStateDeletion {
    pub file: String,
    pub line: usize,
    pub offset: i64,
    pub create_time: i64,
    pub key_size: i32,
    pub value_size: i32,
    pub sequence: i32,
    pub header_keys: String,
    pub transactional_id: String,
}

impl fmt::Display for TransactionStateDeletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset: {} CreateTime: {} transactionalId: {} <DELETE>",
            self.offset,
            fmt_epoch_ms(self.create_time),
            self.transactional_id,
        )
    }
}

/// States of the coordinator's per-transactional-id state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TxnState {
    Empty,
    Ongoing,
    PrepareCommit,
    PrepareAbort,
    CompleteCommit,
    CompleteAbort,
    Dead,
}

impl TxnState {
    /// Whether `prev` is a legal predecessor of `self`.
    pub fn valid_previous(self, prev: TxnState) -> bool {
        use TxnState::*;
        match self {
            Empty => matches!(prev, CompleteCommit | CompleteAbort),
            Ongoing => matches!(prev, Empty | CompleteCommit | CompleteAbort),
            PrepareCommit => matches!(prev, Ongoing),
            PrepareAbort => matches!(prev, Ongoing),
            CompleteCommit => matches!(prev, PrepareCommit),
            CompleteAbort => matches!(prev, PrepareAbort),
            Dead => matches!(prev, Empty | CompleteCommit | CompleteAbort),
        }
    }

    pub(crate) fn from_dump(name: &str) -> Option<TxnState> {
        match name {
            "Empty" => Some(TxnState::Empty),
            "Ongoing" => Some(TxnState::Ongoing),
            "PrepareCommit" => Some(TxnState::PrepareCommit),
            "PrepareAbort" => Some(TxnState::PrepareAbort),
            "CompleteCommit" => Some(TxnState::CompleteCommit),
            "CompleteAbort" => Some(TxnState::CompleteAbort),
            "Dead" => Some(TxnState::Dead),
            _ => None,
        }
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxnState::Empty => "Empty",
            TxnState::Ongoing => "Ongoing",
            TxnState::PrepareCommit => "PrepareCommit",
            TxnState::PrepareAbort => "PrepareAbort",
            TxnState::CompleteCommit => "CompleteCommit",
            TxnState::CompleteAbort => "CompleteAbort",
            TxnState::Dead => "Dead",
        };
        f.write_str(name)
    }
}

/// Render an epoch-millisecond timestamp as RFC 3339 UTC, falling back to
/// the raw number when it is out of chrono's range.
pub fn fmt_epoch_ms(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}

pub(crate) fn serialize_sessions<S, V>(
    map: &HashMap<ProducerSession, V>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    V: Serialize,
{
    use serde::ser::SerializeMap;
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by_key(|(session, _)| (session.producer_id, session.producer_epoch));
    let mut out = serializer.serialize_map(Some(entries.len()))?;
    for (session, value) in entries {
        out.serialize_entry(&session.to_string(), value)?;
    }
    out.end()
}
