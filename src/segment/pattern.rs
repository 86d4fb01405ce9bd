//! Line patterns for the dump format, with the field extractors built on
//! them. Two generations of the dump tool are in circulation and their
//! spellings differ (`keySize`/`keysize`, `CreateTime`/`createTime`,
//! `headerKeys`/`headerkeys`, `Starting offset`/`Log starting offset`,
//! upper or lower case compression codec names); the patterns accept both,
//! even mixed within one dump.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::segment::error::DumpError;
use crate::segment::model::{
    Batch, BaseMessage, ControlMessage, DataMessage, TransactionStateChange,
    TransactionStateDeletion, TxnState,
};

static DUMPING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Dumping (?P<path>.*)$").expect("dumping pattern"));

static STARTING_OFFSET_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:Log starting|Starting) offset: (?P<offset>[0-9]+)$")
        .expect("starting offset pattern")
});

static BATCH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^baseOffset: (?P<baseOffset>[0-9]+) ",
        r"lastOffset: (?P<lastOffset>[0-9]+) ",
        r"count: (?P<count>[0-9]+) ",
        r"baseSequence: (?P<baseSequence>-?[0-9]+) ",
        r"lastSequence: (?P<lastSequence>-?[0-9]+) ",
        r"producerId: (?P<producerId>-?[0-9]+) ",
        r"producerEpoch: (?P<producerEpoch>-?[0-9]+) ",
        r"partitionLeaderEpoch: (?P<partitionLeaderEpoch>[0-9]+) ",
        r"isTransactional: (?P<isTransactional>true|false) ",
        r"isControl: (?P<isControl>true|false)",
        r"( deleteHorizonMs: (?P<deleteHorizonMs>OptionalLong\.empty|[0-9]+))? ",
        r"position: (?P<position>[0-9]+) ",
        r"CreateTime: (?P<createTime>[0-9]+) ",
        r"size: (?P<size>[0-9]+) ",
        r"magic: (?P<magic>[0-9]+) ",
        r"compresscodec: (?P<compressCodec>none|[A-Z]+) ",
        r"crc: (?P<crc>[0-9]+) ",
        r"isvalid: (?P<isValid>true|false)$",
    ))
    .expect("batch header pattern")
});

/// Shared body of every record line. The trailing `payload:` clause is
/// opaque and optional on plain data records.
const RECORD_BODY: &str = concat!(
    r"\| offset: (?P<offset>[0-9]+) ",
    r"[Cc]reateTime: (?P<createTime>[0-9]+) ",
    r"key[Ss]ize: (?P<keySize>-?[0-9]+) ",
    r"value[Ss]ize: (?P<valueSize>-?[0-9]+) ",
    r"sequence: (?P<sequence>-?[0-9]+) ",
    r"header[Kk]eys: \[(?P<headerKeys>.*)\]( payload:.*)?",
);

static DATA_RECORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{RECORD_BODY}$")).expect("data record pattern"));

static CONTROL_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "^{RECORD_BODY} endTxnMarker: (?P<endTxnMarker>COMMIT|ABORT) \
         coordinatorEpoch: (?P<coordinatorEpoch>[0-9]+)$"
    ))
    .expect("control record pattern")
});

static TXN_STATE_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "^{RECORD_BODY} key: transaction_metadata::transactionalId=\
         (?P<transactionalId>.*) payload: (?P<payload>.*)$"
    ))
    .expect("transaction state record pattern")
});

static TXN_STATE_PAYLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^producerId:(?P<producerId>[0-9]+),",
        r"producerEpoch:(?P<producerEpoch>[0-9]+),",
        r"state=(?P<state>Ongoing|PrepareCommit|PrepareAbort|CompleteCommit|CompleteAbort|Empty|Dead),",
        r"partitions=\[(?P<partitions>.*)\],",
        r"txnLastUpdateTimestamp=(?P<txnLastUpdateTimestamp>[0-9]+),",
        r"txnTimeoutMs=(?P<txnTimeoutMs>[0-9]+)$",
    ))
    .expect("transaction state payload pattern")
});

/// Record lines are the only dump lines prefixed with a pipe.
pub(crate) fn is_record_line(line: &str) -> bool {
    line.starts_with("| ")
}

/// Extract the dumped file path from the `Dumping <path>` preamble line.
pub(crate) fn dumping_path(line: &str, file: &str) -> Result<PathBuf, DumpError> {
    let caps = DUMPING_LINE.captures(line).ok_or_else(|| {
        DumpError::malformed(file, 1, "expected first line to match 'Dumping <path>'")
    })?;
    Ok(PathBuf::from(&caps["path"]))
}

/// Extract the declared starting offset from the second preamble line.
pub(crate) fn starting_offset(line: &str, file: &str) -> Result<i64, DumpError> {
    let caps = STARTING_OFFSET_LINE.captures(line).ok_or_else(|| {
        DumpError::malformed(
            file,
            2,
            "expected second line to match '(Log starting|Starting) offset: <n>'",
        )
    })?;
    field(&caps, "offset", file, 2)
}

/// Parse a batch header line. The returned batch has an empty message
/// list; the grouper fills it in under deep iteration.
pub(crate) fn batch_header(line: &str, file: &str, line_no: usize) -> Result<Batch, DumpError> {
    let caps = BATCH_HEADER
        .captures(line)
        .ok_or_else(|| DumpError::invariant(file, line_no, "Expected a message batch"))?;
    let delete_horizon_ms = match caps.name("deleteHorizonMs") {
        None => None,
        Some(m) if m.as_str() == "OptionalLong.empty" => None,
        Some(m) => Some(m.as_str().parse().map_err(|e| {
            DumpError::malformed(file, line_no, format!("deleteHorizonMs out of range: {e}"))
        })?),
    };
    Ok(Batch {
        file: file.to_string(),
        line: line_no,
        base_offset: field(&caps, "baseOffset", file, line_no)?,
        last_offset: field(&caps, "lastOffset", file, line_no)?,
        count: field(&caps, "count", file, line_no)?,
        base_sequence: field(&caps, "baseSequence", file, line_no)?,
        last_sequence: field(&caps, "lastSequence", file, line_no)?,
        producer_id: field(&caps, "producerId", file, line_no)?,
        producer_epoch: field(&caps, "producerEpoch", file, line_no)?,
        partition_leader_epoch: field(&caps, "partitionLeaderEpoch", file, line_no)?,
        is_transactional: &caps["isTransactional"] == "true",
        is_control: &caps["isControl"] == "true",
        delete_horizon_ms,
        position: field(&caps, "position", file, line_no)?,
        create_time: field(&caps, "createTime", file, line_no)?,
        size: field(&caps, "size", file, line_no)?,
        magic: field(&caps, "magic", file, line_no)?,
        compress_codec: caps["compressCodec"].to_ascii_lowercase(),
        crc: field(&caps, "crc", file, line_no)?,
        is_valid: &caps["isValid"] == "true",
        messages: Vec::new(),
    })
}

/// Parse a data record line. `remaining` is how many data records the
/// current batch still owes, quoted in the error when the line does not
/// look like one.
pub(crate) fn data_record(
    line: &str,
    file: &str,
    line_no: usize,
    remaining: i32,
) -> Result<DataMessage, DumpError> {
    let caps = DATA_RECORD.captures(line).ok_or_else(|| {
        DumpError::invariant(
            file,
            line_no,
            format!("Expected {remaining} data records in batch, but this doesn't look like a data record"),
        )
    })?;
    record_fields(&caps, file, line_no)
}

/// Parse a control record line (an end-of-transaction marker).
pub(crate) fn control_record(
    line: &str,
    file: &str,
    line_no: usize,
    remaining: i32,
) -> Result<ControlMessage, DumpError> {
    let caps = CONTROL_RECORD.captures(line).ok_or_else(|| {
        DumpError::invariant(
            file,
            line_no,
            format!("Expected {remaining} control records in batch, but this doesn't look like a control record"),
        )
    })?;
    let base = record_fields(&caps, file, line_no)?;
    Ok(ControlMessage {
        file: base.file,
        line: base.line,
        offset: base.offset,
        create_time: base.create_time,
        key_size: base.key_size,
        value_size: base.value_size,
        sequence: base.sequence,
        header_keys: base.header_keys,
        commit: &caps["endTxnMarker"] == "COMMIT",
        coordinator_epoch: field(&caps, "coordinatorEpoch", file, line_no)?,
    })
}

/// Parse a transaction-state record line, yielding either a state change
/// or a `<DELETE>` tombstone depending on the payload.
pub(crate) fn txn_state_record(
    line: &str,
    file: &str,
    line_no: usize,
    remaining: i32,
) -> Result<BaseMessage, DumpError> {
    let caps = TXN_STATE_RECORD.captures(line).ok_or_else(|| {
        DumpError::invariant(
            file,
            line_no,
            format!("Expected {remaining} txn records in batch, but this doesn't look like a txn record"),
        )
    })?;
    let base = record_fields(&caps, file, line_no)?;
    let transactional_id = caps["transactionalId"].to_string();
    let payload = &caps["payload"];

    if payload == "<DELETE>" {
        return Ok(BaseMessage::StateDeletion(TransactionStateDeletion {
            file: base.file,
            line: base.line,
            offset: base.offset,
            create_time: base.create_time,
            key_size: base.key_size,
            value_size: base.value_size,
            sequence: base.sequence,
            header_keys: base.header_keys,
            transactional_id,
        }));
    }

    let payload_caps = TXN_STATE_PAYLOAD.captures(payload).ok_or_else(|| {
        DumpError::malformed(
            file,
            line_no,
            "transaction state payload didn't match the expected format",
        )
    })?;
    let state = TxnState::from_dump(&payload_caps["state"])
        .expect("state alternation only admits known states");
    Ok(BaseMessage::StateChange(TransactionStateChange {
        file: base.file,
        line: base.line,
        offset: base.offset,
        create_time: base.create_time,
        key_size: base.key_size,
        value_size: base.value_size,
        sequence: base.sequence,
        header_keys: base.header_keys,
        transactional_id,
        producer_id: field(&payload_caps, "producerId", file, line_no)?,
        producer_epoch: field(&payload_caps, "producerEpoch", file, line_no)?,
        state,
        partitions: payload_caps["partitions"].to_string(),
        txn_last_update_timestamp: field(&payload_caps, "txnLastUpdateTimestamp", file, line_no)?,
        txn_timeout_ms: field(&payload_caps, "txnTimeoutMs", file, line_no)?,
    }))
}

fn record_fields(caps: &Captures<'_>, file: &str, line_no: usize) -> Result<DataMessage, DumpError> {
    Ok(DataMessage {
        file: file.to_string(),
        line: line_no,
        offset: field(caps, "offset", file, line_no)?,
        create_time: field(caps, "createTime", file, line_no)?,
        key_size: field(caps, "keySize", file, line_no)?,
        value_size: field(caps, "valueSize", file, line_no)?,
        sequence: field(caps, "sequence", file, line_no)?,
        header_keys: caps["headerKeys"].to_string(),
    })
}

/// Parse one named capture into its numeric type. The patterns constrain
/// the text to digits, so the only runtime failure left is overflow.
fn field<T>(caps: &Captures<'_>, name: &str, file: &str, line_no: usize) -> Result<T, DumpError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let text = &caps[name];
    text.parse().map_err(|e| {
        DumpError::malformed(file, line_no, format!("{name} value '{text}' out of range: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const F: &str = "<test>";

    #[test]
    fn test_dumping_line() {
        let path = dumping_path("Dumping /tmp/kafka-logs/foo-0/00000000000000000000.log", F)
            .unwrap();
        assert_eq!(
            path.to_str().unwrap(),
            "/tmp/kafka-logs/foo-0/00000000000000000000.log"
        );
        assert!(dumping_path("Something else", F).is_err());
    }

    #[test]
    fn test_starting_offset_dialects() {
        assert_eq!(starting_offset("Starting offset: 42", F).unwrap(), 42);
        assert_eq!(starting_offset("Log starting offset: 42", F).unwrap(), 42);
        assert!(starting_offset("Start offset: 42", F).is_err());
    }

    #[test]
    fn test_batch_header_basic() {
        let line = "baseOffset: 0 lastOffset: 1 count: 2 baseSequence: -1 lastSequence: -1 \
                    producerId: -1 producerEpoch: -1 partitionLeaderEpoch: 0 \
                    isTransactional: false isControl: false position: 0 \
                    CreateTime: 1632815304456 size: 88 magic: 2 compresscodec: none \
                    crc: 873053997 isvalid: true";
        let batch = batch_header(line, F, 3).unwrap();
        assert_eq!(batch.base_offset, 0);
        assert_eq!(batch.last_offset, 1);
        assert_eq!(batch.count, 2);
        assert_eq!(batch.producer_id, -1);
        assert_eq!(batch.producer_epoch, -1);
        assert_eq!(batch.delete_horizon_ms, None);
        assert_eq!(batch.position, 0);
        assert_eq!(batch.create_time, 1632815304456);
        assert_eq!(batch.size, 88);
        assert_eq!(batch.magic, 2);
        assert_eq!(batch.compress_codec, "none");
        assert_eq!(batch.crc, 873053997);
        assert!(batch.is_valid);
        assert_eq!(batch.line, 3);
        assert!(batch.messages.is_empty());
    }

    #[test]
    fn test_batch_header_delete_horizon_variants() {
        let with_value = "baseOffset: 0 lastOffset: 0 count: 1 baseSequence: -1 lastSequence: -1 \
                          producerId: -1 producerEpoch: -1 partitionLeaderEpoch: 0 \
                          isTransactional: false isControl: false deleteHorizonMs: 12345 \
                          position: 0 CreateTime: 1 size: 75 magic: 2 compresscodec: NONE \
                          crc: 1 isvalid: true";
        let batch = batch_header(with_value, F, 3).unwrap();
        assert_eq!(batch.delete_horizon_ms, Some(12345));
        // Upper case codec names normalize, so both dialects compare equal.
        assert_eq!(batch.compress_codec, "none");

        let empty = with_value.replace("deleteHorizonMs: 12345", "deleteHorizonMs: OptionalLong.empty");
        let batch = batch_header(&empty, F, 3).unwrap();
        assert_eq!(batch.delete_horizon_ms, None);
    }

    #[test]
    fn test_batch_header_rejects_record_line() {
        let err = batch_header("| offset: 0 CreateTime: 1 keySize: -1 valueSize: 7 sequence: -1 headerKeys: []", F, 4)
            .unwrap_err();
        assert_eq!(err.reason(), Some("Expected a message batch"));
    }

    #[test]
    fn test_data_record_spelling_dialects() {
        let new_style = "| offset: 7 CreateTime: 1632815303637 keySize: -1 valueSize: 7 \
                         sequence: -1 headerKeys: [a,b]";
        let old_style = "| offset: 7 createTime: 1632815303637 keysize: -1 valuesize: 7 \
                         sequence: -1 headerkeys: [a,b]";
        let a = data_record(new_style, F, 4, 1).unwrap();
        let b = data_record(old_style, F, 4, 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.offset, 7);
        assert_eq!(a.key_size, -1);
        assert_eq!(a.value_size, 7);
        assert_eq!(a.header_keys, "a,b");
    }

    #[test]
    fn test_data_record_payload_is_opaque() {
        let line = "| offset: 0 CreateTime: 1 keySize: -1 valueSize: 7 sequence: -1 \
                    headerKeys: [] payload: drfverv";
        let record = data_record(line, F, 4, 2).unwrap();
        assert_eq!(record.offset, 0);
        assert_eq!(record.header_keys, "");
    }

    #[test]
    fn test_data_record_mismatch_cites_remaining() {
        let err = data_record("| garbage", F, 4, 1).unwrap_err();
        assert_eq!(
            err.reason(),
            Some("Expected 1 data records in batch, but this doesn't look like a data record")
        );
    }

    #[test]
    fn test_data_record_rejects_control_suffix() {
        // A control record must not silently parse as a data record.
        let line = "| offset: 4 CreateTime: 1 keySize: 4 valueSize: 6 sequence: -1 \
                    headerKeys: [] endTxnMarker: COMMIT coordinatorEpoch: 4";
        assert!(data_record(line, F, 4, 1).is_err());
    }

    #[test]
    fn test_control_record() {
        let line = "| offset: 4 CreateTime: 1632840911601 keySize: 4 valueSize: 6 sequence: -1 \
                    headerKeys: [] endTxnMarker: COMMIT coordinatorEpoch: 4";
        let record = control_record(line, F, 5, 1).unwrap();
        assert!(record.commit);
        assert_eq!(record.coordinator_epoch, 4);

        let abort = line.replace("COMMIT", "ABORT");
        let record = control_record(&abort, F, 5, 1).unwrap();
        assert!(!record.commit);
    }

    #[test]
    fn test_control_record_mismatch() {
        let line = "| offset: 4 CreateTime: 1 keySize: 4 valueSize: 6 sequence: -1 headerKeys: []";
        let err = control_record(line, F, 5, 1).unwrap_err();
        assert_eq!(
            err.reason(),
            Some("Expected 1 control records in batch, but this doesn't look like a control record")
        );
    }

    #[test]
    fn test_txn_state_change_record() {
        let line = "| offset: 1 CreateTime: 1632840910511 keySize: 15 valueSize: 64 sequence: -1 \
                    headerKeys: [] key: transaction_metadata::transactionalId=my-txnal-id \
                    payload: producerId:0,producerEpoch:0,state=Ongoing,partitions=[transactional-foo-0],txnLastUpdateTimestamp=1632840910510,txnTimeoutMs=60000";
        let record = txn_state_record(line, F, 4, 1).unwrap();
        match record {
            BaseMessage::StateChange(change) => {
                assert_eq!(change.transactional_id, "my-txnal-id");
                assert_eq!(change.producer_id, 0);
                assert_eq!(change.producer_epoch, 0);
                assert_eq!(change.state, TxnState::Ongoing);
                assert_eq!(change.partitions, "transactional-foo-0");
                assert_eq!(change.txn_last_update_timestamp, 1632840910510);
                assert_eq!(change.txn_timeout_ms, 60000);
            }
            other => panic!("expected a state change, got {other:?}"),
        }
    }

    #[test]
    fn test_txn_state_deletion_record() {
        let line = "| offset: 9 CreateTime: 1632840910511 keySize: 15 valueSize: -1 sequence: -1 \
                    headerKeys: [] key: transaction_metadata::transactionalId=gone payload: <DELETE>";
        let record = txn_state_record(line, F, 4, 1).unwrap();
        match record {
            BaseMessage::StateDeletion(del) => assert_eq!(del.transactional_id, "gone"),
            other => panic!("expected a deletion, got {other:?}"),
        }
    }

    #[test]
    fn test_txn_state_payload_violation() {
        let line = "| offset: 1 CreateTime: 1 keySize: 15 valueSize: 64 sequence: -1 \
                    headerKeys: [] key: transaction_metadata::transactionalId=my-txnal-id \
                    payload: state=Nonsense";
        let err = txn_state_record(line, F, 4, 1).unwrap_err();
        assert!(matches!(err, DumpError::Malformed { .. }));
    }

    #[test]
    fn test_is_record_line() {
        assert!(is_record_line("| offset: 0 ..."));
        assert!(!is_record_line("baseOffset: 0 ..."));
        assert!(!is_record_line("Dumping foo"));
    }
}
