use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{sort_dump_paths, CliError};
use crate::segment::{Segment, SegmentType, TxnInfo, TxnInfoCollector};

#[derive(Debug, Serialize)]
struct TxnReport {
    file: String,
    segment_type: SegmentType,
    topic: Option<String>,
    deep_iteration: bool,
    #[serde(flatten)]
    info: TxnInfo,
}

/// Summarize transactional activity per dump, in offset order.
pub fn run(files: Vec<PathBuf>, json: bool) -> Result<(), CliError> {
    let mut reports = Vec::new();
    for path in sort_dump_paths(files) {
        let segment = Segment::read_path(&path)?;
        let report = TxnReport {
            file: segment.file().to_string(),
            segment_type: segment.segment_type(),
            topic: segment.topic().map(str::to_string),
            deep_iteration: segment.deep_iteration(),
            info: TxnInfoCollector::collect(segment.batches())?,
        };
        if json {
            reports.push(report);
        } else {
            println!("{}:", report.file);
            println!("{}", report.info);
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}
