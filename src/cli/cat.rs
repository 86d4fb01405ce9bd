use std::path::PathBuf;

use crate::cli::{sort_dump_paths, CliError};
use crate::segment::{Batch, Segment};

/// Batch predicates for `cat`. Every unset field matches everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchFilter {
    pub producer_id: Option<i64>,
    pub producer_epoch: Option<i16>,
    pub leader_epoch: Option<i32>,
}

impl BatchFilter {
    pub fn matches(&self, batch: &Batch) -> bool {
        self.producer_id.map_or(true, |id| batch.producer_id == id)
            && self
                .producer_epoch
                .map_or(true, |epoch| batch.producer_epoch == epoch)
            && self
                .leader_epoch
                .map_or(true, |epoch| batch.partition_leader_epoch == epoch)
    }
}

/// Print every batch, and under deep iteration every record, of each dump.
pub fn run(files: Vec<PathBuf>, filter: &BatchFilter) -> Result<(), CliError> {
    for path in sort_dump_paths(files) {
        let segment = Segment::read_path(&path)?;
        match segment.topic() {
            Some(topic) => println!(
                "{}: {} segment of topic {}",
                segment.file(),
                segment.segment_type(),
                topic
            ),
            None => println!("{}: {} segment", segment.file(), segment.segment_type()),
        }
        for batch in segment.batches() {
            let batch = batch?;
            if !filter.matches(&batch) {
                continue;
            }
            println!("{batch}");
            for message in &batch.messages {
                println!("  {message}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(producer_id: i64, producer_epoch: i16, leader_epoch: i32) -> Batch {
        Batch {
            file: "<test>".to_string(),
            line: 3,
            base_offset: 0,
            last_offset: 0,
            count: 1,
            base_sequence: -1,
            last_sequence: -1,
            producer_id,
            producer_epoch,
            partition_leader_epoch: leader_epoch,
            is_transactional: false,
            is_control: false,
            delete_horizon_ms: None,
            position: 0,
            create_time: 0,
            size: 75,
            magic: 2,
            compress_codec: "none".to_string(),
            crc: 0,
            is_valid: true,
            messages: Vec::new(),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = BatchFilter::default();
        assert!(filter.matches(&batch(-1, -1, 0)));
        assert!(filter.matches(&batch(7, 3, 9)));
    }

    #[test]
    fn test_filter_by_producer_id() {
        let filter = BatchFilter {
            producer_id: Some(7),
            ..BatchFilter::default()
        };
        assert!(filter.matches(&batch(7, 0, 0)));
        assert!(!filter.matches(&batch(8, 0, 0)));
    }

    #[test]
    fn test_filter_conjunction() {
        let filter = BatchFilter {
            producer_id: Some(7),
            producer_epoch: Some(2),
            leader_epoch: Some(5),
        };
        assert!(filter.matches(&batch(7, 2, 5)));
        assert!(!filter.matches(&batch(7, 2, 6)));
        assert!(!filter.matches(&batch(7, 3, 5)));
    }
}
