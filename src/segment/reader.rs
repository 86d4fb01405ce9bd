//! Reading a dump file into a lazy stream of batches.
//!
//! A dump opens with a two-line preamble (`Dumping <path>` and the
//! starting offset), then alternates batch header lines with, when the
//! dump tool was asked for per-record detail, one `| `-prefixed line per
//! record. Whether that detail is present is not flagged anywhere, so the
//! reader peeks two lines past the preamble and checks if a record line
//! follows the first header.

use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::path::Path;

use tracing::warn;

use crate::segment::check::BatchChecks;
use crate::segment::error::DumpError;
use crate::segment::model::{topic_name, BaseMessage, Batch, SegmentType};
use crate::segment::pattern;

/// A parsed dump. Carries the preamble-derived metadata and the lazy
/// batch stream; reading the stream consumes the segment.
pub struct Segment {
    file: String,
    segment_type: SegmentType,
    topic: Option<String>,
    deep_iteration: bool,
    batches: Batches,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("file", &self.file)
            .field("segment_type", &self.segment_type)
            .field("topic", &self.topic)
            .field("deep_iteration", &self.deep_iteration)
            .field("batches", &self.batches)
            .finish()
    }
}

impl Segment {
    /// Read a segment dump from a line source. `label` names the source in
    /// errors. Only the preamble is consumed eagerly; batches are parsed
    /// as the returned segment's stream is advanced.
    pub fn read_lines<L>(label: impl Into<String>, lines: L) -> Result<Segment, DumpError>
    where
        L: IntoIterator<Item = io::Result<String>>,
        L::IntoIter: 'static,
    {
        let file = label.into();
        let mut lines = lines.into_iter();

        let dumping = lines
            .next()
            .transpose()?
            .ok_or_else(|| DumpError::malformed(&file, 1, "expected at least one line"))?;
        let segment_path = pattern::dumping_path(&dumping, &file)?;

        let segment_type = if has_parent_dir(&segment_path) {
            SegmentType::classify(&segment_path)
        } else {
            // kafka-dump-log.sh run from inside the partition directory
            // records a bare file name, losing the topic.
            warn!(file = %file, "dump does not record the segment's directory, assuming a data segment");
            SegmentType::Data
        };
        let topic = topic_name(&segment_path);

        let offset_line = lines
            .next()
            .transpose()?
            .ok_or_else(|| DumpError::malformed(&file, 2, "expected at least two lines"))?;
        let declared = pattern::starting_offset(&offset_line, &file)?;
        let from_name = filename_offset(&segment_path, &file)?;
        if from_name != declared {
            return Err(DumpError::malformed(
                &file,
                2,
                format!(
                    "segment file name {} implies a starting offset of {from_name} but the dump declares {declared}",
                    segment_path.display()
                ),
            ));
        }

        let mut pushback = VecDeque::new();
        let mut deep_iteration = false;
        if let Some(first_header) = lines.next().transpose()? {
            pushback.push_back(first_header);
            if let Some(after_header) = lines.next().transpose()? {
                deep_iteration = pattern::is_record_line(&after_header);
                pushback.push_back(after_header);
            }
        }

        Ok(Segment {
            batches: Batches {
                file: file.clone(),
                segment_type,
                deep_iteration,
                lines: Box::new(lines),
                pushback,
                line_no: 2,
                expect: 0,
                pending: None,
                checks: BatchChecks::new(segment_type),
                done: false,
            },
            file,
            segment_type,
            topic,
            deep_iteration,
        })
    }

    /// Read a segment dump from a file. The handle is owned by the
    /// returned segment and closed when its batch stream is dropped or
    /// exhausted.
    pub fn read_path(path: &Path) -> Result<Segment, DumpError> {
        let label = path.display().to_string();
        let reader = io::BufReader::new(std::fs::File::open(path)?);
        Segment::read_lines(label, reader.lines())
    }

    /// Read a segment dump held in memory, mainly for tests.
    pub fn read_str(label: impl Into<String>, content: &str) -> Result<Segment, DumpError> {
        let lines: Vec<String> = content.lines().map(str::to_owned).collect();
        Segment::read_lines(label, lines.into_iter().map(Ok))
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn segment_type(&self) -> SegmentType {
        self.segment_type
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// True iff the dump carries one line per record.
    pub fn deep_iteration(&self) -> bool {
        self.deep_iteration
    }

    /// The validated batch stream. Single-pass.
    pub fn batches(self) -> Batches {
        self.batches
    }
}

fn has_parent_dir(segment_path: &Path) -> bool {
    segment_path
        .parent()
        .is_some_and(|p| !p.as_os_str().is_empty())
}

/// Offset encoded in the segment's file name, `<digits>.log`.
fn filename_offset(segment_path: &Path, file: &str) -> Result<i64, DumpError> {
    let name = segment_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let digits = name
        .strip_suffix(".log")
        .filter(|stem| !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| {
            DumpError::malformed(
                file,
                1,
                format!("expected the dumped file name '{name}' to match '<digits>.log'"),
            )
        })?;
    digits.parse().map_err(|e| {
        DumpError::malformed(file, 1, format!("file name offset '{digits}' out of range: {e}"))
    })
}

/// Lazy stream over the batches of one dump.
///
/// Grouping revolves around `expect`, the number of record lines the
/// current batch still owes: positive for data (or transaction-state)
/// records, negative for control records, zero between batches. The sign
/// comes from the batch header's `isControl` flag, so a control batch
/// whose record line lacks the end-txn-marker suffix is an error rather
/// than a silently reclassified data record.
pub struct Batches {
    file: String,
    segment_type: SegmentType,
    deep_iteration: bool,
    lines: Box<dyn Iterator<Item = io::Result<String>>>,
    pushback: VecDeque<String>,
    /// Number of the last line taken from the source, 1-based.
    line_no: usize,
    expect: i32,
    pending: Option<Batch>,
    checks: BatchChecks,
    done: bool,
}

impl std::fmt::Debug for Batches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batches")
            .field("file", &self.file)
            .field("segment_type", &self.segment_type)
            .field("deep_iteration", &self.deep_iteration)
            .field("pushback", &self.pushback)
            .field("line_no", &self.line_no)
            .field("expect", &self.expect)
            .field("pending", &self.pending)
            .field("checks", &self.checks)
            .field("done", &self.done)
            .finish()
    }
}

impl Iterator for Batches {
    type Item = Result<Batch, DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl Batches {
    fn advance(&mut self) -> Result<Option<Batch>, DumpError> {
        loop {
            let Some(line) = self.next_line()? else {
                if self.deep_iteration && self.expect != 0 {
                    let (n, kind) = if self.expect > 0 {
                        (self.expect, "data")
                    } else {
                        (-self.expect, "control")
                    };
                    return Err(DumpError::malformed(
                        &self.file,
                        self.line_no,
                        format!("dump ended with {n} {kind} records outstanding in the current batch"),
                    ));
                }
                return Ok(None);
            };
            if let Some(batch) = self.feed(&line)? {
                self.checks.check(&batch)?;
                return Ok(Some(batch));
            }
        }
    }

    fn next_line(&mut self) -> Result<Option<String>, DumpError> {
        let line = match self.pushback.pop_front() {
            Some(line) => Some(line),
            None => self.lines.next().transpose()?,
        };
        if line.is_some() {
            self.line_no += 1;
        }
        Ok(line)
    }

    fn feed(&mut self, line: &str) -> Result<Option<Batch>, DumpError> {
        if self.expect == 0 || !self.deep_iteration {
            let mut batch = pattern::batch_header(line, &self.file, self.line_no)?;
            self.check_producer_fields(&batch)?;
            if !self.deep_iteration {
                return Ok(Some(batch));
            }
            self.expect = if batch.is_control {
                -batch.count
            } else {
                batch.count
            };
            if self.expect == 0 {
                return Ok(Some(batch));
            }
            batch.messages.reserve(batch.count as usize);
            self.pending = Some(batch);
            Ok(None)
        } else if self.expect > 0 {
            let message = if self.segment_type == SegmentType::TransactionState {
                pattern::txn_state_record(line, &self.file, self.line_no, self.expect)?
            } else {
                BaseMessage::Data(pattern::data_record(
                    line,
                    &self.file,
                    self.line_no,
                    self.expect,
                )?)
            };
            self.expect -= 1;
            self.push_message(message)
        } else {
            let control =
                pattern::control_record(line, &self.file, self.line_no, -self.expect)?;
            self.expect += 1;
            self.push_message(BaseMessage::Control(control))
        }
    }

    fn push_message(&mut self, message: BaseMessage) -> Result<Option<Batch>, DumpError> {
        let batch = self
            .pending
            .as_mut()
            .expect("a batch header precedes every record line");
        batch.messages.push(message);
        if self.expect == 0 {
            Ok(self.pending.take())
        } else {
            Ok(None)
        }
    }

    /// Producer id and epoch must agree with the segment type: the
    /// coordinator's own log is written non-transactionally with no
    /// producer session, while transactional batches on a data partition
    /// always carry one.
    fn check_producer_fields(&self, batch: &Batch) -> Result<(), DumpError> {
        match self.segment_type {
            SegmentType::TransactionState => {
                if batch.producer_id != -1 {
                    return Err(DumpError::malformed(
                        &self.file,
                        batch.line,
                        format!(
                            "transaction-state segment with producerId {} (expected -1)",
                            batch.producer_id
                        ),
                    ));
                }
                if batch.producer_epoch != -1 {
                    return Err(DumpError::malformed(
                        &self.file,
                        batch.line,
                        format!(
                            "transaction-state segment with producerEpoch {} (expected -1)",
                            batch.producer_epoch
                        ),
                    ));
                }
            }
            SegmentType::Data => {
                if batch.is_transactional {
                    if batch.producer_id == -1 {
                        return Err(DumpError::malformed(
                            &self.file,
                            batch.line,
                            "transactional batch with producerId -1",
                        ));
                    }
                    if batch.producer_epoch == -1 {
                        return Err(DumpError::malformed(
                            &self.file,
                            batch.line,
                            "transactional batch with producerEpoch -1",
                        ));
                    }
                }
            }
            SegmentType::ConsumerOffsets => {}
        }
        Ok(())
    }
}
