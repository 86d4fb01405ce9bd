use thiserror::Error;

/// Error raised while reading a segment dump.
///
/// Two categories beyond plain I/O: `Malformed` for input that does not
/// look like dump output at all (bad preamble, unparseable line, payload
/// format violations), and `Invariant` for input that parsed but breaks an
/// on-log guarantee (monotonicity regressions, illegal transaction state
/// transitions, record lines that contradict their batch header).
///
/// Both carry the dump label and the 1-based line number of the offending
/// line. Either one terminates the batch stream.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file}: {line}: {reason}")]
    Malformed {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("{file}: {line}: {reason}")]
    Invariant {
        file: String,
        line: usize,
        reason: String,
    },
}

impl DumpError {
    pub(crate) fn malformed(file: &str, line: usize, reason: impl Into<String>) -> Self {
        DumpError::Malformed {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn invariant(file: &str, line: usize, reason: impl Into<String>) -> Self {
        DumpError::Invariant {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }

    /// The failure reason without the file/line prefix.
    pub fn reason(&self) -> Option<&str> {
        match self {
            DumpError::Malformed { reason, .. } | DumpError::Invariant { reason, .. } => {
                Some(reason)
            }
            DumpError::Io(_) => None,
        }
    }
}
