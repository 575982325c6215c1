use std::fmt;

use crate::model::error::ObjectError;

/// Terminal result of one fetch attempt.
#[derive(Debug)]
pub struct FetchOutcome {
    pub key: String,
    pub bytes_written: u64,
    pub error: Option<ObjectError>,
}

impl FetchOutcome {
    pub fn success(key: &str, bytes_written: u64) -> Self {
        Self {
            key: key.to_string(),
            bytes_written,
            error: None,
        }
    }

    pub fn failure(key: &str, error: ObjectError) -> Self {
        let bytes_written = match &error {
            ObjectError::Fetch { bytes_written, .. } | ObjectError::Write { bytes_written, .. } => {
                *bytes_written
            }
        };

        Self {
            key: key.to_string(),
            bytes_written,
            error: Some(error),
        }
    }
}

#[derive(Debug, Default)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub bytes: u64,
    pub errors: Vec<(String, ObjectError)>,
}

impl Summary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: FetchOutcome) {
        match outcome.error {
            None => {
                self.succeeded += 1;
                self.bytes += outcome.bytes_written;
            }
            Some(err) => {
                self.failed += 1;
                self.errors.push((outcome.key, err));
            }
        }
    }

    /// Counts every key that never produced an outcome as skipped.
    pub fn finish(mut self) -> Self {
        self.skipped = self.total.saturating_sub(self.succeeded + self.failed);
        self.errors.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found {} objects: {} downloaded, {} failed, {} skipped ({} bytes)",
            self.total, self.succeeded, self.failed, self.skipped, self.bytes
        )
    }
}
