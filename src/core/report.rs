// imgcrunch/src/core/report.rs
use super::types::{OriginalDisposition, WorkOutcome, WorkResult};
use super::ErrorKind;
use crate::utils::format_file_size;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FailureEntry {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub resized: usize,
    pub moved: usize,
    pub replaced: usize,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
    pub failures: Vec<FailureEntry>,
    pub elapsed: Duration,
    pub results: Vec<WorkResult>,
}

impl RunReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: &WorkResult) {
        match &result.outcome {
            WorkOutcome::Placed(placement) => {
                self.succeeded += 1;
                self.total_input_bytes += placement.input_bytes;
                self.total_output_bytes += placement.bytes_written;
                if placement.resized() {
                    self.resized += 1;
                }
                match placement.original {
                    OriginalDisposition::Moved(_) => self.moved += 1,
                    OriginalDisposition::Replaced => self.replaced += 1,
                    OriginalDisposition::Kept => {}
                }
            }
            WorkOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(FailureEntry {
                    path: result.source.clone(),
                    kind: failure.kind,
                    message: failure.message.clone(),
                });
            }
            WorkOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Seals the report with the full result set, ordered by source ordinal.
    pub fn finish(&mut self, elapsed: Duration, mut results: Vec<WorkResult>) {
        results.sort_by_key(|r| r.ordinal);
        self.results = results;
        self.elapsed = elapsed;
        self.failures.sort_by(|a, b| a.path.cmp(&b.path));
    }

    pub fn accounted(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn savings_percent(&self) -> f64 {
        if self.total_input_bytes == 0 || self.total_output_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.total_output_bytes as f64 / self.total_input_bytes as f64) * 100.0
    }

    pub fn images_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.succeeded as f64 / secs
    }

    pub fn summary(&self) -> String {
        let mut output = String::new();
        output.push_str("=== Processing Summary ===\n");
        output.push_str(&format!("{:18}: {}\n", "Images processed", self.succeeded));
        output.push_str(&format!("{:18}: {}\n", "Images resized", self.resized));
        if self.failed > 0 {
            output.push_str(&format!("{:18}: {}\n", "Errors", self.failed));
        }
        if self.skipped > 0 {
            output.push_str(&format!("{:18}: {}\n", "Skipped", self.skipped));
        }
        if self.moved > 0 {
            output.push_str(&format!("{:18}: {}\n", "Originals moved", self.moved));
        }
        if self.replaced > 0 {
            output.push_str(&format!("{:18}: {}\n", "Files replaced", self.replaced));
        }

        if self.total_input_bytes > 0 && self.total_output_bytes > 0 {
            let savings = self.savings_percent();
            let direction = if savings > 0.0 { "smaller" } else { "larger" };
            output.push_str(&format!(
                "{:18}: {}\n",
                "Input size",
                format_file_size(self.total_input_bytes)
            ));
            output.push_str(&format!(
                "{:18}: {}\n",
                "Output size",
                format_file_size(self.total_output_bytes)
            ));
            output.push_str(&format!(
                "{:18}: {:.1}% {} ({})\n",
                "Savings",
                savings.abs(),
                direction,
                format_file_size(self.total_input_bytes.abs_diff(self.total_output_bytes))
            ));
        }

        let secs = self.elapsed.as_secs_f64();
        let minutes = (secs / 60.0).floor();
        if minutes > 0.0 {
            output.push_str(&format!(
                "{:18}: {}m {:.1}s\n",
                "Time elapsed",
                minutes as u64,
                secs - minutes * 60.0
            ));
        } else {
            output.push_str(&format!("{:18}: {:.1}s\n", "Time elapsed", secs));
        }
        if self.succeeded > 0 && secs > 0.0 {
            output.push_str(&format!(
                "{:18}: {:.1} images/sec\n",
                "Speed",
                self.images_per_second()
            ));
        }

        for failure in &self.failures {
            output.push_str(&format!(
                "  failed [{}] {}: {}\n",
                failure.kind,
                failure.path.display(),
                failure.message
            ));
        }

        output
    }
}
