//! Per-record progress and batch summary

use colored::*;

/// Final state of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// At least one remote object was created
    Created(String),
    /// Nothing to do, or a referenced object was missing
    Skipped(String),
    /// Dry run: a create would have been issued
    Planned(String),
    Failed(String),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Created(m) | Outcome::Skipped(m) | Outcome::Planned(m) | Outcome::Failed(m) => m,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub row: usize,
    pub label: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub created: usize,
    pub skipped: usize,
    pub planned: usize,
    pub failed: usize,
}

/// Collects outcomes for a whole batch; never aborts it
#[derive(Debug)]
pub struct BatchReport {
    job: &'static str,
    entries: Vec<Entry>,
}

impl BatchReport {
    pub fn new(job: &'static str) -> Self {
        Self {
            job,
            entries: Vec::new(),
        }
    }

    /// Log and store the outcome of a record
    pub fn record(&mut self, row: usize, label: impl Into<String>, outcome: Outcome) {
        let label = label.into();
        match &outcome {
            Outcome::Created(m) => log::info!("Row {} '{}': created - {}", row, label, m),
            Outcome::Skipped(m) => log::info!("Row {} '{}': skipped - {}", row, label, m),
            Outcome::Planned(m) => log::info!("Row {} '{}': dry run - {}", row, label, m),
            Outcome::Failed(m) => log::warn!("Row {} '{}': failed - {}", row, label, m),
        }
        self.entries.push(Entry {
            row,
            label,
            outcome,
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn counts(&self) -> Counts {
        self.entries
            .iter()
            .fold(Counts::default(), |mut counts, entry| {
                match entry.outcome {
                    Outcome::Created(_) => counts.created += 1,
                    Outcome::Skipped(_) => counts.skipped += 1,
                    Outcome::Planned(_) => counts.planned += 1,
                    Outcome::Failed(_) => counts.failed += 1,
                }
                counts
            })
    }

    pub fn failures(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed(_)))
    }

    /// Uncoloured counterpart of the stdout status line
    pub fn summary_line(&self) -> String {
        let counts = self.counts();
        format!(
            "{}: {} record(s) processed - {} created, {} skipped, {} planned, {} failed",
            self.job,
            self.entries().len(),
            counts.created,
            counts.skipped,
            counts.planned,
            counts.failed
        )
    }

    /// Summary through the logger, so it also lands in the log file
    pub fn log_summary(&self) {
        log::info!("{}", self.summary_line());
        for entry in self.failures() {
            log::warn!(
                "  row {} '{}': {}",
                entry.row,
                entry.label,
                entry.outcome.message()
            );
        }
    }

    /// One-line coloured status on stdout
    pub fn print_status(&self) {
        let counts = self.counts();
        let failed = if counts.failed > 0 {
            format!("{} failed", counts.failed).red().bold()
        } else {
            "0 failed".normal()
        };
        println!(
            "{} {} created, {} skipped, {} planned, {}",
            format!("{}:", self.job).bold(),
            counts.created.to_string().green(),
            counts.skipped.to_string().yellow(),
            counts.planned.to_string().cyan(),
            failed
        );
    }
}
