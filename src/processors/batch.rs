use crate::core::processor::ImageProcessor;
use crate::core::report::RunReport;
use crate::core::types::{Progress, WorkItem, WorkResult};
use crate::core::{CrunchError, JobConfig, Result};
use crate::processors::{Dispatcher, FilePlanner, OutputManager};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

pub struct BatchProcessor {
    config: JobConfig,
    dispatcher: Dispatcher,
}

impl BatchProcessor {
    /// Validates `config` and builds the worker pool. Any error here is fatal.
    pub fn new(mut config: JobConfig) -> Result<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.threads)?;

        Ok(Self { config, dispatcher })
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.dispatcher.worker_count()
    }

    /// Setting the returned flag stops workers from starting new images.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.dispatcher.cancel_flag()
    }

    pub fn process_directory(&self, input_dir: &Path) -> Result<RunReport> {
        self.process_directory_with_progress(input_dir, |_, _| {})
    }

    pub fn process_directory_with_progress<P>(
        &self,
        input_dir: &Path,
        mut on_progress: P,
    ) -> Result<RunReport>
    where
        P: FnMut(Progress, &WorkResult),
    {
        let started = Instant::now();

        let plan = match FilePlanner::new(&self.config).plan(input_dir) {
            Ok(plan) => plan,
            Err(CrunchError::EmptyInput(dir)) => {
                log::warn!("No image files found in {}", dir.display());
                let mut report = RunReport::new(0);
                report.finish(started.elapsed(), Vec::new());
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        log::info!(
            "Processing {} images from {} as {} with {} workers",
            plan.items.len(),
            plan.input_dir.display(),
            self.config.format,
            self.worker_count()
        );

        let processor = ImageProcessor::new(&self.config);
        let manager = OutputManager::for_plan(self.config.mode, &plan);
        let handler = |item: &WorkItem| {
            let transformed = processor.transform(&item.source.path)?;
            manager.place(item, transformed)
        };

        let mut report = RunReport::new(plan.items.len());
        let results = self.dispatcher.dispatch(&plan.items, handler, |progress, result| {
            report.record(result);
            on_progress(progress, result);
        });
        report.finish(started.elapsed(), results);

        log::info!(
            "Finished: {} succeeded, {} failed, {} skipped",
            report.succeeded,
            report.failed,
            report.skipped
        );

        Ok(report)
    }
}
