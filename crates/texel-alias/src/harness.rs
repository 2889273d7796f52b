//! Run orchestration
//!
//! Builds the store, the views and the kernel, then processes every view in a
//! fixed order and finalizes the report. Any fatal error aborts the run.

use crate::dataset::BackingStore;
use crate::device::{BindingSlots, GraphicsDevice};
use crate::error::HarnessError;
use crate::format::TexelFormat;
use crate::registry::{ViewRegistry, ViewSpec};
use crate::runner::{DECODE_KERNEL_WGSL, DecodeKernelRunner};
use crate::state::{RunState, RunTracker};
use crate::validator::{ResultValidator, ValidationReport};

/// Configuration of a verification run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Format of the backing texture
    pub storage_format: TexelFormat,
    /// Views to decode, in processing order
    pub views: Vec<ViewSpec>,
    /// Source text of the decode kernel
    pub kernel_source: String,
    /// Binding slots the kernel expects
    pub slots: BindingSlots,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            storage_format: TexelFormat::Rgba8Unorm,
            views: ViewSpec::defaults(),
            kernel_source: DECODE_KERNEL_WGSL.to_string(),
            slots: BindingSlots::DEFAULT,
        }
    }
}

/// Drives verification runs on one device
pub struct Harness<'d, D: GraphicsDevice> {
    device: &'d D,
    config: RunConfig,
    tracker: RunTracker,
}

impl<'d, D: GraphicsDevice> Harness<'d, D> {
    /// Creates a harness for `device`
    pub fn new(device: &'d D, config: RunConfig) -> Self {
        Self {
            device,
            config,
            tracker: RunTracker::new(),
        }
    }

    /// Configuration used by every run
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// State the last run ended in (or is in)
    pub fn state(&self) -> Option<RunState> {
        self.tracker.current()
    }

    /// States the last run passed through
    pub fn history(&self) -> &[RunState] {
        self.tracker.history()
    }

    /// Executes one complete run
    ///
    /// Every run rebuilds its store, views and kernel, so repeated runs are
    /// independent of each other.
    ///
    /// # Errors
    /// Returns the fatal error that aborted the run. Value mismatches are not
    /// errors; they are part of the returned report.
    pub fn run(&mut self) -> Result<ValidationReport, HarnessError> {
        self.tracker = RunTracker::new();

        match self.execute() {
            Ok(report) => Ok(report),
            Err(err) => {
                tracing::error!(state = ?self.tracker.current(), "run aborted: {err}");
                self.tracker.enter(RunState::Aborted);
                Err(err)
            }
        }
    }

    fn execute(&mut self) -> Result<ValidationReport, HarnessError> {
        let device = self.device;
        let config = &self.config;
        let tracker = &mut self.tracker;

        let store = BackingStore::create(device, config.storage_format)?;
        tracker.enter(RunState::Created);

        let registry = ViewRegistry::build(device, &store, &config.views)?;
        tracker.enter(RunState::ViewsReady);
        tracing::info!(views = registry.len(), storage = %store.format(), texels = store.host().texel_count(), "views ready");

        let mut runner = DecodeKernelRunner::new(device, &config.kernel_source, store.host().texel_count(), config.slots)?;
        let mut validator = ResultValidator::new();

        for view in registry.iter() {
            let span = tracing::info_span!("view", name = view.name(), format = %view.format());
            let _guard = span.enter();

            let pending = runner.run_pass(view, tracker)?;
            let mapped = pending.map()?;
            tracker.enter(RunState::Mapped);

            validator.compare(view, mapped.values()?);
            tracker.enter(RunState::Compared);

            drop(mapped);
            tracker.enter(RunState::Unmapped);
        }

        let report = validator.finalize();
        tracker.enter(RunState::ReportFinalized);
        tracing::info!(
            views = report.summary.views,
            texels = report.summary.texels_checked,
            mismatches = report.summary.mismatches,
            "report finalized"
        );

        Ok(report)
    }
}
