//! Engine Wiring
//!
//! Builds the computation pool, spawns both workers, connects the input pump
//! to the presentation loop and tears everything down once the input source
//! closes.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::computation::{ComputationError, ComputationPool, SeriesComputation, WorkerHandle};
use crate::config::PiCalcConfig;
use crate::lifecycle::LifecycleController;
use crate::presentation::{PresentationLoop, PresentationReport};
use crate::quiescence::{QuiescenceCoordinator, QuiescenceError};
use crate::series::Algorithm;
use crate::surface::{pump_input, DisplaySink, InputSource, SurfaceError};

/// Errors from running the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Worker setup or teardown failed
    #[error(transparent)]
    Computation(#[from] ComputationError),

    /// Coordinator setup failed
    #[error(transparent)]
    Quiescence(#[from] QuiescenceError),

    /// Display or input failure
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    /// A background task panicked or was cancelled
    #[error("engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runs the computations, the input pump and the presentation loop
pub struct Engine {
    config: PiCalcConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine on the system clock
    #[must_use]
    pub fn new(config: PiCalcConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Replace the clock (tests drive a manual clock)
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration in use
    #[must_use]
    pub fn config(&self) -> &PiCalcConfig {
        &self.config
    }

    /// Run until `input` closes, then stop and join the workers
    ///
    /// # Errors
    ///
    /// Returns the first surface error, or a worker failure on teardown.
    /// Workers are joined on every path.
    pub async fn run(
        self,
        input: Box<dyn InputSource>,
        display: Box<dyn DisplaySink>,
    ) -> Result<PresentationReport, EngineError> {
        let pool = ComputationPool::new();
        let workers = self.spawn_workers(&pool)?;
        info!(
            refresh_ms = self.config.refresh_period.as_millis(),
            ack_timeout = ?self.config.ack_timeout,
            finite = self.config.finite,
            "Engine started"
        );

        let result = self.present(&pool, input, display).await;

        pool.shutdown();
        let joined = join_workers(workers).await;

        let report = result?;
        joined?;
        info!(cycles = report.cycles, "Engine stopped");
        Ok(report)
    }

    fn spawn_workers(&self, pool: &Arc<ComputationPool>) -> Result<Vec<WorkerHandle>, EngineError> {
        let mut workers = Vec::with_capacity(Algorithm::ALL.len());
        for algorithm in Algorithm::ALL {
            let spawned = SeriesComputation::new(
                Arc::clone(pool),
                algorithm,
                self.config.termination(algorithm),
                self.config.convergence_band(),
                Arc::clone(&self.clock),
            )
            .and_then(SeriesComputation::spawn);

            match spawned {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    error!(%algorithm, error = %err, "Failed to start worker");
                    pool.shutdown();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(workers)
    }

    async fn present(
        &self,
        pool: &Arc<ComputationPool>,
        input: Box<dyn InputSource>,
        display: Box<dyn DisplaySink>,
    ) -> Result<PresentationReport, EngineError> {
        let coordinator = QuiescenceCoordinator::new(Arc::clone(pool), self.config.ack_timeout)?;
        let controller =
            LifecycleController::new(Arc::clone(&self.clock), self.config.reset_on_switch);

        let (event_tx, event_rx) = mpsc::channel(self.config.input_buffer);
        let pump = tokio::spawn(pump_input(input, self.config.input_poll_period, event_tx));

        let presentation = PresentationLoop::new(
            coordinator,
            controller,
            display,
            event_rx,
            Arc::clone(&self.clock),
            self.config.refresh_period,
        );

        // The loop only ends on its own once the pump has returned.
        let report = match presentation.run().await {
            Ok(report) => report,
            Err(err) => {
                pump.abort();
                return Err(err.into());
            }
        };

        pump.await??;
        Ok(report)
    }
}

async fn join_workers(workers: Vec<WorkerHandle>) -> Result<(), EngineError> {
    tokio::task::spawn_blocking(move || {
        let mut first_error = None;
        for worker in workers {
            let algorithm = worker.algorithm();
            if let Err(err) = worker.join() {
                warn!(%algorithm, error = %err, "Worker did not exit cleanly");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), |err| Err(EngineError::from(err)))
    })
    .await?
}
