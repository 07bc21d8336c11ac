//! Two-stage relax-and-resolve solving with retries.
//!
//! Each attempt walks `Init → Stage1Strict → [Stage1RelaxedEarlyDay] →
//! RelaxSingleRider → Stage2 → Done`. An attempt that hits a backend error,
//! or ends without any solution, is retried from `Init` until the configured
//! number of attempts is spent.

use std::fmt;

use dispatch_core::{
    BackendError, BudgetListener, ConstraintGroup, Incumbent, MipBackend, OptimizerConfig,
    SolveParams, SolveReport, StageBudget,
};
use thiserror::Error;

use crate::constraints::ConstraintSet;
use crate::variables::DecisionVariables;

/// States of a solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStage {
    /// Removable groups are reinstalled.
    Init,
    /// First solve with every constraint.
    Stage1Strict,
    /// First solve repeated without the early-day group.
    Stage1RelaxedEarlyDay,
    /// The single-rider group is removed.
    RelaxSingleRider,
    /// Authoritative solve, warm-started from stage 1 when possible.
    Stage2,
    /// A solution was accepted.
    Done,
    /// The attempt ended without a solution.
    Failed,
}

impl SolveStage {
    /// Stable name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Stage1Strict => "stage1-strict",
            Self::Stage1RelaxedEarlyDay => "stage1-relaxed-early-day",
            Self::RelaxSingleRider => "relax-single-rider",
            Self::Stage2 => "stage2",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    /// Accepted solution.
    pub incumbent: Incumbent,
    /// Stage-1 snapshot of the successful attempt, if stage 1 found one.
    pub stage1: Option<Incumbent>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Whether the early-day group had to be dropped.
    pub early_day_relaxed: bool,
    /// Every state entered across all attempts.
    pub trace: Vec<SolveStage>,
}

/// Errors raised by [`SolveOrchestrator::run`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    /// Every attempt ended without a feasible solution.
    #[error("no feasible solution found after {attempts} attempts")]
    SolutionNotFound {
        /// Attempts made.
        attempts: u32,
        /// Backend error of the last attempt, if it failed with one.
        #[source]
        last_error: Option<BackendError>,
    },
}

/// Drives a declared model through the staged solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveOrchestrator<'m> {
    constraints: &'m ConstraintSet,
    vars: &'m DecisionVariables,
    config: &'m OptimizerConfig,
}

struct Attempt {
    incumbent: Incumbent,
    stage1: Option<Incumbent>,
    early_day_relaxed: bool,
}

impl<'m> SolveOrchestrator<'m> {
    /// Orchestrator for a model whose `constraints` are already installed.
    #[must_use]
    pub const fn new(
        constraints: &'m ConstraintSet,
        vars: &'m DecisionVariables,
        config: &'m OptimizerConfig,
    ) -> Self {
        Self {
            constraints,
            vars,
            config,
        }
    }

    /// Run attempts until one yields a solution.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::SolutionNotFound`] once
    /// `max_retries` attempts have ended without a solution.
    pub fn run<B>(&self, backend: &mut B) -> Result<SolveOutcome, OrchestratorError>
    where
        B: MipBackend,
    {
        let mut trace = Vec::new();
        let mut last_error = None;
        for attempt in 1..=self.config.max_retries {
            match self.attempt(backend, &mut trace) {
                Ok(Some(found)) => {
                    enter(&mut trace, SolveStage::Done);
                    return Ok(SolveOutcome {
                        incumbent: found.incumbent,
                        stage1: found.stage1,
                        attempts: attempt,
                        early_day_relaxed: found.early_day_relaxed,
                        trace,
                    });
                }
                Ok(None) => {
                    enter(&mut trace, SolveStage::Failed);
                    log::warn!(
                        "attempt {attempt}/{} ended without a solution; retrying",
                        self.config.max_retries
                    );
                    last_error = None;
                }
                Err(err) => {
                    enter(&mut trace, SolveStage::Failed);
                    log::warn!(
                        "attempt {attempt}/{} failed: {err}; retrying",
                        self.config.max_retries
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(OrchestratorError::SolutionNotFound {
            attempts: self.config.max_retries,
            last_error,
        })
    }

    fn attempt<B: MipBackend>(
        &self,
        backend: &mut B,
        trace: &mut Vec<SolveStage>,
    ) -> Result<Option<Attempt>, BackendError> {
        enter(trace, SolveStage::Init);
        for group in [ConstraintGroup::SingleRider, ConstraintGroup::EarlyDay] {
            let installed = self.constraints.reinstall(backend, group)?;
            log::debug!("reinstalled {installed} {group} constraints");
        }

        enter(trace, SolveStage::Stage1Strict);
        let mut stage1 = self.solve(backend, &self.config.stage1, false, None)?;
        let mut early_day_relaxed = false;
        if stage1.is_none() {
            enter(trace, SolveStage::Stage1RelaxedEarlyDay);
            let dropped_early = backend.remove_constraints(ConstraintGroup::EarlyDay);
            early_day_relaxed = true;
            log::info!("stage 1 infeasible; removed {dropped_early} early-day constraints");
            stage1 = self.solve(backend, &self.config.stage1, true, None)?;
        }
        if stage1.is_none() {
            log::info!("stage 1 found no solution; stage 2 starts cold");
        }

        enter(trace, SolveStage::RelaxSingleRider);
        let dropped_single = backend.remove_constraints(ConstraintGroup::SingleRider);
        log::info!("removed {dropped_single} single-rider constraints");

        enter(trace, SolveStage::Stage2);
        let stage2 = self.solve(backend, &self.config.stage2, true, stage1.as_ref())?;
        let incumbent = match (stage2, stage1.as_ref()) {
            (Some(found), _) => found,
            (None, Some(fallback)) => {
                log::warn!("stage 2 found no solution; keeping the stage 1 incumbent");
                fallback.clone()
            }
            (None, None) => return Ok(None),
        };
        Ok(Some(Attempt {
            incumbent,
            stage1,
            early_day_relaxed,
        }))
    }

    /// Solve once and snapshot every model variable when a solution exists.
    fn solve<B: MipBackend>(
        &self,
        backend: &mut B,
        budget: &StageBudget,
        use_gap: bool,
        warm_start: Option<&Incumbent>,
    ) -> Result<Option<Incumbent>, BackendError> {
        let params = SolveParams {
            listener: BudgetListener::for_stage(budget, use_gap),
            warm_start,
        };
        let SolveReport { status, objective } = backend.solve(&params)?;
        log::info!(
            "solve finished with status {status:?}, objective {}",
            objective.map_or_else(|| "n/a".to_owned(), |value| format!("{value:.3}"))
        );
        Ok(status
            .has_solution()
            .then(|| Incumbent::capture(&*backend, objective, self.vars.all_vars())))
    }
}

fn enter(trace: &mut Vec<SolveStage>, stage: SolveStage) {
    if let Some(previous) = trace.last() {
        log::info!("solve stage {previous} -> {stage}");
    } else {
        log::info!("solve stage {stage}");
    }
    trace.push(stage);
}
