//! Job-oriented solver management.
//!
//! [`SolverJobManager`] tracks one solver run per problem id. Each submitted
//! job solves on its own worker thread while callers poll status, read the
//! best-so-far solution, or request termination from any thread. Finished
//! jobs stay retrievable until the final solution is taken or a retention
//! sweep prunes them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use shiftforge_config::SolverConfig;
use shiftforge_core::{AssignmentRecord, ShiftSchedule};

use crate::solver::{SolveResult, SolveStats, Solver};

/// Lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// The worker is still running.
    Solving,
    /// The worker finished, either by exhausting its termination budget or
    /// by an explicit terminate request.
    Terminated,
}

/// Which solving phase a job is currently in.
///
/// A job starts in the construction phase and moves to local search when
/// the constructed solution is published as the first best solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolvePhase {
    ConstructionHeuristic,
    LocalSearch,
}

/// Errors raised by [`SolverJobManager`] operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// A job with this problem id is already tracked.
    #[error("Job already exists for problem id: {0}")]
    DuplicateJob(String),

    /// No tracked job matches this problem id.
    #[error("No job found for problem id: {0}")]
    JobNotFound(String),
}

/// Per-job bookkeeping shared between the manager and its worker thread.
#[derive(Debug)]
struct SolveJob {
    status: JobStatus,
    phase: SolvePhase,
    best_solution: Option<ShiftSchedule>,
    stats: Option<SolveStats>,
    terminate_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    submitted_at: Instant,
    finished_at: Option<Instant>,
}

/// Tracks concurrent solver jobs keyed by problem id.
///
/// The manager is cheap to clone; clones share the same job table, so a
/// clone handed to another thread can poll or terminate jobs submitted
/// through the original.
#[derive(Debug, Clone)]
pub struct SolverJobManager {
    config: SolverConfig,
    jobs: Arc<Mutex<HashMap<String, SolveJob>>>,
}

impl SolverJobManager {
    /// Creates a manager that runs every job with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        SolverJobManager {
            config,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Generates a fresh problem id.
    pub fn new_problem_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Starts solving `schedule` on a worker thread under `problem_id`.
    ///
    /// Returns [`JobError::DuplicateJob`] if the id is already tracked,
    /// including ids whose finished job has not been taken or swept yet.
    pub fn submit(
        &self,
        problem_id: impl Into<String>,
        schedule: ShiftSchedule,
    ) -> Result<(), JobError> {
        self.submit_with_prior(problem_id, schedule, Vec::new())
    }

    /// Like [`submit`](Self::submit), seeding construction from a previous
    /// schedule's records when warm starts are enabled.
    pub fn submit_with_prior(
        &self,
        problem_id: impl Into<String>,
        schedule: ShiftSchedule,
        prior: Vec<AssignmentRecord>,
    ) -> Result<(), JobError> {
        let problem_id = problem_id.into();
        let terminate_flag = self.register_job(&problem_id)?;
        debug!(event = "job_submitted", problem_id = %problem_id);

        let config = self.config.clone();
        let jobs = Arc::clone(&self.jobs);
        let worker_id = problem_id.clone();
        let handle = thread::spawn(move || {
            run_job(config, jobs, worker_id, schedule, prior, terminate_flag, None);
        });
        self.attach_handle(&problem_id, handle);
        Ok(())
    }

    /// Starts solving on a worker thread and returns a channel that yields
    /// every new best solution, ending with the final one. The channel
    /// closes once the job finishes.
    pub fn solve_and_listen(
        &self,
        problem_id: impl Into<String>,
        schedule: ShiftSchedule,
    ) -> Result<mpsc::UnboundedReceiver<ShiftSchedule>, JobError> {
        let problem_id = problem_id.into();
        let terminate_flag = self.register_job(&problem_id)?;
        debug!(event = "job_submitted", problem_id = %problem_id, streaming = true);

        let (sender, receiver) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let jobs = Arc::clone(&self.jobs);
        let worker_id = problem_id.clone();
        let handle = thread::spawn(move || {
            run_job(
                config,
                jobs,
                worker_id,
                schedule,
                Vec::new(),
                terminate_flag,
                Some(sender),
            );
        });
        self.attach_handle(&problem_id, handle);
        Ok(receiver)
    }

    /// Solves `schedule` on the calling thread, blocking until termination.
    ///
    /// The job is registered under `problem_id` for the duration of the run,
    /// so other threads can observe its status or terminate it. The finished
    /// job stays tracked until taken or swept, like a submitted one.
    pub fn solve(
        &self,
        problem_id: impl Into<String>,
        schedule: ShiftSchedule,
    ) -> Result<SolveResult, JobError> {
        let problem_id = problem_id.into();
        let terminate_flag = self.register_job(&problem_id)?;
        debug!(event = "job_submitted", problem_id = %problem_id, blocking = true);
        Ok(run_job(
            self.config.clone(),
            Arc::clone(&self.jobs),
            problem_id,
            schedule,
            Vec::new(),
            terminate_flag,
            None,
        ))
    }

    /// Reports the lifecycle state of a tracked job.
    pub fn status(&self, problem_id: &str) -> Result<JobStatus, JobError> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(problem_id)
            .map(|job| job.status)
            .ok_or_else(|| JobError::JobNotFound(problem_id.to_string()))
    }

    /// Reports which solving phase a tracked job is in. Finished jobs report
    /// the phase they ended in.
    pub fn phase(&self, problem_id: &str) -> Result<SolvePhase, JobError> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(problem_id)
            .map(|job| job.phase)
            .ok_or_else(|| JobError::JobNotFound(problem_id.to_string()))
    }

    /// Returns a copy of the best solution found so far, if any improvement
    /// has been recorded yet.
    pub fn best_solution(&self, problem_id: &str) -> Result<Option<ShiftSchedule>, JobError> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(problem_id)
            .map(|job| job.best_solution.clone())
            .ok_or_else(|| JobError::JobNotFound(problem_id.to_string()))
    }

    /// Returns the run statistics of a finished job, or `None` while it is
    /// still solving.
    pub fn stats(&self, problem_id: &str) -> Result<Option<SolveStats>, JobError> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(problem_id)
            .map(|job| job.stats.clone())
            .ok_or_else(|| JobError::JobNotFound(problem_id.to_string()))
    }

    /// Requests early termination and waits for the worker to finish.
    ///
    /// The job keeps its best-so-far solution and transitions to
    /// [`JobStatus::Terminated`]. Terminating an already finished job is a
    /// no-op.
    pub fn terminate(&self, problem_id: &str) -> Result<(), JobError> {
        let (flag, handle) = {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(problem_id)
                .ok_or_else(|| JobError::JobNotFound(problem_id.to_string()))?;
            (Arc::clone(&job.terminate_flag), job.handle.take())
        };
        debug!(event = "job_terminate_requested", problem_id = %problem_id);
        flag.store(true, Ordering::Relaxed);
        // Join outside the lock so the worker can write its final state.
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Removes a finished job and returns its final solution.
    ///
    /// Returns `Ok(None)` while the job is still solving; the job stays
    /// tracked in that case. Once taken, the id is free for resubmission.
    pub fn take_final_solution(
        &self,
        problem_id: &str,
    ) -> Result<Option<ShiftSchedule>, JobError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get(problem_id) {
            None => Err(JobError::JobNotFound(problem_id.to_string())),
            Some(job) if job.status == JobStatus::Solving => Ok(None),
            Some(_) => Ok(jobs.remove(problem_id).and_then(|job| job.best_solution)),
        }
    }

    /// Prunes finished jobs that completed more than `retention` ago and
    /// returns how many were removed. Running jobs are never touched.
    pub fn sweep_expired(&self, retention: Duration) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, job| {
            job.status == JobStatus::Solving
                || job.finished_at.map_or(true, |at| at.elapsed() < retention)
        });
        let swept = before - jobs.len();
        if swept > 0 {
            debug!(event = "jobs_swept", count = swept);
        }
        swept
    }

    /// Returns the ids of all tracked jobs in sorted order.
    pub fn tracked_jobs(&self) -> Vec<String> {
        let jobs = self.jobs.lock().unwrap();
        let mut ids: Vec<String> = jobs.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn register_job(&self, problem_id: &str) -> Result<Arc<AtomicBool>, JobError> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(problem_id) {
            return Err(JobError::DuplicateJob(problem_id.to_string()));
        }
        let terminate_flag = Arc::new(AtomicBool::new(false));
        jobs.insert(
            problem_id.to_string(),
            SolveJob {
                status: JobStatus::Solving,
                phase: SolvePhase::ConstructionHeuristic,
                best_solution: None,
                stats: None,
                terminate_flag: Arc::clone(&terminate_flag),
                handle: None,
                submitted_at: Instant::now(),
                finished_at: None,
            },
        );
        Ok(terminate_flag)
    }

    fn attach_handle(&self, problem_id: &str, handle: JoinHandle<()>) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(problem_id) {
            job.handle = Some(handle);
        }
    }
}

impl Default for SolverJobManager {
    fn default() -> Self {
        SolverJobManager::new(SolverConfig::default())
    }
}

/// Runs one job to completion, publishing improvements into the job table
/// and over `sender` when streaming.
fn run_job(
    config: SolverConfig,
    jobs: Arc<Mutex<HashMap<String, SolveJob>>>,
    problem_id: String,
    schedule: ShiftSchedule,
    prior: Vec<AssignmentRecord>,
    terminate_flag: Arc<AtomicBool>,
    sender: Option<mpsc::UnboundedSender<ShiftSchedule>>,
) -> SolveResult {
    let callback_jobs = Arc::clone(&jobs);
    let callback_id = problem_id.clone();
    let callback_sender = sender.clone();
    let solver = Solver::new(config)
        .with_terminate_flag(terminate_flag)
        .with_best_solution_callback(Box::new(move |best: &ShiftSchedule| {
            {
                let mut jobs = callback_jobs.lock().unwrap();
                if let Some(job) = jobs.get_mut(&callback_id) {
                    // The first publication is the constructed solution.
                    job.phase = SolvePhase::LocalSearch;
                    job.best_solution = Some(best.clone());
                }
            }
            // Send outside the lock.
            if let Some(sender) = &callback_sender {
                let _ = sender.send(best.clone());
            }
        }));

    let result = solver.solve_with_prior(schedule, prior);

    if let Some(sender) = &sender {
        let _ = sender.send(result.solution.clone());
    }

    let mut jobs = jobs.lock().unwrap();
    if let Some(job) = jobs.get_mut(&problem_id) {
        job.best_solution = Some(result.solution.clone());
        job.stats = Some(result.stats.clone());
        job.status = JobStatus::Terminated;
        job.finished_at = Some(Instant::now());
        debug!(
            event = "job_finished",
            problem_id = %problem_id,
            total_ms = job.submitted_at.elapsed().as_millis() as u64,
        );
    }
    drop(jobs);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, NaiveTime};

    use shiftforge_core::{DemandSlot, Employee, Station, StationId};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn quick_config(seed: u64) -> SolverConfig {
        let mut config = SolverConfig::new().with_random_seed(seed);
        config.termination.step_count_limit = Some(200);
        config.termination.unimproved_step_count_limit = Some(8);
        config
    }

    fn two_register_problem() -> ShiftSchedule {
        ShiftSchedule::new(
            vec![
                Employee::new("E1", "S1")
                    .with_skill(StationId(0), 3)
                    .with_skill(StationId(1), 2),
                Employee::new("E2", "S1")
                    .with_skill(StationId(0), 2)
                    .with_skill(StationId(1), 3),
            ],
            vec![
                Station::new("S1", 1, "Register 1"),
                Station::new("S1", 2, "Register 2"),
            ],
            vec![
                DemandSlot::new("S1", d(3), t(9, 0), 2),
                DemandSlot::new("S1", d(3), t(9, 15), 2),
            ],
            vec![],
        )
    }

    fn fake_finished_job(flag: Arc<AtomicBool>) -> SolveJob {
        SolveJob {
            status: JobStatus::Terminated,
            phase: SolvePhase::LocalSearch,
            best_solution: None,
            stats: None,
            terminate_flag: flag,
            handle: None,
            submitted_at: Instant::now(),
            finished_at: Some(Instant::now()),
        }
    }

    #[test]
    fn test_submit_terminate_take_lifecycle() {
        let manager = SolverJobManager::new(quick_config(7));
        manager.submit("job-1", two_register_problem()).unwrap();

        // Terminate joins the worker, so the job is finished afterwards.
        manager.terminate("job-1").unwrap();
        assert_eq!(manager.status("job-1").unwrap(), JobStatus::Terminated);
        assert_eq!(manager.phase("job-1").unwrap(), SolvePhase::LocalSearch);

        let stats = manager.stats("job-1").unwrap();
        assert!(stats.is_some());

        let solution = manager.take_final_solution("job-1").unwrap();
        let solution = solution.unwrap();
        assert!(solution.score.is_some());

        // Taking removes the job.
        assert!(matches!(
            manager.status("job-1"),
            Err(JobError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_submit_rejected() {
        let manager = SolverJobManager::new(quick_config(7));
        manager.submit("job-1", two_register_problem()).unwrap();

        let err = manager
            .submit("job-1", two_register_problem())
            .unwrap_err();
        assert!(matches!(err, JobError::DuplicateJob(id) if id == "job-1"));

        manager.terminate("job-1").unwrap();

        // A finished but untaken job still blocks the id.
        let err = manager
            .submit("job-1", two_register_problem())
            .unwrap_err();
        assert!(matches!(err, JobError::DuplicateJob(_)));

        // Taking frees the id for resubmission.
        manager.take_final_solution("job-1").unwrap();
        manager.submit("job-1", two_register_problem()).unwrap();
        manager.terminate("job-1").unwrap();
    }

    #[test]
    fn test_unknown_job_errors() {
        let manager = SolverJobManager::new(quick_config(7));
        assert!(matches!(
            manager.status("missing"),
            Err(JobError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.best_solution("missing"),
            Err(JobError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.terminate("missing"),
            Err(JobError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.take_final_solution("missing"),
            Err(JobError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.stats("missing"),
            Err(JobError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.phase("missing"),
            Err(JobError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_blocking_solve_registers_job() {
        let manager = SolverJobManager::new(quick_config(11));
        let result = manager.solve("job-sync", two_register_problem()).unwrap();
        assert!(result.solution.score.is_some());
        assert!(result.stats.best_score >= result.stats.initial_score);

        assert_eq!(manager.status("job-sync").unwrap(), JobStatus::Terminated);
        let taken = manager.take_final_solution("job-sync").unwrap();
        assert!(taken.is_some());
    }

    #[test]
    fn test_take_final_solution_while_solving_is_none() {
        let manager = SolverJobManager::new(quick_config(7));
        let flag = manager.register_job("job-slow").unwrap();

        // Still marked solving, so nothing to take yet.
        assert!(manager.take_final_solution("job-slow").unwrap().is_none());
        assert_eq!(manager.status("job-slow").unwrap(), JobStatus::Solving);
        assert_eq!(
            manager.phase("job-slow").unwrap(),
            SolvePhase::ConstructionHeuristic
        );

        {
            let mut jobs = manager.jobs.lock().unwrap();
            let job = jobs.get_mut("job-slow").unwrap();
            job.status = JobStatus::Terminated;
            job.best_solution = Some(two_register_problem());
            job.finished_at = Some(Instant::now());
        }
        flag.store(true, Ordering::Relaxed);

        assert!(manager.take_final_solution("job-slow").unwrap().is_some());
    }

    #[test]
    fn test_sweep_expired_prunes_only_finished_jobs() {
        let manager = SolverJobManager::new(quick_config(7));
        {
            let mut jobs = manager.jobs.lock().unwrap();
            jobs.insert(
                "done".to_string(),
                fake_finished_job(Arc::new(AtomicBool::new(true))),
            );
            let mut running = fake_finished_job(Arc::new(AtomicBool::new(false)));
            running.status = JobStatus::Solving;
            running.finished_at = None;
            jobs.insert("running".to_string(), running);
        }

        // A generous retention keeps the fresh job around.
        assert_eq!(manager.sweep_expired(Duration::from_secs(3600)), 0);
        // Zero retention prunes every finished job.
        assert_eq!(manager.sweep_expired(Duration::ZERO), 1);
        assert_eq!(manager.tracked_jobs(), vec!["running".to_string()]);
    }

    #[test]
    fn test_solve_and_listen_streams_improvements() {
        let manager = SolverJobManager::new(quick_config(13));
        let mut receiver = manager
            .solve_and_listen("job-stream", two_register_problem())
            .unwrap();

        let mut received = Vec::new();
        while let Some(solution) = receiver.blocking_recv() {
            received.push(solution);
        }

        // At least the construction best and the final solution arrive.
        assert!(!received.is_empty());
        let last = received.last().unwrap();
        assert!(last.score.is_some());
        assert_eq!(manager.status("job-stream").unwrap(), JobStatus::Terminated);
    }

    #[test]
    fn test_new_problem_id_unique() {
        let a = SolverJobManager::new_problem_id();
        let b = SolverJobManager::new_problem_id();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Solving).unwrap(),
            "\"SOLVING\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Terminated).unwrap(),
            "\"TERMINATED\""
        );
        assert_eq!(
            serde_json::to_string(&SolvePhase::ConstructionHeuristic).unwrap(),
            "\"construction_heuristic\""
        );
        assert_eq!(
            serde_json::to_string(&SolvePhase::LocalSearch).unwrap(),
            "\"local_search\""
        );
    }
}
