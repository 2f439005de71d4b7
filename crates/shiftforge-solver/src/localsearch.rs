//! Local search phase.
//!
//! Improves an existing solution step by step. Each step:
//! 1. Collects candidate moves (employee reassignments, unassignments and
//!    a random sample of swaps) into a reusable buffer
//! 2. Evaluates each doable move by applying it, scoring, and undoing
//! 3. Keeps non-worsening moves as candidates, preferring strict
//!    improvement, until the accepted-count limit is reached
//! 4. Applies the best candidate, or stops at a local optimum when no
//!    candidate survives
//!
//! Accepting score-equal moves lets the search drift across plateaus
//! instead of stopping at the first flat neighborhood; the unimproved
//! terminations bound how long that drift can run.

use std::time::Instant;

use rand::seq::SliceRandom;
use tracing::{debug, info, trace};

use shiftforge_core::{EmployeeId, HardSoftScore, ShiftSchedule};

use crate::moves::Move;
use crate::scope::SolverScope;
use crate::termination::Termination;

/// Step-based local search over the assignment records.
#[derive(Debug)]
pub struct LocalSearch {
    accepted_count_limit: usize,
}

impl LocalSearch {
    /// Creates a local search that stops scanning a step after finding
    /// `accepted_count_limit` strictly improving moves.
    pub fn new(accepted_count_limit: usize) -> Self {
        Self {
            accepted_count_limit: accepted_count_limit.max(1),
        }
    }

    /// Runs until terminated or stuck, reporting each new best solution.
    pub fn run<T, F>(&self, scope: &mut SolverScope, termination: &T, mut on_improved: F)
    where
        T: Termination,
        F: FnMut(&ShiftSchedule),
    {
        let phase_start = Instant::now();
        info!(event = "phase_start", phase = "Local Search", phase_index = 1);

        let mut last_step_score = scope.calculate_score();
        let mut steps_taken: u64 = 0;
        let mut moves_evaluated: u64 = 0;
        let mut last_progress_time = Instant::now();
        let mut last_progress_moves: u64 = 0;
        let mut moves: Vec<Move> = Vec::new();

        loop {
            if scope.is_terminate_early() || termination.is_terminated(scope) {
                break;
            }

            self.collect_moves(scope, &mut moves);

            let mut step_best: Option<(Move, HardSoftScore)> = None;
            let mut improving = 0usize;

            for candidate in moves.drain(..) {
                if !candidate.is_doable(scope.working_solution()) {
                    continue;
                }
                moves_evaluated += 1;
                scope.record_move_evaluated();

                let undo = candidate.apply(scope.director_mut());
                let move_score = scope.calculate_score();
                undo.apply(scope.director_mut());

                if move_score < last_step_score {
                    continue;
                }
                let replaces = step_best
                    .as_ref()
                    .map_or(true, |&(_, best)| move_score > best);
                if replaces {
                    step_best = Some((candidate, move_score));
                }
                if move_score > last_step_score {
                    improving += 1;
                    if improving >= self.accepted_count_limit {
                        break;
                    }
                }
            }

            let now = Instant::now();
            if now.duration_since(last_progress_time).as_secs() >= 1 {
                let moves_delta = moves_evaluated - last_progress_moves;
                let elapsed_secs = now.duration_since(last_progress_time).as_secs_f64();
                debug!(
                    event = "progress",
                    steps = steps_taken,
                    speed = (moves_delta as f64 / elapsed_secs) as u64,
                    score = %last_step_score,
                );
                last_progress_time = now;
                last_progress_moves = moves_evaluated;
            }

            let Some((step_move, step_score)) = step_best else {
                // No accepted moves - we're stuck
                break;
            };

            step_move.apply(scope.director_mut());
            last_step_score = step_score;
            let step = scope.increment_step_count();
            steps_taken += 1;
            trace!(event = "step", step, score = %step_score, accepted = true);

            if scope.update_best_solution() {
                if let Some(best) = scope.best_solution() {
                    on_improved(best);
                }
            }
        }

        let duration = phase_start.elapsed();
        let speed = if duration.as_secs_f64() > 0.0 {
            (moves_evaluated as f64 / duration.as_secs_f64()) as u64
        } else {
            0
        };
        info!(
            event = "phase_end",
            phase = "Local Search",
            phase_index = 1,
            duration_ms = duration.as_millis() as u64,
            steps = steps_taken,
            speed = speed,
            score = %last_step_score,
        );
    }

    /// Refills the move buffer for one step.
    ///
    /// Records with a station get one reassignment per other employee plus
    /// an unassignment; stationless records can only release their
    /// employee. Assigned records are then paired off at random into swap
    /// moves, and the whole buffer is shuffled so evaluation order never
    /// favors low record indexes.
    fn collect_moves(&self, scope: &mut SolverScope, moves: &mut Vec<Move>) {
        moves.clear();
        let mut assigned: Vec<usize> = Vec::new();

        let schedule = scope.working_solution();
        let employee_count = schedule.employees.len();
        for (index, rec) in schedule.records.iter().enumerate() {
            if rec.provenance.is_pinned() {
                continue;
            }
            match (rec.employee, rec.station) {
                (current, Some(station)) => {
                    for e in 0..employee_count {
                        let employee = EmployeeId(e);
                        if current == Some(employee) {
                            continue;
                        }
                        moves.push(Move::Reassign {
                            record: index,
                            employee: Some(employee),
                            station: Some(station),
                        });
                    }
                    if current.is_some() {
                        moves.push(Move::Reassign {
                            record: index,
                            employee: None,
                            station: Some(station),
                        });
                        assigned.push(index);
                    }
                }
                (Some(_), None) => {
                    moves.push(Move::Reassign {
                        record: index,
                        employee: None,
                        station: None,
                    });
                }
                (None, None) => {}
            }
        }

        assigned.shuffle(scope.rng());
        for pair in assigned.chunks_exact(2) {
            moves.push(Move::Swap {
                first: pair[0],
                second: pair[1],
            });
        }
        moves.shuffle(scope.rng());
    }
}
