//! Named fixed/variable-timestep update loops (spec §4.10).
//!
//! New structural code: the teacher's own timer is a single free-running
//! delta clock (`foundation::time::Timer`/`Stopwatch`), generalized here
//! into a registry of independently-paced, catch-up-aware loops. Kept in
//! the teacher's idiom: plain structs, `Default` impls, builder-style
//! `with_*` setters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How a fixed-step loop handles an accumulator that has fallen behind
/// (spec §4.10).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatchupMode {
    /// Run once with `deltaTime = accumulator`, then clear it, however
    /// large it got.
    FireAndForget,
    /// Run at most once per tick, consuming one `fixedTimestep` and
    /// leaving any remainder for later ticks.
    SingleCorrectiveStep,
    /// Run as many `fixedTimestep`-sized steps as the accumulator holds.
    #[default]
    MultipleSteps,
}

/// Declarative configuration for one registered loop (spec §4.10).
#[derive(Clone, Copy, Debug)]
pub struct LoopSpec {
    /// `0` selects a variable-step loop; otherwise the fixed timestep in seconds.
    pub fixed_timestep: f64,
    /// Upper bound on one tick's clamped raw delta, guarding against a
    /// spiral of death after a long stall.
    pub max_catchup_time: f64,
    /// Catch-up behavior once the accumulator exceeds `fixed_timestep`.
    pub catchup_mode: CatchupMode,
    /// Floor applied to the clamped delta, preventing zero/negative steps.
    pub min_step: f64,
}

impl LoopSpec {
    /// A variable-step loop spec with the documented catch-up defaults.
    #[must_use]
    pub fn variable() -> Self {
        Self { fixed_timestep: 0.0, ..Self::default() }
    }

    /// A fixed-step loop spec at `hz` ticks per second.
    #[must_use]
    pub fn fixed_hz(hz: f64) -> Self {
        Self { fixed_timestep: 1.0 / hz, ..Self::default() }
    }

    /// Override the catch-up mode.
    #[must_use]
    pub fn with_catchup_mode(mut self, mode: CatchupMode) -> Self {
        self.catchup_mode = mode;
        self
    }

    /// Override the maximum catch-up time.
    #[must_use]
    pub fn with_max_catchup_time(mut self, seconds: f64) -> Self {
        self.max_catchup_time = seconds;
        self
    }
}

impl Default for LoopSpec {
    fn default() -> Self {
        Self { fixed_timestep: 0.0, max_catchup_time: 0.25, catchup_mode: CatchupMode::MultipleSteps, min_step: 1e-4 }
    }
}

/// One pending (or just-completed) execution of a loop within the current
/// `updateLoops` call, returned to the caller so it can drive whatever
/// subsystem the loop represents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopStep {
    /// Seconds this step advances simulation time by.
    pub delta_time: f64,
}

/// Live state for one registered loop: its spec, accumulator, and
/// bookkeeping counters, returned by reference via [`LoopManager::get_loop_reference`].
#[derive(Clone, Copy, Debug)]
pub struct LoopReference {
    /// The loop's static configuration.
    pub spec: LoopSpec,
    /// True if this loop executed at least once on the current tick.
    pub should_execute_this_frame: bool,
    /// The delta time of the most recent execution, `0.0` if none yet.
    pub delta_time: f64,
    /// Seconds of unconsumed simulation time (fixed-step loops only).
    pub accumulator: f64,
    /// Total number of times this loop has executed.
    pub step_count: u64,
    /// The `updateLoops` tick index this loop last executed on.
    pub last_executed_frame: u64,
}

impl LoopReference {
    fn new(spec: LoopSpec) -> Self {
        Self { spec, should_execute_this_frame: false, delta_time: 0.0, accumulator: 0.0, step_count: 0, last_executed_frame: 0 }
    }
}

/// Registry of named update loops, ticked once per `updateLoops` call
/// (spec §4.10).
#[derive(Default)]
pub struct LoopManager {
    loops: HashMap<String, LoopReference>,
    tick_index: u64,
}

impl LoopManager {
    /// An empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named loop. Replaces any existing loop with the same name.
    pub fn register(&mut self, name: impl Into<String>, spec: LoopSpec) {
        self.loops.insert(name.into(), LoopReference::new(spec));
    }

    /// Remove a named loop.
    pub fn unregister(&mut self, name: &str) {
        self.loops.remove(name);
    }

    /// Stable reference to a loop's live state, for callers that read
    /// `shouldExecuteThisFrame`/`deltaTime` after [`Self::update_loops`].
    #[must_use]
    pub fn get_loop_reference(&self, name: &str) -> Option<&LoopReference> {
        self.loops.get(name)
    }

    /// Advance every registered loop by `raw_delta` seconds, returning
    /// each loop's executed steps this tick, keyed by name (spec §4.10
    /// steps 1-4).
    pub fn update_loops(&mut self, raw_delta: f64) -> HashMap<String, Vec<LoopStep>> {
        self.tick_index += 1;
        let mut steps: HashMap<String, Vec<LoopStep>> = HashMap::new();

        for (name, reference) in &mut self.loops {
            let delta = raw_delta.clamp(reference.spec.min_step, reference.spec.max_catchup_time);
            reference.should_execute_this_frame = false;

            if reference.spec.fixed_timestep <= 0.0 {
                reference.should_execute_this_frame = true;
                reference.delta_time = delta;
                reference.step_count += 1;
                reference.last_executed_frame = self.tick_index;
                steps.entry(name.clone()).or_default().push(LoopStep { delta_time: delta });
                continue;
            }

            reference.accumulator += delta;
            let fixed = reference.spec.fixed_timestep;
            let entry = steps.entry(name.clone()).or_default();

            match reference.spec.catchup_mode {
                CatchupMode::FireAndForget => {
                    if reference.accumulator > 0.0 {
                        entry.push(LoopStep { delta_time: reference.accumulator });
                        reference.delta_time = reference.accumulator;
                        reference.accumulator = 0.0;
                        reference.should_execute_this_frame = true;
                        reference.step_count += 1;
                        reference.last_executed_frame = self.tick_index;
                    }
                }
                CatchupMode::SingleCorrectiveStep => {
                    if reference.accumulator >= fixed {
                        entry.push(LoopStep { delta_time: fixed });
                        reference.delta_time = fixed;
                        reference.accumulator -= fixed;
                        reference.should_execute_this_frame = true;
                        reference.step_count += 1;
                        reference.last_executed_frame = self.tick_index;
                    }
                }
                CatchupMode::MultipleSteps => {
                    while reference.accumulator >= fixed {
                        entry.push(LoopStep { delta_time: fixed });
                        reference.accumulator -= fixed;
                        reference.delta_time = fixed;
                        reference.should_execute_this_frame = true;
                        reference.step_count += 1;
                        reference.last_executed_frame = self.tick_index;
                    }
                }
            }
        }

        steps
    }
}
