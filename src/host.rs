//! Host-facing simulator handle
//!
//! Wraps the shared simulator for a front end (dashboard, logger, CLI). Steps can be
//! run inline or dispatched onto a blocking worker so an async caller's thread is
//! never held for the duration of a step.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::error::SimError;
use crate::plant::{PlantSimulator, PlantSnapshot, StepInputs};

/// Upper bound on physics steps run for one real-time tick
pub const MAX_STEPS_PER_TICK: usize = 1000;

/// Response for a stepping request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub snapshot: Arc<PlantSnapshot>,
    pub steps_run: usize,
}

/// Real-time stepping request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeRequest {
    /// Wall-clock seconds since the previous tick
    pub delta_real_time: f64,
    /// Simulated seconds per wall-clock second
    pub time_speed: f64,
}

/// Shared simulator plus the fractional-time accumulator for real-time stepping.
#[derive(Clone)]
pub struct SimulatorHandle {
    pub simulator: Arc<PlantSimulator>,
    accumulated_hr: Arc<Mutex<f64>>,
}

impl SimulatorHandle {
    pub fn new(simulator: PlantSimulator) -> Self {
        Self::from_shared(Arc::new(simulator))
    }

    pub fn from_shared(simulator: Arc<PlantSimulator>) -> Self {
        Self {
            simulator,
            accumulated_hr: Arc::new(Mutex::new(0.0)),
        }
    }

    /// Get the latest published snapshot
    pub fn get_snapshot(&self) -> Arc<PlantSnapshot> {
        self.simulator.get_snapshot()
    }

    /// Perform one simulation step on the caller's thread
    pub fn simulation_step(&self, inputs: &StepInputs) -> Result<SimulationResponse, SimError> {
        let snapshot = self.simulator.step(inputs)?;
        Ok(SimulationResponse { snapshot, steps_run: 1 })
    }

    /// Run a fixed number of steps with constant inputs
    pub fn simulation_run(
        &self,
        inputs: &StepInputs,
        steps: usize,
    ) -> Result<SimulationResponse, SimError> {
        let mut snapshot = self.simulator.get_snapshot();
        for _ in 0..steps {
            snapshot = self.simulator.step(inputs)?;
        }
        Ok(SimulationResponse { snapshot, steps_run: steps })
    }

    /// Perform one step on a blocking worker thread.
    pub async fn step_on_worker(&self, inputs: StepInputs) -> Result<SimulationResponse, SimError> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.simulation_step(&inputs))
            .await
            .map_err(|e| SimError::Worker(e.to_string()))?
    }

    /// Run `steps` steps on a blocking worker thread.
    pub async fn run_on_worker(
        &self,
        inputs: StepInputs,
        steps: usize,
    ) -> Result<SimulationResponse, SimError> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.simulation_run(&inputs, steps))
            .await
            .map_err(|e| SimError::Worker(e.to_string()))?
    }

    /// Advance by the simulated time that corresponds to `delta_real_time` at `time_speed`.
    ///
    /// Fractions of a step carry over to the next tick so slow speeds still advance.
    pub fn simulation_realtime(
        &self,
        request: RealtimeRequest,
        inputs: &StepInputs,
    ) -> Result<SimulationResponse, SimError> {
        if !(request.delta_real_time.is_finite() && request.time_speed.is_finite()) {
            return Err(SimError::InvalidInput("non-finite real-time request".to_string()));
        }
        let steps = {
            let mut accumulated = self.accumulated_hr.lock().unwrap_or_else(|p| p.into_inner());
            *accumulated += (request.delta_real_time * request.time_speed).max(0.0) / 3600.0;
            let steps = (*accumulated / inputs.dt_hr).floor() as usize;
            *accumulated -= steps as f64 * inputs.dt_hr;
            if steps > MAX_STEPS_PER_TICK {
                log::debug!("real-time tick clamped from {steps} to {MAX_STEPS_PER_TICK} steps");
                *accumulated = 0.0;
            }
            steps.min(MAX_STEPS_PER_TICK)
        };
        self.simulation_run(inputs, steps)
    }

    /// Submit a pre-solver drain adjustment for the next step
    pub fn submit_drain_adjustment(&self, mass_lbm: f64) -> Result<(), SimError> {
        self.simulator.submit_drain_adjustment(mass_lbm)
    }

    /// Reset simulation and the real-time accumulator
    pub fn reset_simulation(&self) -> Result<Arc<PlantSnapshot>, SimError> {
        self.simulator.reset()?;
        *self.accumulated_hr.lock().unwrap_or_else(|p| p.into_inner()) = 0.0;
        Ok(self.simulator.get_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::inventory::PlantRegime;
    use crate::plant::InitialConditions;

    fn handle() -> SimulatorHandle {
        let sim = PlantSimulator::new(SimConfig::default(), InitialConditions::cold_shutdown())
            .expect("sim");
        SimulatorHandle::new(sim)
    }

    fn solid_inputs() -> StepInputs {
        StepInputs {
            regime: PlantRegime::SolidPlant,
            rcs_temp_f: 150.0,
            pressure_psia: 334.7,
            rcp_count: 0,
            dt_hr: 1.0 / 3600.0,
        }
    }

    #[test]
    fn realtime_carries_fractional_steps() {
        let h = handle();
        let request = RealtimeRequest {
            delta_real_time: 0.4,
            time_speed: 1.0,
        };
        let r = h.simulation_realtime(request, &solid_inputs()).expect("tick");
        assert_eq!(r.steps_run, 0);
        let r = h.simulation_realtime(request, &solid_inputs()).expect("tick");
        assert_eq!(r.steps_run, 0);
        let r = h.simulation_realtime(request, &solid_inputs()).expect("tick");
        assert_eq!(r.steps_run, 1);
        assert_eq!(r.snapshot.step_count, 1);
    }

    #[test]
    fn realtime_caps_steps_per_tick() {
        let h = handle();
        let request = RealtimeRequest {
            delta_real_time: 1.0,
            time_speed: 5_000.0,
        };
        let r = h.simulation_realtime(request, &solid_inputs()).expect("tick");
        assert_eq!(r.steps_run, MAX_STEPS_PER_TICK);
    }

    #[tokio::test]
    async fn worker_steps_publish_snapshots() {
        let h = handle();
        let r = h.step_on_worker(solid_inputs()).await.expect("step");
        assert_eq!(r.snapshot.step_count, 1);
        let r = h.run_on_worker(solid_inputs(), 9).await.expect("run");
        assert_eq!(r.steps_run, 9);
        assert_eq!(h.get_snapshot().step_count, 10);

        let snap = h.reset_simulation().expect("reset");
        assert_eq!(snap.step_count, 0);
    }
}
