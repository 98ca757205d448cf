//! Noise scheduler capability interface.
//!
//! Schedulers vary in which optional step parameters they consume (`eta` for
//! DDIM-style samplers, nothing for plain Euler). Rather than probing the
//! step signature at call time, each implementation declares its capabilities
//! up front and the pipeline forwards only what is accepted.

use burn::prelude::*;

/// Optional per-step parameters a scheduler may consume.
///
/// Fields the scheduler does not accept are left at their defaults by the
/// caller; implementations must ignore fields they do not understand.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOptions {
    /// DDIM-style stochasticity knob
    pub eta: f32,
}

/// Discretized timestep schedule plus the per-step math of one sampler.
///
/// The pipeline drives this strictly sequentially: each `step` output is the
/// next step's input latent.
pub trait NoiseScheduler<B: Backend> {
    /// Rebuild the timestep schedule for the given number of inference steps.
    fn set_timesteps(&mut self, num_inference_steps: usize);

    /// The current schedule, ordered from most to least noisy.
    fn timesteps(&self) -> &[f32];

    /// Scale applied to the initial noise draw.
    fn init_noise_sigma(&self) -> f32 {
        1.0
    }

    /// Number of internal sub-steps per visible step. Multistep solvers
    /// report > 1 so progress ticks fire once per solver step.
    fn order(&self) -> usize {
        1
    }

    /// Whether [`StepOptions::eta`] is consumed by this scheduler.
    fn accepts_eta(&self) -> bool {
        false
    }

    /// Per-step input scaling applied to the latent before the denoiser.
    fn scale_model_input(&self, latent: Tensor<B, 5>, timestep: f32) -> Tensor<B, 5>;

    /// Advance the diffusion recurrence by one step.
    fn step(
        &self,
        prediction: Tensor<B, 5>,
        timestep: f32,
        latent: Tensor<B, 5>,
        options: &StepOptions,
    ) -> Tensor<B, 5>;
}

/// Euler sampler over a uniform descending grid.
///
/// The forward process interpolates linearly between data and noise; the
/// model prediction is treated as a velocity and integrated with a plain
/// Euler update. Serves as the default scheduler and the test workhorse.
#[derive(Debug, Clone)]
pub struct EulerScheduler {
    num_steps: usize,
    /// Grid of `num_steps + 1` points from 1.0 down to 0.0; the schedule
    /// exposed to the loop is the first `num_steps` of these.
    grid: Vec<f32>,
    timesteps: Vec<f32>,
}

impl EulerScheduler {
    pub fn new(num_steps: usize) -> Self {
        let mut scheduler = Self {
            num_steps: 0,
            grid: Vec::new(),
            timesteps: Vec::new(),
        };
        scheduler.rebuild(num_steps);
        scheduler
    }

    fn rebuild(&mut self, num_steps: usize) {
        self.num_steps = num_steps;
        self.grid = (0..=num_steps)
            .map(|i| 1.0 - (i as f32) / (num_steps as f32))
            .collect();
        self.timesteps = self.grid[..num_steps].to_vec();
    }

    /// Index of `timestep` on the grid. Timesteps handed to `step` always
    /// originate from `timesteps()`, so the nearest grid point is exact up
    /// to float noise.
    fn position_of(&self, timestep: f32) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (i, &t) in self.grid[..self.num_steps].iter().enumerate() {
            let dist = (t - timestep).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }
}

impl Default for EulerScheduler {
    fn default() -> Self {
        Self::new(20)
    }
}

impl<B: Backend> NoiseScheduler<B> for EulerScheduler {
    fn set_timesteps(&mut self, num_inference_steps: usize) {
        self.rebuild(num_inference_steps);
    }

    fn timesteps(&self) -> &[f32] {
        &self.timesteps
    }

    fn scale_model_input(&self, latent: Tensor<B, 5>, _timestep: f32) -> Tensor<B, 5> {
        latent
    }

    fn step(
        &self,
        prediction: Tensor<B, 5>,
        timestep: f32,
        latent: Tensor<B, 5>,
        _options: &StepOptions,
    ) -> Tensor<B, 5> {
        let i = self.position_of(timestep);
        let dt = self.grid[i + 1] - self.grid[i];
        latent + prediction * dt
    }
}
