//! Recurrent neural controller for NeuroBlob agents.
//!
//! The controller is a single dense weight matrix over a flat neuron vector
//! laid out as `[bias, inputs.., hidden.., outputs..]`. Hidden and output
//! neurons (the recurrent block) are rewritten each step from a tanh of the
//! matrix product with the full previous state, so the controller carries
//! memory across ticks. The same matrix is the substrate for generational
//! mutation and optional reward-modulated Hebbian updates.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by controller stepping and persistence.
#[derive(Debug, Error)]
pub enum BrainError {
    /// The perception vector handed to [`NeuroBlob::step`] has the wrong
    /// length for the controller's topology.
    #[error("controller expected {expected} inputs, got {actual}")]
    InputSize { expected: usize, actual: usize },
    /// A persisted record does not match the requested topology.
    #[error("persisted {field} has {actual} entries, topology requires {expected}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed controller record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Neuron-count layout of a controller.
///
/// Index 0 of the state vector is a bias neuron pinned at 1.0, followed by
/// the input block, then the recurrent block (hidden neurons first, output
/// neurons last). Only the recurrent block has incoming weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobTopology {
    pub n_input: usize,
    pub n_hidden: usize,
    pub n_output: usize,
    /// When false, recurrent neurons get no weight onto themselves.
    pub self_connections: bool,
}

impl BlobTopology {
    #[must_use]
    pub const fn new(n_input: usize, n_hidden: usize, n_output: usize) -> Self {
        Self {
            n_input,
            n_hidden,
            n_output,
            self_connections: true,
        }
    }

    /// Neurons that are rewritten every step.
    #[must_use]
    pub const fn n_recurrent(&self) -> usize {
        self.n_hidden + self.n_output
    }

    /// Total state width including the bias neuron.
    #[must_use]
    pub const fn n_neurons(&self) -> usize {
        1 + self.n_input + self.n_recurrent()
    }

    #[must_use]
    pub const fn input_start(&self) -> usize {
        1
    }

    #[must_use]
    pub const fn hidden_start(&self) -> usize {
        1 + self.n_input
    }

    #[must_use]
    pub const fn output_start(&self) -> usize {
        1 + self.n_input + self.n_hidden
    }
}

/// Persisted controller record. The weight matrix is stored row-per-recurrent
/// -neuron so files stay readable and shape errors stay detectable.
#[derive(Serialize, Deserialize)]
struct ControllerRecord {
    #[serde(rename = "W")]
    w: Vec<Vec<f32>>,
    state: Vec<f32>,
}

/// Dense recurrent controller.
///
/// Weights are stored row-major, one row of `n_neurons` incoming weights per
/// recurrent neuron, every entry clamped to `[-1, 1]` by every mutation path.
#[derive(Debug, Clone)]
pub struct NeuroBlob {
    topology: BlobTopology,
    weights: Vec<f32>,
    state: Vec<f32>,
    scratch: Vec<f32>,
}

impl NeuroBlob {
    /// Controller with uniformly random weights in `[-1, 1)`.
    #[must_use]
    pub fn random(topology: BlobTopology, rng: &mut dyn RngCore) -> Self {
        let n_neurons = topology.n_neurons();
        let n_recurrent = topology.n_recurrent();
        let mut weights = Vec::with_capacity(n_recurrent * n_neurons);
        for _ in 0..n_recurrent * n_neurons {
            weights.push(rng.random_range(-1.0..1.0));
        }
        if !topology.self_connections {
            let hidden_start = topology.hidden_start();
            for row in 0..n_recurrent {
                weights[row * n_neurons + hidden_start + row] = 0.0;
            }
        }
        Self::from_parts(topology, weights)
    }

    /// Controller with every weight at zero; it holds still and emits zeros.
    #[must_use]
    pub fn zeroed(topology: BlobTopology) -> Self {
        let len = topology.n_recurrent() * topology.n_neurons();
        Self::from_parts(topology, vec![0.0; len])
    }

    fn from_parts(topology: BlobTopology, weights: Vec<f32>) -> Self {
        let mut state = vec![0.0; topology.n_neurons()];
        state[0] = 1.0;
        Self {
            topology,
            weights,
            state,
            scratch: vec![0.0; topology.n_recurrent()],
        }
    }

    #[must_use]
    pub const fn topology(&self) -> BlobTopology {
        self.topology
    }

    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    #[must_use]
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    /// Writes `inputs` into the input block, then recomputes the recurrent
    /// block `steps` times. Each pass multiplies the full previous state by
    /// the weight matrix and squashes the result through tanh, so bias and
    /// input neurons are never overwritten. Returns the output slice.
    pub fn step(&mut self, inputs: &[f32], steps: usize) -> Result<&[f32], BrainError> {
        if inputs.len() != self.topology.n_input {
            return Err(BrainError::InputSize {
                expected: self.topology.n_input,
                actual: inputs.len(),
            });
        }
        let n_neurons = self.topology.n_neurons();
        let n_recurrent = self.topology.n_recurrent();
        let hidden_start = self.topology.hidden_start();
        self.state[self.topology.input_start()..hidden_start].copy_from_slice(inputs);
        if self.scratch.len() != n_recurrent {
            self.scratch.resize(n_recurrent, 0.0);
        }
        for _ in 0..steps {
            for row in 0..n_recurrent {
                let incoming = &self.weights[row * n_neurons..(row + 1) * n_neurons];
                let mut sum = 0.0;
                for (weight, value) in incoming.iter().zip(&self.state) {
                    sum += weight * value;
                }
                self.scratch[row] = sum;
            }
            for (slot, sum) in self.state[hidden_start..].iter_mut().zip(&self.scratch) {
                *slot = sum.tanh();
            }
        }
        Ok(&self.state[self.topology.output_start()..])
    }

    /// Perturbs each weight with probability `rate` by a uniform draw in
    /// `[-scale, scale)`, clamped back into `[-1, 1]`.
    pub fn mutate(&mut self, rng: &mut dyn RngCore, rate: f32, scale: f32) {
        if rate <= 0.0 || scale <= 0.0 {
            return;
        }
        for weight in &mut self.weights {
            if rng.random::<f32>() < rate {
                *weight = (*weight + rng.random_range(-scale..scale)).clamp(-1.0, 1.0);
            }
        }
    }

    /// Reward-modulated Hebbian update: each incoming weight of a recurrent
    /// neuron moves by `learning_rate * reward * post * pre`, where `post` is
    /// the neuron's activation and `pre` the source neuron's.
    pub fn learn(&mut self, reward: f32, learning_rate: f32) {
        let gain = learning_rate * reward;
        if gain == 0.0 {
            return;
        }
        let n_neurons = self.topology.n_neurons();
        let hidden_start = self.topology.hidden_start();
        for row in 0..self.topology.n_recurrent() {
            let post = self.state[hidden_start + row];
            let incoming = &mut self.weights[row * n_neurons..(row + 1) * n_neurons];
            for (weight, pre) in incoming.iter_mut().zip(&self.state) {
                *weight = (*weight + gain * post * pre).clamp(-1.0, 1.0);
            }
        }
    }

    /// Scales every weight toward zero, keeping the `[-1, 1]` bound.
    pub fn decay(&mut self, factor: f32) {
        for weight in &mut self.weights {
            *weight = (*weight * factor).clamp(-1.0, 1.0);
        }
    }

    /// Writes the controller as a JSON record of the weight matrix and the
    /// live state vector.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BrainError> {
        let n_neurons = self.topology.n_neurons();
        let record = ControllerRecord {
            w: self
                .weights
                .chunks(n_neurons)
                .map(<[f32]>::to_vec)
                .collect(),
            state: self.state.clone(),
        };
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &record)?;
        Ok(())
    }

    /// Reads a controller saved by [`NeuroBlob::save`], validating every
    /// dimension against `topology` before accepting it. The bias neuron is
    /// re-pinned to 1.0 whatever the file says.
    pub fn load(topology: BlobTopology, path: impl AsRef<Path>) -> Result<Self, BrainError> {
        let file = File::open(path)?;
        let record: ControllerRecord = serde_json::from_reader(BufReader::new(file))?;
        let n_neurons = topology.n_neurons();
        let n_recurrent = topology.n_recurrent();
        if record.w.len() != n_recurrent {
            return Err(BrainError::ShapeMismatch {
                field: "weight rows",
                expected: n_recurrent,
                actual: record.w.len(),
            });
        }
        for row in &record.w {
            if row.len() != n_neurons {
                return Err(BrainError::ShapeMismatch {
                    field: "weight columns",
                    expected: n_neurons,
                    actual: row.len(),
                });
            }
        }
        if record.state.len() != n_neurons {
            return Err(BrainError::ShapeMismatch {
                field: "state",
                expected: n_neurons,
                actual: record.state.len(),
            });
        }
        let mut weights = Vec::with_capacity(n_recurrent * n_neurons);
        for row in record.w {
            weights.extend(row);
        }
        let mut state = record.state;
        state[0] = 1.0;
        Ok(Self {
            topology,
            weights,
            state,
            scratch: vec![0.0; n_recurrent],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn small_topology() -> BlobTopology {
        BlobTopology::new(2, 2, 1)
    }

    #[test]
    fn topology_block_layout() {
        let topology = small_topology();
        assert_eq!(topology.n_recurrent(), 3);
        assert_eq!(topology.n_neurons(), 6);
        assert_eq!(topology.input_start(), 1);
        assert_eq!(topology.hidden_start(), 3);
        assert_eq!(topology.output_start(), 5);
    }

    #[test]
    fn zeroed_controller_emits_zeros_and_keeps_bias() {
        let mut brain = NeuroBlob::zeroed(small_topology());
        let outputs = brain.step(&[0.4, -0.7], 1).expect("step");
        assert_eq!(outputs, &[0.0]);
        assert_eq!(brain.state()[0], 1.0);
        assert_eq!(brain.state()[1..3], [0.4, -0.7]);
    }

    #[test]
    fn bias_column_drives_outputs() {
        let topology = small_topology();
        let mut brain = NeuroBlob::zeroed(topology);
        let output_row = topology.n_hidden;
        brain.weights_mut()[output_row * topology.n_neurons()] = 0.5;
        let outputs = brain.step(&[0.0, 0.0], 1).expect("step");
        assert!((outputs[0] - 0.5_f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn recurrent_state_carries_across_steps() {
        let topology = BlobTopology::new(1, 1, 1);
        let n = topology.n_neurons();
        let mut brain = NeuroBlob::zeroed(topology);
        // Hidden neuron reads the bias, output neuron reads the hidden one.
        brain.weights_mut()[0] = 1.0;
        brain.weights_mut()[n + topology.hidden_start()] = 1.0;

        let first = brain.step(&[0.0], 1).expect("step")[0];
        assert_eq!(first, 0.0);
        let second = brain.step(&[0.0], 1).expect("step")[0];
        let expected = 1.0_f32.tanh().tanh();
        assert!((second - expected).abs() < 1e-6);
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let mut brain = NeuroBlob::zeroed(small_topology());
        let err = brain.step(&[1.0], 1).expect_err("short input must fail");
        assert!(matches!(
            err,
            BrainError::InputSize {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn mutation_respects_weight_bounds() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut brain = NeuroBlob::random(small_topology(), &mut rng);
        let before = brain.weights().to_vec();
        brain.mutate(&mut rng, 1.0, 10.0);
        assert!(brain.weights().iter().all(|w| (-1.0..=1.0).contains(w)));
        assert_ne!(before, brain.weights());
    }

    #[test]
    fn zero_rate_mutation_is_identity() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut brain = NeuroBlob::random(small_topology(), &mut rng);
        let before = brain.weights().to_vec();
        brain.mutate(&mut rng, 0.0, 0.5);
        assert_eq!(before, brain.weights());
    }

    #[test]
    fn self_connections_can_be_disabled() {
        let mut topology = small_topology();
        topology.self_connections = false;
        let mut rng = SmallRng::seed_from_u64(3);
        let brain = NeuroBlob::random(topology, &mut rng);
        let n = topology.n_neurons();
        for row in 0..topology.n_recurrent() {
            assert_eq!(brain.weights()[row * n + topology.hidden_start() + row], 0.0);
        }
    }

    #[test]
    fn hebbian_update_follows_activity_product() {
        let mut rng = SmallRng::seed_from_u64(21);
        let mut brain = NeuroBlob::random(small_topology(), &mut rng);
        brain.step(&[0.8, -0.3], 1).expect("step");
        let before = brain.weights().to_vec();
        let state = brain.state().to_vec();

        let learning_rate = 0.05;
        let reward = 2.0;
        brain.learn(reward, learning_rate);

        let topology = brain.topology();
        let n = topology.n_neurons();
        for row in 0..topology.n_recurrent() {
            let post = state[topology.hidden_start() + row];
            for col in 0..n {
                let expected =
                    (before[row * n + col] + learning_rate * reward * post * state[col])
                        .clamp(-1.0, 1.0);
                assert!((brain.weights()[row * n + col] - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn zero_reward_learning_is_identity() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut brain = NeuroBlob::random(small_topology(), &mut rng);
        brain.step(&[0.5, 0.5], 1).expect("step");
        let before = brain.weights().to_vec();
        brain.learn(0.0, 0.1);
        assert_eq!(before, brain.weights());
    }

    #[test]
    fn decay_shrinks_weights_toward_zero() {
        let mut rng = SmallRng::seed_from_u64(13);
        let mut brain = NeuroBlob::random(small_topology(), &mut rng);
        let before = brain.weights().to_vec();
        brain.decay(0.5);
        for (after, original) in brain.weights().iter().zip(&before) {
            assert!((after - original * 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("controller.json");
        let mut rng = SmallRng::seed_from_u64(42);
        let mut brain = NeuroBlob::random(small_topology(), &mut rng);
        brain.step(&[0.2, 0.9], 3).expect("step");
        brain.save(&path).expect("save");

        let loaded = NeuroBlob::load(small_topology(), &path).expect("load");
        assert_eq!(brain.weights(), loaded.weights());
        assert_eq!(brain.state(), loaded.state());
    }

    #[test]
    fn load_rejects_mismatched_topology() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("controller.json");
        let mut rng = SmallRng::seed_from_u64(9);
        let brain = NeuroBlob::random(small_topology(), &mut rng);
        brain.save(&path).expect("save");

        let err = NeuroBlob::load(BlobTopology::new(3, 2, 1), &path)
            .expect_err("wider topology must be rejected");
        assert!(matches!(err, BrainError::ShapeMismatch { .. }));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("controller.json");
        std::fs::write(&path, b"{ not json").expect("write");
        let err = NeuroBlob::load(small_topology(), &path).expect_err("junk must fail");
        assert!(matches!(err, BrainError::Json(_)));
    }

    #[test]
    fn load_repins_bias_neuron() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("controller.json");
        let topology = BlobTopology::new(1, 1, 1);
        let record = serde_json::json!({
            "W": [[0.1, 0.1, 0.1, 0.1], [0.1, 0.1, 0.1, 0.1]],
            "state": [0.0, 0.5, 0.5, 0.5],
        });
        std::fs::write(&path, record.to_string()).expect("write");
        let brain = NeuroBlob::load(topology, &path).expect("load");
        assert_eq!(brain.state()[0], 1.0);
    }
}
