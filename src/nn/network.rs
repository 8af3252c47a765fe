use std::fmt::Write as _;

use log::debug;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::data::argmax_rows;
use crate::error::{DepartError, Result};
use crate::estimator::{Estimator, FitOptions, History};

use super::activation::Activation;
use super::init::Initializer;
use super::loss::Loss;
use super::optim::{Optimizer, OptimizerKind};

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// Fully-connected layer: `activation(x · W + b)`.
#[derive(Debug, Clone)]
pub struct Dense {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
    pub activation: Activation,
    pub activation_name: String,
}

#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    /// Inverted dropout, active during training only.
    Dropout { rate: f64 },
}

/// Values kept from the forward pass for back-propagation.
enum Trace {
    Dense {
        input: Array2<f64>,
        z: Array2<f64>,
        output: Array2<f64>,
    },
    Dropout {
        mask: Option<Array2<f64>>,
    },
}

/// Metric reported per epoch next to the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monitor {
    Accuracy,
    MeanSquaredError,
}

impl Monitor {
    pub fn name(&self) -> &'static str {
        match self {
            Monitor::Accuracy => "accuracy",
            Monitor::MeanSquaredError => "mse",
        }
    }

    fn score(&self, pred: &Array2<f64>, target: &Array2<f64>) -> f64 {
        match self {
            Monitor::Accuracy => {
                let hits = argmax_rows(pred.view())
                    .into_iter()
                    .zip(argmax_rows(target.view()))
                    .filter(|(p, t)| p == t)
                    .count();
                hits as f64 / pred.nrows().max(1) as f64
            }
            Monitor::MeanSquaredError => Loss::MeanSquaredError.value(pred, target),
        }
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Sequential stack of dense and dropout layers trained by mini-batch
/// gradient descent.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    input_dim: usize,
    loss: Loss,
    optimizer: Optimizer,
    monitor: Monitor,
    rng: StdRng,
}

impl Network {
    pub fn new(input_dim: usize, loss: Loss, optimizer: OptimizerKind, monitor: Monitor, seed: u64) -> Self {
        Self {
            layers: Vec::new(),
            input_dim,
            loss,
            optimizer: Optimizer::new(optimizer),
            monitor,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Width of the last dense layer (the input width while empty).
    pub fn output_dim(&self) -> usize {
        self.layers
            .iter()
            .rev()
            .find_map(|l| match l {
                Layer::Dense(d) => Some(d.bias.len()),
                Layer::Dropout { .. } => None,
            })
            .unwrap_or(self.input_dim)
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn add_dense(&mut self, units: usize, activation_name: &str, activation: Activation, init: Initializer) -> Result<()> {
        if units == 0 {
            return Err(DepartError::Config("dense layer needs at least one unit".into()));
        }
        let fan_in = self.output_dim();
        let weights = init.kernel(fan_in, units, &mut self.rng);
        self.layers.push(Layer::Dense(Dense {
            weights,
            bias: Array1::zeros(units),
            activation,
            activation_name: activation_name.to_string(),
        }));
        Ok(())
    }

    pub fn add_dropout(&mut self, rate: f64) -> Result<()> {
        if !(0.0..1.0).contains(&rate) {
            return Err(DepartError::Config(format!("dropout rate {rate} outside [0, 1)")));
        }
        self.layers.push(Layer::Dropout { rate });
        Ok(())
    }

    /// Total trainable parameter count.
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| match l {
                Layer::Dense(d) => d.weights.len() + d.bias.len(),
                Layer::Dropout { .. } => 0,
            })
            .sum()
    }

    /// Human-readable layer listing.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<10} {:>8} {:>12} {:>10}", "layer", "units", "activation", "params");
        for layer in &self.layers {
            let _ = match layer {
                Layer::Dense(d) => writeln!(
                    out,
                    "{:<10} {:>8} {:>12} {:>10}",
                    "dense",
                    d.bias.len(),
                    d.activation_name,
                    d.weights.len() + d.bias.len()
                ),
                Layer::Dropout { rate } => writeln!(out, "{:<10} {:>8} {:>12} {:>10}", "dropout", "", format!("{rate}"), 0),
            };
        }
        let _ = write!(out, "trainable parameters: {}", self.parameter_count());
        out
    }

    /// Inference pass (dropout disabled).
    pub fn forward(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut a = x.to_owned();
        for layer in &self.layers {
            if let Layer::Dense(d) = layer {
                let z = a.dot(&d.weights) + &d.bias;
                a = d.activation.apply(&z);
            }
        }
        a
    }

    fn forward_train(&mut self, x: Array2<f64>) -> (Array2<f64>, Vec<Trace>) {
        let mut traces = Vec::with_capacity(self.layers.len());
        let mut a = x;
        for layer in &self.layers {
            match layer {
                Layer::Dense(d) => {
                    let z = a.dot(&d.weights) + &d.bias;
                    let output = d.activation.apply(&z);
                    traces.push(Trace::Dense {
                        input: a,
                        z,
                        output: output.clone(),
                    });
                    a = output;
                }
                Layer::Dropout { rate } if *rate > 0.0 => {
                    let keep = 1.0 - rate;
                    let rng = &mut self.rng;
                    let mask = Array2::from_shape_fn(a.raw_dim(), |_| {
                        if rng.gen::<f64>() < keep {
                            1.0 / keep
                        } else {
                            0.0
                        }
                    });
                    a = a * &mask;
                    traces.push(Trace::Dropout { mask: Some(mask) });
                }
                Layer::Dropout { .. } => traces.push(Trace::Dropout { mask: None }),
            }
        }
        (a, traces)
    }

    /// One forward/backward/update step. Returns the batch output.
    fn train_batch(&mut self, x: Array2<f64>, y: &Array2<f64>) -> Array2<f64> {
        let (output, traces) = self.forward_train(x);
        let mut grad = self.loss.gradient(&output, y);

        let mut updates: Vec<(usize, Array2<f64>, Array1<f64>)> = Vec::new();
        for (idx, (layer, trace)) in self.layers.iter().zip(traces.iter()).enumerate().rev() {
            match (layer, trace) {
                (Layer::Dense(d), Trace::Dense { input, z, output }) => {
                    let grad_z = d.activation.backward(z, output, &grad);
                    let grad_w = input.t().dot(&grad_z);
                    let grad_b = grad_z.sum_axis(Axis(0));
                    grad = grad_z.dot(&d.weights.t());
                    updates.push((idx, grad_w, grad_b));
                }
                (Layer::Dropout { .. }, Trace::Dropout { mask: Some(mask) }) => {
                    grad = grad * mask;
                }
                _ => {}
            }
        }

        self.optimizer.begin_step();
        for (idx, grad_w, grad_b) in updates {
            if let Layer::Dense(d) = &mut self.layers[idx] {
                self.optimizer.update(2 * idx, &mut d.weights, &grad_w);
                self.optimizer.update(2 * idx + 1, &mut d.bias, &grad_b);
            }
        }
        output
    }

    fn check_input(&self, x: &ArrayView2<f64>) -> Result<()> {
        if x.ncols() != self.input_dim {
            return Err(DepartError::Shape(format!(
                "network expects {} input columns, got {}",
                self.input_dim,
                x.ncols()
            )));
        }
        Ok(())
    }
}

impl Estimator for Network {
    fn fit(&mut self, features: ArrayView2<f64>, targets: ArrayView2<f64>, opts: &FitOptions) -> Result<History> {
        self.check_input(&features)?;
        if targets.ncols() != self.output_dim() {
            return Err(DepartError::Shape(format!(
                "network has {} outputs, targets have {} columns",
                self.output_dim(),
                targets.ncols()
            )));
        }
        if features.nrows() != targets.nrows() || features.nrows() == 0 {
            return Err(DepartError::Shape(format!(
                "{} feature rows for {} target rows",
                features.nrows(),
                targets.nrows()
            )));
        }
        if opts.batch_size == 0 {
            return Err(DepartError::Config("batch size must be positive".into()));
        }

        let n = features.nrows();
        let mut order: Vec<usize> = (0..n).collect();
        let mut history = History::new(self.monitor.name());

        for epoch in 1..=opts.epochs {
            if opts.shuffle {
                order.shuffle(&mut self.rng);
            }
            let mut loss_sum = 0.0;
            let mut metric_sum = 0.0;
            for batch in order.chunks(opts.batch_size) {
                let xb = features.select(Axis(0), batch);
                let yb = targets.select(Axis(0), batch);
                let output = self.train_batch(xb, &yb);
                let weight = batch.len() as f64;
                loss_sum += self.loss.value(&output, &yb) * weight;
                metric_sum += self.monitor.score(&output, &yb) * weight;
            }
            let loss = loss_sum / n as f64;
            let metric = metric_sum / n as f64;
            if !loss.is_finite() {
                return Err(DepartError::Diverged(epoch));
            }
            debug!("epoch {epoch}/{}: loss={loss:.5} {}={metric:.5}", opts.epochs, self.monitor.name());
            history.push(loss, metric);
        }
        Ok(history)
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_input(&features)?;
        Ok(self.forward(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::ActivationRegistry;
    use ndarray::array;

    fn two_class_net(seed: u64) -> Network {
        let reg = ActivationRegistry::with_builtins();
        let mut net = Network::new(
            2,
            Loss::CategoricalCrossentropy,
            OptimizerKind::from_name("adam", Some(0.05)).unwrap(),
            Monitor::Accuracy,
            seed,
        );
        net.add_dense(8, "tanh", reg.get("tanh").unwrap(), Initializer::GlorotUniform)
            .unwrap();
        net.add_dropout(0.0).unwrap();
        net.add_dense(2, "softmax", reg.get("softmax").unwrap(), Initializer::GlorotUniform)
            .unwrap();
        net
    }

    #[test]
    fn training_reduces_loss_on_separable_data() {
        let x = array![[0.0, 0.0], [0.1, 0.2], [0.9, 1.0], [1.0, 0.8], [0.2, 0.1], [0.8, 0.9]];
        let y = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let mut net = two_class_net(7);
        let opts = FitOptions {
            epochs: 200,
            batch_size: 3,
            shuffle: true,
        };
        let history = net.fit(x.view(), y.view(), &opts).unwrap();

        let first = history.records[0].loss;
        let last = history.final_loss().unwrap();
        assert!(last < first * 0.5, "loss went from {first} to {last}");

        let pred = net.predict(x.view()).unwrap();
        assert_eq!(argmax_rows(pred.view()), argmax_rows(y.view()));
    }

    #[test]
    fn input_width_is_checked() {
        let net = two_class_net(1);
        assert!(matches!(
            net.predict(array![[1.0, 2.0, 3.0]].view()),
            Err(DepartError::Shape(_))
        ));
    }

    #[test]
    fn invalid_dropout_is_rejected() {
        let mut net = two_class_net(1);
        assert!(net.add_dropout(1.0).is_err());
    }

    #[test]
    fn summary_lists_layers() {
        let net = two_class_net(1);
        let summary = net.summary();
        assert!(summary.contains("softmax"));
        assert_eq!(net.parameter_count(), 2 * 8 + 8 + 8 * 2 + 2);
    }
}
