use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{DepartError, Result};
use crate::estimator::{ModelDims, ModelFactory, Task};

use super::activation::ActivationRegistry;
use super::init::Initializer;
use super::loss::Loss;
use super::network::{Monitor, Network};
use super::optim::OptimizerKind;

const HIDDEN_LAYERS: usize = 3;

/// Configuration of the fixed three-hidden-layer network.
///
/// The first hidden layer uses `initializer`; the later layers use `normal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub initializer: String,
    pub optimizer: String,
    /// Defaults to `categorical_crossentropy` / `mse` depending on the task.
    pub loss: Option<String>,
    pub activations: Vec<String>,
    pub dropout: Vec<f64>,
    pub neurons: Vec<usize>,
    /// Defaults to 0.001 for regression, the optimizer default otherwise.
    pub learning_rate: Option<f64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            initializer: "normal".to_string(),
            optimizer: "adam".to_string(),
            loss: None,
            activations: vec!["relu".into(), "tanh".into(), "relu".into()],
            dropout: vec![0.0; HIDDEN_LAYERS],
            neurons: vec![50, 40, 35],
            learning_rate: None,
        }
    }
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        for (field, len) in [
            ("activations", self.activations.len()),
            ("dropout", self.dropout.len()),
            ("neurons", self.neurons.len()),
        ] {
            if len != HIDDEN_LAYERS {
                return Err(DepartError::Config(format!(
                    "{field} needs {HIDDEN_LAYERS} entries, got {len}"
                )));
            }
        }
        Ok(())
    }

    /// Softmax classifier with `dims.output` classes.
    pub fn build_classifier(&self, registry: &ActivationRegistry, dims: ModelDims, seed: u64) -> Result<Network> {
        let loss = self.loss.as_deref().unwrap_or("categorical_crossentropy");
        let optimizer = OptimizerKind::from_name(&self.optimizer, self.learning_rate)?;
        self.build(registry, dims, seed, loss, optimizer, Monitor::Accuracy, "softmax", dims.output)
    }

    /// Single-output regressor with a relu output unit.
    pub fn build_regressor(&self, registry: &ActivationRegistry, dims: ModelDims, seed: u64) -> Result<Network> {
        let loss = self.loss.as_deref().unwrap_or("mse");
        let optimizer = OptimizerKind::from_name(&self.optimizer, Some(self.learning_rate.unwrap_or(0.001)))?;
        self.build(registry, dims, seed, loss, optimizer, Monitor::MeanSquaredError, "relu", 1)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        registry: &ActivationRegistry,
        dims: ModelDims,
        seed: u64,
        loss: &str,
        optimizer: OptimizerKind,
        monitor: Monitor,
        output_activation: &str,
        output_units: usize,
    ) -> Result<Network> {
        self.validate()?;
        if dims.input == 0 {
            return Err(DepartError::Config("network needs at least one input feature".into()));
        }
        let first_init: Initializer = self.initializer.parse()?;
        let loss: Loss = loss.parse()?;

        let mut net = Network::new(dims.input, loss, optimizer, monitor, seed);
        for layer in 0..HIDDEN_LAYERS {
            let name = &self.activations[layer];
            let init = if layer == 0 { first_init } else { Initializer::Normal };
            net.add_dense(self.neurons[layer], name, registry.get(name)?, init)?;
            net.add_dropout(self.dropout[layer])?;
        }
        net.add_dense(
            output_units,
            output_activation,
            registry.get(output_activation)?,
            Initializer::Normal,
        )?;
        debug!("built network (seed {seed}):\n{}", net.summary());
        Ok(net)
    }
}

/// [`ModelFactory`] producing classifier or regressor networks.
#[derive(Debug, Clone)]
pub struct NeuralFactory {
    pub config: NetworkConfig,
    pub task: Task,
    pub registry: ActivationRegistry,
}

impl NeuralFactory {
    pub fn classifier(config: NetworkConfig, registry: ActivationRegistry) -> Self {
        Self {
            config,
            task: Task::Classification,
            registry,
        }
    }

    pub fn regressor(config: NetworkConfig, registry: ActivationRegistry) -> Self {
        Self {
            config,
            task: Task::Regression,
            registry,
        }
    }
}

impl ModelFactory for NeuralFactory {
    type Model = Network;

    fn task(&self) -> Task {
        self.task
    }

    fn build(&self, dims: ModelDims, seed: u64) -> Result<Network> {
        match self.task {
            Task::Classification => self.config.build_classifier(&self.registry, dims, seed),
            Task::Regression => self.config.build_regressor(&self.registry, dims, seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::network::Layer;

    fn dims() -> ModelDims {
        ModelDims { input: 12, output: 5 }
    }

    #[test]
    fn classifier_has_fixed_topology() {
        let net = NetworkConfig::default()
            .build_classifier(&ActivationRegistry::default(), dims(), 0)
            .unwrap();
        let dense: Vec<(usize, &str)> = net
            .layers()
            .iter()
            .filter_map(|l| match l {
                Layer::Dense(d) => Some((d.bias.len(), d.activation_name.as_str())),
                Layer::Dropout { .. } => None,
            })
            .collect();
        assert_eq!(
            dense,
            vec![(50, "relu"), (40, "tanh"), (35, "relu"), (5, "softmax")]
        );
        assert_eq!(net.layers().len(), 7);
    }

    #[test]
    fn regressor_has_single_relu_output() {
        let cfg = NetworkConfig {
            neurons: vec![8, 4, 2],
            ..NetworkConfig::default()
        };
        let net = cfg
            .build_regressor(&ActivationRegistry::default(), dims(), 0)
            .unwrap();
        assert_eq!(net.output_dim(), 1);
        assert_eq!(net.input_dim(), 12);
    }

    #[test]
    fn swish_can_be_used_by_name() {
        let cfg = NetworkConfig {
            activations: vec!["swish".into(), "swish".into(), "tanh".into()],
            ..NetworkConfig::default()
        };
        assert!(cfg
            .build_classifier(&ActivationRegistry::default(), dims(), 0)
            .is_ok());
    }

    #[test]
    fn bad_configuration_is_rejected() {
        let reg = ActivationRegistry::default();
        let short = NetworkConfig {
            dropout: vec![0.1],
            ..NetworkConfig::default()
        };
        assert!(matches!(
            short.build_classifier(&reg, dims(), 0),
            Err(DepartError::Config(_))
        ));

        let unknown = NetworkConfig {
            activations: vec!["relu".into(), "gelu".into(), "relu".into()],
            ..NetworkConfig::default()
        };
        assert!(matches!(
            unknown.build_classifier(&reg, dims(), 0),
            Err(DepartError::UnknownActivation(_))
        ));
    }

    #[test]
    fn summary_of_built_classifier_counts_parameters() {
        let net = NetworkConfig::default()
            .build_classifier(&ActivationRegistry::default(), dims(), 0)
            .unwrap();
        let summary = net.summary();
        assert_eq!(summary.lines().filter(|l| l.starts_with("dense")).count(), 4);
        assert_eq!(summary.lines().filter(|l| l.starts_with("dropout")).count(), 3);
        let params = 12 * 50 + 50 + 50 * 40 + 40 + 40 * 35 + 35 + 35 * 5 + 5;
        assert!(summary.ends_with(&format!("trainable parameters: {params}")));
    }

    #[test]
    fn factory_dispatches_on_task() {
        let factory = NeuralFactory::regressor(NetworkConfig::default(), ActivationRegistry::default());
        assert_eq!(factory.task(), Task::Regression);
        assert_eq!(factory.build(dims(), 3).unwrap().output_dim(), 1);
    }
}
