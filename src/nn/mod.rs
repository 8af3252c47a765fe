//! Compact dense-network backend built on `ndarray`.
//!
//! ```text
//!  NetworkConfig ──► factory ──► Network (Dense / Dropout layers)
//!                      ▲                 │ fit: mini-batch backprop
//!  ActivationRegistry ─┘                 ▼ predict: inference pass
//! ```

pub mod activation;
pub mod factory;
pub mod init;
pub mod loss;
pub mod network;
pub mod optim;

pub use activation::{Activation, ActivationRegistry};
pub use factory::{NetworkConfig, NeuralFactory};
pub use init::Initializer;
pub use loss::Loss;
pub use network::{Layer, Monitor, Network};
pub use optim::OptimizerKind;
