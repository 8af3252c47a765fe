use std::collections::BTreeMap;

use ndarray::{Array2, Axis, Zip};

use crate::error::{DepartError, Result};

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

/// A layer activation.
///
/// Pointwise activations carry their function and its derivative with respect
/// to the pre-activation value. Softmax is row-wise and handled separately.
#[derive(Debug, Clone, Copy)]
pub enum Activation {
    Pointwise {
        forward: fn(f64) -> f64,
        derivative: fn(f64) -> f64,
    },
    Softmax,
}

impl Activation {
    pub fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Pointwise { forward, .. } => z.mapv(*forward),
            Activation::Softmax => {
                let mut out = z.clone();
                for mut row in out.axis_iter_mut(Axis(0)) {
                    let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
                    row.mapv_inplace(|v| (v - max).exp());
                    let sum = row.sum();
                    row.mapv_inplace(|v| v / sum);
                }
                out
            }
        }
    }

    /// Gradient with respect to the pre-activation `z`, given the layer output
    /// `a` and the gradient flowing into the output.
    pub fn backward(&self, z: &Array2<f64>, a: &Array2<f64>, grad_a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Pointwise { derivative, .. } => {
                let mut grad = grad_a.clone();
                Zip::from(&mut grad).and(z).for_each(|g, &zv| *g *= derivative(zv));
                grad
            }
            Activation::Softmax => {
                let mut grad = Array2::zeros(a.raw_dim());
                for ((mut g_row, a_row), ga_row) in grad
                    .axis_iter_mut(Axis(0))
                    .zip(a.axis_iter(Axis(0)))
                    .zip(grad_a.axis_iter(Axis(0)))
                {
                    let dot = a_row.dot(&ga_row);
                    Zip::from(&mut g_row)
                        .and(&a_row)
                        .and(&ga_row)
                        .for_each(|g, &av, &gav| *g = av * (gav - dot));
                }
                grad
            }
        }
    }
}

fn linear(x: f64) -> f64 {
    x
}

fn linear_grad(_: f64) -> f64 {
    1.0
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn relu_grad(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn tanh(x: f64) -> f64 {
    x.tanh()
}

fn tanh_grad(x: f64) -> f64 {
    1.0 - x.tanh().powi(2)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn sigmoid_grad(x: f64) -> f64 {
    let s = sigmoid(x);
    s * (1.0 - s)
}

fn softplus(x: f64) -> f64 {
    if x > 30.0 {
        x
    } else {
        x.exp().ln_1p()
    }
}

/// x · sigmoid(x)
fn swish(x: f64) -> f64 {
    x * sigmoid(x)
}

fn swish_grad(x: f64) -> f64 {
    let s = sigmoid(x);
    s + x * s * (1.0 - s)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name → activation lookup handed to the network factory.
///
/// Custom activations are registered on an instance, never globally.
#[derive(Debug, Clone)]
pub struct ActivationRegistry {
    entries: BTreeMap<String, Activation>,
}

impl Default for ActivationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ActivationRegistry {
    /// Registry with no entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry pre-populated with the standard activations.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register_pointwise("linear", linear, linear_grad);
        reg.register_pointwise("relu", relu, relu_grad);
        reg.register_pointwise("tanh", tanh, tanh_grad);
        reg.register_pointwise("sigmoid", sigmoid, sigmoid_grad);
        reg.register_pointwise("softplus", softplus, sigmoid);
        reg.register_pointwise("swish", swish, swish_grad);
        reg.register("softmax", Activation::Softmax);
        reg
    }

    pub fn register(&mut self, name: &str, activation: Activation) {
        self.entries.insert(name.to_string(), activation);
    }

    pub fn register_pointwise(&mut self, name: &str, forward: fn(f64) -> f64, derivative: fn(f64) -> f64) {
        self.register(name, Activation::Pointwise { forward, derivative });
    }

    pub fn get(&self, name: &str) -> Result<Activation> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| DepartError::UnknownActivation(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn softmax_rows_sum_to_one() {
        let z = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]];
        let a = Activation::Softmax.apply(&z);
        for row in a.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(a[[1, 0]], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn softmax_backward_matches_cross_entropy_shortcut() {
        // d(-log p_k)/dz = p - y
        let z = array![[0.3, -1.2, 2.0]];
        let y = array![[0.0, 1.0, 0.0]];
        let a = Activation::Softmax.apply(&z);
        let grad_a = -(&y / &a);
        let grad_z = Activation::Softmax.backward(&z, &a, &grad_a);
        let expected = &a - &y;
        for (g, e) in grad_z.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*g, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn custom_activation_is_scoped_to_its_registry() {
        fn cube(x: f64) -> f64 {
            x * x * x
        }
        fn cube_grad(x: f64) -> f64 {
            3.0 * x * x
        }
        let mut reg = ActivationRegistry::with_builtins();
        reg.register_pointwise("cube", cube, cube_grad);

        let act = reg.get("cube").unwrap();
        assert_eq!(act.apply(&array![[2.0]])[[0, 0]], 8.0);
        assert!(ActivationRegistry::with_builtins().get("cube").is_err());
        assert!(reg.names().contains(&"swish"));
    }
}
