use std::str::FromStr;

use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::error::DepartError;

/// Kernel initialisation schemes, named as in the usual deep-learning APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initializer {
    /// N(0, 0.05)
    Normal,
    /// U(-0.05, 0.05)
    Uniform,
    Zeros,
    GlorotUniform,
    GlorotNormal,
    HeNormal,
    HeUniform,
    LecunNormal,
}

impl FromStr for Initializer {
    type Err = DepartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" | "random_normal" => Ok(Self::Normal),
            "uniform" | "random_uniform" => Ok(Self::Uniform),
            "zeros" => Ok(Self::Zeros),
            "glorot_uniform" => Ok(Self::GlorotUniform),
            "glorot_normal" => Ok(Self::GlorotNormal),
            "he_normal" => Ok(Self::HeNormal),
            "he_uniform" => Ok(Self::HeUniform),
            "lecun_normal" => Ok(Self::LecunNormal),
            other => Err(DepartError::Config(format!("unknown initializer '{other}'"))),
        }
    }
}

impl Initializer {
    /// Draw a `fan_in × fan_out` kernel.
    pub fn kernel<R: Rng + ?Sized>(&self, fan_in: usize, fan_out: usize, rng: &mut R) -> Array2<f64> {
        let fan_in_f = fan_in.max(1) as f64;
        let fan_avg = (fan_in + fan_out).max(1) as f64 / 2.0;
        match self {
            Initializer::Zeros => Array2::zeros((fan_in, fan_out)),
            Initializer::Normal => normal(fan_in, fan_out, 0.05, rng),
            Initializer::Uniform => uniform(fan_in, fan_out, 0.05, rng),
            Initializer::GlorotNormal => normal(fan_in, fan_out, (1.0 / fan_avg).sqrt(), rng),
            Initializer::GlorotUniform => uniform(fan_in, fan_out, (3.0 / fan_avg).sqrt(), rng),
            Initializer::HeNormal => normal(fan_in, fan_out, (2.0 / fan_in_f).sqrt(), rng),
            Initializer::HeUniform => uniform(fan_in, fan_out, (6.0 / fan_in_f).sqrt(), rng),
            Initializer::LecunNormal => normal(fan_in, fan_out, (1.0 / fan_in_f).sqrt(), rng),
        }
    }
}

fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std: f64, rng: &mut R) -> Array2<f64> {
    match Normal::new(0.0, std) {
        Ok(dist) => Array2::from_shape_fn((rows, cols), |_| dist.sample(&mut *rng)),
        Err(_) => Array2::zeros((rows, cols)),
    }
}

fn uniform<R: Rng + ?Sized>(rows: usize, cols: usize, limit: f64, rng: &mut R) -> Array2<f64> {
    let dist = Uniform::new_inclusive(-limit, limit);
    Array2::from_shape_fn((rows, cols), |_| dist.sample(&mut *rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn names_parse() {
        assert_eq!("normal".parse::<Initializer>().unwrap(), Initializer::Normal);
        assert_eq!(
            "glorot_uniform".parse::<Initializer>().unwrap(),
            Initializer::GlorotUniform
        );
        assert!("orthogonal".parse::<Initializer>().is_err());
    }

    #[test]
    fn uniform_kernel_stays_within_limit() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = Initializer::Uniform.kernel(20, 10, &mut rng);
        assert_eq!(w.dim(), (20, 10));
        assert!(w.iter().all(|v| v.abs() <= 0.05));
    }

    #[test]
    fn same_seed_gives_same_kernel() {
        let a = Initializer::HeNormal.kernel(4, 3, &mut StdRng::seed_from_u64(9));
        let b = Initializer::HeNormal.kernel(4, 3, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
