/*!

Named, independently seeded random number streams stored in the `Context`, plus the period
distributions scenario files use for disease and vaccine durations.

Each module declares its own stream with `define_rng!`, so adding a draw in one module never
shifts the numbers another module sees.

*/

use crate::{
    HashMap,
    context::{Context, DataPlugin},
    error::SimError,
    hashing::hash_str,
    log::trace,
};
use rand::{
    Rng, SeedableRng,
    distr::{
        Uniform,
        uniform::{SampleRange, SampleUniform},
        weighted::{Weight, WeightedIndex},
    },
    prelude::Distribution,
};
use rand_distr::{Gamma, Normal, Poisson, Triangular};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};

pub trait RngId: Any {
    #![allow(non_upper_case_globals)]
    const new: &'static dyn Fn(u64) -> Self;
    const name: &'static str;
    type RngType: SeedableRng;
    fn rng(&mut self) -> &mut Self::RngType;
}

struct RngPlugin {
    base_seed: u64,
    rng_map: HashMap<TypeId, Box<dyn Any>>,
}

impl RngPlugin {
    fn clear(&mut self) {
        self.rng_map.clear();
    }

    fn get_rng<R: RngId>(&mut self) -> &mut R::RngType {
        let seed = self.base_seed.wrapping_add(hash_str(R::name));
        self.rng_map
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(R::new(seed)))
            .downcast_mut::<R>()
            .unwrap() // Keys are always the `TypeId` of the stored value
            .rng()
    }
}

impl DataPlugin for RngPlugin {
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self = &|| RngPlugin {
        base_seed: 0,
        rng_map: HashMap::default(),
    };
}

// A private free function so that it's not leaked to the public API.
fn get_rng<R: RngId>(context: &mut Context) -> &mut R::RngType {
    context.get_data_container_mut::<RngPlugin>().get_rng::<R>()
}

pub trait ContextRandomExt {
    /// Sets the base seed and drops every existing stream so that each is re-seeded on next use.
    fn init_random(&mut self, base_seed: u64);

    /// Gets a random sample from the stream `R` by applying `sampler` to it.
    fn sample<R: RngId + 'static, T>(&mut self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Gets a random sample from `distribution` using the stream `R`.
    fn sample_distr<R: RngId + 'static, T>(&mut self, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng;

    /// Gets a random sample within `range` using the stream `R`.
    fn sample_range<R: RngId + 'static, S, T>(&mut self, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;

    /// True with probability `p`. Values of `p` outside [0, 1] are clamped.
    fn sample_bool<R: RngId + 'static>(&mut self, p: f64) -> bool
    where
        R::RngType: Rng;

    /// A uniform draw from [0, 1).
    fn sample_uniform<R: RngId + 'static>(&mut self) -> f64
    where
        R::RngType: Rng;

    /// Draws an index into `weights` with probability proportional to its weight.
    fn sample_weighted<R: RngId + 'static, T>(&mut self, weights: &[T]) -> Result<usize, SimError>
    where
        R::RngType: Rng,
        T: Clone + Default + SampleUniform + for<'a> std::ops::AddAssign<&'a T> + PartialOrd + Weight;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random streams with base seed {base_seed}");
        let rng_container = self.get_data_container_mut::<RngPlugin>();
        rng_container.base_seed = base_seed;
        rng_container.clear();
    }

    fn sample<R: RngId + 'static, T>(&mut self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let rng = get_rng::<R>(self);
        sampler(rng)
    }

    fn sample_distr<R: RngId + 'static, T>(&mut self, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng,
    {
        let rng = get_rng::<R>(self);
        distribution.sample::<R::RngType>(rng)
    }

    fn sample_range<R: RngId + 'static, S, T>(&mut self, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample::<R, T>(|rng| rng.random_range(range))
    }

    fn sample_bool<R: RngId + 'static>(&mut self, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        self.sample::<R, bool>(|rng| rng.random_bool(p))
    }

    fn sample_uniform<R: RngId + 'static>(&mut self) -> f64
    where
        R::RngType: Rng,
    {
        self.sample::<R, f64>(|rng| rng.random::<f64>())
    }

    fn sample_weighted<R: RngId + 'static, T>(&mut self, weights: &[T]) -> Result<usize, SimError>
    where
        R::RngType: Rng,
        T: Clone + Default + SampleUniform + for<'a> std::ops::AddAssign<&'a T> + PartialOrd + Weight,
    {
        let index = WeightedIndex::new(weights).map_err(|e| SimError::SimError(e.to_string()))?;
        let rng = get_rng::<R>(self);
        Ok(index.sample(rng))
    }
}

/// A probability distribution over durations (in days) as written in a scenario file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PeriodDistribution {
    Point { value: f64 },
    Uniform { a: f64, b: f64 },
    /// Minimum `a`, mode `c`, maximum `b`.
    Triangular { a: f64, c: f64, b: f64 },
    Gaussian { mean: f64, stddev: f64 },
    Gamma { shape: f64, scale: f64 },
    Poisson { mean: f64 },
    Discrete { values: Vec<f64>, weights: Vec<f64> },
}

impl PeriodDistribution {
    /// Checks the parameters and builds something that can be sampled.
    pub fn sampler(&self) -> Result<PeriodSampler, SimError> {
        fn invalid(what: &str, e: impl std::fmt::Display) -> SimError {
            SimError::ConfigError(format!("invalid {what} distribution: {e}"))
        }
        let sampler = match *self {
            PeriodDistribution::Point { value } => {
                if !value.is_finite() {
                    return Err(invalid("point", "value is not finite"));
                }
                PeriodSampler::Point(value)
            }
            PeriodDistribution::Uniform { a, b } => {
                PeriodSampler::Uniform(Uniform::new_inclusive(a, b).map_err(|e| invalid("uniform", e))?)
            }
            PeriodDistribution::Triangular { a, c, b } => {
                PeriodSampler::Triangular(Triangular::new(a, b, c).map_err(|e| invalid("triangular", e))?)
            }
            PeriodDistribution::Gaussian { mean, stddev } => {
                PeriodSampler::Gaussian(Normal::new(mean, stddev).map_err(|e| invalid("gaussian", e))?)
            }
            PeriodDistribution::Gamma { shape, scale } => {
                PeriodSampler::Gamma(Gamma::new(shape, scale).map_err(|e| invalid("gamma", e))?)
            }
            PeriodDistribution::Poisson { mean } => {
                PeriodSampler::Poisson(Poisson::new(mean).map_err(|e| invalid("poisson", e))?)
            }
            PeriodDistribution::Discrete {
                ref values,
                ref weights,
            } => {
                if values.len() != weights.len() {
                    return Err(invalid("discrete", "values and weights differ in length"));
                }
                let index = WeightedIndex::new(weights).map_err(|e| invalid("discrete", e))?;
                PeriodSampler::Discrete(values.clone(), index)
            }
        };
        Ok(sampler)
    }

    /// The value every draw returns, if the distribution is a point.
    #[must_use]
    pub fn point_value(&self) -> Option<f64> {
        match *self {
            PeriodDistribution::Point { value } => Some(value),
            _ => None,
        }
    }
}

/// A validated `PeriodDistribution`, ready to draw from.
#[derive(Clone, Debug)]
pub enum PeriodSampler {
    Point(f64),
    Uniform(Uniform<f64>),
    Triangular(Triangular<f64>),
    Gaussian(Normal<f64>),
    Gamma(Gamma<f64>),
    Poisson(Poisson<f64>),
    Discrete(Vec<f64>, WeightedIndex<f64>),
}

impl Distribution<f64> for PeriodSampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            PeriodSampler::Point(value) => *value,
            PeriodSampler::Uniform(d) => d.sample(rng),
            PeriodSampler::Triangular(d) => d.sample(rng),
            PeriodSampler::Gaussian(d) => d.sample(rng),
            PeriodSampler::Gamma(d) => d.sample(rng),
            PeriodSampler::Poisson(d) => d.sample(rng),
            PeriodSampler::Discrete(values, index) => values[index.sample(rng)],
        }
    }
}

#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        $crate::define_rng!($random_id, $crate::rand::rngs::StdRng);
    };
    ($random_id:ident, $rng_type:ty) => {
        struct $random_id {
            rng: $rng_type,
        }

        impl $crate::random::RngId for $random_id {
            #![allow(non_upper_case_globals)]
            type RngType = $rng_type;
            const name: &'static str = stringify!($random_id);
            const new: &'static dyn Fn(u64) -> Self = &|seed| {
                use $crate::rand::SeedableRng;
                Self {
                    rng: <$rng_type>::seed_from_u64(seed),
                }
            };

            fn rng(&mut self) -> &mut Self::RngType {
                &mut self.rng
            }
        }
    };
}
#[allow(unused_imports)]
pub use define_rng;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn streams_advance() {
        let mut context = Context::new();
        context.init_random(42);
        assert_ne!(
            context.sample::<FooRng, _>(RngCore::next_u64),
            context.sample::<FooRng, _>(RngCore::next_u64)
        );
    }

    #[test]
    fn streams_are_independent() {
        let mut context = Context::new();
        context.init_random(42);
        assert_ne!(
            context.sample::<FooRng, _>(RngCore::next_u64),
            context.sample::<BarRng, _>(RngCore::next_u64)
        );
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);

        let run_0 = context.sample::<FooRng, _>(RngCore::next_u64);
        let run_1 = context.sample::<FooRng, _>(RngCore::next_u64);

        // Same seed, same values.
        context.init_random(42);
        assert_eq!(run_0, context.sample::<FooRng, _>(RngCore::next_u64));
        assert_eq!(run_1, context.sample::<FooRng, _>(RngCore::next_u64));

        context.init_random(88);
        assert_ne!(run_0, context.sample::<FooRng, _>(RngCore::next_u64));
    }

    #[test]
    fn uniform_and_bool_bounds() {
        let mut context = Context::new();
        context.init_random(7);
        for _ in 0..100 {
            let u = context.sample_uniform::<FooRng>();
            assert!((0.0..1.0).contains(&u));
        }
        assert!(context.sample_bool::<FooRng>(1.5));
        assert!(!context.sample_bool::<FooRng>(-0.5));
        let r = context.sample_range::<FooRng, _, usize>(0..3);
        assert!(r < 3);
    }

    #[test]
    fn sample_weighted() {
        let mut context = Context::new();
        context.init_random(42);
        let r = context.sample_weighted::<FooRng, _>(&[0.1, 0.3, 0.4]).unwrap();
        assert!(r < 3);
        assert!(context.sample_weighted::<FooRng, f64>(&[]).is_err());
    }

    #[test]
    fn period_distributions() {
        let mut context = Context::new();
        context.init_random(42);

        let point = PeriodDistribution::Point { value: 4.0 }.sampler().unwrap();
        assert_eq!(context.sample_distr::<FooRng, f64>(&point), 4.0);

        let uniform = PeriodDistribution::Uniform { a: 2.0, b: 2.0 }.sampler().unwrap();
        assert_eq!(context.sample_distr::<FooRng, f64>(&uniform), 2.0);

        let triangular = PeriodDistribution::Triangular { a: 1.0, c: 2.0, b: 5.0 }.sampler().unwrap();
        for _ in 0..50 {
            let x = context.sample_distr::<FooRng, f64>(&triangular);
            assert!((1.0..=5.0).contains(&x));
        }

        let discrete = PeriodDistribution::Discrete {
            values: vec![3.0, 9.0],
            weights: vec![0.0, 1.0],
        }
        .sampler()
        .unwrap();
        assert_eq!(context.sample_distr::<FooRng, f64>(&discrete), 9.0);
    }

    #[test]
    fn bad_parameters_are_config_errors() {
        let gaussian = PeriodDistribution::Gaussian { mean: 1.0, stddev: -1.0 };
        assert!(matches!(gaussian.sampler(), Err(SimError::ConfigError(_))));
        let discrete = PeriodDistribution::Discrete {
            values: vec![1.0],
            weights: vec![],
        };
        assert!(matches!(discrete.sampler(), Err(SimError::ConfigError(_))));
    }

    #[test]
    fn deserializes_tagged() {
        let d: PeriodDistribution = serde_json::from_str(r#"{"type": "gamma", "shape": 2.0, "scale": 1.5}"#).unwrap();
        assert_eq!(d, PeriodDistribution::Gamma { shape: 2.0, scale: 1.5 });
    }
}
