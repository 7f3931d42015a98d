//! Parameter-space descriptors and samplers.
//!
//! Each strategy parameter is a fixed value, a discrete choice set, or a
//! stepped numeric range. Sampling is grid (Cartesian product in key
//! order), seeded random, or seeded Latin hypercube; the seed is echoed on
//! every sample so any trial can be reproduced alone.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use barlab_core::strategy::{ParamValue, Params};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamRange {
    Fixed(ParamValue),
    Choice(Vec<ParamValue>),
    IntRange { min: i64, max: i64, step: i64 },
    FloatRange { min: f64, max: f64, step: f64 },
}

impl ParamRange {
    /// All values this dimension contributes to a grid.
    fn grid_values(&self) -> Vec<ParamValue> {
        match self {
            ParamRange::Fixed(v) => vec![*v],
            ParamRange::Choice(vs) => vs.clone(),
            ParamRange::IntRange { min, max, step } => {
                let step = (*step).max(1);
                (0..)
                    .map(|i| min + i * step)
                    .take_while(|v| v <= max)
                    .map(ParamValue::Int)
                    .collect()
            }
            ParamRange::FloatRange { min, max, step } => {
                let mut values = Vec::new();
                if *step <= 0.0 {
                    return vec![ParamValue::Float(*min)];
                }
                let mut i = 0u32;
                loop {
                    let v = min + f64::from(i) * step;
                    if v > max + 1e-12 {
                        break;
                    }
                    values.push(ParamValue::Float(v));
                    i += 1;
                }
                values
            }
        }
    }

    fn random_value(&self, rng: &mut ChaCha8Rng) -> ParamValue {
        match self {
            ParamRange::Fixed(v) => *v,
            ParamRange::Choice(vs) => *vs.choose(rng).expect("choice set must be non-empty"),
            ParamRange::IntRange { min, max, step } => {
                let step = (*step).max(1);
                let count = (max - min) / step + 1;
                let idx = rng.gen_range(0..count);
                ParamValue::Int(min + idx * step)
            }
            ParamRange::FloatRange { min, max, .. } => {
                ParamValue::Float(rng.gen_range(*min..*max))
            }
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            ParamRange::IntRange { .. } | ParamRange::FloatRange { .. }
        )
    }
}

/// Ordered set of parameter dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    dims: BTreeMap<String, ParamRange>,
}

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, range: ParamRange) -> Self {
        self.dims.insert(name.into(), range);
        self
    }

    pub fn fixed_int(self, name: impl Into<String>, value: i64) -> Self {
        self.add(name, ParamRange::Fixed(ParamValue::Int(value)))
    }

    pub fn fixed_float(self, name: impl Into<String>, value: f64) -> Self {
        self.add(name, ParamRange::Fixed(ParamValue::Float(value)))
    }

    pub fn int_range(self, name: impl Into<String>, min: i64, max: i64, step: i64) -> Self {
        self.add(name, ParamRange::IntRange { min, max, step })
    }

    pub fn float_range(self, name: impl Into<String>, min: f64, max: f64, step: f64) -> Self {
        self.add(name, ParamRange::FloatRange { min, max, step })
    }

    pub fn choice(self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.add(name, ParamRange::Choice(values))
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Cartesian product over all dimensions, in key order.
    pub fn grid(&self) -> Vec<Params> {
        let mut combos: Vec<Params> = vec![Params::new()];
        for (name, range) in &self.dims {
            let values = range.grid_values();
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in &values {
                    let mut params = combo.clone();
                    params.insert(name.clone(), *value);
                    next.push(params);
                }
            }
            combos = next;
        }
        combos
    }

    /// Draw up to `n` distinct random samples.
    pub fn random(&self, n: usize, seed: u64) -> Vec<Params> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut seen = BTreeSet::new();
        let mut samples = Vec::new();
        let mut attempts = 0usize;
        let max_attempts = n.saturating_mul(10).max(10);

        while samples.len() < n && attempts < max_attempts {
            attempts += 1;
            let params: Params = self
                .dims
                .iter()
                .map(|(name, range)| (name.clone(), range.random_value(&mut rng)))
                .collect();
            let key = serde_json::to_string(&params).expect("params serialize");
            if seen.insert(key) {
                samples.push(params);
            }
        }
        samples
    }

    /// Stratified Latin-hypercube draw over numeric dimensions; discrete
    /// dimensions are drawn uniformly per sample.
    pub fn latin_hypercube(&self, n: usize, seed: u64) -> Vec<Params> {
        if n == 0 {
            return Vec::new();
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut columns: BTreeMap<String, Vec<ParamValue>> = BTreeMap::new();

        for (name, range) in &self.dims {
            let column = if range.is_numeric() {
                let (min, max, is_int) = match range {
                    ParamRange::IntRange { min, max, .. } => (*min as f64, *max as f64, true),
                    ParamRange::FloatRange { min, max, .. } => (*min, *max, false),
                    _ => unreachable!("is_numeric covers exactly these variants"),
                };
                let width = (max - min) / n as f64;
                let mut strata: Vec<ParamValue> = (0..n)
                    .map(|i| {
                        let low = min + i as f64 * width;
                        let high = min + (i + 1) as f64 * width;
                        let v = if high > low {
                            rng.gen_range(low..high)
                        } else {
                            low
                        };
                        if is_int {
                            ParamValue::Int(v.round() as i64)
                        } else {
                            ParamValue::Float(v)
                        }
                    })
                    .collect();
                strata.shuffle(&mut rng);
                strata
            } else {
                (0..n).map(|_| range.random_value(&mut rng)).collect()
            };
            columns.insert(name.clone(), column);
        }

        (0..n)
            .map(|i| {
                columns
                    .iter()
                    .map(|(name, column)| (name.clone(), column[i]))
                    .collect()
            })
            .collect()
    }
}

/// How to draw parameter sets from a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sampler {
    Grid,
    Random { n: usize, seed: u64 },
    LatinHypercube { n: usize, seed: u64 },
}

/// One drawn parameter set, with the seed that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub trial_id: usize,
    pub params: Params,
    pub seed: u64,
}

/// Materialize a sampler against a space.
pub fn draw_samples(space: &ParamSpace, sampler: &Sampler) -> Vec<Sample> {
    let (sets, seed) = match sampler {
        Sampler::Grid => (space.grid(), 0),
        Sampler::Random { n, seed } => (space.random(*n, *seed), *seed),
        Sampler::LatinHypercube { n, seed } => (space.latin_hypercube(*n, *seed), *seed),
    };
    sets.into_iter()
        .enumerate()
        .map(|(trial_id, params)| Sample {
            trial_id,
            params,
            seed,
        })
        .collect()
}
