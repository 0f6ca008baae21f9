//! Genome operators: crossover and optional mutation.

use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::schema::{CrossoverPolicy, KfGenome, MutationConfig, OperatorConfig};

/// Seedable random source plus the configured crossover/mutation settings.
pub struct GenomeOperators {
    rng: StdRng,
    crossover: CrossoverPolicy,
    mutation: Option<MutationConfig>,
}

impl GenomeOperators {
    /// Create from seed.
    pub fn new(config: &OperatorConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            crossover: config.crossover,
            mutation: config.mutation.clone(),
        }
    }

    /// Random source shared with parent selection.
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Derive a child genome from two parents.
    ///
    /// Every child field depends only on the two parents' corresponding fields and
    /// lies in the closed range they span. Mutation, when configured, is applied
    /// to the child before it is returned.
    pub fn crossover(&mut self, parent1: &KfGenome, parent2: &KfGenome) -> KfGenome {
        let rng = &mut self.rng;
        let child = match self.crossover {
            CrossoverPolicy::Average => parent1.zip_with(parent2, |a, b| blend(a, b, 0.5)),
            CrossoverPolicy::UniformPick => {
                parent1.zip_with(parent2, |a, b| if rng.gen_bool(0.5) { a } else { b })
            }
            CrossoverPolicy::Blend => {
                parent1.zip_with(parent2, |a, b| blend(a, b, rng.r#gen::<f64>()))
            }
        };

        match &self.mutation {
            Some(mutation) => mutate(rng, &child, mutation),
            None => child,
        }
    }
}

/// Linear blend between two values, kept inside `[min(a, b), max(a, b)]`.
fn blend(a: f64, b: f64, t: f64) -> f64 {
    // Rounding can land an ulp outside the parents' range.
    (a * (1.0 - t) + b * t).clamp(a.min(b), a.max(b))
}

/// Multiplicative Gaussian perturbation, clamped from below.
fn perturb(rng: &mut StdRng, value: f64, strength: f64, floor: f64) -> f64 {
    let noise: f64 = rng.sample(StandardNormal);
    (value * (1.0 + noise * strength)).max(floor)
}

fn mutate(rng: &mut StdRng, genome: &KfGenome, config: &MutationConfig) -> KfGenome {
    genome.map(|value| {
        if rng.r#gen::<f64>() < config.rate {
            perturb(rng, value, config.strength, config.min_value)
        } else {
            value
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn operators(crossover: CrossoverPolicy) -> GenomeOperators {
        GenomeOperators::new(
            &OperatorConfig {
                crossover,
                mutation: None,
            },
            42,
        )
    }

    fn spread_genome(scale: f64) -> KfGenome {
        KfGenome::from_array(std::array::from_fn(|i| scale * (i + 1) as f64))
    }

    #[test]
    fn test_average_crossover() {
        let mut ops = operators(CrossoverPolicy::Average);
        let a = spread_genome(1.0);
        let b = spread_genome(3.0);

        let child = ops.crossover(&a, &b);
        for (i, value) in child.to_array().into_iter().enumerate() {
            assert!((value - 2.0 * (i + 1) as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn test_identical_parents_reproduce() {
        for policy in [
            CrossoverPolicy::Average,
            CrossoverPolicy::UniformPick,
            CrossoverPolicy::Blend,
        ] {
            let mut ops = operators(policy);
            let parent = KfGenome::default();
            assert_eq!(ops.crossover(&parent, &parent), parent);
        }
    }

    #[test]
    fn test_average_field_independence() {
        // Changing one field of one parent only moves that field of the child.
        let mut ops = operators(CrossoverPolicy::Average);
        let a = spread_genome(1.0);
        let b = spread_genome(2.0);
        let before = ops.crossover(&a, &b).to_array();

        let mut changed = b;
        changed.q[2] += 4.0;
        let after = ops.crossover(&a, &changed).to_array();

        for i in 0..before.len() {
            if i == 6 {
                assert!((after[i] - before[i] - 2.0).abs() < 1e-12);
            } else {
                assert_eq!(after[i], before[i]);
            }
        }
    }

    #[test]
    fn test_uniform_pick_copies_parent_values() {
        let mut ops = operators(CrossoverPolicy::UniformPick);
        let a = spread_genome(1.0);
        let b = spread_genome(10.0);

        let child = ops.crossover(&a, &b).to_array();
        let (a, b) = (a.to_array(), b.to_array());
        for i in 0..child.len() {
            assert!(child[i] == a[i] || child[i] == b[i]);
        }
    }

    #[test]
    fn test_mutation_disabled_by_default() {
        let config = OperatorConfig::default();
        assert!(config.mutation.is_none());

        let mut ops = GenomeOperators::new(&config, 7);
        let parent = spread_genome(0.5);
        assert_eq!(ops.crossover(&parent, &parent), parent);
    }

    #[test]
    fn test_mutation_respects_floor() {
        let config = OperatorConfig {
            crossover: CrossoverPolicy::Average,
            mutation: Some(MutationConfig {
                rate: 1.0,
                strength: 5.0,
                min_value: 1e-3,
            }),
        };
        let mut ops = GenomeOperators::new(&config, 3);
        let parent = KfGenome::default();

        let mut changed = false;
        for _ in 0..20 {
            let child = ops.crossover(&parent, &parent);
            assert!(child.to_array().iter().all(|v| *v >= 1e-3));
            changed |= child != parent;
        }
        assert!(changed);
    }

    #[test]
    fn test_seeded_operators_reproducible() {
        let a = spread_genome(1.0);
        let b = spread_genome(5.0);
        let mut first = operators(CrossoverPolicy::Blend);
        let mut second = operators(CrossoverPolicy::Blend);
        assert_eq!(first.crossover(&a, &b), second.crossover(&a, &b));
    }

    #[test]
    fn test_blend_stays_in_closed_range() {
        // Sweep t across [0, 1], endpoints included.
        let (a, b) = (0.1, 0.3);
        for step in 0..=1000 {
            let t = step as f64 / 1000.0;
            let value = blend(a, b, t);
            assert!((a..=b).contains(&value), "t = {t}: {value}");
        }
        assert_eq!(blend(0.3, 0.3, 0.37), 0.3);
        assert_eq!(blend(0.1, 0.3, 0.0), 0.1);
        assert_eq!(blend(0.1, 0.3, 1.0), 0.3);
    }

    fn genome_strategy() -> impl Strategy<Value = KfGenome> {
        prop::array::uniform12(1e-6f64..1e3).prop_map(KfGenome::from_array)
    }

    proptest! {
        #[test]
        fn prop_child_within_parent_range(
            a in genome_strategy(),
            b in genome_strategy(),
            seed in any::<u64>(),
            policy in prop_oneof![
                Just(CrossoverPolicy::Average),
                Just(CrossoverPolicy::UniformPick),
                Just(CrossoverPolicy::Blend),
            ],
        ) {
            let mut ops = GenomeOperators::new(
                &OperatorConfig { crossover: policy, mutation: None },
                seed,
            );
            let child = ops.crossover(&a, &b).to_array();
            let (a, b) = (a.to_array(), b.to_array());
            for i in 0..child.len() {
                let lo = a[i].min(b[i]);
                let hi = a[i].max(b[i]);
                prop_assert!(child[i] >= lo && child[i] <= hi);
            }
        }
    }
}
