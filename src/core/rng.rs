use std::f64::consts::PI;

/// Source of randomness for the simulator.
///
/// Implementors only supply uniform draws; `standard_normal` turns them into
/// standard-normal variates with a Box-Muller transform.
pub trait RandomSource {
    /// Uniform draw in `[0, 1)`.
    fn next_uniform(&mut self) -> f64;

    fn standard_normal(&mut self) -> f64 {
        let (u1, u2) = loop {
            let u1 = self.next_uniform();
            let u2 = self.next_uniform();
            if u1 != 0.0 && u2 != 0.0 {
                break (u1, u2);
            }
        };

        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

/// Seeded xorshift64* generator.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

impl RandomSource for Rng {
    fn next_uniform(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        (self.next_u64() >> 11) as f64 / DENOM
    }
}

/// Independent stream seed for one iteration of a seeded run.
pub fn derive_seed(base_seed: u64, iteration: usize) -> u64 {
    splitmix64(base_seed ^ splitmix64(iteration as u64))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
