//! # Random Source
//!
//! One seeded `ChaCha8Rng` is shared by every engine. It is not
//! cryptographic; a fixed seed makes test runs repeatable.

use devastation_world::BlockPos;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The simulation's random generator.
pub type SimRng = ChaCha8Rng;

/// Creates the generator from an optional seed (entropy when absent).
#[must_use]
pub fn seeded_rng(seed: Option<u64>) -> SimRng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Uniformly distributed unit vector.
pub fn unit_direction(rng: &mut impl Rng) -> [f64; 3] {
    // Uniform z and azimuth give a uniform direction on the sphere.
    let z: f64 = rng.gen_range(-1.0..=1.0);
    let theta: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    [r * theta.cos(), z, r * theta.sin()]
}

/// Offsets `center` by `direction * distance`, rounded to the lattice.
#[must_use]
pub fn project(center: BlockPos, direction: [f64; 3], distance: f64) -> BlockPos {
    center.offset(
        (direction[0] * distance).round() as i32,
        (direction[1] * distance).round() as i32,
        (direction[2] * distance).round() as i32,
    )
}

/// Uniform lattice point inside a sphere (rejection sampled).
pub fn point_in_sphere(rng: &mut impl Rng, center: BlockPos, radius: i32) -> BlockPos {
    let radius = radius.max(0);
    let limit = i64::from(radius) * i64::from(radius);
    loop {
        let offset = center.offset(
            rng.gen_range(-radius..=radius),
            rng.gen_range(-radius..=radius),
            rng.gen_range(-radius..=radius),
        );
        if offset.distance_squared(center) <= limit {
            return offset;
        }
    }
}

/// Rolls a fractional amount: the integer part always, the remainder as a
/// probability.
pub fn roll_budget(rng: &mut impl Rng, amount: f64) -> u32 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    let whole = amount.floor();
    let extra = u32::from(rng.gen::<f64>() < amount - whole);
    (whole as u32).saturating_add(extra)
}
