//! Seeded initial platform layout.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::ScenarioConfig;
use crate::model::{PlatformSpec, SpatialDomain};

/// Cruise speed range per domain, metres per second.
fn speed_range(domain: SpatialDomain) -> (f64, f64) {
    match domain {
        SpatialDomain::Air => (120.0, 300.0),
        SpatialDomain::Land => (5.0, 25.0),
        SpatialDomain::Surface => (5.0, 15.0),
        SpatialDomain::Subsurface => (3.0, 10.0),
        SpatialDomain::Space => (7000.0, 7800.0),
    }
}

fn altitude(domain: SpatialDomain, rng: &mut SmallRng) -> f64 {
    match domain {
        SpatialDomain::Air => rng.gen_range(1_000.0..12_000.0),
        SpatialDomain::Land | SpatialDomain::Surface => 0.0,
        SpatialDomain::Subsurface => -rng.gen_range(20.0..300.0),
        SpatialDomain::Space => rng.gen_range(300_000.0..800_000.0),
    }
}

/// Builds the initial platforms. The same config always yields the same
/// layout.
pub fn initial_platforms(config: &ScenarioConfig) -> Vec<PlatformSpec> {
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let domains = SpatialDomain::all();

    (0..config.platform_count)
        .map(|i| {
            let side = config
                .sides
                .get(i % config.sides.len().max(1))
                .cloned()
                .unwrap_or_default();
            let domain = domains[rng.gen_range(0..domains.len())];
            let (min_speed, max_speed) = speed_range(domain);
            let speed = rng.gen_range(min_speed..max_speed);
            let heading = rng.gen_range(0.0..std::f64::consts::TAU);
            let x = rng.gen_range(-config.extent..=config.extent);
            let y = rng.gen_range(-config.extent..=config.extent);

            PlatformSpec {
                name: format!("{}-{:03}", side, i + 1),
                side,
                domain,
                position: [x, y, altitude(domain, &mut rng)],
                velocity: [speed * heading.cos(), speed * heading.sin(), 0.0],
            }
        })
        .collect()
}
