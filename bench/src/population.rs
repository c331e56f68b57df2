//! Pre-filled brokers for dispatch benchmarks.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_broker::{AnyEvent, Broker, Priority};

use crate::events::{Damage, Gameplay, Hit, Tick};

const PRIORITIES: [Priority; 5] = [
    Priority::Highest,
    Priority::High,
    Priority::Normal,
    Priority::Low,
    Priority::Lowest,
];

/// A broker plus a counter every registered handler increments.
pub struct Population {
    pub broker: Broker,
    pub hits: Arc<AtomicU64>,
}

impl Population {
    fn new() -> Self {
        Self {
            broker: Broker::new(),
            hits: Arc::new(AtomicU64::new(0)),
        }
    }

    fn counter(&self) -> impl Fn(u64) + Send + Sync + 'static {
        let hits = Arc::clone(&self.hits);
        move |n| {
            hits.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// `count` unfiltered handlers on `Tick` with random priorities.
    pub fn flat(count: usize, seed: u64) -> Self {
        let population = Self::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        for _ in 0..count {
            let hit = population.counter();
            population
                .broker
                .on::<Tick>()
                .with_priority(PRIORITIES[rng.gen_range(0..PRIORITIES.len())])
                .run(move |_| hit(1));
        }
        population
    }

    /// `count` handlers spread over every level of the `Hit` hierarchy.
    ///
    /// Roughly half of the `Damage` handlers filter on the target, so the
    /// predicate path is exercised too.
    pub fn hierarchy(count: usize, seed: u64) -> Self {
        let population = Self::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        for i in 0..count {
            let hit = population.counter();
            let priority = PRIORITIES[rng.gen_range(0..PRIORITIES.len())];
            let broker = &population.broker;

            match i % 4 {
                0 => {
                    broker
                        .on::<Hit>()
                        .with_priority(priority)
                        .run(move |hit_event| hit(hit_event.damage.amount as u64));
                }
                1 => {
                    let target = rng.gen_range(0..8);
                    broker
                        .on::<Damage>()
                        .with_priority(priority)
                        .when(move |damage| damage.target == target)
                        .run(move |damage| hit(damage.amount as u64));
                }
                2 => {
                    broker
                        .on::<Gameplay>()
                        .with_priority(priority)
                        .run(move |gameplay| hit(gameplay.frame & 1));
                }
                _ => {
                    broker
                        .on::<AnyEvent>()
                        .with_priority(priority)
                        .run(move |_| hit(1));
                }
            }
        }
        population
    }

    /// Publishes `Hit` events for `frames` frames and returns the hit count.
    pub fn publish_hits(&self, frames: u64) -> u64 {
        for frame in 0..frames {
            self.broker.publish(Hit::new(frame, (frame % 8) as u32, 10));
        }
        self.hits.load(Ordering::Relaxed)
    }
}
