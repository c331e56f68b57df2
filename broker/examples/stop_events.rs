use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use log::LevelFilter;
use rusty_broker::{AnyEvent, Broker, Event, Priority, logging::ChannelLogger};

#[derive(Event, Debug)]
struct Damage {
    amount: u32,
}

#[derive(Event, Debug)]
struct CriticalDamage {
    #[event(parent)]
    damage: Damage,
    multiplier: u32,
}

#[derive(Event, Debug)]
struct RoundOver {
    round: u32,
}

fn main() {
    let (logger, records) = ChannelLogger::with_receiver();
    logger
        .with_level(LevelFilter::Debug)
        .install()
        .expect("no other logger installed");

    let broker = Broker::new();
    let total = Arc::new(AtomicU32::new(0));

    // Sum all damage until the first round is over. The stop handler is
    // shared with the critical-hit announcer below.
    let mut round_over = None;
    let sum = Arc::clone(&total);
    broker
        .on::<Damage>()
        .until_event_into::<RoundOver>(|stop| stop.when(|over| over.round == 1), &mut round_over)
        .run(move |damage| {
            sum.fetch_add(damage.amount, Ordering::SeqCst);
        });

    broker
        .on::<CriticalDamage>()
        .with_priority(Priority::High)
        .until(round_over.as_ref().expect("stop handler"))
        .run(|critical| println!("critical hit x{}!", critical.multiplier));

    broker
        .on::<AnyEvent>()
        .with_priority(Priority::Lowest)
        .run(|event| println!("published {}", event.type_name()));

    // First-blood bonus, only ever registered once.
    for _ in 0..3 {
        broker
            .on::<Damage>()
            .once()
            .with_idempotency_key("first-blood")
            .run(|_| println!("first blood!"));
    }

    broker.publish(Damage { amount: 5 });
    broker.publish(CriticalDamage {
        damage: Damage { amount: 20 },
        multiplier: 4,
    });
    broker.publish(RoundOver { round: 1 });
    broker.publish(CriticalDamage {
        damage: Damage { amount: 99 },
        multiplier: 2,
    });

    println!("damage taken in round 1: {}", total.load(Ordering::SeqCst));

    println!("broker log:");
    for record in records.try_iter() {
        println!("  [{}] {}", record.level, record.message);
    }
}
