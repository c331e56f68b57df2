//! Event types used across benchmarks.
//!
//! `Hit` derives from `Damage`, which derives from `Gameplay`, giving a
//! four-level chain (with `AnyEvent`) for hierarchy dispatch.

use rusty_broker::Event;

/// Root of the gameplay hierarchy (8 bytes).
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct Gameplay {
    pub frame: u64,
}

#[derive(Event, Clone, Copy, Debug, Default)]
pub struct Damage {
    #[event(parent)]
    pub gameplay: Gameplay,
    pub target: u32,
    pub amount: u32,
}

#[derive(Event, Clone, Copy, Debug, Default)]
pub struct Hit {
    #[event(parent)]
    pub damage: Damage,
    pub x: f32,
    pub y: f32,
}

impl Hit {
    pub fn new(frame: u64, target: u32, amount: u32) -> Self {
        Self {
            damage: Damage {
                gameplay: Gameplay { frame },
                target,
                amount,
            },
            x: 0.0,
            y: 0.0,
        }
    }
}

/// A flat event with no declared parent.
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct Tick;

/// Stops handlers registered with `until`.
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct Reset;
