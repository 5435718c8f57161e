//! Local paddle input: key state to directional intents, queued for the network

use shared::{ClientMessage, PlayerSide};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const QUEUE_CAPACITY: usize = 3;
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

/// Key names bound to each paddle direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    pub p1_up: String,
    pub p1_down: String,
    pub p2_up: String,
    pub p2_down: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            p1_up: "w".to_string(),
            p1_down: "s".to_string(),
            p2_up: "ArrowUp".to_string(),
            p2_down: "ArrowDown".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct KeySlot {
    key: String,
    player: PlayerSide,
    active: bool,
    just_modified: bool,
}

impl KeySlot {
    fn new(key: &str, player: PlayerSide) -> Self {
        Self {
            key: key.to_string(),
            player,
            active: false,
            just_modified: false,
        }
    }
}

/// Intent change waiting to be sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundInputMessage {
    pub player: PlayerSide,
    pub value: [i8; 2],
    pub sent_at: Instant,
}

impl OutboundInputMessage {
    pub fn to_message(&self) -> ClientMessage {
        ClientMessage::key_down(self.player, self.value)
    }
}

/// Samples paddle keys and turns intent changes into outbound messages.
///
/// Owned by the driver; the session state machine decides when it is active.
pub struct InputSampler {
    // Order matters: p1 up, p1 down, p2 up, p2 down.
    slots: [KeySlot; 4],
    intents: [i8; 2],
    queue: VecDeque<OutboundInputMessage>,
    active: bool,
    tick: Duration,
    last_drain: Option<Instant>,
}

impl InputSampler {
    pub fn new(bindings: &KeyBindings, tick: Duration) -> Self {
        Self {
            slots: [
                KeySlot::new(&bindings.p1_up, PlayerSide::One),
                KeySlot::new(&bindings.p1_down, PlayerSide::One),
                KeySlot::new(&bindings.p2_up, PlayerSide::Two),
                KeySlot::new(&bindings.p2_down, PlayerSide::Two),
            ],
            intents: [0, 0],
            queue: VecDeque::with_capacity(QUEUE_CAPACITY),
            active: false,
            tick,
            last_drain: None,
        }
    }

    /// Records a key transition. Ignored while deactivated.
    pub fn key_event(&mut self, key: &str, pressed: bool) {
        if !self.active {
            return;
        }
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.key == key) {
            if slot.active != pressed {
                slot.active = pressed;
                slot.just_modified = true;
            }
        }
    }

    /// Recomputes intents for modified keys and enqueues changes.
    pub fn sample(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        for i in 0..self.slots.len() {
            if !self.slots[i].just_modified {
                continue;
            }
            self.slots[i].just_modified = false;
            let player = self.slots[i].player;
            if self.recompute_intent(player) {
                self.enqueue(OutboundInputMessage {
                    player,
                    value: self.intents,
                    sent_at: now,
                });
            }
        }
    }

    /// Pops one message per tick elapsed since the last drain, so the send
    /// rate stays at the tick rate when frames are slower than the tick.
    pub fn drain(&mut self, now: Instant) -> Vec<OutboundInputMessage> {
        if !self.active {
            return Vec::new();
        }
        let due = match self.last_drain {
            None => 1,
            Some(last) => {
                let tick = self.tick.as_nanos().max(1);
                (now.saturating_duration_since(last).as_nanos() / tick) as usize
            }
        };
        if due == 0 {
            return Vec::new();
        }
        self.last_drain = match self.last_drain {
            Some(last) if due < QUEUE_CAPACITY => Some(last + self.tick * due as u32),
            _ => Some(now),
        };
        let count = due.min(self.queue.len());
        self.queue.drain(..count).collect()
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Stops sampling and forgets held keys and pending messages.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.queue.clear();
        self.intents = [0, 0];
        self.last_drain = None;
        for slot in &mut self.slots {
            slot.active = false;
            slot.just_modified = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn intent(&self, player: PlayerSide) -> i8 {
        self.intents[player.index()]
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn bound_keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.key.as_str())
    }

    fn recompute_intent(&mut self, player: PlayerSide) -> bool {
        let base = player.index() * 2;
        let up = self.slots[base].active as i8;
        let down = self.slots[base + 1].active as i8;
        let previous = self.intents[player.index()];
        self.intents[player.index()] = up - down;
        self.intents[player.index()] != previous
    }

    // Once full, the newest message replaces the last slot.
    fn enqueue(&mut self, message: OutboundInputMessage) {
        if self.queue.len() >= QUEUE_CAPACITY {
            if let Some(last) = self.queue.back_mut() {
                *last = message;
            }
        } else {
            self.queue.push_back(message);
        }
    }
}
