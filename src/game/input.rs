//! Player Input and Reconciliation
//!
//! Clients send one input per client tick. The server buffers them and,
//! once per server tick, consumes at most as many as the ticks it is owed.
//! A burst beyond that is stale, so the oldest excess inputs are thrown
//! away rather than replayed faster than real time.

use std::collections::VecDeque;

use crate::core::vec2::Vec2;
use crate::game::config::GameConfig;
use crate::game::state::Player;

// =============================================================================
// PLAYER INPUT
// =============================================================================

/// One client tick of input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayerInput {
    /// Client tick this input was sampled on.
    pub tick: u8,
    /// Direction bits, see `MOVE_*`.
    pub movement: u8,
    /// Action bits, see `FIRE_*` and `DROP_FLAG`.
    pub actions: u8,
    /// Aim in radians. Only meaningful when firing.
    pub aim_angle: f64,
}

impl PlayerInput {
    pub const MOVE_LEFT: u8 = 0x01;
    pub const MOVE_RIGHT: u8 = 0x02;
    pub const MOVE_UP: u8 = 0x04;
    pub const MOVE_DOWN: u8 = 0x08;

    pub const FIRE_PRIMARY: u8 = 0x01;
    pub const FIRE_SECONDARY: u8 = 0x02;
    pub const DROP_FLAG: u8 = 0x04;

    /// Input with only movement bits.
    pub const fn with_movement(tick: u8, movement: u8) -> Self {
        Self { tick, movement, actions: 0, aim_angle: 0.0 }
    }

    #[inline]
    pub fn left(&self) -> bool {
        self.movement & Self::MOVE_LEFT != 0
    }

    #[inline]
    pub fn right(&self) -> bool {
        self.movement & Self::MOVE_RIGHT != 0
    }

    #[inline]
    pub fn up(&self) -> bool {
        self.movement & Self::MOVE_UP != 0
    }

    #[inline]
    pub fn down(&self) -> bool {
        self.movement & Self::MOVE_DOWN != 0
    }

    #[inline]
    pub fn fires_primary(&self) -> bool {
        self.actions & Self::FIRE_PRIMARY != 0
    }

    #[inline]
    pub fn fires_secondary(&self) -> bool {
        self.actions & Self::FIRE_SECONDARY != 0
    }

    /// Either fire bit set; the aim angle is on the wire only then.
    #[inline]
    pub fn is_firing(&self) -> bool {
        self.fires_primary() || self.fires_secondary()
    }

    #[inline]
    pub fn drops_flag(&self) -> bool {
        self.actions & Self::DROP_FLAG != 0
    }

    /// Sum of the pressed directions. Opposing keys cancel.
    pub fn direction(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.left() {
            dir.x -= 1.0;
        }
        if self.right() {
            dir.x += 1.0;
        }
        if self.up() {
            dir.y += 1.0;
        }
        if self.down() {
            dir.y -= 1.0;
        }
        dir
    }

    /// Movement for one tick at `speed`. Zero when no net direction.
    #[inline]
    pub fn displacement(&self, speed: f64) -> Vec2 {
        self.direction().normalize().scale(speed)
    }

    /// Facing as a keypad number:
    ///
    /// ```text
    /// 4 3 2
    /// 5 0 1
    /// 6 7 8
    /// ```
    pub fn dir_num(&self) -> u8 {
        let dir = self.direction();
        match (dir.x as i8, dir.y as i8) {
            (1, 0) => 1,
            (1, 1) => 2,
            (0, 1) => 3,
            (-1, 1) => 4,
            (-1, 0) => 5,
            (-1, -1) => 6,
            (0, -1) => 7,
            (1, -1) => 8,
            _ => 0,
        }
    }
}

/// Unit direction for a keypad number, zero for 0 or unknown.
pub fn dir_from_num(num: u8) -> Vec2 {
    match num {
        1 => Vec2::new(1.0, 0.0),
        2 => Vec2::new(1.0, 1.0),
        3 => Vec2::new(0.0, 1.0),
        4 => Vec2::new(-1.0, 1.0),
        5 => Vec2::new(-1.0, 0.0),
        6 => Vec2::new(-1.0, -1.0),
        7 => Vec2::new(0.0, -1.0),
        8 => Vec2::new(1.0, -1.0),
        _ => Vec2::ZERO,
    }
    .normalize()
}

/// Ticks from `earlier` to `later` on the wrapping 8-bit clock.
#[inline]
pub fn tick_delta(later: u8, earlier: u8) -> u8 {
    later.wrapping_sub(earlier)
}

// =============================================================================
// INPUT QUEUE
// =============================================================================

/// Bounded FIFO of received inputs. When full the oldest is dropped.
#[derive(Clone, Debug)]
pub struct InputQueue {
    inputs: VecDeque<PlayerInput>,
    capacity: usize,
}

impl InputQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { inputs: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append an input. Returns true if the oldest had to be dropped.
    pub fn push(&mut self, input: PlayerInput) -> bool {
        let dropped = if self.inputs.len() == self.capacity {
            self.inputs.pop_front();
            true
        } else {
            false
        };
        self.inputs.push_back(input);
        dropped
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }

    /// Take every queued input after discarding the oldest ones beyond
    /// `owed`. Order is kept.
    pub fn take_owed(&mut self, owed: usize) -> Vec<PlayerInput> {
        let excess = self.inputs.len().saturating_sub(owed);
        self.inputs.drain(..excess);
        self.inputs.drain(..).collect()
    }
}

// =============================================================================
// RECONCILIATION
// =============================================================================

/// Advance a player's input clock by one server tick and return the inputs
/// to simulate this tick.
///
/// Sets the speed-up flag while the client owes more ticks than the lag
/// ceiling allows.
pub fn take_tick_inputs(player: &mut Player, config: &GameConfig) -> Vec<PlayerInput> {
    player.ticks_since_last_input += 1;

    let before = player.inputs.len();
    let consumed = player.inputs.take_owed(player.ticks_since_last_input as usize);
    let discarded = before - consumed.len();
    if discarded > 0 {
        tracing::trace!(player = %player.id, discarded, "discarded input burst");
    }

    player.ticks_since_last_input -= consumed.len() as u32;

    if player.ticks_since_last_input > config.max_input_lag_ticks {
        player.ticks_since_last_input = config.max_input_lag_ticks;
        player.do_speedup = true;
    } else {
        player.do_speedup = false;
    }

    consumed
}

/// Ticks the predicted copy is extrapolated past the acked one.
#[inline]
pub fn prediction_steps(player: &Player, config: &GameConfig) -> u32 {
    player.ticks_since_last_input.min(config.max_motion_predictions)
}

// =============================================================================
// TESTS
// =============================================================================
