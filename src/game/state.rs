//! Game State Definitions
//!
//! All state owned by the simulation: players, projectiles, flags and the
//! world that holds them. Players live in a `BTreeMap` keyed by id so
//! iteration order is stable and lookups never go through stale indices.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::geometry::Line;
use crate::core::rng::WorldRng;
use crate::core::vec2::Vec2;
use crate::game::config::GameConfig;
use crate::game::events::GameEvent;
use crate::game::input::{InputQueue, PlayerInput};
use crate::game::map::Map;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Player identifier, unique among connected players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Number of distinct player ids.
pub const MAX_PLAYERS: usize = 256;

/// Hands out player ids, reusing released ones.
///
/// Fresh ids are issued in order until all 256 have been used once, after
/// which released ids come back last-in first-out.
#[derive(Clone, Debug, Default)]
pub struct PlayerIdPool {
    issued: usize,
    free: Vec<PlayerId>,
}

impl PlayerIdPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an id, or `None` when every id is in use.
    pub fn acquire(&mut self) -> Option<PlayerId> {
        if self.issued < MAX_PLAYERS {
            let id = PlayerId(self.issued as u8);
            self.issued += 1;
            return Some(id);
        }
        self.free.pop()
    }

    /// Return an id to the pool.
    pub fn release(&mut self, id: PlayerId) {
        debug_assert!(!self.free.contains(&id), "player id {} released twice", id);
        self.free.push(id);
    }

    /// Ids currently handed out.
    pub fn in_use(&self) -> usize {
        self.issued - self.free.len()
    }
}

// =============================================================================
// TEAMS AND STATES
// =============================================================================

/// Team affinity of players and tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Team {
    Green = 0,
    Red = 1,
    Yellow = 2,
    Blue = 3,
}

impl Team {
    /// Number of teams a map can describe.
    pub const COUNT: usize = 4;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: u8) -> Option<Team> {
        match index {
            0 => Some(Team::Green),
            1 => Some(Team::Red),
            2 => Some(Team::Yellow),
            3 => Some(Team::Blue),
            _ => None,
        }
    }
}

/// Connection progress of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NetState {
    /// Needs the Init message.
    #[default]
    Joining,
    /// Init sent, no input seen yet.
    WaitingForInput,
    /// Receiving state updates.
    Ready,
}

/// Simulation state of a player. The discriminant goes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SimState {
    #[default]
    Spectating = 0,
    Jailed = 1,
    Alive = 2,
}

impl SimState {
    pub fn from_u8(value: u8) -> Option<SimState> {
        match value {
            0 => Some(SimState::Spectating),
            1 => Some(SimState::Jailed),
            2 => Some(SimState::Alive),
            _ => None,
        }
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Position and weapon energy at some tick.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub pos: Vec2,
    pub energy: u16,
    pub bouncy_energy: u16,
}

/// Complete player state.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub team: Team,
    pub net_state: NetState,
    pub sim_state: SimState,
    pub health: i32,

    /// Ground truth from received inputs.
    pub acked: PlayerSnapshot,
    /// Acked state extrapolated over the ticks still owed.
    pub predicted: PlayerSnapshot,

    /// Received, not yet simulated.
    pub inputs: InputQueue,
    /// Most recent consumed input, used for extrapolation.
    pub last_input: PlayerInput,
    /// Simulation ticks not yet covered by a consumed input.
    pub ticks_since_last_input: u32,
    /// Client tick of the newest input consumed this tick.
    pub acked_input_tick: Option<u8>,

    /// Set when a consumed input asked to drop the carried flag.
    pub drop_flag_requested: bool,
    pub flag_cooldown_ticks: u32,
    pub jail_time_ticks: u32,

    /// Evict at the end of this tick.
    pub do_disconnect: bool,
    /// Ask the client to run faster.
    pub do_speedup: bool,
}

impl Player {
    /// A freshly connected player.
    pub fn new(id: PlayerId, team: Team, input_capacity: usize) -> Self {
        Self {
            id,
            team,
            net_state: NetState::Joining,
            sim_state: SimState::Spectating,
            health: 0,
            acked: PlayerSnapshot::default(),
            predicted: PlayerSnapshot::default(),
            inputs: InputQueue::new(input_capacity),
            last_input: PlayerInput::default(),
            ticks_since_last_input: 0,
            acked_input_tick: None,
            drop_flag_requested: false,
            flag_cooldown_ticks: 0,
            jail_time_ticks: 0,
            do_disconnect: false,
            do_speedup: false,
        }
    }

    /// Alive and not yet out of health.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.sim_state == SimState::Alive && self.health > 0
    }

    /// Facing direction for other clients, from the last consumed input.
    #[inline]
    pub fn dir_num(&self) -> u8 {
        self.last_input.dir_num()
    }

    /// Put the player in jail at `pos`.
    pub fn send_to_jail(&mut self, pos: Vec2, config: &GameConfig) {
        self.sim_state = SimState::Jailed;
        self.jail_time_ticks = config.jail_time_ticks;
        self.acked.pos = pos;
        self.predicted = self.acked;
    }

    /// Release to `pos` with full health and energy.
    pub fn release(&mut self, pos: Vec2, config: &GameConfig) {
        self.sim_state = SimState::Alive;
        self.health = config.player_health;
        self.jail_time_ticks = 0;
        self.acked = PlayerSnapshot {
            pos,
            energy: config.max_laser_energy,
            bouncy_energy: config.max_bouncy_energy,
        };
        self.predicted = self.acked;
    }

    /// Refill both energy pools.
    pub fn refill_energy(&mut self, config: &GameConfig) {
        self.acked.energy = config.max_laser_energy;
        self.acked.bouncy_energy = config.max_bouncy_energy;
    }
}

// =============================================================================
// PROJECTILES
// =============================================================================

/// Projectile class. The discriminant goes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ProjectileKind {
    /// Stops at the first wall.
    Laser = 0,
    /// Reflects off walls.
    Bouncy = 1,
}

impl ProjectileKind {
    pub fn from_u8(value: u8) -> Option<ProjectileKind> {
        match value {
            0 => Some(ProjectileKind::Laser),
            1 => Some(ProjectileKind::Bouncy),
            _ => None,
        }
    }

    #[inline]
    pub fn speed(self, config: &GameConfig) -> f64 {
        config.projectile_speed(self == ProjectileKind::Bouncy)
    }
}

/// A projectile in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct Projectile {
    pub kind: ProjectileKind,
    pub owner: PlayerId,
    /// Segment swept this tick. `end` is the leading edge.
    pub line: Line,
    /// Unit travel direction.
    pub dir: Vec2,
    /// Aim angle at firing time.
    pub angle: f64,
    pub age: u32,
    /// Direction angle after the most recent reflection.
    pub last_bounce_angle: Option<f64>,
}

// =============================================================================
// FLAGS
// =============================================================================

/// Who holds a flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FlagState {
    /// Lying in the field, anyone may take it.
    #[default]
    Dropped,
    /// Held by a player.
    Carried(PlayerId),
    /// Delivered to a goal; only other teams may take it.
    Captured(Team),
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Flag {
    pub pos: Vec2,
    pub state: FlagState,
}

impl Flag {
    pub fn new(pos: Vec2) -> Self {
        Self { pos, state: FlagState::Dropped }
    }

    #[inline]
    pub fn carrier(&self) -> Option<PlayerId> {
        match self.state {
            FlagState::Carried(id) => Some(id),
            _ => None,
        }
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// Mutable simulation state. Owned by the tick driver.
#[derive(Clone, Debug)]
pub struct World {
    /// Current server tick, wraps at 256.
    pub tick: u8,
    pub players: BTreeMap<PlayerId, Player>,
    pub projectiles: Vec<Projectile>,
    pub flags: Vec<Flag>,
    pub map: Arc<Map>,
    pub config: GameConfig,

    /// Projectiles fired this tick.
    pub new_projectiles: Vec<Projectile>,
    /// Points where projectiles hit players this tick.
    pub new_hits: Vec<Vec2>,

    pub rng: WorldRng,
    pub winning_team: Option<Team>,
    pub win_cooldown_ticks: u32,
    pub id_pool: PlayerIdPool,

    /// Events produced this tick.
    pub events: Vec<GameEvent>,
}

impl World {
    /// Create a world on `map` with one dropped flag per flag spawn.
    pub fn new(map: Arc<Map>, config: GameConfig, seed: u64) -> Self {
        let flags = map.flag_spawns().iter().map(|&pos| Flag::new(pos)).collect();
        Self {
            tick: 0,
            players: BTreeMap::new(),
            projectiles: Vec::new(),
            flags,
            map,
            config,
            new_projectiles: Vec::new(),
            new_hits: Vec::new(),
            rng: WorldRng::new(seed),
            winning_team: None,
            win_cooldown_ticks: 0,
            id_pool: PlayerIdPool::new(),
            events: Vec::new(),
        }
    }

    /// Admit a new player on the smaller of Green and Red.
    ///
    /// Returns `None` when every id is taken.
    pub fn add_player(&mut self) -> Option<PlayerId> {
        let id = self.id_pool.acquire()?;
        let team = self.smaller_team();
        self.players.insert(id, Player::new(id, team, self.config.input_buffer_capacity));
        Some(id)
    }

    /// Remove a player and release its id. A carried flag drops where the
    /// player stood.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        for flag in &mut self.flags {
            if flag.carrier() == Some(id) {
                flag.state = FlagState::Dropped;
                flag.pos = player.acked.pos;
            }
        }
        self.id_pool.release(id);
        Some(player)
    }

    #[inline]
    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    #[inline]
    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Queue an input received from a player.
    ///
    /// The first input from a player waiting on it puts the player in jail
    /// and starts the simulation for it.
    pub fn receive_input(&mut self, id: PlayerId, input: PlayerInput) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        if player.net_state == NetState::WaitingForInput {
            let pos = random_location(&mut self.rng, self.map.jails(player.team));
            player.send_to_jail(pos, &self.config);
            player.refill_energy(&self.config);
            player.predicted = player.acked;
            player.net_state = NetState::Ready;
            player.ticks_since_last_input = 0;
            self.events.push(GameEvent::PlayerJailed { player: id });
        }

        if player.inputs.push(input) {
            tracing::debug!(player = %id, "input buffer full, dropped oldest input");
        }
    }

    /// Index of the flag carried by a player.
    pub fn flag_carried_by(&self, id: PlayerId) -> Option<usize> {
        self.flags.iter().position(|f| f.carrier() == Some(id))
    }

    /// Team with fewer players, Green on a tie.
    pub fn smaller_team(&self) -> Team {
        let red = self.players.values().filter(|p| p.team == Team::Red).count();
        let green = self.players.values().filter(|p| p.team == Team::Green).count();
        if red < green {
            Team::Red
        } else {
            Team::Green
        }
    }

    #[inline]
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take all events produced so far.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Random entry from a location list, origin when empty.
pub fn random_location(rng: &mut WorldRng, locations: &[Vec2]) -> Vec2 {
    rng.choose(locations).copied().unwrap_or_default()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::map::TileTable;

    /// 40x24 arena world with default parameters.
    pub(crate) fn test_world() -> World {
        let map = Map::arena(&TileTable::standard(), 40, 24, 32.0).unwrap();
        World::new(Arc::new(map), GameConfig::default(), 7)
    }

    /// Add a player and bring it straight to Alive at `pos`.
    pub(crate) fn spawn_alive(world: &mut World, pos: Vec2) -> PlayerId {
        let id = world.add_player().unwrap();
        let config = world.config.clone();
        let player = world.get_player_mut(id).unwrap();
        player.net_state = NetState::Ready;
        player.release(pos, &config);
        id
    }

    #[test]
    fn test_id_pool_counter_then_free_list() {
        let mut pool = PlayerIdPool::new();
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_eq!(first, PlayerId(0));
        assert_eq!(second, PlayerId(1));

        pool.release(first);
        // Counter is used until exhausted
        assert_eq!(pool.acquire(), Some(PlayerId(2)));

        for _ in 3..MAX_PLAYERS {
            assert!(pool.acquire().is_some());
        }
        assert_eq!(pool.acquire(), Some(PlayerId(0)));
        assert_eq!(pool.acquire(), None);

        pool.release(PlayerId(9));
        pool.release(PlayerId(4));
        assert_eq!(pool.acquire(), Some(PlayerId(4)));
        assert_eq!(pool.acquire(), Some(PlayerId(9)));
        assert_eq!(pool.in_use(), MAX_PLAYERS);
    }

    #[test]
    fn test_team_balance() {
        let mut world = test_world();
        let a = world.add_player().unwrap();
        let b = world.add_player().unwrap();
        let c = world.add_player().unwrap();
        assert_eq!(world.get_player(a).unwrap().team, Team::Green);
        assert_eq!(world.get_player(b).unwrap().team, Team::Red);
        assert_eq!(world.get_player(c).unwrap().team, Team::Green);
    }

    #[test]
    fn test_world_full() {
        let mut world = test_world();
        for _ in 0..MAX_PLAYERS {
            assert!(world.add_player().is_some());
        }
        assert!(world.add_player().is_none());

        world.remove_player(PlayerId(17));
        assert_eq!(world.add_player(), Some(PlayerId(17)));
    }

    #[test]
    fn test_first_input_jails_player() {
        let mut world = test_world();
        let id = world.add_player().unwrap();
        world.get_player_mut(id).unwrap().net_state = NetState::WaitingForInput;

        world.receive_input(id, PlayerInput::default());
        let player = world.get_player(id).unwrap();
        assert_eq!(player.net_state, NetState::Ready);
        assert_eq!(player.sim_state, SimState::Jailed);
        assert_eq!(player.jail_time_ticks, world.config.jail_time_ticks);
        assert!(world.map.jails(player.team).contains(&player.acked.pos));
        assert_eq!(player.inputs.len(), 1);
    }

    #[test]
    fn test_remove_carrier_drops_flag() {
        let mut world = test_world();
        let id = spawn_alive(&mut world, Vec2::new(100.0, 100.0));
        world.flags[0].state = FlagState::Carried(id);

        world.remove_player(id);
        assert_eq!(world.flags[0].state, FlagState::Dropped);
        assert_eq!(world.flags[0].pos, Vec2::new(100.0, 100.0));
        assert!(world.get_player(id).is_none());
    }

    #[test]
    fn test_is_alive_requires_health() {
        let mut world = test_world();
        let id = spawn_alive(&mut world, Vec2::new(100.0, 100.0));
        let player = world.get_player_mut(id).unwrap();
        assert!(player.is_alive());
        player.health = 0;
        assert!(!player.is_alive());
    }

    #[test]
    fn test_flags_from_map() {
        let world = test_world();
        assert_eq!(world.flags.len(), world.map.flag_spawns().len());
        assert!(world.flags.iter().all(|f| f.state == FlagState::Dropped));
    }
}
