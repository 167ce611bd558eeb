//! Protocol Messages
//!
//! Binary wire format, big-endian, one leading type byte per message.
//!
//! ```text
//! Input        (client -> server)
//!   u8 type=0 | u8 actions | u8 client tick | u8 movement | [f64 aim if firing]
//!
//! Init         (server -> client, once)
//!   u8 type=2 | u8 player id | u16 rows | rows x (u16 len | len x u8 tile type)
//!
//! StateUpdate  (server -> client, every tick)
//!   u8 type=1 | u8 flags | u8 server tick | [u8 acked client tick]
//!   own:    u8 state | i8 flag index | vec pos | u16 energy | u16 bouncy energy
//!   u8  n   x (u8 id | u8 state | vec predicted pos | u8 dir)
//!   u16 n   x (u8 kind | u8 owner | vec start | vec end | f64 angle)
//!   u16 n   x vec hit
//!   u8  n   x vec flag
//! ```
//!
//! `vec` is two `f64`s.

use crate::core::vec2::Vec2;
use crate::game::input::PlayerInput;
use crate::game::map::Map;
use crate::game::state::{NetState, Player, PlayerId, ProjectileKind, SimState, World};
use crate::network::codec::{CodecError, Decoder, Encoder};

/// Client input message type.
pub const MSG_INPUT: u8 = 0;
/// Per-tick state message type.
pub const MSG_STATE_UPDATE: u8 = 1;
/// Join message type.
pub const MSG_INIT: u8 = 2;

/// StateUpdate flag: `acked_tick` is present.
pub const STATE_FLAG_ACK: u8 = 0x01;
/// StateUpdate flag: client should speed up.
pub const STATE_FLAG_SPEEDUP: u8 = 0x02;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Player input for one client tick.
    Input(PlayerInput),
}

impl ClientMessage {
    /// Decode a complete frame. Any error rejects the whole frame.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut dec = Decoder::new(data);
        let msg = match dec.read_u8()? {
            MSG_INPUT => {
                let actions = dec.read_u8()?;
                let tick = dec.read_u8()?;
                let movement = dec.read_u8()?;
                let mut input = PlayerInput { tick, movement, actions, aim_angle: 0.0 };
                if input.is_firing() {
                    input.aim_angle = dec.read_finite_f64("aim angle")?;
                }
                ClientMessage::Input(input)
            }
            other => return Err(CodecError::UnknownMessageType(other)),
        };
        dec.finish()?;
        Ok(msg)
    }

    pub fn encode(&self) -> Vec<u8> {
        let ClientMessage::Input(input) = self;
        let mut enc = Encoder::with_capacity(12);
        enc.write_u8(MSG_INPUT);
        enc.write_u8(input.actions);
        enc.write_u8(input.tick);
        enc.write_u8(input.movement);
        if input.is_firing() {
            enc.write_f64(input.aim_angle);
        }
        enc.finish()
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Sent once to a joining player: its id and the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitMessage {
    pub player_id: PlayerId,
    /// Tile type ids, row by row.
    pub tiles: Vec<Vec<u8>>,
}

impl InitMessage {
    pub fn new(player_id: PlayerId, map: &Map) -> Self {
        Self { player_id, tiles: map.type_ids() }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let size = 4 + self.tiles.iter().map(|row| 2 + row.len()).sum::<usize>();
        let mut enc = Encoder::with_capacity(size);
        enc.write_u8(MSG_INIT);
        enc.write_u8(self.player_id.0);
        enc.write_count_u16("map rows", self.tiles.len())?;
        for row in &self.tiles {
            enc.write_count_u16("row tiles", row.len())?;
            for &tile in row {
                enc.write_u8(tile);
            }
        }
        Ok(enc.finish())
    }

    fn decode_body(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let player_id = PlayerId(dec.read_u8()?);
        let rows = dec.read_u16()? as usize;
        let mut tiles = Vec::with_capacity(rows.min(dec.remaining() / 2));
        for _ in 0..rows {
            let len = dec.read_u16()? as usize;
            tiles.push(dec.read_bytes(len)?.to_vec());
        }
        Ok(Self { player_id, tiles })
    }
}

/// The receiving player's own acked state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OwnState {
    pub sim_state: SimState,
    /// Index of the carried flag.
    pub flag_index: Option<u8>,
    pub pos: Vec2,
    pub energy: u16,
    pub bouncy_energy: u16,
}

/// Another player as seen by the receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtherPlayer {
    pub id: PlayerId,
    pub sim_state: SimState,
    /// Predicted, not acked, position.
    pub pos: Vec2,
    /// Facing as a keypad number.
    pub dir_num: u8,
}

/// A projectile fired this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileInfo {
    pub kind: ProjectileKind,
    pub owner: PlayerId,
    pub start: Vec2,
    pub end: Vec2,
    pub angle: f64,
}

/// Per-tick state for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub tick: u8,
    /// Client tick of the newest input consumed this tick.
    pub acked_tick: Option<u8>,
    pub speedup: bool,
    pub own: OwnState,
    pub others: Vec<OtherPlayer>,
    pub projectiles: Vec<ProjectileInfo>,
    pub hits: Vec<Vec2>,
    pub flags: Vec<Vec2>,
}

impl StateUpdate {
    /// Build the update `player` receives this tick.
    pub fn for_player(world: &World, player: &Player) -> Self {
        let others = world
            .players
            .values()
            .filter(|p| p.id != player.id && p.net_state == NetState::Ready)
            .map(|p| OtherPlayer {
                id: p.id,
                sim_state: p.sim_state,
                pos: p.predicted.pos,
                dir_num: p.dir_num(),
            })
            .collect();

        let projectiles = world
            .new_projectiles
            .iter()
            .map(|p| ProjectileInfo {
                kind: p.kind,
                owner: p.owner,
                start: p.line.start,
                end: p.line.end,
                angle: p.angle,
            })
            .collect();

        Self {
            tick: world.tick,
            acked_tick: player.acked_input_tick,
            speedup: player.do_speedup,
            own: OwnState {
                sim_state: player.sim_state,
                flag_index: world.flag_carried_by(player.id).map(|i| i.min(u8::MAX as usize) as u8),
                pos: player.acked.pos,
                energy: player.acked.energy,
                bouncy_energy: player.acked.bouncy_energy,
            },
            others,
            projectiles,
            hits: world.new_hits.clone(),
            flags: world.flags.iter().map(|f| f.pos).collect(),
        }
    }

    /// Encode, failing if a list is too long for its count field.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let size = 48 + self.others.len() * 19 + self.projectiles.len() * 42 + (self.hits.len() + self.flags.len()) * 16;
        let mut enc = Encoder::with_capacity(size);

        let mut flags = 0;
        if self.acked_tick.is_some() {
            flags |= STATE_FLAG_ACK;
        }
        if self.speedup {
            flags |= STATE_FLAG_SPEEDUP;
        }
        enc.write_u8(MSG_STATE_UPDATE);
        enc.write_u8(flags);
        enc.write_u8(self.tick);
        if let Some(acked) = self.acked_tick {
            enc.write_u8(acked);
        }

        let flag_index = match self.own.flag_index {
            None => -1,
            Some(i) => i8::try_from(i).map_err(|_| CodecError::CountOverflow {
                what: "flag index",
                count: i as usize,
                max: i8::MAX as usize,
            })?,
        };
        enc.write_u8(self.own.sim_state as u8);
        enc.write_i8(flag_index);
        enc.write_vec2(self.own.pos);
        enc.write_u16(self.own.energy);
        enc.write_u16(self.own.bouncy_energy);

        enc.write_count_u8("other players", self.others.len())?;
        for other in &self.others {
            enc.write_u8(other.id.0);
            enc.write_u8(other.sim_state as u8);
            enc.write_vec2(other.pos);
            enc.write_u8(other.dir_num);
        }

        enc.write_count_u16("projectiles", self.projectiles.len())?;
        for p in &self.projectiles {
            enc.write_u8(p.kind as u8);
            enc.write_u8(p.owner.0);
            enc.write_vec2(p.start);
            enc.write_vec2(p.end);
            enc.write_f64(p.angle);
        }

        enc.write_count_u16("hits", self.hits.len())?;
        for &hit in &self.hits {
            enc.write_vec2(hit);
        }

        enc.write_count_u8("flags", self.flags.len())?;
        for &flag in &self.flags {
            enc.write_vec2(flag);
        }

        Ok(enc.finish())
    }

    fn decode_body(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let flags = dec.read_u8()?;
        let tick = dec.read_u8()?;
        let acked_tick = if flags & STATE_FLAG_ACK != 0 {
            Some(dec.read_u8()?)
        } else {
            None
        };

        let sim_state = read_sim_state(dec)?;
        let flag_index = match dec.read_i8()? {
            -1 => None,
            i if i >= 0 => Some(i as u8),
            i => return Err(CodecError::InvalidEnum { what: "flag index", value: i as u8 }),
        };
        let own = OwnState {
            sim_state,
            flag_index,
            pos: dec.read_vec2()?,
            energy: dec.read_u16()?,
            bouncy_energy: dec.read_u16()?,
        };

        let count = dec.read_u8()? as usize;
        let mut others = Vec::with_capacity(count);
        for _ in 0..count {
            others.push(OtherPlayer {
                id: PlayerId(dec.read_u8()?),
                sim_state: read_sim_state(dec)?,
                pos: dec.read_vec2()?,
                dir_num: dec.read_u8()?,
            });
        }

        let count = dec.read_u16()? as usize;
        let mut projectiles = Vec::with_capacity(count.min(dec.remaining() / 42));
        for _ in 0..count {
            let kind_byte = dec.read_u8()?;
            let kind = ProjectileKind::from_u8(kind_byte)
                .ok_or(CodecError::InvalidEnum { what: "projectile kind", value: kind_byte })?;
            projectiles.push(ProjectileInfo {
                kind,
                owner: PlayerId(dec.read_u8()?),
                start: dec.read_vec2()?,
                end: dec.read_vec2()?,
                angle: dec.read_f64()?,
            });
        }

        let count = dec.read_u16()? as usize;
        let mut hits = Vec::with_capacity(count.min(dec.remaining() / 16));
        for _ in 0..count {
            hits.push(dec.read_vec2()?);
        }

        let count = dec.read_u8()? as usize;
        let mut flag_positions = Vec::with_capacity(count);
        for _ in 0..count {
            flag_positions.push(dec.read_vec2()?);
        }

        Ok(Self {
            tick,
            acked_tick,
            speedup: flags & STATE_FLAG_SPEEDUP != 0,
            own,
            others,
            projectiles,
            hits,
            flags: flag_positions,
        })
    }
}

fn read_sim_state(dec: &mut Decoder<'_>) -> Result<SimState, CodecError> {
    let value = dec.read_u8()?;
    SimState::from_u8(value).ok_or(CodecError::InvalidEnum { what: "player state", value })
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Init(InitMessage),
    StateUpdate(StateUpdate),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            ServerMessage::Init(msg) => msg.encode(),
            ServerMessage::StateUpdate(msg) => msg.encode(),
        }
    }

    /// Decode a complete frame, as a client would.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut dec = Decoder::new(data);
        let msg = match dec.read_u8()? {
            MSG_INIT => ServerMessage::Init(InitMessage::decode_body(&mut dec)?),
            MSG_STATE_UPDATE => ServerMessage::StateUpdate(StateUpdate::decode_body(&mut dec)?),
            other => return Err(CodecError::UnknownMessageType(other)),
        };
        dec.finish()?;
        Ok(msg)
    }
}

// =============================================================================
// TESTS
// =============================================================================
