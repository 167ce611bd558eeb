//! Game Session
//!
//! Owns the world and one [`Link`] per player, and runs the full tick:
//!
//! ```text
//! receive (capped per player) -> simulate -> send -> evict -> advance
//! ```
//!
//! Per-player failures only ever mark that player for disconnection.
//! An encoding failure is a broken invariant and stops the session.

use std::collections::BTreeMap;

use tracing::{debug, info, trace, warn};

use crate::game::events::GameEvent;
use crate::game::state::{NetState, PlayerId, World};
use crate::game::tick::{advance_tick, simulate, TickResult};
use crate::network::codec::CodecError;
use crate::network::link::{Link, Recv};
use crate::network::protocol::{ClientMessage, InitMessage, StateUpdate};

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Every player id is taken.
    #[error("Session is full")]
    Full,

    /// An outbound message could not be encoded.
    #[error("Failed to encode message: {0}")]
    Encode(#[from] CodecError),
}

/// The world plus the links to its players.
pub struct Session<L: Link> {
    world: World,
    links: BTreeMap<PlayerId, L>,
}

impl<L: Link> Session<L> {
    pub fn new(world: World) -> Self {
        Self { world, links: BTreeMap::new() }
    }

    #[inline]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Connected player count.
    #[inline]
    pub fn player_count(&self) -> usize {
        self.links.len()
    }

    /// Admit a connection. It receives Init on the next send phase.
    pub fn add_player(&mut self, link: L) -> Result<PlayerId, SessionError> {
        let id = self.world.add_player().ok_or(SessionError::Full)?;
        self.links.insert(id, link);
        if let Some(player) = self.world.get_player(id) {
            info!(player = %id, team = ?player.team, players = self.links.len(), "player joined");
        }
        Ok(id)
    }

    /// Remove a player and hand back its link. Dropping the link closes
    /// the connection.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<L> {
        self.world.remove_player(id);
        self.links.remove(&id)
    }

    /// Run one full tick.
    pub fn tick(&mut self) -> Result<TickResult, SessionError> {
        self.receive();

        let result = simulate(&mut self.world);
        log_events(result.tick, &result.events);

        self.send()?;
        self.evict();
        advance_tick(&mut self.world);

        Ok(result)
    }

    /// Drain up to the per-tick read cap from every link.
    fn receive(&mut self) {
        let max_reads = self.world.config.max_reads_per_tick;

        for (&id, link) in self.links.iter_mut() {
            for _ in 0..max_reads {
                match link.try_recv() {
                    Recv::Frame(frame) => match ClientMessage::decode(&frame) {
                        Ok(ClientMessage::Input(input)) => self.world.receive_input(id, input),
                        Err(e) => {
                            warn!(player = %id, error = %e, "protocol error, disconnecting");
                            debug!(player = %id, frame = %hex::encode(&frame), "rejected frame");
                            mark_disconnect(&mut self.world, id);
                            break;
                        }
                    },
                    Recv::Empty => break,
                    Recv::Closed => {
                        debug!(player = %id, "connection closed");
                        mark_disconnect(&mut self.world, id);
                        break;
                    }
                }
            }
        }
    }

    /// Queue Init for joining players and a StateUpdate for everyone else.
    ///
    /// Waiting players get updates too; the server tick in them is what a
    /// client seeds its own tick from before sending any input.
    fn send(&mut self) -> Result<(), SessionError> {
        let mut outgoing = Vec::with_capacity(self.links.len());
        for player in self.world.players.values() {
            if player.do_disconnect {
                continue;
            }
            let frame = match player.net_state {
                NetState::Joining => InitMessage::new(player.id, &self.world.map).encode()?,
                NetState::WaitingForInput | NetState::Ready => StateUpdate::for_player(&self.world, player).encode()?,
            };
            outgoing.push((player.id, frame));
        }

        for (id, frame) in outgoing {
            let Some(link) = self.links.get_mut(&id) else {
                continue;
            };
            let sent = link.try_send(frame);
            let Some(player) = self.world.get_player_mut(id) else {
                continue;
            };
            match sent {
                Ok(()) => {
                    if player.net_state == NetState::Joining {
                        player.net_state = NetState::WaitingForInput;
                    }
                }
                Err(e) => {
                    warn!(player = %id, error = %e, "send failed, disconnecting");
                    player.do_disconnect = true;
                }
            }
        }
        Ok(())
    }

    /// Remove every player marked for disconnection.
    fn evict(&mut self) {
        let leaving: Vec<PlayerId> = self
            .world
            .players
            .values()
            .filter(|p| p.do_disconnect)
            .map(|p| p.id)
            .collect();

        for id in leaving {
            self.remove_player(id);
            info!(player = %id, players = self.links.len(), "player evicted");
        }
    }
}

fn mark_disconnect(world: &mut World, id: PlayerId) {
    if let Some(player) = world.get_player_mut(id) {
        player.do_disconnect = true;
    }
}

fn log_events(tick: u8, events: &[GameEvent]) {
    for event in events {
        if event.is_notable() {
            debug!(tick, "{}", event);
        } else {
            trace!(tick, "{}", event);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::input::PlayerInput;
    use crate::game::state::tests::test_world;
    use crate::game::state::SimState;
    use crate::network::link::{ChannelLink, SendError};
    use crate::network::protocol::{ServerMessage, MSG_INIT, MSG_INPUT, MSG_STATE_UPDATE};
    use std::collections::VecDeque;

    /// In-memory link with a fixed outbound capacity.
    #[derive(Default)]
    struct MockLink {
        inbound: VecDeque<Vec<u8>>,
        outbound: Vec<Vec<u8>>,
        capacity: usize,
        closed: bool,
    }

    impl MockLink {
        fn with_capacity(capacity: usize) -> Self {
            Self { capacity, ..Default::default() }
        }

        fn push_input(&mut self, input: PlayerInput) {
            self.inbound.push_back(ClientMessage::Input(input).encode());
        }
    }

    impl Link for MockLink {
        fn try_recv(&mut self) -> Recv {
            match self.inbound.pop_front() {
                Some(frame) => Recv::Frame(frame),
                None if self.closed => Recv::Closed,
                None => Recv::Empty,
            }
        }

        fn try_send(&mut self, frame: Vec<u8>) -> Result<(), SendError> {
            if self.closed {
                return Err(SendError::Closed);
            }
            if self.outbound.len() >= self.capacity {
                return Err(SendError::Full);
            }
            self.outbound.push(frame);
            Ok(())
        }
    }

    fn session() -> Session<MockLink> {
        Session::new(test_world())
    }

    fn link(session: &mut Session<MockLink>, id: PlayerId) -> &mut MockLink {
        session.links.get_mut(&id).unwrap()
    }

    fn decode_last(session: &mut Session<MockLink>, id: PlayerId) -> ServerMessage {
        let frame = link(session, id).outbound.last().cloned().unwrap();
        ServerMessage::decode(&frame).unwrap()
    }

    #[test]
    fn test_join_flow() {
        let mut session = session();
        let id = session.add_player(MockLink::with_capacity(64)).unwrap();

        session.tick().unwrap();
        match decode_last(&mut session, id) {
            ServerMessage::Init(init) => {
                assert_eq!(init.player_id, id);
                assert_eq!(init.tiles.len(), session.world().map.row_count());
            }
            other => panic!("expected Init, got {:?}", other),
        }
        assert_eq!(session.world().get_player(id).unwrap().net_state, NetState::WaitingForInput);

        // Updates flow before any input, carrying the server tick
        let tick = session.world().tick;
        session.tick().unwrap();
        assert_eq!(link(&mut session, id).outbound.len(), 2);
        match decode_last(&mut session, id) {
            ServerMessage::StateUpdate(update) => {
                assert_eq!(update.tick, tick);
                assert_eq!(update.acked_tick, None);
            }
            other => panic!("expected StateUpdate, got {:?}", other),
        }
        assert_eq!(session.world().get_player(id).unwrap().net_state, NetState::WaitingForInput);

        link(&mut session, id).push_input(PlayerInput::default());
        session.tick().unwrap();
        let player = session.world().get_player(id).unwrap();
        assert_eq!(player.net_state, NetState::Ready);
        assert_eq!(player.sim_state, SimState::Jailed);
        match decode_last(&mut session, id) {
            ServerMessage::StateUpdate(update) => {
                assert_eq!(update.acked_tick, Some(0));
                assert_eq!(update.own.sim_state, SimState::Jailed);
            }
            other => panic!("expected StateUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_waiting_player_receives_updates() {
        let mut session: Session<ChannelLink> = Session::new(test_world());
        let (player_link, mut remote) = ChannelLink::pair(4, 8);
        session.add_player(player_link).unwrap();

        for _ in 0..3 {
            session.tick().unwrap();
        }

        let mut kinds = Vec::new();
        while let Ok(frame) = remote.outbound.try_recv() {
            kinds.push(frame[0]);
        }
        assert_eq!(kinds, vec![MSG_INIT, MSG_STATE_UPDATE, MSG_STATE_UPDATE]);
    }

    #[test]
    fn test_tick_advances_and_wraps() {
        let mut session = session();
        session.world_mut().tick = 255;
        let result = session.tick().unwrap();
        assert_eq!(result.tick, 255);
        assert_eq!(session.world().tick, 0);
    }

    #[test]
    fn test_malformed_frame_disconnects_only_sender() {
        let mut session = session();
        let bad = session.add_player(MockLink::with_capacity(64)).unwrap();
        let good = session.add_player(MockLink::with_capacity(64)).unwrap();
        session.tick().unwrap();

        link(&mut session, bad).inbound.push_back(vec![MSG_INPUT, 1, 0]);
        link(&mut session, good).push_input(PlayerInput::default());
        session.tick().unwrap();

        assert!(session.world().get_player(bad).is_none());
        assert_eq!(session.player_count(), 1);
        assert_eq!(session.world().get_player(good).unwrap().net_state, NetState::Ready);
    }

    #[test]
    fn test_read_cap_per_tick() {
        let mut session = session();
        session.world_mut().config.max_reads_per_tick = 2;
        let id = session.add_player(MockLink::with_capacity(64)).unwrap();
        session.tick().unwrap();

        for tick in 0..5 {
            link(&mut session, id).push_input(PlayerInput::with_movement(tick, 0));
        }
        session.tick().unwrap();
        assert_eq!(link(&mut session, id).inbound.len(), 3);
    }

    #[test]
    fn test_full_queue_disconnects_without_stalling_others() {
        let mut session = session();
        let slow = session.add_player(MockLink::with_capacity(1)).unwrap();
        let fast = session.add_player(MockLink::with_capacity(64)).unwrap();
        session.tick().unwrap();

        link(&mut session, slow).push_input(PlayerInput::default());
        link(&mut session, fast).push_input(PlayerInput::default());
        let tick = session.world().tick;
        session.tick().unwrap();

        assert!(session.world().get_player(slow).is_none());
        assert!(!session.links.contains_key(&slow));
        match decode_last(&mut session, fast) {
            ServerMessage::StateUpdate(update) => assert_eq!(update.tick, tick),
            other => panic!("expected StateUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_closed_link_evicted_and_flag_dropped() {
        let mut session = session();
        let id = session.add_player(MockLink::with_capacity(64)).unwrap();
        session.tick().unwrap();
        link(&mut session, id).push_input(PlayerInput::default());
        session.tick().unwrap();

        let pos = Vec2::new(300.0, 300.0);
        let world = session.world_mut();
        world.flags[0].state = crate::game::state::FlagState::Carried(id);
        world.get_player_mut(id).unwrap().acked.pos = pos;

        link(&mut session, id).closed = true;
        session.tick().unwrap();
        assert_eq!(session.player_count(), 0);
        assert_eq!(session.world().flags[0].state, crate::game::state::FlagState::Dropped);
    }

    #[test]
    fn test_full_world_rejected() {
        let mut session = session();
        for _ in 0..crate::game::state::MAX_PLAYERS {
            session.add_player(MockLink::with_capacity(1)).unwrap();
        }
        assert_eq!(session.add_player(MockLink::default()).err(), Some(SessionError::Full));
    }

    #[tokio::test]
    async fn test_channel_link_backpressure() {
        let mut session: Session<ChannelLink> = Session::new(test_world());
        let (slow_link, slow_remote) = ChannelLink::pair(4, 1);
        let (fast_link, mut fast_remote) = ChannelLink::pair(4, 8);
        let slow = session.add_player(slow_link).unwrap();
        let fast = session.add_player(fast_link).unwrap();

        // Init fills the slow player's only slot
        session.tick().unwrap();
        for remote in [&slow_remote.inbound, &fast_remote.inbound] {
            remote.send(ClientMessage::Input(PlayerInput::default()).encode()).await.unwrap();
        }
        session.tick().unwrap();

        assert!(session.world().get_player(slow).is_none());
        assert!(session.world().get_player(fast).is_some());
        assert!(matches!(fast_remote.outbound.recv().await, Some(f) if f[0] == MSG_INIT));
        assert!(fast_remote.outbound.recv().await.is_some());
    }
}
