//! End-to-end tests against a bound server over real WebSockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use ctf_arena::game::state::SimState;
use ctf_arena::network::protocol::{ClientMessage, ServerMessage, StateUpdate};
use ctf_arena::network::server::{load_world, GameServer, ServerConfig};
use ctf_arena::PlayerInput;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (Arc<GameServer>, SocketAddr) {
    let config = ServerConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        seed: Some(42),
        ..Default::default()
    };
    let server = Arc::new(GameServer::bind(config).await.unwrap());
    let addr = server.local_addr().unwrap();
    let world = load_world(None, None, 42).unwrap();
    {
        let server = server.clone();
        tokio::spawn(async move { server.run(world).await });
    }
    (server, addr)
}

async fn next_message(client: &mut Client) -> Option<ServerMessage> {
    loop {
        match timeout(Duration::from_secs(2), client.next()).await.ok()?? {
            Ok(Message::Binary(data)) => return Some(ServerMessage::decode(&data).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

async fn next_update(client: &mut Client, pred: impl Fn(&StateUpdate) -> bool) -> Option<StateUpdate> {
    for _ in 0..60 {
        match next_message(client).await? {
            ServerMessage::StateUpdate(update) if pred(&update) => return Some(update),
            _ => {}
        }
    }
    None
}

#[tokio::test]
async fn test_join_input_and_ack() {
    let (server, addr) = start_server().await;
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    let init = match next_message(&mut client).await {
        Some(ServerMessage::Init(init)) => init,
        other => panic!("expected Init, got {:?}", other),
    };
    assert_eq!(init.tiles.len(), 24);
    assert!(init.tiles.iter().all(|row| row.len() == 40));

    // The first update arrives before any input and seeds the client tick
    let first = next_update(&mut client, |_| true).await.expect("update before input");
    assert_eq!(first.acked_tick, None);
    let client_tick = first.tick;

    let input = ClientMessage::Input(PlayerInput::with_movement(client_tick, PlayerInput::MOVE_RIGHT));
    client.send(Message::Binary(input.encode())).await.unwrap();

    let update = next_update(&mut client, |u| u.acked_tick == Some(client_tick)).await.expect("acked update");
    assert_eq!(update.own.sim_state, SimState::Jailed);
    assert_eq!(update.flags.len(), 2);

    server.shutdown();
}

#[tokio::test]
async fn test_two_players_see_each_other() {
    let (server, addr) = start_server().await;
    let (mut a, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let (mut b, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    let Some(ServerMessage::Init(init_a)) = next_message(&mut a).await else { panic!("no Init for a") };
    let Some(ServerMessage::Init(init_b)) = next_message(&mut b).await else { panic!("no Init for b") };
    assert_ne!(init_a.player_id, init_b.player_id);

    for (client, tick) in [(&mut a, 0u8), (&mut b, 0u8)] {
        let input = ClientMessage::Input(PlayerInput::with_movement(tick, 0));
        client.send(Message::Binary(input.encode())).await.unwrap();
    }

    let update = next_update(&mut a, |u| !u.others.is_empty()).await.expect("update with other player");
    assert_eq!(update.others[0].id, init_b.player_id);

    server.shutdown();
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let (server, addr) = start_server().await;
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    assert!(matches!(next_message(&mut client).await, Some(ServerMessage::Init(_))));

    // Unknown message type
    client.send(Message::Binary(vec![9, 0, 0, 0])).await.unwrap();

    let mut closed = false;
    for _ in 0..60 {
        if next_message(&mut client).await.is_none() {
            closed = true;
            break;
        }
    }
    assert!(closed);

    server.shutdown();
}

#[tokio::test]
async fn test_text_frame_closes_connection() {
    let (server, addr) = start_server().await;
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    assert!(matches!(next_message(&mut client).await, Some(ServerMessage::Init(_))));

    client.send(Message::Text("hello".to_string())).await.unwrap();

    let mut closed = false;
    for _ in 0..60 {
        if next_message(&mut client).await.is_none() {
            closed = true;
            break;
        }
    }
    assert!(closed);

    server.shutdown();
}
