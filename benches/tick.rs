use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ctf_arena::game::map::{Map, TileTable};
use ctf_arena::game::state::NetState;
use ctf_arena::game::{advance_tick, simulate, GameConfig, PlayerInput, World};
use ctf_arena::network::protocol::StateUpdate;

fn populated_world(players: usize) -> World {
    let config = GameConfig::default();
    let map = Map::arena(&TileTable::standard(), 40, 24, config.tile_size).unwrap();
    let mut world = World::new(Arc::new(map), config, 99);
    for _ in 0..players {
        let id = world.add_player().unwrap();
        world.get_player_mut(id).unwrap().net_state = NetState::WaitingForInput;
        world.receive_input(id, PlayerInput::default());
    }
    // Let everyone out of jail
    world.config.jail_time_ticks = 1;
    for player in world.players.values_mut() {
        player.jail_time_ticks = 1;
    }
    simulate(&mut world);
    world
}

fn bench_tick(c: &mut Criterion) {
    let mut world = populated_world(32);
    let ids: Vec<_> = world.players.keys().copied().collect();

    c.bench_function("tick_32_players", |b| {
        b.iter(|| {
            let tick = world.tick;
            for (i, &id) in ids.iter().enumerate() {
                let input = PlayerInput {
                    tick,
                    movement: 1 << (i % 4),
                    actions: if i % 8 == 0 { PlayerInput::FIRE_SECONDARY } else { 0 },
                    aim_angle: i as f64,
                };
                world.receive_input(id, input);
            }
            let result = simulate(black_box(&mut world));
            advance_tick(&mut world);
            result
        })
    });

    c.bench_function("encode_state_update", |b| {
        let player = world.players.values().next().unwrap();
        b.iter(|| StateUpdate::for_player(black_box(&world), player).encode().unwrap())
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
