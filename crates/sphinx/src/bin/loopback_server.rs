//! # Sphinx Loopback Server
//!
//! Headless authoritative server with in-process clients over the loopback
//! transport. Each client walks its player around a circle; the server
//! relays the moves and logs what every peer sees.
//!
//! ```bash
//! RUST_LOG=sphinx_net=debug loopback_server [config.toml] [seconds]
//! ```

use std::error::Error;
use std::time::Duration;

use sphinx::core::{CoordinateTransform, Velocity, World};
use sphinx::net::{ClientSession, LinkConditions, LoopbackHub, LoopbackTransport, NetConfig, NetRole, ServerSession};
use sphinx::shared::{Coordinate, Vec3, Vec3Int, CHUNK_SIZE};
use sphinx::TickLoop;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CLIENTS: usize = 3;
const DEFAULT_SECONDS: u64 = 5;

fn game_world() -> World {
    let mut world = World::new();
    world.register::<CoordinateTransform>();
    world.register::<Velocity>();
    world
}

fn circle_position(tick: u64, client: usize) -> Coordinate {
    let angle = (tick as f32 * 0.05) + (client as f32 * std::f32::consts::TAU / CLIENTS as f32);
    let radius = 5.0;
    let center = CHUNK_SIZE as f32 / 2.0;
    let x = center + radius * angle.cos();
    let z = center + radius * angle.sin();
    Coordinate::new(
        Vec3Int::ZERO,
        Vec3Int::new(x.floor() as i32, 1, z.floor() as i32),
        Vec3::new(x.fract(), 0.0, z.fract()),
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => NetConfig::load(path)?,
        None => NetConfig::default(),
    };
    if config.role != NetRole::Server {
        return Err("loopback_server needs role = \"server\"".into());
    }
    let seconds = args.next().map(|s| s.parse::<u64>()).transpose()?.unwrap_or(DEFAULT_SECONDS);

    info!(tick_rate = config.tick_rate, max_connections = config.max_connections, seconds, "starting loopback server");

    let hub = LoopbackHub::with_conditions(LinkConditions::LOSSY, 0x5EED);
    let mut server = ServerSession::new(hub.listen(), &config, game_world());
    let mut clients: Vec<ClientSession<LoopbackTransport>> = (0..CLIENTS)
        .map(|_| Ok(ClientSession::new(hub.connect()?, &NetConfig::client(), game_world())))
        .collect::<Result<_, sphinx::net::NetError>>()?;

    let mut ticks = TickLoop::from_config(&config);
    let total_ticks = seconds * u64::from(config.tick_rate);
    while ticks.tick_count() < total_ticks {
        let ctx = ticks.begin_tick();

        for event in server.update(ctx.delta)? {
            info!(?event, "server event");
        }
        for (index, client) in clients.iter_mut().enumerate() {
            client.update(ctx.delta)?;
            if let Some(player) = client.local_player() {
                let target = circle_position(ctx.tick, index);
                client.mutate::<CoordinateTransform, _, _>(player, |t, c| {
                    t.set_position(target, c);
                })?;
            }
        }

        if ctx.tick % u64::from(config.tick_rate) == 0 {
            for net_id in server.net().connected_client_net_ids() {
                if let Some(player) = server.player_of(net_id) {
                    let position = server.world().component::<CoordinateTransform>(player)?.position();
                    info!(tick = ctx.tick, %net_id, world = ?position.to_world(), "player position");
                }
            }
        }

        let remaining = ticks.end_tick(ctx);
        std::thread::sleep(remaining);
    }

    let stats = ticks.stats();
    info!(
        ticks = stats.ticks,
        avg_us = stats.average_us(),
        max_us = stats.max_us,
        over_budget = stats.over_budget,
        entities = server.world().entities().len(),
        "shutting down"
    );
    for client in &clients {
        info!(net_id = ?client.local_net_id(), mirrors = client.mirror_count(), "client summary");
    }
    Ok(())
}
