//! A scripted "guest" session against the CartLink register window.
//!
//! Plays the part of an emulated processor: maps the window, fires each
//! command through the trigger register, and prints the decoded replies.
//! Run with `RUST_LOG=debug` to watch the link and daemon activity.

use cartlink_bridge::{AccessSize, CartLink, WINDOW_BASE};
use cartlink_codec::{decode_record, encode_record, Value};
use cartlink_session::LinkConfig;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = LinkConfig::new("host_sim_demo")
        .with_rng_seed(2026)
        .with_sync_interval(Duration::from_secs(2))
        .with_tick(Duration::from_millis(250))
        .with_refusal_probability(0.0)
        .with_max_transfer_delay(Duration::from_millis(200))
        .with_connect_delay_cap(Duration::from_millis(100));

    let cart = CartLink::initialize(config);
    info!(base = format_args!("{WINDOW_BASE:#010x}"), "window mapped");

    // 0x01: no parameters.
    fire(&cart, 0x01, 0, None);

    // 0x03: parameter record placed at 0x100.
    fire(
        &cart,
        0x03,
        0x100,
        Some(Value::record(vec![(
            "content_id".into(),
            Value::Integer(7),
        )])),
    );

    // 0x06: leaderboard for board 3.
    fire(
        &cart,
        0x06,
        0x200,
        Some(Value::record(vec![("board_id".into(), Value::Integer(3))])),
    );

    // 0x02: force a sync.
    fire(&cart, 0x02, 0, None);

    // Let the daemon tick a few times before shutting down.
    std::thread::sleep(Duration::from_secs(3));

    let stats = cart.stats();
    info!(
        used = stats.used_bytes,
        available = stats.available_bytes,
        syncs = stats.syncs_completed,
        autosaves = stats.autosaves,
        "session summary"
    );

    cart.shutdown();
}

/// Places optional parameters at `pointer` and fires the trigger register.
fn fire(cart: &CartLink, command: u8, pointer: usize, params: Option<Value>) {
    if let Some(params) = &params {
        match encode_record(params) {
            Ok(bytes) => {
                cart.write(pointer, bytes.len() as u32, AccessSize::Word);
                cart.write_block(pointer + 4, &bytes);
            }
            Err(e) => {
                info!(error = %e, "skipping unencodable parameters");
                return;
            }
        }
    }

    let word = (u32::from(command) << 24) | pointer as u32;
    cart.write(0, word, AccessSize::Word);

    match cart.take_response() {
        Some(bytes) => match decode_record(&bytes) {
            Ok(reply) => info!(command = format_args!("{command:#04x}"), ?reply, "reply"),
            Err(e) => info!(command, error = %e, "undecodable reply"),
        },
        None => info!(command, "no reply published"),
    }
}
