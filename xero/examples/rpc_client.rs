/// RPC client example
///
/// Issues a few `compare` calls against the worker started by
/// `rpc_worker` and prints whatever emissions arrive meanwhile:
///
/// ```text
/// cargo run --example rpc_worker --features zmq
/// cargo run --example rpc_client --features zmq
/// ```
use std::time::Duration;

use tracing::info;
use xero::rpc::{ClientConfig, Payload, RpcClient};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    xero::dev_tracing::init_tracing();

    let client = RpcClient::bind(ClientConfig::new("tcp://127.0.0.1:5556"))?;
    client.wait_for_connected(Duration::from_secs(5))?;
    info!("worker connected");

    let reply = client.rpc(
        "compare",
        Payload::array([Payload::Int(1), Payload::Int(1)]),
        Payload::Nil,
    )?;
    info!(?reply, "compare(1, 1)");

    let reply = client.rpc(
        "compare",
        Payload::array([Payload::Int(1), Payload::Int(2)]),
        Payload::Nil,
    )?;
    info!(?reply, "compare(1, 2)");

    for emission in client.drain_emits(Duration::from_secs(2)) {
        info!(?emission, "emit");
    }

    Ok(())
}
