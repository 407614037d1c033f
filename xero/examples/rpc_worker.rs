/// RPC worker example
///
/// Registers a tiny dispatch table (`compare`) and emits a periodic
/// tick event. Run alongside `rpc_client` against the same endpoint:
///
/// ```text
/// cargo run --example rpc_worker --features zmq
/// cargo run --example rpc_client --features zmq
/// ```
use std::thread;
use std::time::Duration;

use tracing::info;
use xero::rpc::{Handler, HandlerOutcome, Payload, RemoteException, ReplySink, RpcWorker, WorkerConfig};

struct Compare;

impl Handler for Compare {
    fn call(&self, method: &str, args: Payload, _kwargs: Payload, _replies: &ReplySink) -> HandlerOutcome {
        match method {
            "compare" => match args {
                Payload::Array(items) if items.len() == 2 => {
                    HandlerOutcome::Final(Payload::Bool(items[0] == items[1]))
                }
                _ => HandlerOutcome::Exception(RemoteException::new(
                    "compare expects exactly two positional arguments".to_string(),
                    String::new(),
                )),
            },
            other => HandlerOutcome::Exception(RemoteException::new(format!("unknown method: {other}"), String::new())),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    xero::dev_tracing::init_tracing();

    let worker = RpcWorker::connect(WorkerConfig::new("tcp://127.0.0.1:5556"), Compare)?;
    info!("worker connected, dispatching `compare` and emitting ticks");

    for tick in 0u64.. {
        thread::sleep(Duration::from_secs(1));
        if worker.emit(Payload::Uint(tick)).is_err() {
            break;
        }
    }

    Ok(())
}
