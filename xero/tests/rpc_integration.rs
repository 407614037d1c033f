#![cfg(feature = "zmq")]

use std::time::Duration;

use xero::rpc::{
    ClientConfig, Handler, HandlerOutcome, Payload, RemoteException, ReplySink, RpcClient, RpcWorker, WorkerConfig,
};

fn endpoint() -> String {
    let port = portpicker::pick_unused_port().expect("no free port");
    format!("tcp://127.0.0.1:{port}")
}

struct Echo;

impl Handler for Echo {
    fn call(&self, method: &str, args: Payload, kwargs: Payload, replies: &ReplySink) -> HandlerOutcome {
        match method {
            "echo" => HandlerOutcome::Final(args),
            "boom" => HandlerOutcome::Exception(RemoteException::new("boom".to_string(), "traceback".to_string())),
            "count_then_echo" => {
                if let Payload::Array(items) = &args {
                    for item in items {
                        replies.partial(item.clone());
                    }
                }
                HandlerOutcome::Final(kwargs)
            }
            other => HandlerOutcome::Exception(RemoteException::new(format!("no such method: {other}"), String::new())),
        }
    }
}

#[test]
fn happy_path_rpc_round_trip() {
    let endpoint = endpoint();
    let client = RpcClient::bind(ClientConfig::new(&endpoint)).expect("client bind");
    let worker = RpcWorker::connect(WorkerConfig::new(&endpoint), Echo).expect("worker connect");

    client
        .wait_for_connected(Duration::from_secs(2))
        .expect("worker should register");

    let reply = client
        .rpc("echo", Payload::Str("hi".to_string()), Payload::Nil)
        .expect("rpc should succeed");
    assert_eq!(reply, Payload::Str("hi".to_string()));

    client.stop();
    worker.stop();
}

#[test]
fn exception_propagates_as_remote_exception() {
    let endpoint = endpoint();
    let client = RpcClient::bind(ClientConfig::new(&endpoint)).expect("client bind");
    let worker = RpcWorker::connect(WorkerConfig::new(&endpoint), Echo).expect("worker connect");
    client.wait_for_connected(Duration::from_secs(2)).unwrap();

    let err = client.rpc("boom", Payload::Nil, Payload::Nil).expect_err("should raise");
    match err {
        xero::rpc::RpcError::RemoteException(exc) => assert_eq!(exc.message, "boom"),
        other => panic!("expected RemoteException, got {other:?}"),
    }

    client.stop();
    worker.stop();
}

#[test]
fn partial_replies_arrive_before_final() {
    let endpoint = endpoint();
    let client = RpcClient::bind(ClientConfig::new(&endpoint)).expect("client bind");
    let worker = RpcWorker::connect(WorkerConfig::new(&endpoint), Echo).expect("worker connect");
    client.wait_for_connected(Duration::from_secs(2)).unwrap();

    let partials = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let collector = partials.clone();
    let reply = client
        .rpc_with_partial(
            "count_then_echo",
            Payload::array([Payload::Int(1), Payload::Int(2), Payload::Int(3)]),
            Payload::Str("done".to_string()),
            Duration::from_secs(5),
            move |p| collector.lock().unwrap().push(p),
        )
        .expect("rpc should succeed");

    assert_eq!(reply, Payload::Str("done".to_string()));
    assert_eq!(
        *partials.lock().unwrap(),
        vec![Payload::Int(1), Payload::Int(2), Payload::Int(3)]
    );

    client.stop();
    worker.stop();
}

#[test]
fn worker_emit_reaches_client() {
    let endpoint = endpoint();
    let client = RpcClient::bind(ClientConfig::new(&endpoint)).expect("client bind");
    let worker = RpcWorker::connect(WorkerConfig::new(&endpoint), Echo).expect("worker connect");
    client.wait_for_connected(Duration::from_secs(2)).unwrap();
    worker
        .emit(Payload::Str("tick".to_string()))
        .expect("emit while connected should succeed");

    let emitted = client.get_emit(Duration::from_secs(2)).expect("emit should arrive");
    assert_eq!(emitted, Payload::Str("tick".to_string()));

    client.stop();
    worker.stop();
}

#[test]
fn rpc_without_a_worker_times_out_as_lost_peer() {
    let endpoint = endpoint();
    let client = RpcClient::bind(ClientConfig::new(&endpoint)).expect("client bind");

    let err = client
        .rpc_timeout("echo", Payload::Nil, Payload::Nil, Duration::from_millis(200))
        .expect_err("no worker is registered, call must fail");
    assert!(err.is_lost_peer());

    client.stop();
}
