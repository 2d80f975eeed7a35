use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use tiny_http::{Response, Server, StatusCode};

use wallet_session_adapters::{Eip1193Adapter, SessionAdapterConfig};
use wallet_session_core::{
    Account, ConnectOutcome, PortError, ProviderAvailability, ProviderPort, SendOutcome,
    SessionController,
};

const ACCOUNT: &str = "0x2000000000000000000000000000000000000002";

#[derive(Debug)]
struct MockWallet {
    accounts: Vec<String>,
    chain_id: String,
    calls: Vec<String>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self {
            accounts: vec![ACCOUNT.to_owned()],
            chain_id: "0x1".to_owned(),
            calls: Vec::new(),
        }
    }
}

fn spawn_mock_wallet(state: Arc<Mutex<MockWallet>>) -> String {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());

    thread::spawn(move || loop {
        let mut req = match server.recv() {
            Ok(r) => r,
            Err(_) => break,
        };
        let mut body = String::new();
        let _ = req.as_reader().read_to_string(&mut body);
        let call: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let id = call.get("id").cloned().unwrap_or(Value::Null);
        let method = call
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let outcome = {
            let mut g = state.lock().expect("mock lock");
            g.calls.push(method.clone());
            match method.as_str() {
                "eth_chainId" => Ok(json!(g.chain_id)),
                "eth_accounts" | "eth_requestAccounts" => Ok(json!(g.accounts)),
                "eth_getBalance" => Ok(json!("0x38D7EA4C68000")),
                "eth_sendTransaction" => Err(json!({"code": -32000, "message": "insufficient funds"})),
                _ => Err(json!({"code": -32601, "message": "method not found"})),
            }
        };
        let payload = match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
        };
        let response = Response::from_string(payload.to_string()).with_status_code(StatusCode(200));
        let _ = req.respond(response);
    });

    addr
}

fn proxy_adapter(base_url: String) -> Eip1193Adapter {
    Eip1193Adapter::with_config(SessionAdapterConfig {
        eip1193_proxy_url: Some(base_url),
        request_timeout_ms: 5_000,
        ..SessionAdapterConfig::default()
    })
}

#[tokio::test]
async fn proxy_requests_and_errors_map_to_port_results() {
    let state = Arc::new(Mutex::new(MockWallet::default()));
    let adapter = proxy_adapter(spawn_mock_wallet(Arc::clone(&state)));
    assert_eq!(adapter.mode_name(), "proxy");

    assert!(adapter.is_available().await.expect("probe"));
    assert_eq!(
        adapter.accounts().await.expect("accounts"),
        vec![Account::from(ACCOUNT)]
    );
    assert_eq!(adapter.chain_id().await.expect("chain").as_str(), "0x1");
    assert_eq!(
        adapter
            .balance_of(&Account::from(ACCOUNT))
            .await
            .expect("balance"),
        "0.001"
    );

    let err = adapter
        .request("eth_coinbase", json!([]))
        .await
        .expect_err("unknown method");
    match err {
        PortError::Rpc { code, message } => {
            assert_eq!(code, -32601);
            assert_eq!(message, "method not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn proxy_session_connects_and_surfaces_send_failure() {
    let state = Arc::new(Mutex::new(MockWallet::default()));
    let adapter = proxy_adapter(spawn_mock_wallet(Arc::clone(&state)));
    let controller = SessionController::start(Arc::new(adapter.clone())).await;
    controller.flush().await;

    let s = controller.snapshot();
    assert_eq!(s.availability, ProviderAvailability::Present);
    assert_eq!(s.accounts, vec![Account::from(ACCOUNT)]);
    assert_eq!(s.balance.as_deref(), Some("0.001"));

    assert_eq!(
        controller.connect().await,
        ConnectOutcome::Connected(vec![Account::from(ACCOUNT)])
    );
    assert_eq!(
        controller.send("0x000000000000000000000000000000000000CAFE").await,
        SendOutcome::Failed("insufficient funds".to_owned())
    );
    assert_eq!(
        controller.snapshot().last_tx.to_string(),
        "insufficient funds"
    );

    let calls = state.lock().expect("mock lock").calls.clone();
    assert_eq!(calls.first().map(String::as_str), Some("eth_chainId"));
    assert_eq!(
        calls.iter().filter(|m| *m == "eth_requestAccounts").count(),
        1
    );
}

#[tokio::test]
async fn polling_emits_chain_and_account_drift() {
    let state = Arc::new(Mutex::new(MockWallet::default()));
    let adapter = proxy_adapter(spawn_mock_wallet(Arc::clone(&state)));
    let controller = SessionController::start(Arc::new(adapter.clone())).await;
    controller.flush().await;

    assert_eq!(adapter.poll_events().await.expect("baseline poll"), 0);
    assert_eq!(adapter.poll_events().await.expect("quiet poll"), 0);

    state.lock().expect("mock lock").chain_id = "0xa".to_owned();
    assert_eq!(adapter.poll_events().await.expect("chain poll"), 1);
    controller.flush().await;
    let s = controller.snapshot();
    assert_eq!(s.chain_id_decimal(), Some(10));
    assert_eq!(s.accounts, vec![Account::from(ACCOUNT)]);

    state.lock().expect("mock lock").accounts.clear();
    assert_eq!(adapter.poll_events().await.expect("revoke poll"), 1);
    controller.flush().await;
    assert!(controller.snapshot().accounts.is_empty());
}

#[tokio::test]
async fn unreachable_proxy_probes_absent() {
    // Bind and immediately drop a listener to get a port nothing listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        format!("http://{}", listener.local_addr().expect("local addr"))
    };
    let adapter = Eip1193Adapter::with_config(SessionAdapterConfig {
        eip1193_proxy_url: Some(addr),
        request_timeout_ms: 500,
        ..SessionAdapterConfig::default()
    });

    assert!(adapter.is_available().await.is_err());
    let controller = SessionController::start(Arc::new(adapter)).await;
    assert_eq!(controller.availability(), ProviderAvailability::Absent);
}
