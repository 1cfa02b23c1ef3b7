//! Integration tests for LedgerSession and DeskState against a live dev node
//!
//! Each test spawns its own in-memory node on an ephemeral loopback port and
//! talks to it over real HTTP, so the JSON-RPC client path is exercised end
//! to end.

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use transferdesk::devnode::{DevNode, DevNodeOptions};
use transferdesk::transfer::TRANSFER_GAS;
use transferdesk::units::{Wei, WEI_PER_ETHER, WEI_PER_GWEI};
use transferdesk::{DeskState, LedgerSession, TransferRequest};

const IDLE_ACCOUNT: &str = "0x000000000000000000000000000000000000dEaD";

/// Helper to start a node and connect a session to it
async fn start(chain_id: u64) -> Result<(DevNode, LedgerSession), Box<dyn std::error::Error>> {
    let node = DevNode::new(DevNodeOptions {
        chain_id,
        accounts: 4,
        initial_balance: 100,
        gas_price: 2 * WEI_PER_GWEI,
    });
    let (addr, _handle) = node.clone().spawn().await?;
    let session = LedgerSession::connect(&format!("http://{}", addr)).await?;
    Ok((node, session))
}

fn gas_cost(node: &DevNode) -> Wei {
    Wei::from(TRANSFER_GAS) * node.gas_price()
}

#[tokio::test]
async fn test_describe_network_labels() -> Result<(), Box<dyn std::error::Error>> {
    let (_node, session) = start(31337).await?;
    let snapshot = session.describe_network().await?;
    assert_eq!(snapshot.chain_id, 31337);
    assert_eq!(snapshot.label, "Anvil Local Chain");
    assert_eq!(snapshot.block_height, 0);

    let (_node, session) = start(4242).await?;
    let snapshot = session.describe_network().await?;
    assert_eq!(snapshot.label, "Network 4242");

    Ok(())
}

#[tokio::test]
async fn test_list_accounts_preserves_node_order() -> Result<(), Box<dyn std::error::Error>> {
    let (node, session) = start(31337).await?;
    let accounts = session.list_accounts().await?;
    assert_eq!(accounts, node.accounts());
    assert_eq!(accounts.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_idle_account_has_zero_balance() -> Result<(), Box<dyn std::error::Error>> {
    let (_node, session) = start(31337).await?;
    let balance = session.get_balance(IDLE_ACCOUNT).await?;
    assert_eq!(balance.wei, 0);
    assert_eq!(balance.ether(), "0");
    Ok(())
}

#[tokio::test]
async fn test_transfer_moves_exact_amount() -> Result<(), Box<dyn std::error::Error>> {
    let (node, session) = start(31337).await?;
    let accounts = session.list_accounts().await?;
    let (alice, bob) = (accounts[0].as_str(), accounts[1].as_str());

    let alice_before = session.get_balance(alice).await?.wei;
    let bob_before = session.get_balance(bob).await?.wei;

    let tx_hash = session
        .submit_transfer(&TransferRequest::new(alice, bob, "1.25"))
        .await?;
    assert!(tx_hash.starts_with("0x"));
    assert_eq!(tx_hash.len(), 66);

    let amount = WEI_PER_ETHER + WEI_PER_ETHER / 4;
    let alice_after = session.get_balance(alice).await?.wei;
    let bob_after = session.get_balance(bob).await?.wei;
    assert_eq!(bob_after, bob_before + amount);
    assert_eq!(alice_after, alice_before - amount - gas_cost(&node));
    assert!(alice_before - alice_after > amount);

    // The transfer was mined into a new block.
    assert_eq!(session.describe_network().await?.block_height, 1);
    let block = session.fetch_latest_block().await?;
    assert_eq!(block.height, 1);
    assert_eq!(block.transaction_count, 1);

    Ok(())
}

#[tokio::test]
async fn test_transfer_to_idle_account() -> Result<(), Box<dyn std::error::Error>> {
    let (_node, session) = start(31337).await?;
    let accounts = session.list_accounts().await?;

    session
        .submit_transfer(&TransferRequest::new(accounts[2].as_str(), IDLE_ACCOUNT, "0.000001"))
        .await?;

    let balance = session.get_balance(IDLE_ACCOUNT).await?;
    assert_eq!(balance.wei, 1_000_000_000_000);
    assert_eq!(balance.ether(), "0.000001");
    Ok(())
}

#[tokio::test]
async fn test_invalid_requests_never_reach_the_node() -> Result<(), Box<dyn std::error::Error>> {
    let (node, session) = start(31337).await?;
    let accounts = session.list_accounts().await?;
    let (alice, bob) = (accounts[0].as_str(), accounts[1].as_str());
    let calls_before = node.request_count();

    let invalid = [
        TransferRequest::new("", bob, "1"),
        TransferRequest::new(alice, "", "1"),
        TransferRequest::new(alice, bob, ""),
        TransferRequest::new(alice, bob, "ten"),
        TransferRequest::new(alice, bob, "-1"),
        TransferRequest::new(alice, bob, "0.0000000000000000001"),
        TransferRequest::new(alice, "0x1234", "1"),
    ];
    for request in &invalid {
        let err = session.submit_transfer(request).await.unwrap_err();
        assert!(err.is_validation(), "{:?} gave {:?}", request, err);
    }

    let err = session.get_balance("not-an-address").await.unwrap_err();
    assert!(err.is_validation());

    assert_eq!(node.request_count(), calls_before);
    Ok(())
}

#[tokio::test]
async fn test_overdraft_is_a_submission_error() -> Result<(), Box<dyn std::error::Error>> {
    let (node, session) = start(31337).await?;
    let accounts = session.list_accounts().await?;
    let (alice, bob) = (accounts[0].as_str(), accounts[1].as_str());

    let alice_before = session.get_balance(alice).await?.wei;
    let bob_before = session.get_balance(bob).await?.wei;
    let calls_before = node.request_count();

    let err = session
        .submit_transfer(&TransferRequest::new(alice, bob, "1000"))
        .await
        .unwrap_err();
    assert!(err.is_submission());
    assert_eq!(err.message(), "insufficient funds for gas * price + value");
    // Exactly one attempt, no retry.
    assert_eq!(node.request_count(), calls_before + 1);

    assert_eq!(session.get_balance(alice).await?.wei, alice_before);
    assert_eq!(session.get_balance(bob).await?.wei, bob_before);
    Ok(())
}

#[tokio::test]
async fn test_unmanaged_sender_is_a_submission_error() -> Result<(), Box<dyn std::error::Error>> {
    let (_node, session) = start(31337).await?;
    let accounts = session.list_accounts().await?;

    let err = session
        .submit_transfer(&TransferRequest::new(IDLE_ACCOUNT, accounts[0].as_str(), "1"))
        .await
        .unwrap_err();
    assert!(err.is_submission());
    assert_eq!(err.message(), "sender account not recognized");
    Ok(())
}

#[tokio::test]
async fn test_latest_block_is_stable_without_activity() -> Result<(), Box<dyn std::error::Error>> {
    let (_node, session) = start(31337).await?;

    let first = session.fetch_latest_block().await?;
    let second = session.fetch_latest_block().await?;
    assert_eq!(first.height, second.height);
    assert_eq!(first.hash, second.hash);
    assert_eq!(first.gas_price_display, "2 Gwei");
    assert!(first.timestamp_display.ends_with("UTC"));
    assert_eq!(first.transaction_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_operations_on_one_session() -> Result<(), Box<dyn std::error::Error>> {
    let (_node, session) = start(31337).await?;
    let other = session.clone();

    let (network, accounts, block) = tokio::join!(
        session.describe_network(),
        other.list_accounts(),
        session.fetch_latest_block()
    );
    assert_eq!(network?.block_height, block?.height);
    assert_eq!(accounts?.len(), 4);
    Ok(())
}

/// Port that was free a moment ago and has nothing listening now
async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_unreachable_node_is_a_connection_error() {
    let addr = closed_port().await;
    let err = LedgerSession::connect(&addr.to_string()).await.unwrap_err();
    assert!(err.is_connection(), "{:?}", err);
}

#[tokio::test]
async fn test_silent_node_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept connections and never answer.
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        LedgerSession::connect_with_timeout(&format!("http://{}", addr), Duration::from_millis(300)),
    )
    .await
    .expect("session timeout should fire first");
    let err = result.unwrap_err();
    assert!(err.is_connection(), "{:?}", err);
    assert!(err.message().contains("timed out"), "{}", err);
}

/// Serve `router` on an ephemeral loopback port
async fn serve_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Node that answers every request with the same status and body
async fn fixed_reply_node(status: StatusCode, body: &'static str) -> SocketAddr {
    serve_stub(Router::new().route("/", post(move || async move { (status, body) }))).await
}

/// Node that looks healthy to the connect probe but misbehaves on later reads
async fn misbehaving_node() -> SocketAddr {
    let router = Router::new().route(
        "/",
        post(|Json(request): Json<Value>| async move {
            let id = request["id"].clone();
            let reply = match request["method"].as_str().unwrap_or_default() {
                "net_version" => json!({ "jsonrpc": "2.0", "id": id, "result": "31337" }),
                "eth_blockNumber" => json!({ "jsonrpc": "2.0", "id": id, "result": "0x5" }),
                "eth_gasPrice" => json!({ "jsonrpc": "2.0", "id": id, "result": "0x1" }),
                "eth_getBlockByNumber" => json!({ "jsonrpc": "2.0", "id": id, "result": null }),
                "eth_accounts" => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32000, "message": "accounts locked" }
                }),
                _ => json!({ "jsonrpc": "2.0", "id": id }),
            };
            Json(reply)
        }),
    );
    serve_stub(router).await
}

#[tokio::test]
async fn test_non_json_success_body_is_a_connection_error() {
    let addr = fixed_reply_node(StatusCode::OK, "<html>not a node</html>").await;
    let err = LedgerSession::connect(&addr.to_string()).await.unwrap_err();
    assert!(err.is_connection(), "{:?}", err);
    assert!(err.message().contains("malformed"), "{}", err);
}

#[tokio::test]
async fn test_http_failure_is_a_connection_error() {
    let addr = fixed_reply_node(StatusCode::INTERNAL_SERVER_ERROR, "oops").await;
    let err = LedgerSession::connect(&addr.to_string()).await.unwrap_err();
    assert!(err.is_connection(), "{:?}", err);
    assert!(err.message().contains("500"), "{}", err);
}

#[tokio::test]
async fn test_bad_read_replies_are_connection_errors() -> Result<(), Box<dyn std::error::Error>> {
    let addr = misbehaving_node().await;
    let session = LedgerSession::connect(&addr.to_string()).await?;
    assert_eq!(session.describe_network().await?.block_height, 5);

    // Error object on a read query
    let err = session.list_accounts().await.unwrap_err();
    assert!(err.is_connection(), "{:?}", err);
    assert_eq!(err.message(), "accounts locked");

    // Envelope with neither result nor error
    let err = session.get_balance(IDLE_ACCOUNT).await.unwrap_err();
    assert!(err.is_connection(), "{:?}", err);

    // Node reports a height it has no block for
    let err = session.fetch_latest_block().await.unwrap_err();
    assert!(err.is_connection(), "{:?}", err);
    assert!(err.message().contains("height 5"), "{}", err);
    Ok(())
}

#[tokio::test]
async fn test_desk_state_defaults_and_refresh() -> Result<(), Box<dyn std::error::Error>> {
    let (node, session) = start(31337).await?;
    let accounts = node.accounts();

    let mut desk = DeskState::load(&session).await?;
    assert_eq!(desk.accounts, accounts);
    assert_eq!(desk.sender.as_ref(), Some(&accounts[0]));
    assert_eq!(desk.recipient.as_ref(), Some(&accounts[1]));
    assert_eq!(desk.balance.as_ref().map(|b| b.wei), Some(100 * WEI_PER_ETHER));
    assert_eq!(desk.network.as_ref().map(|n| n.block_height), Some(0));

    let tx_hash = desk.transfer(&session, "2").await?;
    assert!(matches!(&desk.last_transfer, Some(Ok(h)) if *h == tx_hash));
    // Balance and height were re-read after the transfer landed.
    assert_eq!(
        desk.balance.as_ref().map(|b| b.wei),
        Some(98 * WEI_PER_ETHER - gas_cost(&node))
    );
    assert_eq!(desk.network.as_ref().map(|n| n.block_height), Some(1));
    assert!(desk.status_message().unwrap().contains(&tx_hash));

    desk.select_sender(&session, accounts[1].as_str()).await?;
    assert_eq!(desk.balance.as_ref().map(|b| b.wei), Some(102 * WEI_PER_ETHER));

    let summary = desk.view_latest_block(&session).await?.clone();
    assert_eq!(summary.height, 1);
    desk.close_block_panel();
    assert!(desk.latest_block.is_none());
    Ok(())
}

#[tokio::test]
async fn test_desk_state_keeps_failed_attempt() -> Result<(), Box<dyn std::error::Error>> {
    let (_node, session) = start(31337).await?;
    let mut desk = DeskState::load(&session).await?;
    let balance_before = desk.balance.clone();

    let err = desk.transfer(&session, "5000").await.unwrap_err();
    assert!(err.is_submission());
    assert!(matches!(&desk.last_transfer, Some(Err(e)) if e.is_submission()));
    assert_eq!(desk.balance, balance_before);
    assert!(desk.status_message().unwrap().starts_with("Transaction failed"));

    desk.recipient = None;
    let err = desk.transfer(&session, "1").await.unwrap_err();
    assert!(err.is_validation());
    Ok(())
}

#[tokio::test]
async fn test_single_account_node_has_no_default_recipient() -> Result<(), Box<dyn std::error::Error>> {
    let node = DevNode::new(DevNodeOptions {
        accounts: 1,
        ..DevNodeOptions::default()
    });
    let (addr, _handle) = node.clone().spawn().await?;
    let session = LedgerSession::connect(&addr.to_string()).await?;

    let desk = DeskState::load(&session).await?;
    assert_eq!(desk.accounts.len(), 1);
    assert!(desk.sender.is_some());
    assert!(desk.recipient.is_none());
    Ok(())
}
