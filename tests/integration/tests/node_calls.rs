use anyhow::Result;
use axum::http::StatusCode;
use lnbridge_core::lightning::backend::LightningBackend;
use lnbridge_core::lightning::error::LightningError;
use lnbridge_core::lightning::types::{
    ConnectionResult, CreateInvoiceParams, OpenChannelRequest, OpenChannelResult, PayResult,
};
use lnbridge_integration::fake_lnd::{FakeLnd, NODE_PUBKEY};
use lnbridge_lnd::LndBackend;
use ln_types::{Amount, NodeId, P2PAddress};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

const PEER: &str = "03f25d220b3dd4ff4bca5a7ddb7a3e4ce6fcf6cb6f26ba18a1a9c2b1e3e7d7c1aa";
const SYNCING: &str = "chain backend is still syncing, server not active yet";

fn open_request(node: &str) -> Result<OpenChannelRequest> {
    Ok(OpenChannelRequest {
        node: node
            .parse::<NodeId>()
            .map_err(|e| anyhow::anyhow!("bad node id: {e}"))?,
        channel_amount: Amount::from_sat(250_000)?,
        fee_rate_sat_per_vbyte: Some(2),
    })
}

fn remote(code: i64, message: &str) -> serde_json::Value {
    json!({ "code": code, "message": message })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_node_info_and_channels() -> Result<()> {
    timeout(Duration::from_secs(30), async move {
        let fake = FakeLnd::start().await?;
        let backend = LndBackend::connect(fake.config()).await?;

        let info = backend.get_info().await?;
        assert_eq!(info.identity.to_string(), NODE_PUBKEY);
        assert_eq!(info.block_height, 812_000);
        assert!(info.synced_to_chain);
        assert_eq!(info.addresses.len(), 1);
        assert_eq!(info.addresses[0].port, 9735);

        let channels = backend.list_channels().await?;
        assert_eq!(channels.len(), 1);
        assert!(channels[0].is_active);
        assert!(!channels[0].is_public);
        assert_eq!(channels[0].capacity, Amount::from_sat(1_000_000)?);
        assert_eq!(channels[0].local_balance, Amount::from_sat(400_000)?);

        let address = backend.get_deposit_address().await?;
        assert!(address.starts_with("bcrt1"));
        Ok(())
    })
    .await?
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pay_reports_route_details() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;

    match backend.pay("lnbcrt1000n1ptest").await? {
        PayResult::Ok(Some(details)) => {
            assert_eq!(details.total_amount, Amount::from_msat(101_000)?);
            assert_eq!(details.fee_amount, Amount::from_msat(1_000)?);
        }
        other => anyhow::bail!("unexpected pay result {other:?}"),
    }
    assert_eq!(fake.calls("send_payment"), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pay_failures_are_typed() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;

    fake.script_pay(
        StatusCode::OK,
        json!({ "payment_error": "unable to find a path to destination" }),
    );
    assert_eq!(backend.pay("lnbcrt1").await?, PayResult::CouldNotFindRoute);

    fake.script_pay(
        StatusCode::OK,
        json!({ "payment_error": "invoice is already paid" }),
    );
    assert_eq!(backend.pay("lnbcrt1").await?, PayResult::Ok(None));

    fake.script_pay(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, "invoice expired"),
    );
    assert_eq!(
        backend.pay("lnbcrt1").await?,
        PayResult::Error("invoice expired".to_string())
    );

    assert!(matches!(
        backend.pay("  ").await,
        Err(LightningError::InvalidPaymentRequest(_))
    ));
    assert_eq!(fake.calls("send_payment"), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pay_retries_while_backend_syncs() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;

    fake.script_pay(StatusCode::INTERNAL_SERVER_ERROR, remote(2, SYNCING));
    fake.script_pay(StatusCode::INTERNAL_SERVER_ERROR, remote(2, SYNCING));

    assert!(matches!(backend.pay("lnbcrt1").await?, PayResult::Ok(Some(_))));
    assert_eq!(fake.calls("send_payment"), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pay_gives_up_after_bounded_retries() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;

    for _ in 0..10 {
        fake.script_pay(StatusCode::INTERNAL_SERVER_ERROR, remote(2, SYNCING));
    }

    assert_eq!(
        backend.pay("lnbcrt1").await?,
        PayResult::Error(SYNCING.to_string())
    );
    assert_eq!(fake.calls("send_payment"), 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_open_channel_outcomes() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;

    assert_eq!(
        backend.open_channel(open_request(PEER)?).await?,
        OpenChannelResult::Ok
    );

    fake.script_open_channel(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, &format!("peer {PEER} is not online")),
    );
    assert_eq!(
        backend.open_channel(open_request(PEER)?).await?,
        OpenChannelResult::PeerNotConnected
    );

    fake.script_open_channel(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, "not enough witness outputs to create funding transaction"),
    );
    assert_eq!(
        backend.open_channel(open_request(PEER)?).await?,
        OpenChannelResult::CannotAffordFunding
    );

    fake.script_open_channel(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, "Number of pending channels exceed maximum"),
    );
    assert_eq!(
        backend.open_channel(open_request(PEER)?).await?,
        OpenChannelResult::NeedMoreConf
    );
    assert_eq!(fake.calls("pending_channels"), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_duplicate_channel_checks_pending_list() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;

    fake.set_pending_open(&[PEER]);
    fake.script_open_channel(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(177, "channel already pending"),
    );
    assert_eq!(
        backend.open_channel(open_request(PEER)?).await?,
        OpenChannelResult::NeedMoreConf
    );

    fake.set_pending_open(&[NODE_PUBKEY]);
    fake.script_open_channel(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(177, "channel already open"),
    );
    assert_eq!(
        backend.open_channel(open_request(PEER)?).await?,
        OpenChannelResult::AlreadyExists
    );
    assert_eq!(fake.calls("pending_channels"), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_open_channel_retries_too_early() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;

    fake.script_open_channel(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, "channels cannot be created before the wallet is fully synced"),
    );
    assert_eq!(
        backend.open_channel(open_request(PEER)?).await?,
        OpenChannelResult::Ok
    );
    assert_eq!(fake.calls("open_channel"), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_to_peer() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;
    let address: P2PAddress = format!("{PEER}@127.0.0.1:9735")
        .parse()
        .map_err(|e| anyhow::anyhow!("bad address: {e}"))?;

    assert_eq!(backend.connect_to(&address).await?, ConnectionResult::Ok);

    fake.script_connect_peer(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, &format!("already connected to peer: {PEER}@127.0.0.1:9735")),
    );
    assert_eq!(backend.connect_to(&address).await?, ConnectionResult::Ok);

    fake.script_connect_peer(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, "dial tcp 127.0.0.1:9735: connect: connection refused"),
    );
    assert_eq!(
        backend.connect_to(&address).await?,
        ConnectionResult::CouldNotConnect
    );
    assert_eq!(fake.calls("connect_peer"), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_error_mapping() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;

    fake.script_pay_text(
        StatusCode::BAD_GATEWAY,
        "<html><body>502 Bad Gateway</body></html>",
    );
    match backend.pay("lnbcrt1").await {
        Err(LightningError::NodeUnavailable(message)) => {
            assert!(message.contains("502"), "{message}");
            assert!(message.contains("Bad Gateway"), "{message}");
        }
        other => anyhow::bail!("expected node unavailable, got {other:?}"),
    }

    fake.script_pay(
        StatusCode::FORBIDDEN,
        remote(7, "permission denied: macaroon lacks offchain:write"),
    );
    assert!(matches!(
        backend.pay("lnbcrt1").await,
        Err(LightningError::AuthError(_))
    ));

    // Neither failure is retried.
    assert_eq!(fake.calls("send_payment"), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lookup_not_found_message_is_none() -> Result<()> {
    let fake = FakeLnd::start().await?;
    let backend = LndBackend::new(fake.config())?;
    let created = backend
        .create_invoice(CreateInvoiceParams::new(
            Amount::from_msat(1_000)?,
            "tea",
            Duration::from_secs(600),
        ))
        .await?;

    fake.script_lookup_invoice(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, "unable to locate invoice"),
    );
    assert!(backend.get_invoice(&created.id).await?.is_none());

    fake.script_lookup_invoice(
        StatusCode::INTERNAL_SERVER_ERROR,
        remote(2, "database is locked"),
    );
    assert!(matches!(
        backend.get_invoice(&created.id).await,
        Err(LightningError::Remote(_))
    ));

    assert!(backend.get_invoice(&created.id).await?.is_some());
    Ok(())
}
