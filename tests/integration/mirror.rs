//! Market mirror over a live (in-memory) transport.

use std::time::Duration;

use depth_mirror::orderbook::{DepthSnapshot, MarketMirror, PriceLevel};
use depth_mirror::seed::MockSeedSource;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::json;

use crate::support::{depth_frame, manager, next_connection, MemoryConnector, WAIT};

fn seed() -> DepthSnapshot {
    DepthSnapshot::new(
        vec![
            PriceLevel::new(dec!(100), dec!(1)),
            PriceLevel::new(dec!(99), dec!(2)),
        ],
        vec![
            PriceLevel::new(dec!(101), dec!(1)),
            PriceLevel::new(dec!(102), dec!(2)),
        ],
    )
}

#[tokio::test]
async fn mirror_follows_stream_after_seed() {
    let manager = manager(Duration::from_secs(3600));
    let (connector, mut links) = MemoryConnector::new();

    let mirror = MarketMirror::open(&manager, "SOL_USDC", 64);
    manager.start(connector);

    let mut server = next_connection(&mut links).await;
    let mut subscribed = vec![
        server.next_request().await["params"][0].clone(),
        server.next_request().await["params"][0].clone(),
    ];
    subscribed.sort_by_key(|v| v.to_string());
    assert_eq!(subscribed, vec![json!("depth@SOL_USDC"), json!("ticker@SOL_USDC")]);

    // Arrives before the seed and is replayed over it.
    server.push(&depth_frame("SOL_USDC", r#"[["100","0"]]"#, "[]"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(mirror.snapshot().bids.is_empty());

    let mut updates = mirror.watch();
    let source = MockSeedSource::new(seed());
    source.set_price(dec!(100.5));
    mirror.reseed(&source).await.unwrap();

    let snapshot = mirror.snapshot();
    assert!(snapshot.seeded);
    assert_eq!(snapshot.best_bid(), Some(dec!(99)));
    assert_eq!(snapshot.last_price, Some(dec!(100.5)));

    updates.borrow_and_update();
    server.push(&depth_frame(
        "SOL_USDC",
        r#"[["99.5","3"]]"#,
        r#"[["101","0"],["103","1"]]"#,
    ));
    tokio::time::timeout(WAIT, updates.changed())
        .await
        .unwrap()
        .unwrap();

    let snapshot = updates.borrow().clone();
    assert_eq!(
        snapshot.bids,
        vec![
            PriceLevel::new(dec!(99.5), dec!(3)),
            PriceLevel::new(dec!(99), dec!(2)),
        ]
    );
    assert_eq!(
        snapshot.asks,
        vec![
            PriceLevel::new(dec!(102), dec!(2)),
            PriceLevel::new(dec!(103), dec!(1)),
        ]
    );

    server.push(r#"{"stream":"ticker@SOL_USDC","tickerdata":{"c":"101.7","v":"12"}}"#);
    tokio::time::timeout(WAIT, updates.changed())
        .await
        .unwrap()
        .unwrap();
    let snapshot = updates.borrow().clone();
    assert_eq!(snapshot.last_price, Some(dec!(101.7)));
    assert_eq!(snapshot.ticker.volume, Some(dec!(12)));

    mirror.close();
    let mut unsubscribed = vec![
        server.next_request().await,
        server.next_request().await,
    ];
    unsubscribed.sort_by_key(|v| v["params"][0].to_string());
    assert_eq!(unsubscribed[0]["method"], json!("UNSUBSCRIBE"));
    assert_eq!(unsubscribed[0]["params"], json!(["depth@SOL_USDC"]));
    assert_eq!(unsubscribed[1]["params"], json!(["ticker@SOL_USDC"]));

    manager.shutdown().await;
}
