mod common;

use common::{drain, round, round_floor, run, MockProvider};
use mediation_core::observer::DemandReportStatus;
use mediation_core::{
    AdType, AuctionController, AuctionEvent, AuctionGraph, BaseMediationObserver,
    ControllerEvent, ControllerState, LineItem, LineItems, MediationError, MediationObserver,
    Waterfall, WaterfallController,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn outcome(events: &[ControllerEvent]) -> &ControllerEvent {
    events.last().expect("auction emitted no events")
}

fn winner_of(events: &[ControllerEvent]) -> (String, f64, Waterfall) {
    match outcome(events) {
        ControllerEvent::AuctionCompleted { winner, waterfall } => {
            (winner.network_id.clone(), winner.price(), waterfall.clone())
        }
        other => panic!("auction did not complete: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_bid_above_floor_fails() {
    let low = MockProvider::bidding("low", 0.5).build();
    let empty = MockProvider::no_fill("empty").build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(AuctionGraph::chain(vec![round("ROUND_1", 500, &["low", "empty"])]).unwrap())
        .with_pricefloor(1.0)
        .with_provider(low.programmatic())
        .with_provider(empty.programmatic())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    assert!(matches!(
        outcome(&events),
        ControllerEvent::AuctionFailed {
            error: MediationError::InternalInconsistency
        }
    ));
    assert!(low.notifications().is_empty());
    assert!(empty.notifications().is_empty());
    assert_eq!(controller.state(), ControllerState::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_single_win_and_lose_notifications() {
    let first = MockProvider::bidding("first", 2.0).build();
    let second = MockProvider::bidding("second", 4.0).build();
    let third = MockProvider::bidding("third", 3.0).build();
    let silent = MockProvider::no_fill("silent").build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(
            AuctionGraph::chain(vec![
                round("ROUND_1", 500, &["first", "silent"]),
                round("ROUND_2", 500, &["second", "third"]),
            ])
            .unwrap(),
        )
        .with_pricefloor(1.0)
        .with_provider(first.programmatic())
        .with_provider(second.programmatic())
        .with_provider(third.programmatic())
        .with_provider(silent.programmatic())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    let (network, price, waterfall) = winner_of(&events);
    assert_eq!(network, "second");
    assert_eq!(price, 4.0);

    let winning_ad = waterfall.winner().unwrap().ad().clone();
    assert_eq!(second.notifications(), vec![AuctionEvent::Win(winning_ad.clone())]);
    // "third" bid 3.0 against a 2.0 floor in the second round
    assert_eq!(third.notifications(), vec![AuctionEvent::Lose(winning_ad.clone())]);
    assert_eq!(first.notifications(), vec![AuctionEvent::Lose(winning_ad)]);
    assert!(silent.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_highest_price_wins_with_configuration_tie_break() {
    // "slow" is listed first, "fast" answers first with the same price
    let slow = MockProvider::bidding("slow", 3.0)
        .with_latency(Duration::from_millis(200))
        .build();
    let fast = MockProvider::bidding("fast", 3.0).build();
    let cheap = MockProvider::bidding("cheap", 2.0).build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(
            AuctionGraph::chain(vec![round("ROUND_1", 1000, &["slow", "fast", "cheap"])]).unwrap(),
        )
        .with_pricefloor(1.0)
        .with_provider(slow.programmatic())
        .with_provider(fast.programmatic())
        .with_provider(cheap.programmatic())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    let (network, _, waterfall) = winner_of(&events);
    assert_eq!(network, "slow");

    let order: Vec<&str> = waterfall.iter().map(|demand| demand.network_id()).collect();
    assert_eq!(order, vec!["slow", "fast", "cheap"]);
}

#[tokio::test(start_paused = true)]
async fn test_round_timeout_bounds_silent_round() {
    let sleepy = MockProvider::bidding("sleepy", 5.0)
        .with_latency(Duration::from_secs(10))
        .build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(AuctionGraph::chain(vec![round("ROUND_1", 100, &["sleepy"])]).unwrap())
        .with_pricefloor(1.0)
        .with_provider(sleepy.programmatic())
        .build()
        .unwrap();

    let start = Instant::now();
    let events = run(&controller, &mut events).await;

    assert!(start.elapsed() < Duration::from_millis(150));
    assert!(events
        .iter()
        .any(|event| matches!(event, ControllerEvent::RoundCompleted { round } if round == "ROUND_1")));
    assert!(!events
        .iter()
        .any(|event| matches!(event, ControllerEvent::BidReceived { .. })));
    assert!(matches!(outcome(&events), ControllerEvent::AuctionFailed { .. }));
    assert_eq!(sleepy.cancels(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_response_is_not_registered() {
    let late = MockProvider::bidding("late", 10.0)
        .with_latency(Duration::from_millis(300))
        .build();
    let fast = MockProvider::bidding("fast", 2.0).build();
    let follower = MockProvider::bidding("follower", 3.0)
        .with_latency(Duration::from_millis(500))
        .build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(
            AuctionGraph::chain(vec![
                round("ROUND_1", 100, &["late", "fast"]),
                round("ROUND_2", 0, &["follower"]),
            ])
            .unwrap(),
        )
        .with_pricefloor(1.0)
        .with_provider(late.programmatic())
        .with_provider(fast.programmatic())
        .with_provider(follower.programmatic())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    let (network, price, waterfall) = winner_of(&events);

    // the second round outlives the moment "late" would have answered
    assert_eq!(network, "follower");
    assert_eq!(price, 3.0);
    assert!(waterfall.iter().all(|demand| demand.network_id() != "late"));
    assert_eq!(late.cancels(), 1);
    assert!(late.notifications().is_empty());
    assert_eq!(round_floor(&events, "ROUND_2"), Some(2.0));
}

#[tokio::test(start_paused = true)]
async fn test_seeded_rounds_share_the_current_floor() {
    let a = MockProvider::bidding("a", 2.0).build();
    let b = MockProvider::bidding("b", 3.0).build();
    let c = MockProvider::bidding("c", 9.0)
        .with_latency(Duration::from_secs(5))
        .build();

    let seeds = HashMap::from([("A".to_string(), vec!["B".to_string(), "C".to_string()])]);
    let auction = AuctionGraph::new(
        vec![
            round("A", 500, &["a"]),
            round("B", 500, &["b"]),
            round("C", 100, &["c"]),
        ],
        &seeds,
    )
    .unwrap();

    let observer = Arc::new(BaseMediationObserver::new("diamond", 1, AdType::Banner));
    let (controller, mut events) = AuctionController::builder()
        .with_ad_type(AdType::Banner)
        .with_auction(auction)
        .with_pricefloor(1.0)
        .with_provider(a.programmatic())
        .with_provider(b.programmatic())
        .with_provider(c.programmatic())
        .with_observer(observer.clone())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    assert_eq!(round_floor(&events, "A"), Some(1.0));
    assert_eq!(round_floor(&events, "B"), Some(2.0));
    assert_eq!(round_floor(&events, "C"), Some(2.0));
    assert_eq!(c.floors(), vec![2.0]);

    let (network, price, waterfall) = winner_of(&events);
    assert_eq!(network, "b");
    assert_eq!(price, 3.0);

    let winning_ad = waterfall.winner().unwrap().ad().clone();
    assert_eq!(a.notifications(), vec![AuctionEvent::Lose(winning_ad)]);
    assert_eq!(c.cancels(), 1);

    let report = observer.report();
    assert_eq!(report.rounds.len(), 3);
    assert_eq!(
        report.demand("C", "c").map(|demand| demand.status),
        Some(DemandReportStatus::Timeout)
    );
    assert_eq!(report.rounds[0].winner_network_id.as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn test_round_waits_for_every_predecessor() {
    let a = MockProvider::bidding("a", 2.0).build();
    let b = MockProvider::bidding("b", 4.0)
        .with_latency(Duration::from_millis(300))
        .build();
    let d = MockProvider::bidding("d", 5.0).build();

    let seeds = HashMap::from([
        ("A".to_string(), vec!["D".to_string()]),
        ("B".to_string(), vec!["D".to_string()]),
    ]);
    let auction = AuctionGraph::new(
        vec![round("A", 500, &["a"]), round("B", 500, &["b"]), round("D", 500, &["d"])],
        &seeds,
    )
    .unwrap();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(auction)
        .with_pricefloor(1.0)
        .with_provider(a.programmatic())
        .with_provider(b.programmatic())
        .with_provider(d.programmatic())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    let starts = events
        .iter()
        .filter(|event| matches!(event, ControllerEvent::RoundStarted { round, .. } if round == "D"))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(round_floor(&events, "D"), Some(4.0));
    assert_eq!(winner_of(&events).0, "d");
}

#[tokio::test(start_paused = true)]
async fn test_direct_demand_uses_cheapest_line_item_above_floor() {
    let programmatic = MockProvider::bidding("programmatic", 2.0).build();
    let direct = MockProvider::bidding("direct", 0.0).build();

    let line_items = LineItems::new(vec![
        LineItem::new("direct", "unit-low", 1.5),
        LineItem::new("direct", "unit-high", 4.0),
        LineItem::new("direct", "unit-mid", 2.5),
        LineItem::new("other", "unit-other", 2.2),
    ]);

    let (controller, mut events) = AuctionController::builder()
        .with_auction(
            AuctionGraph::chain(vec![
                round("ROUND_1", 500, &["programmatic"]),
                round("ROUND_2", 500, &["direct"]),
            ])
            .unwrap(),
        )
        .with_pricefloor(1.0)
        .with_line_items(line_items)
        .with_provider(programmatic.programmatic())
        .with_provider(direct.direct())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    assert_eq!(direct.line_items(), vec![LineItem::new("direct", "unit-mid", 2.5)]);

    let (network, price, waterfall) = winner_of(&events);
    assert_eq!(network, "direct");
    assert_eq!(price, 2.5);
    assert_eq!(waterfall.winner().unwrap().bid().ad_unit_id(), Some("unit-mid"));
}

#[tokio::test(start_paused = true)]
async fn test_direct_demand_without_line_item_does_not_bid() {
    let direct = MockProvider::bidding("direct", 0.0).build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(AuctionGraph::chain(vec![round("ROUND_1", 500, &["direct"])]).unwrap())
        .with_pricefloor(3.0)
        .with_line_items(LineItems::new(vec![LineItem::new("direct", "unit", 3.0)]))
        .with_provider(direct.direct())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    assert!(direct.line_items().is_empty());
    assert!(matches!(outcome(&events), ControllerEvent::AuctionFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_reload_during_auction_is_ignored() {
    let slow = MockProvider::bidding("slow", 2.0)
        .with_latency(Duration::from_millis(200))
        .build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(
            AuctionGraph::chain(vec![round("ROUND_1", 500, &["slow"]), round("ROUND_2", 500, &["slow"])])
                .unwrap(),
        )
        .with_pricefloor(1.0)
        .with_provider(slow.programmatic())
        .build()
        .unwrap();

    controller.load();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.state(), ControllerState::Running);
    controller.load();

    let events = drain(&mut events).await;
    let started = events
        .iter()
        .filter(|event| matches!(event, ControllerEvent::AuctionStarted))
        .count();
    let rounds = events
        .iter()
        .filter(|event| matches!(event, ControllerEvent::RoundStarted { .. }))
        .count();
    assert_eq!(started, 1);
    assert_eq!(rounds, 2);
    assert_eq!(slow.floors(), vec![1.0, 2.0]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_keeps_received_bids() {
    let quick = MockProvider::bidding("quick", 2.0).build();
    let stuck = MockProvider::bidding("stuck", 6.0)
        .with_latency(Duration::from_secs(60))
        .build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(AuctionGraph::chain(vec![round("ROUND_1", 0, &["quick", "stuck"])]).unwrap())
        .with_pricefloor(1.0)
        .with_provider(quick.programmatic())
        .with_provider(stuck.programmatic())
        .build()
        .unwrap();

    controller.load();
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.cancel();

    let events = drain(&mut events).await;
    assert_eq!(winner_of(&events).0, "quick");
    assert!(stuck.notifications().is_empty());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(stuck.cancels(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_provider_is_skipped() {
    let known = MockProvider::bidding("known", 2.0).build();

    let (controller, mut events) = AuctionController::builder()
        .with_auction(AuctionGraph::chain(vec![round("ROUND_1", 500, &["unknown", "known"])]).unwrap())
        .with_pricefloor(1.0)
        .with_provider(known.programmatic())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    assert_eq!(winner_of(&events).0, "known");
}

#[tokio::test(start_paused = true)]
async fn test_waterfall_loads_next_demand_after_failed_fill() {
    let rich = MockProvider::bidding("rich", 5.0).failing_fill().build();
    let modest = MockProvider::bidding("modest", 3.0).build();

    let observer = Arc::new(BaseMediationObserver::new("waterfall", 2, AdType::Rewarded));
    let (controller, mut events) = AuctionController::builder()
        .with_ad_type(AdType::Rewarded)
        .with_auction(AuctionGraph::chain(vec![round("ROUND_1", 500, &["rich", "modest"])]).unwrap())
        .with_pricefloor(1.0)
        .with_provider(rich.programmatic())
        .with_provider(modest.programmatic())
        .with_observer(observer.clone())
        .build()
        .unwrap();

    let events = run(&controller, &mut events).await;
    let (_, _, waterfall) = winner_of(&events);

    let loader = WaterfallController::new(waterfall, observer.clone(), None);
    let demand = loader.load().await.unwrap();
    assert_eq!(demand.network_id(), "modest");
    assert_eq!(demand.price(), 3.0);

    let report = observer.report();
    assert_eq!(report.result.winner_network_id.as_deref(), Some("modest"));
    assert_eq!(
        report.demand("ROUND_1", "rich").map(|demand| demand.status),
        Some(DemandReportStatus::NoFill)
    );
    assert_eq!(
        report.demand("ROUND_1", "modest").map(|demand| demand.status),
        Some(DemandReportStatus::Win)
    );
}
