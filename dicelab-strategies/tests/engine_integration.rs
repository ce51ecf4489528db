//! End-to-end runs of the real strategies through the simulation engine:
//! the Martingale cap, the parking constraint and multi-strategy plans.

use dicelab_core::config::{ParkingConfig, SimulationConfig};
use dicelab_core::core::events::{Event, EventKind, EventSink};
use dicelab_core::core::provably_fair::ProvablyFair;
use dicelab_core::core::types::StopReason;
use dicelab_core::core::{DiceGame, EventBus, GameConfig};
use dicelab_core::engine::SimulationEngine;
use dicelab_core::money::session::SessionConfig;
use dicelab_core::runner::{comparison_plan, RunnerOptions, SimulationRunner};
use dicelab_core::strategy::StrategyConfig;
use dicelab_strategies::{Factory, Fibonacci, Martingale, Parking};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Collects (kind, payload) pairs for offline inspection, since long
/// sessions overflow the bus ring buffer.
struct Collector {
    events: Arc<Mutex<Vec<(EventKind, serde_json::Value)>>>,
}

impl EventSink for Collector {
    fn on_event(&mut self, event: &Event) {
        self.events
            .lock()
            .unwrap()
            .push((event.kind, event.payload.clone()));
    }
}

fn collecting_engine(rng_seed: u64) -> (SimulationEngine, Arc<Mutex<Vec<(EventKind, serde_json::Value)>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut bus = EventBus::new();
    bus.subscribe(Box::new(Collector {
        events: events.clone(),
    }));
    let oracle = ProvablyFair::deterministic(rng_seed, "integration");
    let engine = SimulationEngine::new(DiceGame::new(GameConfig::default(), oracle), bus);
    (engine, events)
}

fn session_config(initial: Decimal, max_bets: u64) -> SessionConfig {
    SessionConfig {
        initial_balance: initial,
        stop_loss_ratio: -0.99,
        take_profit_ratio: 99.0,
        max_bets,
        ..SessionConfig::default()
    }
}

#[test]
fn martingale_respects_its_cap_end_to_end() {
    let (mut engine, events) = collecting_engine(31);
    let mut strategy = Martingale::new(StrategyConfig {
        base_bet: dec!(0.001),
        max_losses: 10,
        ..StrategyConfig::default()
    });
    let cancel = AtomicBool::new(false);
    let summary = engine.run_session(
        Uuid::new_v4(),
        session_config(dec!(10), 2_000),
        &mut strategy,
        &cancel,
    );
    assert!(summary.bets > 0);

    // No bet ever exceeded base * 2^10
    let cap = dec!(0.001) * dec!(1024);
    let events = events.lock().unwrap();
    let mut previous_losses = 0u32;
    let mut losses_in_row = 0u32;
    for (kind, payload) in events.iter() {
        if *kind != EventKind::BetResult {
            continue;
        }
        let amount: Decimal = serde_json::from_value(payload["result"]["amount"].clone()).unwrap();
        assert!(amount <= cap, "bet {amount} exceeded cap {cap}");

        // After the cap was hit, the very next bet is the base bet
        if previous_losses >= 10 {
            assert_eq!(amount, dec!(0.001), "expected base bet after cap");
        }
        let won = payload["result"]["won"].as_bool().unwrap();
        losses_in_row = if won { 0 } else { losses_in_row + 1 };
        previous_losses = losses_in_row;
    }
}

#[test]
fn parking_never_exceeds_the_toggle_budget() {
    let parking_config = ParkingConfig {
        parking_on_consecutive_losses: 5,
        ..ParkingConfig::default()
    };
    let base = Fibonacci::new(StrategyConfig {
        base_bet: dec!(0.002),
        max_losses: 12,
        ..StrategyConfig::default()
    });
    let mut strategy = Parking::new(parking_config, Box::new(base));

    let (mut engine, events) = collecting_engine(97);
    let cancel = AtomicBool::new(false);
    let summary = engine.run_session(
        Uuid::new_v4(),
        session_config(dec!(50), 1_000),
        &mut strategy,
        &cancel,
    );
    assert!(summary.bets >= 1_000 || summary.stop_reason != StopReason::MaxBets);
    assert!(summary.parking_bets > 0, "expected the streak trigger to fire");

    let events = events.lock().unwrap();

    // Invariant: between any two consumed nonces, at most 3 toggles
    let mut toggles_since_bet = 0u32;
    for (kind, _) in events.iter() {
        match kind {
            EventKind::StrategyToggle => {
                toggles_since_bet += 1;
                assert!(toggles_since_bet <= 3, "toggle budget exceeded");
            }
            EventKind::BetResolved => toggles_since_bet = 0,
            _ => {}
        }
    }

    // After a 5-loss streak, the next consumed nonce is a parking bet
    // (multiplier ~ 100/98) unless a rotation intervened
    let mut losses_in_row = 0u32;
    let mut expect_parking = false;
    for (kind, payload) in events.iter() {
        match kind {
            EventKind::StrategySeedChange => expect_parking = false,
            EventKind::BetResult => {
                let multiplier = payload["result"]["multiplier"].as_f64().unwrap();
                if expect_parking {
                    assert!(
                        (multiplier - 100.0 / 98.0).abs() < 1e-9,
                        "expected a parking multiplier after the loss streak, got {multiplier}"
                    );
                }
                let won = payload["result"]["won"].as_bool().unwrap();
                losses_in_row = if won { 0 } else { losses_in_row + 1 };
                expect_parking = losses_in_row >= 5;
            }
            _ => {}
        }
    }
}

#[test]
fn parking_counters_reach_the_summary() {
    let parking_config = ParkingConfig {
        parking_on_consecutive_losses: 3,
        ..ParkingConfig::default()
    };
    let base = Fibonacci::new(StrategyConfig::with_base_bet(dec!(0.002)));
    let mut strategy = Parking::new(parking_config, Box::new(base));

    let (mut engine, _) = collecting_engine(5);
    let cancel = AtomicBool::new(false);
    let summary = engine.run_session(
        Uuid::new_v4(),
        session_config(dec!(20), 600),
        &mut strategy,
        &cancel,
    );
    assert!(summary.bet_type_toggles > 0);
    assert!(summary.parking_bets > 0);
    // Parking losses only accrue on lost parking bets, which are rare
    assert!(summary.parking_losses >= Decimal::ZERO);
}

#[test]
fn factory_strategies_run_under_the_runner() {
    let plan = comparison_plan(
        vec![
            (
                "flat".into(),
                serde_json::json!({ "strategy": "flat", "base_bet": "0.001" }),
            ),
            (
                "martingale".into(),
                serde_json::json!({ "strategy": "martingale", "base_bet": "0.001", "max_losses": 8 }),
            ),
            (
                "parked_fibonacci".into(),
                serde_json::json!({ "strategy": "fibonacci", "base_bet": "0.001", "parking": true }),
            ),
        ],
        SessionConfig {
            initial_balance: dec!(5),
            stop_loss_ratio: -0.99,
            take_profit_ratio: 99.0,
            max_bets: 100,
            ..SessionConfig::default()
        },
        10,
        2024,
    );

    let runner = SimulationRunner::new(
        SimulationConfig {
            parallel_workers: 4,
            auto_parallel_threshold: 10,
            checkpoint_interval: 0,
            ..SimulationConfig::default()
        },
        GameConfig::default(),
        RunnerOptions::default(),
    );
    let result = runner.run(plan, &Factory).unwrap();
    assert_eq!(result.per_session.len(), 30);
    assert_eq!(result.per_spec.len(), 3);
    for spec in &result.per_spec {
        assert_eq!(spec.aggregate.sessions, 10);
    }
    // Deterministic re-run agrees
    let runner2 = SimulationRunner::new(
        SimulationConfig {
            parallel_workers: 1,
            auto_parallel_threshold: u32::MAX,
            checkpoint_interval: 0,
            ..SimulationConfig::default()
        },
        GameConfig::default(),
        RunnerOptions::default(),
    );
    let plan2 = comparison_plan(
        vec![
            (
                "flat".into(),
                serde_json::json!({ "strategy": "flat", "base_bet": "0.001" }),
            ),
            (
                "martingale".into(),
                serde_json::json!({ "strategy": "martingale", "base_bet": "0.001", "max_losses": 8 }),
            ),
            (
                "parked_fibonacci".into(),
                serde_json::json!({ "strategy": "fibonacci", "base_bet": "0.001", "parking": true }),
            ),
        ],
        SessionConfig {
            initial_balance: dec!(5),
            stop_loss_ratio: -0.99,
            take_profit_ratio: 99.0,
            max_bets: 100,
            ..SessionConfig::default()
        },
        10,
        2024,
    );
    let result2 = runner2.run(plan2, &Factory).unwrap();
    let profits: Vec<Decimal> = result.per_session.iter().map(|s| s.profit).collect();
    let profits2: Vec<Decimal> = result2.per_session.iter().map(|s| s.profit).collect();
    assert_eq!(profits, profits2);
}

/// Flat survival odds at research scale; ignored by default because it
/// rolls tens of millions of HMACs.
#[test]
#[ignore = "statistical, ~10M HMAC derivations"]
fn flat_rarely_goes_bankrupt() {
    let plan = comparison_plan(
        vec![(
            "flat".into(),
            serde_json::json!({ "strategy": "flat", "base_bet": "0.001" }),
        )],
        SessionConfig {
            initial_balance: dec!(100),
            stop_loss_ratio: -0.999,
            take_profit_ratio: 999.0,
            max_bets: 10_000,
            ..SessionConfig::default()
        },
        1_000,
        90210,
    );
    let runner = SimulationRunner::new(
        SimulationConfig {
            parallel_workers: 8,
            auto_parallel_threshold: 1,
            checkpoint_interval: 0,
            ..SimulationConfig::default()
        },
        GameConfig::default(),
        RunnerOptions::default(),
    );
    let result = runner.run(plan, &Factory).unwrap();
    assert!(result.aggregate.bankrupt_rate < 0.01);
    assert!(result.aggregate.average_roi > -0.02);
    assert!(result.aggregate.average_roi < 0.005);
}
