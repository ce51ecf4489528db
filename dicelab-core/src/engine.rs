//! Per-session simulation loop.
//!
//! One engine owns one game (and through it one oracle), one session and
//! one strategy, plus the event bus it reports into. Everything inside the
//! loop is single-threaded and fully sequential; the only outside influence
//! is the cooperative cancellation token, observed between bets.

use crate::core::dice_game::DiceGame;
use crate::core::errors::EngineError;
use crate::core::events::{Event, EventBus, EventKind};
use crate::core::types::{AltAction, BetType, StopReason};
use crate::money::session::{Session, SessionConfig, SessionSummary};
use crate::strategy::{clamp_bet, Strategy};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

/// Drawdown ratio that triggers a `DRAWDOWN_ALERT` event.
const DRAWDOWN_ALERT_RATIO_DEC: rust_decimal::Decimal = rust_decimal_macros::dec!(0.10);
/// Streak events fire every this many consecutive results, from 3 up.
const STREAK_EVENT_PERIOD: u32 = 5;

/// Drives one session to completion.
pub struct SimulationEngine {
    game: DiceGame,
    bus: EventBus,
}

impl SimulationEngine {
    pub fn new(game: DiceGame, bus: EventBus) -> Self {
        Self { game, bus }
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn game(&self) -> &DiceGame {
        &self.game
    }

    /// Run the session loop until a stop condition, cancellation or a
    /// fatal oracle error. Always returns a summary; session-level errors
    /// are recorded on it rather than propagated.
    pub fn run_session(
        &mut self,
        session_id: Uuid,
        config: SessionConfig,
        strategy: &mut dyn Strategy,
        cancel: &AtomicBool,
    ) -> SessionSummary {
        let mut session = Session::new(session_id, config, strategy.name());
        let game_config = self.game.config().clone();
        let min_bet = game_config.min_bet;
        let mut drawdown_alerted = false;

        self.emit(
            EventKind::SessionStart,
            Some(session.id),
            json!({
                "strategy": session.strategy_name,
                "initial_balance": session.state.balance,
                "seed_info": self.game.current_seed_info(),
            }),
        );

        loop {
            // Cancellation is observed between bets, never mid-bet.
            if cancel.load(Ordering::Relaxed) {
                session.end(StopReason::ExternalCancel);
                break;
            }

            if let Some(reason) = session.should_stop() {
                self.emit_stop_milestone(&session, reason);
                session.end(reason);
                break;
            }

            let decision = strategy.decide(&session.state);
            self.emit(
                EventKind::BetDecision,
                Some(session.id),
                json!({
                    "decision": &decision,
                    "balance": session.state.balance,
                    "nonce": self.game.nonce(),
                }),
            );

            if decision.skip {
                match decision.action {
                    Some(AltAction::ToggleBetType) => {
                        session.state.current_bet_type =
                            session.state.current_bet_type.toggled();
                        session.state.bet_type_toggles += 1;
                        strategy.on_alt_action(AltAction::ToggleBetType);
                        self.emit(
                            EventKind::StrategyToggle,
                            Some(session.id),
                            json!({
                                "new_bet_type": session.state.current_bet_type,
                                "toggles": session.state.bet_type_toggles,
                            }),
                        );
                        continue;
                    }
                    Some(AltAction::RotateSeed) => {
                        let revealed = self.game.rotate_seeds();
                        session.state.seed_rotations_count += 1;
                        strategy.on_alt_action(AltAction::RotateSeed);
                        self.emit(
                            EventKind::StrategySeedChange,
                            Some(session.id),
                            json!({
                                "revealed_server_seed_hash": revealed.server_seed_hash(),
                                "final_nonce": revealed.nonce,
                                "new_server_seed_hash":
                                    self.game.current_seed_info().server_seed_hash,
                                "rotations": session.state.seed_rotations_count,
                            }),
                        );
                        continue;
                    }
                    _ => {
                        // A plain skip with no alternative means the strategy
                        // cannot bet at all; the only honest end state is
                        // bankruptcy.
                        debug!(
                            reason = decision.reason.as_deref().unwrap_or("unspecified"),
                            "strategy skipped without an alternative action"
                        );
                        session.end(StopReason::Bankrupt);
                        break;
                    }
                }
            }

            // BET_INVALID recovery: clamp locally and log, never abort.
            // The strategy's own limits apply first, then the game's band,
            // so a strategy config wider than the table cannot reach
            // roll()'s validation.
            let amount = clamp_bet(decision.amount, strategy.config(), session.state.balance)
                .max(game_config.min_bet)
                .min(game_config.max_bet)
                .min(session.state.balance);
            if amount != decision.amount {
                warn!(
                    requested = %decision.amount,
                    clamped = %amount,
                    "bet outside limits, clamped"
                );
            }
            if amount < min_bet || amount > session.state.balance {
                session.end(StopReason::Bankrupt);
                break;
            }

            let multiplier = decision
                .multiplier
                .clamp(game_config.min_multiplier, game_config.max_multiplier);
            if multiplier != decision.multiplier {
                warn!(
                    requested = decision.multiplier,
                    clamped = multiplier,
                    "multiplier outside game band, clamped"
                );
            }

            let bet_type = effective_bet_type(&decision, &mut session);

            self.emit(
                EventKind::BetPlaced,
                Some(session.id),
                json!({
                    "amount": amount,
                    "multiplier": multiplier,
                    "bet_type": bet_type,
                    "nonce": self.game.nonce(),
                }),
            );

            let result = match self.game.roll(amount, multiplier, bet_type) {
                Ok(result) => result,
                Err(err @ EngineError::OracleExhausted { .. }) => {
                    // In practice impossible, but the taxonomy demands a
                    // clean session death, not a panic.
                    warn!(%err, "oracle exhausted, ending session");
                    session.error = Some(err.to_string());
                    session.end(StopReason::Bankrupt);
                    break;
                }
                Err(EngineError::BetInvalid { reason }) => {
                    // Unreachable after the clamping above; recover locally
                    // per the error policy. roll() validates before it
                    // consumes a nonce, so nothing advanced.
                    warn!(%reason, "bet rejected by the game, skipping");
                    continue;
                }
                Err(err) => {
                    session.error = Some(err.to_string());
                    session.end(StopReason::Bankrupt);
                    break;
                }
            };

            self.emit(
                EventKind::BetResolved,
                Some(session.id),
                json!({
                    "roll": result.roll,
                    "won": result.won,
                    "payout": result.payout,
                    "nonce": result.nonce,
                }),
            );

            if decision.action == Some(AltAction::ParkingBet) {
                session.state.parking_bets_count += 1;
                if !result.won {
                    session.state.parking_losses += result.amount;
                }
                self.emit(
                    EventKind::StrategyParkingBet,
                    Some(session.id),
                    json!({
                        "amount": result.amount,
                        "won": result.won,
                        "parking_bets": session.state.parking_bets_count,
                    }),
                );
            }

            session.apply(&result);
            strategy.update(&result, &session.state);

            if let Some(switch) = strategy.take_switch() {
                self.emit(
                    EventKind::StrategySwitch,
                    Some(session.id),
                    json!({
                        "from": switch.from,
                        "to": switch.to,
                        "condition": switch.condition,
                        "at_bet": switch.at_bet,
                    }),
                );
            }

            self.emit_streak_events(&session);
            self.emit_drawdown_alert(&session, &mut drawdown_alerted);

            self.emit(
                EventKind::BetResult,
                Some(session.id),
                json!({
                    "result": result,
                    "balance": session.state.balance,
                    "streak": session.state.current_streak,
                    "drawdown": session.state.current_drawdown,
                }),
            );
        }

        let summary = session.summary();
        self.emit(
            EventKind::SessionEnd,
            Some(session.id),
            json!({
                "stop_reason": summary.stop_reason,
                "final_balance": summary.final_balance,
                "bets": summary.bets,
                "roi": summary.roi,
                "error": summary.error,
            }),
        );
        self.bus.flush();
        summary
    }

    fn emit(&mut self, kind: EventKind, session_id: Option<Uuid>, payload: serde_json::Value) {
        self.bus.emit(Event::new(kind, session_id, payload));
    }

    fn emit_streak_events(&mut self, session: &Session) {
        let wins = session.state.consecutive_wins();
        let losses = session.state.consecutive_losses();
        if wins >= 3 && wins % STREAK_EVENT_PERIOD == 0 {
            self.emit(
                EventKind::WinningStreak,
                Some(session.id),
                json!({ "length": wins }),
            );
        }
        if losses >= 3 && losses % STREAK_EVENT_PERIOD == 0 {
            self.emit(
                EventKind::LosingStreak,
                Some(session.id),
                json!({ "length": losses }),
            );
        }
    }

    /// Emit `DRAWDOWN_ALERT` once per excursion past the threshold, not on
    /// every bet spent under water.
    fn emit_drawdown_alert(&mut self, session: &Session, alerted: &mut bool) {
        let drawdown = session.state.current_drawdown;
        if drawdown >= DRAWDOWN_ALERT_RATIO_DEC {
            if !*alerted {
                *alerted = true;
                self.emit(
                    EventKind::DrawdownAlert,
                    Some(session.id),
                    json!({
                        "drawdown": drawdown,
                        "peak_balance": session.state.peak_balance,
                        "balance": session.state.balance,
                    }),
                );
            }
        } else {
            *alerted = false;
        }
    }

    fn emit_stop_milestone(&mut self, session: &Session, reason: StopReason) {
        let kind = match reason {
            StopReason::TakeProfit => EventKind::ProfitTargetReached,
            StopReason::StopLoss => EventKind::StopLossTriggered,
            _ => return,
        };
        self.emit(
            kind,
            Some(session.id),
            json!({
                "roi": session.state.session_roi(),
                "balance": session.state.balance,
            }),
        );
    }
}

/// The bet side actually sent to the game: parking bets follow the
/// session's current side, ordinary bets take the strategy's choice and
/// update the session side.
fn effective_bet_type(
    decision: &crate::core::types::BetDecision,
    session: &mut Session,
) -> BetType {
    if decision.action == Some(AltAction::ParkingBet) {
        session.state.current_bet_type
    } else {
        session.state.current_bet_type = decision.bet_type;
        decision.bet_type
    }
}
