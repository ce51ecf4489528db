//! Adaptive strategy: rule-driven switching between named strategies.
//!
//! Holds an ordered rule list; after every update the first matching,
//! non-cooling rule swaps the active strategy. Confidence carries over to
//! the incoming strategy, and the outgoing one is parked with its
//! progression state intact so a later rule can bring it back mid-run.

use crate::factory::build_basic;
use dicelab_core::core::types::{AltAction, BetDecision, BetResult};
use dicelab_core::state::GameState;
use dicelab_core::strategy::{Strategy, StrategyConfig, StrategyMetrics, SwitchRecord};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// What a rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchCondition {
    ConsecutiveLosses,
    ConsecutiveWins,
    DrawdownPct,
    ProfitPct,
    LowConfidence,
    BalanceBelow,
    BalanceAbove,
}

/// One switching rule. Rules are evaluated in list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRule {
    pub condition: SwitchCondition,
    pub threshold: f64,
    /// Name of the strategy to switch to (factory name, e.g. "martingale")
    pub target: String,
    #[serde(default = "default_cooldown")]
    pub cooldown_bets: u32,
}

fn default_cooldown() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Factory name of the strategy to start with
    pub initial: String,
    #[serde(default)]
    pub rules: Vec<StrategyRule>,
    #[serde(default = "default_min_bets")]
    pub min_bets_before_switch: u32,
}

fn default_min_bets() -> u32 {
    5
}

#[derive(Debug)]
pub struct Adaptive {
    config: StrategyConfig,
    adaptive: AdaptiveConfig,
    active: Box<dyn Strategy>,
    active_name: String,
    /// Switched-out strategies, progression preserved for potential return
    parked: HashMap<String, Box<dyn Strategy>>,
    /// Strategy name -> bets until it may be targeted again
    cooldowns: HashMap<String, u32>,
    bets_since_switch: u32,
    initial_balance: Option<Decimal>,
    pending_switch: Option<SwitchRecord>,
    switch_history: Vec<SwitchRecord>,
    metrics: StrategyMetrics,
    confidence: f64,
}

impl Adaptive {
    pub fn new(
        config: StrategyConfig,
        adaptive: AdaptiveConfig,
    ) -> Result<Self, dicelab_core::EngineError> {
        let active = build_basic(&adaptive.initial, config)?;
        Ok(Self {
            active_name: adaptive.initial.clone(),
            config,
            adaptive,
            active,
            parked: HashMap::new(),
            cooldowns: HashMap::new(),
            bets_since_switch: 0,
            initial_balance: None,
            pending_switch: None,
            switch_history: Vec::new(),
            metrics: StrategyMetrics::default(),
            confidence: 1.0,
        })
    }

    pub fn active_name(&self) -> &str {
        &self.active_name
    }

    pub fn switch_history(&self) -> &[SwitchRecord] {
        &self.switch_history
    }

    fn rule_matches(&self, rule: &StrategyRule, state: &GameState) -> bool {
        if rule.target == self.active_name || self.cooldowns.contains_key(&rule.target) {
            return false;
        }
        let initial = self.initial_balance.unwrap_or(state.session_start_balance);
        let balance_ratio = if initial.is_zero() {
            1.0
        } else {
            (state.balance / initial).to_f64().unwrap_or(1.0)
        };
        match rule.condition {
            SwitchCondition::ConsecutiveLosses => {
                f64::from(state.consecutive_losses()) >= rule.threshold
            }
            SwitchCondition::ConsecutiveWins => {
                f64::from(state.consecutive_wins()) >= rule.threshold
            }
            SwitchCondition::DrawdownPct => {
                state.current_drawdown.to_f64().unwrap_or(0.0) >= rule.threshold
            }
            SwitchCondition::ProfitPct => balance_ratio - 1.0 >= rule.threshold,
            SwitchCondition::LowConfidence => self.active.confidence() <= rule.threshold,
            SwitchCondition::BalanceBelow => balance_ratio <= rule.threshold,
            SwitchCondition::BalanceAbove => balance_ratio >= rule.threshold,
        }
    }

    fn switch_to(&mut self, rule: &StrategyRule, state: &GameState) {
        if rule.target == self.active_name {
            return;
        }
        let incoming = match self.parked.remove(&rule.target) {
            Some(parked) => parked,
            None => match build_basic(&rule.target, self.config) {
                Ok(fresh) => fresh,
                Err(err) => {
                    warn!(target = %rule.target, %err, "switch target unavailable, keeping current strategy");
                    return;
                }
            },
        };

        let confidence = self.active.confidence();
        let outgoing_name = std::mem::replace(&mut self.active_name, rule.target.clone());
        let outgoing = std::mem::replace(&mut self.active, incoming);
        self.parked.insert(outgoing_name.clone(), outgoing);

        // Confidence carries over, with a small optimism bump for the change
        self.active.set_confidence((confidence * 1.1).min(1.0));
        self.cooldowns.insert(outgoing_name.clone(), rule.cooldown_bets);
        self.bets_since_switch = 0;

        let record = SwitchRecord {
            from: outgoing_name,
            to: rule.target.clone(),
            condition: format!("{:?}", rule.condition),
            at_bet: state.bets_count,
        };
        debug!(from = %record.from, to = %record.to, condition = %record.condition, "adaptive switch");
        self.switch_history.push(record.clone());
        self.pending_switch = Some(record);
    }

    fn check_rules(&mut self, state: &GameState) {
        if self.bets_since_switch < self.adaptive.min_bets_before_switch {
            return;
        }
        let matching = self
            .adaptive
            .rules
            .iter()
            .find(|rule| self.rule_matches(rule, state))
            .cloned();
        if let Some(rule) = matching {
            self.switch_to(&rule, state);
        }
    }
}

impl Strategy for Adaptive {
    fn name(&self) -> String {
        format!("Adaptive[{}]", self.active_name)
    }

    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn metrics(&self) -> &StrategyMetrics {
        &self.metrics
    }

    fn metrics_mut(&mut self) -> &mut StrategyMetrics {
        &mut self.metrics
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence;
    }

    fn next_amount(&mut self, state: &GameState) -> Decimal {
        self.active.next_amount(state)
    }

    fn on_result(&mut self, _result: &BetResult) {}

    fn decide(&mut self, state: &GameState) -> BetDecision {
        if self.initial_balance.is_none() {
            self.initial_balance = Some(state.balance);
        }
        let decision = self.active.decide(state);
        self.confidence = self.active.confidence();
        decision
    }

    fn update(&mut self, result: &BetResult, state: &GameState) {
        self.active.update(result, state);
        self.metrics.record(result, state);
        self.bets_since_switch += 1;

        self.cooldowns.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(1);
            *remaining > 0
        });

        self.check_rules(state);
    }

    fn on_alt_action(&mut self, action: AltAction) {
        self.active.on_alt_action(action);
    }

    fn take_switch(&mut self) -> Option<SwitchRecord> {
        self.pending_switch.take()
    }

    fn reset(&mut self) {
        // Back to the initial lineup; parked progressions are discarded
        if let Ok(initial) = build_basic(&self.adaptive.initial, self.config) {
            self.active = initial;
            self.active_name = self.adaptive.initial.clone();
        } else {
            self.active.reset();
        }
        self.parked.clear();
        self.cooldowns.clear();
        self.bets_since_switch = 0;
        self.initial_balance = None;
        self.pending_switch = None;
        self.switch_history.clear();
        self.metrics.reset();
        self.confidence = 1.0;
    }

    fn on_winning_streak(&mut self, length: u32, state: &GameState) {
        self.active.on_winning_streak(length, state);
    }

    fn on_losing_streak(&mut self, length: u32, state: &GameState) {
        self.active.on_losing_streak(length, state);
    }
}
