use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::orderbook::book::BookStats;
use crate::orderbook::registry::BookRegistry;
use crate::orderbook::types::{
    price_from_dollars, OrderId, OrderType, Price, Quantity, Side, SymbolId,
};
use crate::position::tracker::{PositionTracker, TrackerStats};
use crate::scenario::command::{parse_line, CommandKind, ScenarioCommand};

/// Outcome of one scenario run, including final book and position state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    pub error_message: String,
    pub execution_time_ms: f64,
    pub orders_processed: usize,
    pub trades_executed: usize,
    pub book_stats: BTreeMap<SymbolId, BookStats>,
    pub position_stats: TrackerStats,
}

/// Aggregate counters across runs of one runner.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScenarioStats {
    pub total_scenarios: usize,
    pub passed_scenarios: usize,
    pub failed_scenarios: usize,
    pub total_execution_time_ms: f64,
    pub avg_execution_time_ms: f64,
}

/// Applies parsed scenario commands to a book registry and tracker.
///
/// Matching starts disabled: market-order commands are accepted but do
/// nothing until a script runs `enable matching`.
pub struct ScenarioRunner<'a> {
    registry: &'a BookRegistry,
    tracker: &'a PositionTracker,
    matching_enabled: bool,
    stats: ScenarioStats,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(registry: &'a BookRegistry, tracker: &'a PositionTracker) -> Self {
        Self {
            registry,
            tracker,
            matching_enabled: false,
            stats: ScenarioStats::default(),
        }
    }

    pub fn set_matching_enabled(&mut self, enabled: bool) {
        self.matching_enabled = enabled;
    }

    pub fn is_matching_enabled(&self) -> bool {
        self.matching_enabled
    }

    pub fn stats(&self) -> ScenarioStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ScenarioStats::default();
    }

    /// Run a script given as text. Comments and unknown commands are
    /// skipped; the first failing command stops the scenario.
    pub fn run_script(&mut self, name: &str, script: &str) -> ScenarioResult {
        info!(scenario = name, "running scenario");
        let started = Instant::now();

        let mut result = ScenarioResult {
            name: name.to_owned(),
            passed: true,
            error_message: String::new(),
            execution_time_ms: 0.0,
            orders_processed: 0,
            trades_executed: 0,
            book_stats: BTreeMap::new(),
            position_stats: TrackerStats::default(),
        };

        for (index, line) in script.lines().enumerate() {
            let command = parse_line(line, index + 1);
            match command.kind {
                CommandKind::Comment => continue,
                CommandKind::Unknown => {
                    warn!(scenario = name, line = command.line_number, "skipping unknown command");
                    continue;
                }
                _ => {}
            }

            if !self.execute_command(&command, &mut result.trades_executed) {
                result.passed = false;
                result.error_message =
                    format!("Failed to execute command at line {}", command.line_number);
                break;
            }

            if matches!(
                command.kind,
                CommandKind::AddLimitBuy
                    | CommandKind::AddLimitSell
                    | CommandKind::AddMarketBuy
                    | CommandKind::AddMarketSell
            ) {
                result.orders_processed += 1;
            }
        }

        for symbol in self.registry.active_symbols() {
            result.book_stats.insert(symbol, self.registry.book(symbol).stats());
        }
        result.position_stats = self.tracker.stats();
        result.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.stats.total_scenarios += 1;
        if result.passed {
            self.stats.passed_scenarios += 1;
        } else {
            self.stats.failed_scenarios += 1;
        }
        self.stats.total_execution_time_ms += result.execution_time_ms;
        self.stats.avg_execution_time_ms =
            self.stats.total_execution_time_ms / self.stats.total_scenarios as f64;

        result
    }

    /// Run a scenario file; the file stem becomes the scenario name.
    pub fn run_file<P: AsRef<Path>>(&mut self, path: P) -> io::Result<ScenarioResult> {
        let path = path.as_ref();
        let script = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("scenario")
            .to_owned();
        Ok(self.run_script(&name, &script))
    }

    /// Run every `*.txt` scenario in a directory.
    pub fn run_dir<P: AsRef<Path>>(&mut self, dir: P) -> io::Result<Vec<ScenarioResult>> {
        let mut results = Vec::new();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "txt").unwrap_or(false))
            .collect();
        paths.sort();

        for path in paths {
            results.push(self.run_file(&path)?);
        }
        Ok(results)
    }

    fn execute_command(&mut self, command: &ScenarioCommand, trades_executed: &mut usize) -> bool {
        let args = &command.args;
        match command.kind {
            CommandKind::EnableMatching => {
                self.matching_enabled = true;
                true
            }
            CommandKind::AddSymbol => {
                // <symbol_id> <name>; the name is informational
                let Some(symbol) = arg_num::<SymbolId>(args, 0, 2) else {
                    return false;
                };
                self.registry.book(symbol);
                true
            }
            CommandKind::AddBook => {
                let Some(symbol) = arg_num::<SymbolId>(args, 0, 1) else {
                    return false;
                };
                self.registry.book(symbol);
                true
            }
            CommandKind::DeleteSymbol | CommandKind::DeleteBook => {
                // Books are never deleted during the process lifetime
                arg_num::<SymbolId>(args, 0, 1).is_some()
            }
            CommandKind::AddLimitBuy => self.add_limit(args, Side::Buy),
            CommandKind::AddLimitSell => self.add_limit(args, Side::Sell),
            CommandKind::AddMarketBuy => self.add_market(args, Side::Buy, trades_executed),
            CommandKind::AddMarketSell => self.add_market(args, Side::Sell, trades_executed),
            CommandKind::AddSlippageMarketBuy => {
                self.add_slippage_market(args, Side::Buy, trades_executed)
            }
            CommandKind::AddSlippageMarketSell => {
                self.add_slippage_market(args, Side::Sell, trades_executed)
            }
            CommandKind::ReduceOrder => {
                // <order_id> <qty>; book-side application is an extension point
                arg_num::<OrderId>(args, 0, 2).is_some() && arg_num::<Quantity>(args, 1, 2).is_some()
            }
            CommandKind::ModifyOrder => {
                arg_num::<OrderId>(args, 0, 3).is_some()
                    && arg_price(args, 1, 3).is_some()
                    && arg_num::<Quantity>(args, 2, 3).is_some()
            }
            CommandKind::ReplaceOrder => {
                arg_num::<OrderId>(args, 0, 4).is_some()
                    && arg_num::<OrderId>(args, 1, 4).is_some()
                    && arg_price(args, 2, 4).is_some()
                    && arg_num::<Quantity>(args, 3, 4).is_some()
            }
            CommandKind::DeleteOrder => arg_num::<OrderId>(args, 0, 1).is_some(),
            CommandKind::Comment | CommandKind::Unknown => {
                unreachable!("comments and unknown commands are filtered before dispatch")
            }
        }
    }

    fn add_limit(&mut self, args: &[String], side: Side) -> bool {
        let (Some(order_id), Some(symbol), Some(price), Some(quantity)) = (
            arg_num::<OrderId>(args, 0, 4),
            arg_num::<SymbolId>(args, 1, 4),
            arg_price(args, 2, 4),
            arg_num::<Quantity>(args, 3, 4),
        ) else {
            return false;
        };

        self.registry
            .add_order(symbol, order_id, price, quantity, side, OrderType::Limit)
            .is_ok()
    }

    fn add_market(&mut self, args: &[String], side: Side, trades_executed: &mut usize) -> bool {
        let (Some(order_id), Some(symbol), Some(quantity)) = (
            arg_num::<OrderId>(args, 0, 3),
            arg_num::<SymbolId>(args, 1, 3),
            arg_num::<Quantity>(args, 2, 3),
        ) else {
            return false;
        };

        if !self.matching_enabled {
            debug!(order_id, symbol, "market order accepted, matching disabled");
            return true;
        }

        // Cross the spread at the touch on the opposite side
        let book = self.registry.book(symbol);
        let (touch, _) = match side {
            Side::Buy => book.best_ask(),
            Side::Sell => book.best_bid(),
        };
        if touch > 0 {
            let filled = book.execute_trade(touch, quantity, side);
            self.tracker.record_trade(symbol, touch, quantity, side, order_id);
            if filled {
                *trades_executed += 1;
            }
        }
        true
    }

    fn add_slippage_market(
        &mut self,
        args: &[String],
        side: Side,
        trades_executed: &mut usize,
    ) -> bool {
        let (Some(order_id), Some(symbol), Some(quantity), Some(slippage)) = (
            arg_num::<OrderId>(args, 0, 4),
            arg_num::<SymbolId>(args, 1, 4),
            arg_num::<Quantity>(args, 2, 4),
            arg_price(args, 3, 4),
        ) else {
            return false;
        };

        if !self.matching_enabled {
            return true;
        }

        // The effective price is offset from the touch by the slippage
        let book = self.registry.book(symbol);
        let execution_price = match side {
            Side::Buy => {
                let (bid, _) = book.best_bid();
                if bid == 0 {
                    return true;
                }
                bid + slippage
            }
            Side::Sell => {
                let (ask, _) = book.best_ask();
                if ask == 0 {
                    return true;
                }
                ask - slippage
            }
        };

        let filled = book.execute_trade(execution_price, quantity, side);
        self.tracker
            .record_trade(symbol, execution_price, quantity, side, order_id);
        if filled {
            *trades_executed += 1;
        }
        true
    }
}

/// Parse args[index] as an unsigned integer, requiring at least `arity`
/// arguments in total.
fn arg_num<T: std::str::FromStr>(args: &[String], index: usize, arity: usize) -> Option<T> {
    if args.len() < arity {
        return None;
    }
    args.get(index)?.parse().ok()
}

/// Parse args[index] as decimal dollars, converted to ticks.
fn arg_price(args: &[String], index: usize, arity: usize) -> Option<Price> {
    if args.len() < arity {
        return None;
    }
    let dollars: f64 = args.get(index)?.parse().ok()?;
    Some(price_from_dollars(dollars))
}
