//! Market-Making Simulator
//!
//! Demo harness for the engine: runs a market-making walkthrough, replays
//! any scenario files given on the command line, then drives the bundled
//! strategies against simulated flow and prints statistics.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use market_maker_engine::feed::FeedAdapter;
use market_maker_engine::metrics::MetricsReporter;
use market_maker_engine::orderbook::{
    price_from_dollars, price_to_dollars, BookRegistry, OrderBook, OrderType, Side,
};
use market_maker_engine::position::{PositionLimits, PositionTracker};
use market_maker_engine::scenario::ScenarioRunner;
use market_maker_engine::strategy::{
    FixedSpreadConfig, FixedSpreadStrategy, InventorySkewedConfig, InventorySkewedStrategy,
    MarketMakingStrategy,
};
use market_maker_engine::utils::time::Clock;
use market_maker_engine::EngineMetrics;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Starting market-making simulator...");

    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        warn!("Prometheus recorder unavailable: {e}");
    }

    let metrics = Arc::new(EngineMetrics::new());
    let reporter = MetricsReporter::new(Arc::clone(&metrics), Duration::from_secs(5));
    let reporter_task = tokio::spawn(async move { reporter.run().await });

    market_making_walkthrough(&metrics);

    // Binary captures replay through the feed adapter; everything else is a
    // scenario script or directory.
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (feed_files, scenario_paths): (Vec<String>, Vec<String>) = args
        .into_iter()
        .partition(|arg| arg.ends_with(".itch") || arg.ends_with(".bin"));

    for feed_file in &feed_files {
        run_feed(feed_file, &metrics)?;
    }
    if !scenario_paths.is_empty() {
        run_scenarios(&scenario_paths, &metrics)?;
    }

    strategy_simulation();

    reporter_task.abort();
    info!("Simulator finished.");
    Ok(())
}

fn print_book_stats(book: &OrderBook) {
    let stats = book.stats();
    info!(
        "Book {} | orders: {} active: {} | bid levels: {} ask levels: {} | bid: ${:.2} ask: ${:.2} mid: ${:.2} spread: ${:.2}",
        book.symbol(),
        stats.total_orders,
        stats.active_orders,
        stats.bid_levels,
        stats.ask_levels,
        price_to_dollars(stats.best_bid),
        price_to_dollars(stats.best_ask),
        price_to_dollars(stats.mid_price),
        price_to_dollars(stats.spread),
    );
}

fn print_position_stats(tracker: &PositionTracker) {
    let stats = tracker.stats();
    info!(
        "Positions | symbols: {} active: {} | realized: ${:.2} unrealized: ${:.2} total: ${:.2} | largest: {} shares on symbol {}",
        stats.total_symbols,
        stats.active_positions,
        price_to_dollars(stats.total_realized_pnl),
        price_to_dollars(stats.total_unrealized_pnl),
        price_to_dollars(stats.total_pnl),
        stats.max_position_size,
        stats.largest_position_symbol,
    );
}

/// Quote, get hit on both sides, mark to mid.
fn market_making_walkthrough(metrics: &EngineMetrics) {
    info!("=== Market making walkthrough ===");

    let registry = BookRegistry::new();
    let tracker = PositionTracker::new(PositionLimits {
        max_position_size: 10_000,
        max_long_position: 5_000,
        max_short_position: 5_000,
        ..PositionLimits::default()
    });

    let book = registry.book(1);
    metrics.time_add_order(|| {
        book.add_order(1, price_from_dollars(100.00), 1000, Side::Buy, OrderType::Limit)
    })
    .ok();
    metrics.increment_orders_added();
    metrics.time_add_order(|| {
        book.add_order(2, price_from_dollars(100.10), 1000, Side::Sell, OrderType::Limit)
    })
    .ok();
    metrics.increment_orders_added();
    print_book_stats(&book);

    info!("Seller hits our bid for 500...");
    if metrics.time_execute_trade(|| book.execute_trade(price_from_dollars(100.00), 500, Side::Sell)) {
        tracker.record_trade(1, price_from_dollars(100.00), 500, Side::Buy, 1);
        metrics.increment_trades_executed(500, 500 * price_from_dollars(100.00) as u64);
    }

    info!("Buyer lifts our offer for 300...");
    if metrics.time_execute_trade(|| book.execute_trade(price_from_dollars(100.10), 300, Side::Buy)) {
        tracker.record_trade(1, price_from_dollars(100.10), 300, Side::Sell, 2);
        metrics.increment_trades_executed(300, 300 * price_from_dollars(100.10) as u64);
    }

    print_book_stats(&book);

    let stats = book.stats();
    metrics.set_resting_orders(stats.total_orders as u64);
    metrics.set_bid_levels(stats.bid_levels as u64);
    metrics.set_ask_levels(stats.ask_levels as u64);
    metrics.set_spread(stats.spread as u64);

    tracker.update_unrealized_pnl(1, book.mid_price());
    print_position_stats(&tracker);
}

fn run_feed(path: &str, metrics: &EngineMetrics) -> Result<(), std::io::Error> {
    info!("=== Feed replay: {path} ===");

    let registry = BookRegistry::new();
    let tracker = PositionTracker::default();
    let mut adapter = FeedAdapter::new(&registry, &tracker);

    let buffer = std::fs::read(path)?;
    adapter.process_buffer(&buffer);

    let stats = adapter.stats();
    metrics.increment_feed_messages(stats.total_messages);
    info!(
        "Feed messages: {} | adds: {} execs: {} cancels: {} deletes: {} replaces: {} trades: {} errors: {}",
        stats.total_messages,
        stats.add_orders,
        stats.executions,
        stats.cancels,
        stats.deletes,
        stats.replaces,
        stats.trades,
        stats.errors,
    );

    for symbol in registry.active_symbols().into_iter().take(3) {
        print_book_stats(&registry.book(symbol));
    }
    print_position_stats(&tracker);
    Ok(())
}

fn run_scenarios(paths: &[String], metrics: &EngineMetrics) -> Result<(), std::io::Error> {
    info!("=== Scenario replay ===");

    let registry = BookRegistry::new();
    let tracker = PositionTracker::default();
    let mut runner = ScenarioRunner::new(&registry, &tracker);

    let mut results = Vec::new();
    for arg in paths {
        let path = Path::new(arg);
        if path.is_dir() {
            results.extend(runner.run_dir(path)?);
        } else {
            results.push(runner.run_file(path)?);
        }
    }

    for result in &results {
        metrics.increment_scenarios_run();
        if result.passed {
            info!(
                "Scenario {} PASSED | {:.2} ms | orders: {} trades: {}",
                result.name, result.execution_time_ms, result.orders_processed, result.trades_executed
            );
        } else {
            error!("Scenario {} FAILED: {}", result.name, result.error_message);
        }
    }

    let stats = runner.stats();
    info!(
        "Scenarios: {} total, {} passed, {} failed, avg {:.2} ms",
        stats.total_scenarios, stats.passed_scenarios, stats.failed_scenarios, stats.avg_execution_time_ms
    );
    print_position_stats(&tracker);
    Ok(())
}

/// Run both bundled strategies over simulated two-sided flow.
fn strategy_simulation() {
    info!("=== Strategy simulation ===");

    let symbols = vec![1, 2];
    let limits = PositionLimits {
        max_position_size: 10_000,
        max_long_position: 5_000,
        max_short_position: 5_000,
        ..PositionLimits::default()
    };

    let mut strategies: Vec<(&str, Box<dyn MarketMakingStrategy>)> = vec![
        (
            "FixedSpreadStrategy",
            Box::new(FixedSpreadStrategy::new(FixedSpreadConfig {
                base_price: price_from_dollars(100.00),
                spread: price_from_dollars(0.10),
                quote_size: 100,
                symbols: symbols.clone(),
            })),
        ),
        (
            "InventorySkewedStrategy",
            Box::new(InventorySkewedStrategy::new(InventorySkewedConfig {
                base_price: price_from_dollars(100.00),
                min_spread: price_from_dollars(0.05),
                max_spread: price_from_dollars(0.20),
                quote_size: 100,
                max_inventory: 1_000,
                symbols: symbols.clone(),
            })),
        ),
    ];

    for (name, strategy) in strategies.iter_mut() {
        info!("--- Simulating {name} ---");
        let registry = BookRegistry::new();
        let tracker = PositionTracker::new(limits);

        // Deterministic xorshift flow generator
        let mut rng_state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;
            rng_state
        };

        for round in 0..20u64 {
            let now = Clock::nanos();
            strategy.update_quotes(&registry, &tracker, now);

            for (i, &symbol) in symbols.iter().enumerate() {
                let book = registry.book(symbol);
                let (bid, _) = book.best_bid();
                let (ask, _) = book.best_ask();

                if next() % 2 == 0 && bid > 0 {
                    let qty = 10 + (next() % 20) as u32;
                    book.execute_trade(bid, qty, Side::Sell);
                    tracker.record_trade(symbol, bid, qty, Side::Buy, 100_000 + round * 10 + i as u64);
                    strategy.on_trade(symbol, bid, qty, Side::Buy, now);
                }
                if next() % 2 == 0 && ask > 0 {
                    let qty = 10 + (next() % 20) as u32;
                    book.execute_trade(ask, qty, Side::Buy);
                    tracker.record_trade(symbol, ask, qty, Side::Sell, 200_000 + round * 10 + i as u64);
                    strategy.on_trade(symbol, ask, qty, Side::Sell, now);
                }

                if let Some(position) = tracker.position(symbol) {
                    tracker.update_unrealized_pnl(symbol, book.mid_price());
                    strategy.on_position_update(symbol, &position, &tracker.stats(), now);
                }
            }
        }

        for &symbol in &symbols {
            if let Some(position) = tracker.position(symbol) {
                info!(
                    "Symbol {symbol}: net={} realized=${:.2} unrealized=${:.2}",
                    position.net_position(),
                    price_to_dollars(position.realized_pnl),
                    price_to_dollars(position.unrealized_pnl),
                );
            } else {
                info!("Symbol {symbol}: no position");
            }
        }
        print_position_stats(&tracker);
    }
}
