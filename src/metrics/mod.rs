//! Engine-wide operational metrics.
//!
//! Counters and latency trackers are plain atomics readable in-process;
//! everything is also published through the `metrics` facade so a Prometheus
//! recorder can scrape it.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::info;

/// Metrics collector for engine operations
#[derive(Debug)]
pub struct EngineMetrics {
    // Latency tracking
    add_order_latency: LatencyTracker,
    cancel_order_latency: LatencyTracker,
    modify_order_latency: LatencyTracker,
    execute_trade_latency: LatencyTracker,

    // Throughput counters
    orders_added: AtomicU64,
    orders_cancelled: AtomicU64,
    orders_modified: AtomicU64,
    trades_executed: AtomicU64,
    feed_messages: AtomicU64,
    scenarios_run: AtomicU64,

    // Volume tracking
    total_volume: AtomicU64,
    total_notional: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        describe_counter!("engine_orders_total", "Total number of orders processed");
        describe_counter!("engine_trades_total", "Total number of trades executed");
        describe_counter!("engine_feed_messages_total", "Total feed messages consumed");
        describe_counter!("engine_scenarios_total", "Total scenarios executed");
        describe_histogram!(
            "engine_operation_duration_seconds",
            "Duration of book operations"
        );
        describe_gauge!("engine_levels_total", "Number of price levels in a book");
        describe_gauge!("engine_orders_current", "Current number of resting orders");
        describe_gauge!("engine_spread_ticks", "Current bid-ask spread in ticks");

        Self {
            add_order_latency: LatencyTracker::new("add_order"),
            cancel_order_latency: LatencyTracker::new("cancel_order"),
            modify_order_latency: LatencyTracker::new("modify_order"),
            execute_trade_latency: LatencyTracker::new("execute_trade"),
            orders_added: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            orders_modified: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            feed_messages: AtomicU64::new(0),
            scenarios_run: AtomicU64::new(0),
            total_volume: AtomicU64::new(0),
            total_notional: AtomicU64::new(0),
        }
    }

    // Latency measurement methods
    pub fn time_add_order<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.add_order_latency.time(f)
    }

    pub fn time_cancel_order<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.cancel_order_latency.time(f)
    }

    pub fn time_modify_order<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.modify_order_latency.time(f)
    }

    pub fn time_execute_trade<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.execute_trade_latency.time(f)
    }

    // Counter methods
    pub fn increment_orders_added(&self) {
        self.orders_added.fetch_add(1, Ordering::Relaxed);
        counter!("engine_orders_total", "operation" => "add").increment(1);
    }

    pub fn increment_orders_cancelled(&self) {
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
        counter!("engine_orders_total", "operation" => "cancel").increment(1);
    }

    pub fn increment_orders_modified(&self) {
        self.orders_modified.fetch_add(1, Ordering::Relaxed);
        counter!("engine_orders_total", "operation" => "modify").increment(1);
    }

    pub fn increment_trades_executed(&self, quantity: u64, notional: u64) {
        self.trades_executed.fetch_add(1, Ordering::Relaxed);
        self.total_volume.fetch_add(quantity, Ordering::Relaxed);
        self.total_notional.fetch_add(notional, Ordering::Relaxed);

        counter!("engine_trades_total").increment(1);
        counter!("engine_volume_total").increment(quantity);
        counter!("engine_notional_total").increment(notional);
    }

    pub fn increment_feed_messages(&self, count: u64) {
        self.feed_messages.fetch_add(count, Ordering::Relaxed);
        counter!("engine_feed_messages_total").increment(count);
    }

    pub fn increment_scenarios_run(&self) {
        self.scenarios_run.fetch_add(1, Ordering::Relaxed);
        counter!("engine_scenarios_total").increment(1);
    }

    // Gauge methods
    pub fn set_resting_orders(&self, count: u64) {
        gauge!("engine_orders_current").set(count as f64);
    }

    pub fn set_bid_levels(&self, count: u64) {
        gauge!("engine_levels_total", "side" => "bid").set(count as f64);
    }

    pub fn set_ask_levels(&self, count: u64) {
        gauge!("engine_levels_total", "side" => "ask").set(count as f64);
    }

    pub fn set_spread(&self, spread_ticks: u64) {
        gauge!("engine_spread_ticks").set(spread_ticks as f64);
    }

    // Getters for current values
    pub fn orders_added(&self) -> u64 {
        self.orders_added.load(Ordering::Relaxed)
    }

    pub fn orders_cancelled(&self) -> u64 {
        self.orders_cancelled.load(Ordering::Relaxed)
    }

    pub fn orders_modified(&self) -> u64 {
        self.orders_modified.load(Ordering::Relaxed)
    }

    pub fn trades_executed(&self) -> u64 {
        self.trades_executed.load(Ordering::Relaxed)
    }

    pub fn feed_messages(&self) -> u64 {
        self.feed_messages.load(Ordering::Relaxed)
    }

    pub fn scenarios_run(&self) -> u64 {
        self.scenarios_run.load(Ordering::Relaxed)
    }

    pub fn total_volume(&self) -> u64 {
        self.total_volume.load(Ordering::Relaxed)
    }

    pub fn total_notional(&self) -> u64 {
        self.total_notional.load(Ordering::Relaxed)
    }

    pub fn latency_stats(&self) -> LatencyStats {
        LatencyStats {
            add_order: self.add_order_latency.stats(),
            cancel_order: self.cancel_order_latency.stats(),
            modify_order: self.modify_order_latency.stats(),
            execute_trade: self.execute_trade_latency.stats(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency tracker for individual operations
#[derive(Debug)]
struct LatencyTracker {
    operation: &'static str,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(start.elapsed());
        result
    }

    fn record(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        histogram!("engine_operation_duration_seconds", "operation" => self.operation)
            .record(duration.as_secs_f64());
    }

    fn stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        let min = self.min_nanos.load(Ordering::Relaxed);
        let max = self.max_nanos.load(Ordering::Relaxed);

        OperationLatencyStats {
            operation: self.operation,
            samples,
            avg_nanos: if samples > 0 { total / samples } else { 0 },
            min_nanos: if min == u64::MAX { 0 } else { min },
            max_nanos: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub add_order: OperationLatencyStats,
    pub cancel_order: OperationLatencyStats,
    pub modify_order: OperationLatencyStats,
    pub execute_trade: OperationLatencyStats,
}

#[derive(Debug, Clone)]
pub struct OperationLatencyStats {
    pub operation: &'static str,
    pub samples: u64,
    pub avg_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    /// Mean latency in microseconds, for log summaries.
    pub fn mean_micros(&self) -> f64 {
        Duration::from_nanos(self.avg_nanos).as_secs_f64() * 1e6
    }
}

/// Background metrics reporter
pub struct MetricsReporter {
    metrics: Arc<EngineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<EngineMetrics>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    pub async fn run(&self) {
        let mut interval = interval(self.interval);

        loop {
            interval.tick().await;

            let stats = self.metrics.latency_stats();
            info!(
                "Engine metrics - Orders: +{} -{} ~{} | Trades: {} | Feed: {} | Latency (us): add={:.2} cancel={:.2} modify={:.2} execute={:.2}",
                self.metrics.orders_added(),
                self.metrics.orders_cancelled(),
                self.metrics.orders_modified(),
                self.metrics.trades_executed(),
                self.metrics.feed_messages(),
                stats.add_order.mean_micros(),
                stats.cancel_order.mean_micros(),
                stats.modify_order.mean_micros(),
                stats.execute_trade.mean_micros()
            );
        }
    }
}
