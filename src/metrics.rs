//! Render statistics for the churn dashboard.

use crate::dashboard::ViewMode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for dashboard requests
pub struct DashboardMetrics {
    /// Total successful renders
    pub renders: AtomicU64,
    /// Total confirmed what-if predictions
    pub predictions: AtomicU64,
    /// Renders by view mode
    renders_by_mode: RwLock<HashMap<ViewMode, u64>>,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<&'static str, u64>>,
    /// Render times (in microseconds)
    render_times: RwLock<Vec<u64>>,
    /// What-if churn probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Time spent computing explanations, once per artifact set
    explanation_time: RwLock<Option<Duration>>,
    start_time: Instant,
}

impl DashboardMetrics {
    pub fn new() -> Self {
        Self {
            renders: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            renders_by_mode: RwLock::new(HashMap::new()),
            failures_by_kind: RwLock::new(HashMap::new()),
            render_times: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            explanation_time: RwLock::new(None),
            start_time: Instant::now(),
        }
    }

    /// Record a successful render
    pub fn record_render(&self, mode: ViewMode, render_time: Duration) {
        self.renders.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_mode) = self.renders_by_mode.write() {
            *by_mode.entry(mode).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.render_times.write() {
            times.push(render_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record a confirmed what-if prediction
    pub fn record_prediction(&self, probability: f64) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        let bucket = (probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed render pass
    pub fn record_failure(&self, kind: &'static str) {
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn record_explanation_time(&self, elapsed: Duration) {
        if let Ok(mut slot) = self.explanation_time.write() {
            *slot = Some(elapsed);
        }
    }

    /// Get render time statistics
    pub fn get_render_stats(&self) -> RenderStats {
        let Ok(times) = self.render_times.read() else {
            return RenderStats::default();
        };
        if times.is_empty() {
            return RenderStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        RenderStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    pub fn get_renders_by_mode(&self) -> HashMap<ViewMode, u64> {
        self.renders_by_mode
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_failures_by_kind(&self) -> HashMap<&'static str, u64> {
        self.failures_by_kind
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    pub fn get_explanation_time(&self) -> Option<Duration> {
        self.explanation_time.read().ok().and_then(|t| *t)
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let renders = self.renders.load(Ordering::Relaxed);
        let predictions = self.predictions.load(Ordering::Relaxed);
        let stats = self.get_render_stats();
        let by_mode = self.get_renders_by_mode();
        let failures = self.get_failures_by_kind();
        let dist = self.get_probability_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             CHURN DASHBOARD - METRICS SUMMARY                ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Renders: {:>8}  │  Predictions: {:>8}  │  Uptime: {:>6}s ║",
            renders,
            predictions,
            self.start_time.elapsed().as_secs()
        );
        info!(
            "║ Render Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            stats.mean_us, stats.p50_us, stats.p95_us, stats.p99_us
        );
        if let Some(elapsed) = self.get_explanation_time() {
            info!("║ Explanation computation: {:>8} ms                         ║", elapsed.as_millis());
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        for mode in ViewMode::ALL {
            info!(
                "║   {:<20}: {:>8}                                ║",
                mode.slug(),
                by_mode.get(&mode).copied().unwrap_or(0)
            );
        }
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by kind:                                            ║");
            for (kind, count) in &failures {
                info!("║   {:<20}: {:>8}                                ║", kind, count);
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ What-if Churn Probability Distribution:                      ║");
        let total: u64 = dist.iter().sum();
        for (i, &count) in dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for DashboardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Render time statistics
#[derive(Debug, Default)]
pub struct RenderStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
