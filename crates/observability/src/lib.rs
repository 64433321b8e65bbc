use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    chat_requests_total: AtomicU64,
    fallback_intent_total: AtomicU64,
    limit_blocks_total: AtomicU64,
    charts_generated_total: AtomicU64,
    charts_rendered_total: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub chat_requests_total: u64,
    pub fallback_intent_total: u64,
    pub limit_blocks_total: u64,
    pub charts_generated_total: u64,
    pub charts_rendered_total: u64,
    pub avg_chat_latency_micros: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_chat_request(&self) {
        self.chat_requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("lyra_chat_requests_total").increment(1);
    }

    pub fn inc_fallback_intent(&self) {
        self.fallback_intent_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("lyra_fallback_intent_total").increment(1);
    }

    pub fn inc_limit_block(&self) {
        self.limit_blocks_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("lyra_limit_blocks_total").increment(1);
    }

    pub fn inc_chart_generated(&self) {
        self.charts_generated_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("lyra_charts_generated_total").increment(1);
    }

    pub fn inc_chart_rendered(&self) {
        self.charts_rendered_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("lyra_charts_rendered_total").increment(1);
    }

    pub fn observe_chat_latency(&self, duration: Duration) {
        self.total_latency_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let chats = self.chat_requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            chat_requests_total: chats,
            fallback_intent_total: self.fallback_intent_total.load(Ordering::Relaxed),
            limit_blocks_total: self.limit_blocks_total.load(Ordering::Relaxed),
            charts_generated_total: self.charts_generated_total.load(Ordering::Relaxed),
            charts_rendered_total: self.charts_rendered_total.load(Ordering::Relaxed),
            avg_chat_latency_micros: if chats == 0 {
                0.0
            } else {
                latency as f64 / chats as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,lyra_api=info,lyra_agents=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
