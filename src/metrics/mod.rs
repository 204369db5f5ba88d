use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Tracks:
// - Order placement outcomes and latency
// - Payment intent creation
// - Webhook deliveries by event type and outcome
//
// Gathered from the registry and exposed via GET /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_placed: IntCounter,
    pub orders_rejected: IntCounterVec,
    pub order_placement_duration: Histogram,

    pub payment_intents_created: IntCounter,
    pub webhook_events: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_placed = IntCounter::new(
            "orders_placed_total",
            "Orders successfully placed and committed",
        )?;
        registry.register(Box::new(orders_placed.clone()))?;

        let orders_rejected = IntCounterVec::new(
            Opts::new("orders_rejected_total", "Order placements rejected"),
            &["reason"],
        )?;
        registry.register(Box::new(orders_rejected.clone()))?;

        let order_placement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "order_placement_duration_seconds",
                "End-to-end order placement duration including retries",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(order_placement_duration.clone()))?;

        let payment_intents_created = IntCounter::new(
            "payment_intents_created_total",
            "Payment intents created and persisted",
        )?;
        registry.register(Box::new(payment_intents_created.clone()))?;

        let webhook_events = IntCounterVec::new(
            Opts::new("webhook_events_total", "Webhook deliveries processed"),
            &["event_type", "outcome"],
        )?;
        registry.register(Box::new(webhook_events.clone()))?;

        Ok(Self {
            registry,
            orders_placed,
            orders_rejected,
            order_placement_duration,
            payment_intents_created,
            webhook_events,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_placement(&self, duration_secs: f64, outcome: Result<(), &str>) {
        match outcome {
            Ok(()) => self.orders_placed.inc(),
            Err(reason) => self.orders_rejected.with_label_values(&[reason]).inc(),
        }
        self.order_placement_duration.observe(duration_secs);
    }

    pub fn record_webhook(&self, event_type: &str, outcome: &str) {
        self.webhook_events
            .with_label_values(&[event_type, outcome])
            .inc();
    }
}
