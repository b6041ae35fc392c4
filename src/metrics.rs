use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

pub struct Metrics {
    registry: Registry,

    // Message metrics
    pub messages_total: IntCounter,
    pub messages_forwarded: IntCounter,
    pub messages_stopped: IntCounter,
    pub message_duration: Histogram,

    // Plugin metrics
    pub plugin_executions_total: IntCounterVec,
    pub plugin_errors_total: IntCounterVec,
    pub plugin_execution_duration: HistogramVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_total = IntCounter::new(
            "chat_relay_messages_total",
            "Total number of messages run through the plugin chain",
        )
        .expect("metric creation failed");
        let messages_forwarded = IntCounter::new(
            "chat_relay_messages_forwarded_total",
            "Messages that passed every plugin",
        )
        .expect("metric creation failed");
        let messages_stopped = IntCounter::new(
            "chat_relay_messages_stopped_total",
            "Messages a plugin vetoed",
        )
        .expect("metric creation failed");
        let message_duration = Histogram::with_opts(HistogramOpts::new(
            "chat_relay_message_duration_seconds",
            "Time spent running one message through the chain",
        ))
        .expect("metric creation failed");

        let plugin_executions_total = IntCounterVec::new(
            Opts::new(
                "chat_relay_plugin_executions_total",
                "Total number of plugin executions",
            ),
            &["plugin"],
        )
        .expect("metric creation failed");
        let plugin_errors_total = IntCounterVec::new(
            Opts::new("chat_relay_plugin_errors_total", "Total number of plugin errors"),
            &["plugin"],
        )
        .expect("metric creation failed");
        let plugin_execution_duration = HistogramVec::new(
            HistogramOpts::new(
                "chat_relay_plugin_duration_seconds",
                "Plugin execution duration in seconds",
            ),
            &["plugin"],
        )
        .expect("metric creation failed");

        // Register all metrics
        registry
            .register(Box::new(messages_total.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(messages_forwarded.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(messages_stopped.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(message_duration.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(plugin_executions_total.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(plugin_errors_total.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(plugin_execution_duration.clone()))
            .expect("metric registration failed");

        Self {
            registry,
            messages_total,
            messages_forwarded,
            messages_stopped,
            message_duration,
            plugin_executions_total,
            plugin_errors_total,
            plugin_execution_duration,
        }
    }

    pub fn record_message(&self) {
        self.messages_total.inc();
    }

    pub fn record_message_outcome(&self, forwarded: bool, duration: Duration) {
        if forwarded {
            self.messages_forwarded.inc();
        } else {
            self.messages_stopped.inc();
        }
        self.message_duration.observe(duration.as_secs_f64());
    }

    pub fn record_plugin_execution(&self, plugin: &str, duration: Duration, success: bool) {
        self.plugin_executions_total
            .with_label_values(&[plugin])
            .inc();
        self.plugin_execution_duration
            .with_label_values(&[plugin])
            .observe(duration.as_secs_f64());
        if !success {
            self.plugin_errors_total.with_label_values(&[plugin]).inc();
        }
    }

    pub fn gather_metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.gather_metrics(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
