use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;


lazy_static! {
    pub static ref DATA_REFRESHES: IntCounterVec = IntCounterVec::new(
        Opts::new("data_refreshes", "Committed node data refreshes"),
        &["path"]
    )
    .expect("metric can not be created");

    pub static ref CHILD_REFRESHES: IntCounterVec = IntCounterVec::new(
        Opts::new("child_refreshes", "Committed child mapping refreshes"),
        &["path"]
    )
    .expect("metric can not be created");

    pub static ref FETCH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("fetch_failures", "Refreshes abandoned because get-data kept failing"),
        &["path"]
    )
    .expect("metric can not be created");

    pub static ref CALLBACK_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("callback_failures", "Callbacks that panicked during dispatch"),
        &["path"]
    )
    .expect("metric can not be created");

    pub static ref CALLBACK_DISPATCHES: IntCounter =
        IntCounter::new("callback_dispatches", "Callback invocations across all watchers")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("nodewatch".to_string()), None)
            .expect("registry can be created");
        register_custom_metrics(&registry);
        registry
    };
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(DATA_REFRESHES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CHILD_REFRESHES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(FETCH_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CALLBACK_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CALLBACK_DISPATCHES.clone()))
        .expect("collector can be registered");
}

/// Renders every watcher metric in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode prometheus metrics: {:?}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
