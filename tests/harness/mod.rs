//! Shared fixtures for the bridge integration tests.
//!
//! Every test gets its own [`HeadlessHost`] and [`Bridge`]; nothing is global.

#![allow(dead_code)]

use std::sync::Arc;

use hostbind::prelude::*;
use hostbind::{HeadlessHost, IntegrityError, framework_class};

framework_class!(
    /// Native class that only the test host knows about.
    Bar: Node
);

/// Bridge over a fresh headless host, reporting integrity errors instead of
/// aborting.
pub fn bridge() -> (Arc<HeadlessHost>, Bridge) {
    bridge_with(BridgeConfig::default())
}

pub fn bridge_with(config: BridgeConfig) -> (Arc<HeadlessHost>, Bridge) {
    init_tracing();
    let host = Arc::new(HeadlessHost::new());
    host.add_native_class("Bar", Some("Node"));
    let bridge = Bridge::new(
        Arc::clone(&host) as Arc<dyn hostbind::HostInterface>,
        config.with_integrity_policy(IntegrityPolicy::Report),
    );
    (host, bridge)
}

/// Install a test subscriber once; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Drain the bridge's integrity journal.
pub fn integrity_errors(bridge: &Bridge) -> Vec<IntegrityError> {
    bridge.diagnostics().take()
}

// ============================================================================
// Test classes
// ============================================================================

/// Subclass of `Bar` overriding `_process` and `_describe`.
#[derive(Debug, Class)]
pub struct Foo {
    pub base: Base,
    #[hostbind(export)]
    pub ticks: i64,
    pub last_label: Option<String>,
    pub notifications: Vec<i32>,
}

impl Subclass for Foo {
    type Parent = Bar;

    fn init(base: Base) -> Self {
        Self {
            base,
            ticks: 0,
            last_label: None,
            notifications: Vec::new(),
        }
    }

    fn register(class: &mut ClassBuilder<Self>) {
        class
            .virtual_method("_process", |this: &mut Foo, delta: f64| {
                this.ticks += 1;
                delta * 2.0
            })
            .virtual_method("_describe", |this: &mut Foo, label: String, count: i64| -> String {
                this.last_label = Some(label.clone());
                format!("{label}x{count}")
            })
            .virtual_method("_fail", |_: &mut Foo| -> Result<i64, String> { Err("refused".into()) })
            .virtual_method("_explode", |_: &mut Foo| -> i64 { panic!("boom") })
            .method_with_defaults(
                "advance",
                vec![Variant::Int(1)],
                |this: &mut Foo, steps: i64| -> i64 {
                    this.ticks += steps;
                    this.ticks
                },
            )
            .method("shatter", |_: &mut Foo| -> i64 { panic!("shattered") })
            .method("reenter", |this: &mut Foo| -> Variant {
                let bridge = this.base.bridge().expect("bridge alive");
                bridge
                    .call_host_method(this.base.handle(), "advance", &[Variant::Int(5)])
                    .unwrap_or(Variant::String("busy".into()))
            })
            .signal(SignalInfo::new("ticked").with_argument(PropertyInfo::new("count", VariantType::Int)));
    }

    fn on_notification(&mut self, what: i32, _reversed: bool) {
        self.notifications.push(what);
    }
}

/// Subclass of `Bar` overriding nothing.
#[derive(Debug, Class)]
pub struct Plain {
    pub base: Base,
}

impl Subclass for Plain {
    type Parent = Bar;

    fn init(base: Base) -> Self {
        Self { base }
    }
}
