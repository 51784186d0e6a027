#![forbid(unsafe_code)]

//! Development diagnostics are emitted as `tracing` warnings, and only when
//! enabled.

use std::sync::{Arc, Mutex};

use ftui_reactive::{RawObject, ReactiveConfig, Reactivity, Value};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Debug, Default, Clone)]
struct Captured {
    level: Option<tracing::Level>,
    message: String,
    key: Option<String>,
}

struct WarnCapture {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S: Subscriber> Layer<S> for WarnCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Fields(Captured);
        impl Visit for Fields {
            fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
                match field.name() {
                    "message" => self.0.message = format!("{value:?}"),
                    "key" => self.0.key = Some(format!("{value:?}")),
                    _ => {}
                }
            }
        }
        if *event.metadata().level() != tracing::Level::WARN {
            return;
        }
        let mut fields = Fields(Captured {
            level: Some(*event.metadata().level()),
            ..Captured::default()
        });
        event.record(&mut fields);
        self.events.lock().expect("capture lock").push(fields.0);
    }
}

fn capture(f: impl FnOnce()) -> Vec<Captured> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WarnCapture {
        events: Arc::clone(&events),
    });
    tracing::subscriber::with_default(subscriber, f);
    let out = events.lock().expect("capture lock").clone();
    out
}

fn dev() -> Reactivity {
    Reactivity::builder()
        .config(ReactiveConfig::development())
        .build()
}

#[test]
fn rejected_readonly_write_names_key() {
    let rx = dev();
    let r = rx.readonly(&Value::from(RawObject::from_entries([("a", 1)])));
    let warnings = capture(|| {
        assert_eq!(r.set("a", 2), Ok(false));
        assert_eq!(r.delete("a"), Ok(false));
    });
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.key.as_deref() == Some("a")));
    assert!(warnings[0].message.contains("set operation"));
    assert!(warnings[1].message.contains("delete operation"));
    assert!(warnings.iter().all(|w| w.level == Some(tracing::Level::WARN)));
}

#[test]
fn wrapping_a_primitive_warns() {
    let rx = dev();
    let warnings = capture(|| {
        rx.reactive(&Value::from(1));
        rx.readonly(&Value::from("s"));
    });
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].message.contains("cannot be made reactive"));
    assert!(warnings[1].message.contains("cannot be made readonly"));
}

#[test]
fn refs_pass_through_silently() {
    let rx = dev();
    let r = Value::from(rx.ref_value(1));
    let warnings = capture(|| {
        rx.reactive(&r);
    });
    assert!(warnings.is_empty());
}

#[test]
fn to_refs_on_plain_object_warns_and_proceeds() {
    let rx = dev();
    let raw = Value::from(RawObject::from_entries([("a", 1)]));
    let mut refs = Vec::new();
    let warnings = capture(|| refs = rx.to_refs(&raw));
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("to_refs()"));
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].1.get(), Value::from(1));
}

#[test]
fn to_refs_on_readonly_views_is_silent() {
    let rx = dev();
    let raw = Value::from(RawObject::from_entries([("a", 1)]));
    let ro = rx.readonly(&raw);
    let props = rx.readonly_props(&raw);
    let warnings = capture(|| {
        assert_eq!(rx.to_refs(&ro).len(), 1);
        assert_eq!(rx.to_refs(&props).len(), 1);
    });
    assert!(warnings.is_empty());
}

#[test]
fn production_config_is_silent() {
    let rx = Reactivity::builder()
        .config(ReactiveConfig::production())
        .build();
    let r = rx.readonly(&Value::from(RawObject::record()));
    let warnings = capture(|| {
        let _ = r.set("a", 1);
        rx.reactive(&Value::Null);
        rx.to_refs(&Value::from(RawObject::record()));
    });
    assert!(warnings.is_empty());
}
