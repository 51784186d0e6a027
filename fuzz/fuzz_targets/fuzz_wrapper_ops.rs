#![no_main]

use arbitrary::Arbitrary;
use ftui_reactive::{ObjectKind, PropertyKey, RawObject, ReactiveConfig, Reactivity, Value};
use libfuzzer_sys::fuzz_target;

const POOL: usize = 4;

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Set { obj: u8, key: u8, value: i16, readonly: bool, privileged: bool },
    Link { obj: u8, key: u8, child: u8 },
    Delete { obj: u8, key: u8, readonly: bool, privileged: bool },
    Get { obj: u8, key: u8, readonly: bool },
    Keys { obj: u8 },
    StoreRef { obj: u8, key: u8, value: i16 },
    Prototype { obj: u8, proto: u8 },
    Freeze { obj: u8 },
}

fn key(k: u8) -> PropertyKey {
    match k % 5 {
        0..=2 => PropertyKey::from(format!("k{}", k % 3)),
        3 => PropertyKey::from(u32::from(k % 4)),
        _ => PropertyKey::length_key(),
    }
}

fn pick(raws: &[RawObject], i: u8) -> &RawObject {
    &raws[usize::from(i) % POOL]
}

fuzz_target!(|input: (bool, Vec<FuzzOp>)| {
    let (array_first, ops) = input;
    let rx = Reactivity::builder()
        .config(ReactiveConfig::production())
        .build();
    let raws: Vec<RawObject> = (0..POOL)
        .map(|i| {
            if i == 0 && array_first {
                RawObject::new(ObjectKind::Array)
            } else {
                RawObject::record()
            }
        })
        .collect();
    let run = |privileged: bool, f: &dyn Fn()| {
        if privileged {
            rx.with_unlocked(f);
        } else {
            f();
        }
    };

    for op in ops.into_iter().take(256) {
        match op {
            FuzzOp::Set { obj, key: k, value, readonly, privileged } => {
                let raw = Value::from(pick(&raws, obj).clone());
                let view = if readonly { rx.readonly(&raw) } else { rx.reactive(&raw) };
                run(privileged, &|| {
                    let written = view.set(key(k), f64::from(value));
                    if let Ok(true) = written
                        && (!readonly || privileged)
                        && pick(&raws, obj).prototype().is_none()
                        && !matches!(pick(&raws, obj).get_own(&key(k)), Some(Value::Ref(_)))
                    {
                        assert_eq!(pick(&raws, obj).get_own(&key(k)), Some(Value::from(f64::from(value))));
                    }
                });
            }
            FuzzOp::Link { obj, key: k, child } => {
                let view = rx.reactive(&Value::from(pick(&raws, obj).clone()));
                let _ = view.set(key(k), pick(&raws, child).clone());
            }
            FuzzOp::Delete { obj, key: k, readonly, privileged } => {
                let raw = Value::from(pick(&raws, obj).clone());
                let view = if readonly { rx.readonly(&raw) } else { rx.reactive(&raw) };
                run(privileged, &|| {
                    let _ = view.delete(key(k));
                });
            }
            FuzzOp::Get { obj, key: k, readonly } => {
                let raw = Value::from(pick(&raws, obj).clone());
                let view = if readonly { rx.readonly(&raw) } else { rx.reactive(&raw) };
                // Composites come back wrapped unless they cannot be observed.
                if let Value::Object(child) = view.get(key(k)) {
                    assert!(child.is_frozen() || pick(&raws, obj).is_frozen());
                }
            }
            FuzzOp::Keys { obj } => {
                let view = rx.reactive(&Value::from(pick(&raws, obj).clone()));
                let _ = view.own_keys();
            }
            FuzzOp::StoreRef { obj, key: k, value } => {
                let r = rx.ref_value(f64::from(value));
                let _ = pick(&raws, obj).insert(key(k), r);
            }
            FuzzOp::Prototype { obj, proto } => {
                let view = rx.reactive(&Value::from(pick(&raws, proto).clone()));
                let _ = pick(&raws, obj).set_prototype(Some(view));
            }
            FuzzOp::Freeze { obj } => pick(&raws, obj).freeze(),
        }

        // Identity laws hold after every step.
        let x = Value::from(raws[1].clone());
        let w = rx.reactive(&x);
        assert_eq!(rx.readonly(&w), rx.readonly(&x));
        assert_eq!(rx.to_raw(&w), x);
    }

    for raw in &raws {
        raw.clear();
        let _ = raw.set_prototype(None);
    }
});
