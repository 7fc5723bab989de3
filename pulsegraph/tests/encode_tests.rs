use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pulsegraph::model::{RecordArena, RecordId, Value};
use pulsegraph::pulse::Pulse;
use pulsegraph::transform::{Encode, Encoder, EncoderSet, Params, TickContext, Transform};

fn alloc(arena: &mut RecordArena) -> RecordId {
    arena.insert(HashMap::new(), 1)
}

/// Encoder writing a constant field, reporting whether the stored value
/// actually changed, and counting invocations.
fn setter(field: &str, value: Value, counter: Arc<AtomicUsize>) -> Encoder {
    let field = field.to_string();
    Encoder::new(vec![field.clone()], move |record, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        record.set(&field, value.clone())
    })
}

/// Encoder writing nothing, returning a fixed result.
fn fixed(output: &[&str], result: bool, counter: Arc<AtomicUsize>) -> Encoder {
    let output = output.iter().map(|s| s.to_string()).collect();
    Encoder::new(output, move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        result
    })
}

fn run(encode: &mut Encode, params: &Params, pulse: &Pulse, arena: &mut RecordArena) -> Pulse {
    let mut ctx = TickContext {
        arena,
        clock: pulse.clock(),
    };
    encode.run(params, pulse, &mut ctx).expect("encode failed")
}

#[test]
fn test_added_records_run_enter_then_update() {
    let mut arena = RecordArena::new();
    let r1 = alloc(&mut arena);

    let enter_calls = Arc::new(AtomicUsize::new(0));
    let update_calls = Arc::new(AtomicUsize::new(0));
    let encoders = EncoderSet::builder()
        .enter(setter("x", Value::from(0i64), Arc::clone(&enter_calls)))
        .update(setter("y", Value::from(1i64), Arc::clone(&update_calls)))
        .build();
    let mut encode = Encode::new(encoders);

    let mut pulse = Pulse::new(1);
    pulse.push_add(r1);
    let out = run(&mut encode, &Params::new(), &pulse, &mut arena);

    assert_eq!(out.added(), &[r1]);
    assert!(out.is_modified("x"));
    assert!(out.is_modified("y"));
    assert_eq!(enter_calls.load(Ordering::SeqCst), 1);
    assert_eq!(update_calls.load(Ordering::SeqCst), 1);

    let record = arena.get(r1).unwrap();
    assert_eq!(record.get("x"), Some(&Value::from(0i64)));
    assert_eq!(record.get("y"), Some(&Value::from(1i64)));
}

#[test]
fn test_removed_records_flow_through_without_exit() {
    let mut arena = RecordArena::new();
    let r2 = alloc(&mut arena);

    let mut encode = Encode::new(EncoderSet::builder().build());

    let mut pulse = Pulse::new(1);
    pulse.push_rem(r2);
    let out = run(&mut encode, &Params::new(), &pulse, &mut arena);

    assert_eq!(out.removed(), &[r2]);
    assert!(out.modified_fields().is_empty());
}

#[test]
fn test_exit_runs_for_removed_records() {
    let mut arena = RecordArena::new();
    let r = alloc(&mut arena);

    let exit_calls = Arc::new(AtomicUsize::new(0));
    let encoders = EncoderSet::builder()
        .exit(setter("opacity", Value::from(0i64), Arc::clone(&exit_calls)))
        .build();
    let mut encode = Encode::new(encoders);

    let mut pulse = Pulse::new(1);
    pulse.push_rem(r);
    let out = run(&mut encode, &Params::new(), &pulse, &mut arena);

    assert_eq!(out.removed(), &[r]);
    assert!(out.is_modified("opacity"));
    assert_eq!(exit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(arena.get(r).unwrap().get("opacity"), Some(&Value::from(0i64)));
}

#[test]
fn test_unchanged_update_collects_nothing() {
    let mut arena = RecordArena::new();
    let r3 = alloc(&mut arena);

    let update_calls = Arc::new(AtomicUsize::new(0));
    let encoders = EncoderSet::builder()
        .update(fixed(&["y"], false, Arc::clone(&update_calls)))
        .build();
    let mut encode = Encode::new(encoders);

    let mut pulse = Pulse::new(1);
    pulse.push_mod(r3);
    let out = run(&mut encode, &Params::new(), &pulse, &mut arena);

    assert!(out.modified().is_empty());
    assert!(!out.is_modified("y"));
    assert_eq!(update_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reenter_collects_records_modified_by_enter() {
    let mut arena = RecordArena::new();
    let r4 = alloc(&mut arena);

    let enter_calls = Arc::new(AtomicUsize::new(0));
    let update_calls = Arc::new(AtomicUsize::new(0));
    let encoders = EncoderSet::builder()
        .enter(fixed(&["x"], true, Arc::clone(&enter_calls)))
        .update(fixed(&["y"], false, Arc::clone(&update_calls)))
        .build();
    let mut encode = Encode::new(encoders);

    let mut pulse = Pulse::new(1);
    pulse.push_mod(r4);
    pulse.set_encode(Some("enter".to_string()));
    let out = run(&mut encode, &Params::new(), &pulse, &mut arena);

    // enter reported a change, so the record is collected even though
    // the active set did not.
    assert_eq!(out.modified(), &[r4]);
    assert!(out.is_modified("x"));
    assert_eq!(enter_calls.load(Ordering::SeqCst), 1);
    assert_eq!(update_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_pulse_produces_empty_output_twice() {
    let mut arena = RecordArena::new();

    let encoders = EncoderSet::builder()
        .update(fixed(&["y"], true, Arc::new(AtomicUsize::new(0))))
        .enter(fixed(&["x"], true, Arc::new(AtomicUsize::new(0))))
        .build();
    let mut encode = Encode::new(encoders);

    for _ in 0..2 {
        let pulse = Pulse::new(1);
        let out = run(&mut encode, &Params::new(), &pulse, &mut arena);
        assert!(out.added().is_empty());
        assert!(out.removed().is_empty());
        assert!(out.modified().is_empty());
        assert!(out.modified_fields().is_empty());
        assert!(!out.propagates());
    }
}

#[test]
fn test_entering_records_also_run_a_distinct_named_set() {
    let mut arena = RecordArena::new();
    let r = alloc(&mut arena);

    let enter_calls = Arc::new(AtomicUsize::new(0));
    let update_calls = Arc::new(AtomicUsize::new(0));
    let hover_calls = Arc::new(AtomicUsize::new(0));
    let encoders = EncoderSet::builder()
        .enter(setter("x", Value::from(0i64), Arc::clone(&enter_calls)))
        .update(setter("y", Value::from(1i64), Arc::clone(&update_calls)))
        .named(
            "hover",
            setter("stroke", Value::from("red"), Arc::clone(&hover_calls)),
        )
        .build();
    let mut encode = Encode::new(encoders);

    let mut pulse = Pulse::new(1);
    pulse.push_add(r);
    pulse.set_encode(Some("hover".to_string()));
    let out = run(&mut encode, &Params::new(), &pulse, &mut arena);

    // enter and update always run for entering records; the named set
    // is layered on afterwards.
    assert_eq!(enter_calls.load(Ordering::SeqCst), 1);
    assert_eq!(update_calls.load(Ordering::SeqCst), 1);
    assert_eq!(hover_calls.load(Ordering::SeqCst), 1);
    assert!(out.is_modified("x"));
    assert!(out.is_modified("y"));
    assert!(out.is_modified("stroke"));
}

#[test]
fn test_unconfigured_named_set_is_a_noop() {
    let mut arena = RecordArena::new();
    let r = alloc(&mut arena);

    let update_calls = Arc::new(AtomicUsize::new(0));
    let encoders = EncoderSet::builder()
        .update(fixed(&["y"], true, Arc::clone(&update_calls)))
        .build();
    let mut encode = Encode::new(encoders);

    let mut pulse = Pulse::new(1);
    pulse.push_mod(r);
    pulse.set_encode(Some("hover".to_string()));
    let out = run(&mut encode, &Params::new(), &pulse, &mut arena);

    // The unknown set resolves to the no-op, not to update.
    assert!(out.modified().is_empty());
    assert_eq!(update_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_reflow_visits_every_source_record() {
    let mut arena = RecordArena::new();
    let records: Vec<RecordId> = (0..3).map(|_| alloc(&mut arena)).collect();

    let update_calls = Arc::new(AtomicUsize::new(0));
    let encoders = EncoderSet::builder()
        .update(fixed(&["y"], true, Arc::clone(&update_calls)))
        .build();
    let mut encode = Encode::new(encoders);

    let mut params = Params::new();
    params.set("fill", Value::from("blue"));
    assert!(params.modified());

    // No per-record changes; only the parameter changed.
    let mut pulse = Pulse::new(2);
    pulse.set_source(records.clone());
    let out = run(&mut encode, &params, &pulse, &mut arena);

    assert_eq!(update_calls.load(Ordering::SeqCst), 3);
    assert_eq!(out.modified(), records.as_slice());
    assert!(out.is_modified("y"));
}

#[test]
fn test_no_reflow_without_parameter_changes() {
    let mut arena = RecordArena::new();
    let records: Vec<RecordId> = (0..3).map(|_| alloc(&mut arena)).collect();

    let update_calls = Arc::new(AtomicUsize::new(0));
    let encoders = EncoderSet::builder()
        .update(fixed(&["y"], true, Arc::clone(&update_calls)))
        .build();
    let mut encode = Encode::new(encoders);

    let mut pulse = Pulse::new(2);
    pulse.set_source(records);
    let out = run(&mut encode, &Params::new(), &pulse, &mut arena);

    assert_eq!(update_calls.load(Ordering::SeqCst), 0);
    assert!(!out.propagates());
}
