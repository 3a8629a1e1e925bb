//! Name-based foreign calls through the host entry points

mod common;

use common::*;
use common::assert_eq;
use paribridge_runtime::{Bridge, CallError, ForeignError, ForeignErrorKind, RuntimeError, Value};
use rstest::rstest;

#[rstest]
fn test_multiply_through_call2(mut bridge: Bridge) {
    let a = bridge.call("int_to_handle", &[int(12)]).unwrap();
    let b = bridge.call("int_to_handle", &[int(34)]).unwrap();
    let product = bridge.call("call2", &[text("gmul"), a, b]).unwrap();
    assert_eq!(bridge.call("handle_data", &[product]).unwrap(), int(408));
}

#[rstest]
fn test_unknown_foreign_function(mut bridge: Bridge) {
    let used = bridge.stats().unwrap().used;
    let err = bridge
        .call("call0", &[text("definitely_not_a_symbol")])
        .unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Call(CallError::FunctionNotFound {
            name: "definitely_not_a_symbol".to_string()
        })
    );
    assert_eq!(bridge.stats().unwrap().used, used);
}

#[rstest]
#[case(1)]
#[case(3)]
fn test_bound_function_rejects_wrong_count(mut bridge: Bridge, #[case] given: usize) {
    let gadd = bridge.call("bind", &[text("gadd"), int(2)]).unwrap();
    let one = bridge.call("int_to_handle", &[int(1)]).unwrap();
    let mut args = vec![gadd];
    args.extend(std::iter::repeat(one).take(given));

    let err = bridge.call("invoke", &args).unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(
        err,
        RuntimeError::Call(CallError::ArityMismatch {
            name: "gadd".to_string(),
            expected: 2,
            got: given,
        })
    );
}

#[rstest]
fn test_every_arity(mut bridge: Bridge) {
    let h: Vec<Value> = (1..=5)
        .map(|n| bridge.call("int_to_handle", &[int(n)]).unwrap())
        .collect();
    let data = |bridge: &mut Bridge, result: Value| bridge.call("handle_data", &[result]).unwrap();

    let zero = bridge.call("call0", &[text("gen_0")]).unwrap();
    assert_eq!(data(&mut bridge, zero), int(0));

    let neg = bridge.call("call1", &[text("gneg"), h[0].clone()]).unwrap();
    assert_eq!(data(&mut bridge, neg), int(-1));

    let product = bridge
        .call("call2", &[text("gmul"), h[1].clone(), h[2].clone()])
        .unwrap();
    assert_eq!(data(&mut bridge, product), int(6));

    let mut args = vec![text("mkvec3")];
    args.extend(h[..3].iter().cloned());
    let v3 = bridge.call("call3", &args).unwrap();
    assert_eq!(data(&mut bridge, v3), ints(&[1, 2, 3]));

    let mut args = vec![text("mkvec4")];
    args.extend(h[..4].iter().cloned());
    let v4 = bridge.call("call4", &args).unwrap();
    assert_eq!(data(&mut bridge, v4), ints(&[1, 2, 3, 4]));

    let mut args = vec![text("mkvec5")];
    args.extend(h.iter().cloned());
    let v5 = bridge.call("call5", &args).unwrap();
    assert_eq!(data(&mut bridge, v5), ints(&[1, 2, 3, 4, 5]));
}

#[rstest]
fn test_export_called_with_wrong_arity(mut bridge: Bridge) {
    let a = bridge.call("int_to_handle", &[int(1)]).unwrap();
    let err = bridge.call("call1", &[text("gmul"), a]).unwrap_err();
    assert!(err.is_contract_violation());
}

#[rstest]
fn test_division_by_zero_is_recoverable(mut bridge: Bridge) {
    let one = bridge.call("int_to_handle", &[int(1)]).unwrap();
    let zero = bridge.call("int_to_handle", &[int(0)]).unwrap();
    let used = bridge.stats().unwrap().used;

    let err = bridge
        .call("call2", &[text("gdiv"), one.clone(), zero])
        .unwrap_err();
    assert!(err.is_foreign());
    assert!(matches!(
        err,
        RuntimeError::Foreign(ForeignError {
            kind: ForeignErrorKind::Inverse,
            ..
        })
    ));
    assert_eq!(bridge.stats().unwrap().used, used);

    // the bridge keeps working afterwards
    let two = bridge.call("call2", &[text("gadd"), one.clone(), one]).unwrap();
    assert_eq!(bridge.call("handle_data", &[two]).unwrap(), int(2));
}

#[rstest]
fn test_non_handle_argument(mut bridge: Bridge) {
    let err = bridge.call("call1", &[text("gneg"), int(5)]).unwrap_err();
    assert!(matches!(err, RuntimeError::NotAHandle { .. }));
}

#[rstest]
fn test_wrong_entry_point_argument_count(mut bridge: Bridge) {
    let err = bridge.call("multiply", &[int(1)]).unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(err.to_string(), "multiply expects 2 arguments, got 1");
}
