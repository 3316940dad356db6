use serde_json::json;

use super::FunctionRegistry;
use crate::error::EngineError;
use crate::pipe::Val;

fn v(value: serde_json::Value) -> Val {
    Val::Defined(value)
}

fn call(registry: &FunctionRegistry, name: &str, args: Vec<Val>) -> Val {
    registry.invoke(name, &args).unwrap()
}

#[test]
fn string_functions() {
    let reg = FunctionRegistry::with_builtins();

    assert_eq!(
        call(&reg, "string.concat", vec![v(json!("hello")), v(json!(" world"))]),
        v(json!("hello world"))
    );
    assert_eq!(
        call(&reg, "string.split", vec![v(json!("John Doe")), v(json!(" "))]),
        v(json!(["John", "Doe"]))
    );
    assert_eq!(
        call(&reg, "string.char_at", vec![v(json!("John")), v(json!(0))]),
        v(json!("J"))
    );
    assert_eq!(
        call(&reg, "string.slice", vec![v(json!("workflow")), v(json!(-4))]),
        v(json!("flow"))
    );
    assert_eq!(
        call(&reg, "string.pad_start", vec![v(json!("7")), v(json!(3)), v(json!("0"))]),
        v(json!("007"))
    );
}

#[test]
fn array_functions() {
    let reg = FunctionRegistry::with_builtins();

    assert_eq!(
        call(&reg, "array.get", vec![v(json!(["a", "b", "c"])), v(json!(1))]),
        v(json!("b"))
    );
    assert_eq!(
        call(&reg, "array.get", vec![v(json!(["a", "b"])), v(json!(-1))]),
        v(json!("b"))
    );
    assert_eq!(
        reg.invoke("array.get", &[v(json!(["a"])), v(json!(5))]).unwrap(),
        Val::Undefined
    );
    assert_eq!(
        call(&reg, "array.join", vec![v(json!(["a", "b"])), v(json!("-"))]),
        v(json!("a-b"))
    );
    assert_eq!(
        call(&reg, "array.index_of", vec![v(json!([1, 2, 3])), v(json!(2))]),
        v(json!(1))
    );
}

#[test]
fn conditional_functions() {
    let reg = FunctionRegistry::with_builtins();

    assert_eq!(
        call(&reg, "conditional.equality", vec![v(json!("hello")), v(json!("hello"))]),
        v(json!(true))
    );
    assert_eq!(
        call(&reg, "conditional.equality", vec![Val::Undefined, v(json!(null))]),
        v(json!(true))
    );
    assert_eq!(
        call(&reg, "conditional.strict_equality", vec![Val::Undefined, v(json!(null))]),
        v(json!(false))
    );
    assert_eq!(
        call(
            &reg,
            "conditional.ternary",
            vec![v(json!(false)), v(json!("yes")), v(json!("no"))]
        ),
        v(json!("no"))
    );
    assert_eq!(
        call(
            &reg,
            "conditional.nullish",
            vec![Val::Undefined, v(json!(null)), v(json!("fallback"))]
        ),
        v(json!("fallback"))
    );
}

#[test]
fn math_and_number_functions() {
    let reg = FunctionRegistry::with_builtins();

    assert_eq!(
        call(&reg, "math.add", vec![v(json!(1)), v(json!(2)), v(json!(3))]),
        v(json!(6.0))
    );
    assert_eq!(
        call(&reg, "number.gte", vec![v(json!(2)), v(json!(2))]),
        v(json!(true))
    );
    assert_eq!(
        call(&reg, "number.to_fixed", vec![v(json!(3.14159)), v(json!(2))]),
        v(json!("3.14"))
    );
    assert!(matches!(
        reg.invoke("math.divide", &[v(json!(1)), v(json!(0))]),
        Err(EngineError::InvalidPipeExpression { .. })
    ));
}

#[test]
fn bitwise_functions() {
    let reg = FunctionRegistry::with_builtins();

    assert_eq!(
        call(&reg, "bitwise.and", vec![v(json!(6)), v(json!(3))]),
        v(json!(2))
    );
    assert_eq!(
        call(&reg, "bitwise.lshift", vec![v(json!(1)), v(json!(4))]),
        v(json!(16))
    );
}

#[test]
fn json_round_trip_via_catalog() {
    let reg = FunctionRegistry::with_builtins();

    let s = call(&reg, "json.stringify", vec![v(json!({"a": 1}))]);
    assert_eq!(s, v(json!("{\"a\":1}")));
    assert_eq!(
        call(&reg, "json.parse", vec![s]),
        v(json!({"a": 1}))
    );
}

#[test]
fn arity_is_enforced() {
    let reg = FunctionRegistry::with_builtins();

    let err = reg.invoke("string.split", &[v(json!("a b"))]).unwrap_err();
    match err {
        EngineError::ArityMismatch {
            function, actual, ..
        } => {
            assert_eq!(function, "string.split");
            assert_eq!(actual, 1);
        }
        other => panic!("expected ArityMismatch, got {:?}", other),
    }
}

#[test]
fn unknown_function_is_invalid_pipe() {
    let reg = FunctionRegistry::with_builtins();
    assert!(matches!(
        reg.invoke("string.nope", &[]),
        Err(EngineError::InvalidPipeExpression { .. })
    ));
}

#[test]
fn custom_functions_can_be_registered() {
    let mut reg = FunctionRegistry::with_builtins();
    reg.register("custom.shout", 1, Some(1), |args| {
        let s = args[0]
            .as_json()
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Ok(Val::Defined(json!(format!("{}!", s.to_uppercase()))))
    });

    assert_eq!(
        call(&reg, "custom.shout", vec![v(json!("hey"))]),
        v(json!("HEY!"))
    );
}
