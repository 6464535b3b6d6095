//! Constructor / call argument handling.
//!
//! Arguments arrive as JSON values (from plan files or callers) and are
//! coerced against the ABI parameter types with `DynSolType::coerce_str`.

use alloy::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy::json_abi::Param;
use serde_json::Value;

use crate::error::{DeployError, Result};

/// Turns a raw argument value into an ordered argument list.
///
/// Arrays are taken as-is, `null` means no arguments and scalars become a
/// one-element list. A single plain object is ambiguous (it may be one struct
/// argument or a mistake), so it is wrapped only when `wrap_object` is set.
pub fn normalize_args(value: Value, wrap_object: bool) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Object(map) if wrap_object => Ok(vec![Value::Object(map)]),
        Value::Object(_) => Err(DeployError::invalid_args(
            "a single object argument must be wrapped in a list or `wrap_object_args` enabled",
        )),
        scalar => Ok(vec![scalar]),
    }
}

/// Coerces `args` to the types of `params`, in order.
pub fn coerce_args(params: &[Param], args: &[Value]) -> Result<Vec<DynSolValue>> {
    if params.len() != args.len() {
        return Err(DeployError::invalid_args(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty: DynSolType = param.resolve().map_err(|e| {
                DeployError::invalid_args(format!("unsupported type {}: {e}", param.ty))
            })?;
            to_sol_value(&ty, arg).map_err(|reason| {
                DeployError::invalid_args(format!(
                    "cannot coerce {} to {} for `{}`: {reason}",
                    sol_literal(arg),
                    param.ty,
                    param.name
                ))
            })
        })
        .collect()
}

/// Walks a JSON value alongside its ABI type. JSON arrays fill arrays and
/// tuples element by element, objects fill tuples in field order, and every
/// leaf (or a whole value given as one string) goes through `coerce_str`.
fn to_sol_value(ty: &DynSolType, value: &Value) -> std::result::Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| to_sol_value(inner, item))
            .collect::<std::result::Result<_, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(format!("expected {len} elements, got {}", items.len()));
            }
            items
                .iter()
                .map(|item| to_sol_value(inner, item))
                .collect::<std::result::Result<_, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => tuple(types, items.iter()),
        (DynSolType::Tuple(types), Value::Object(fields)) => tuple(types, fields.values()),
        _ => ty
            .coerce_str(&sol_literal(value))
            .map_err(|e| e.to_string()),
    }
}

fn tuple<'v>(
    types: &[DynSolType],
    items: impl ExactSizeIterator<Item = &'v Value>,
) -> std::result::Result<DynSolValue, String> {
    if items.len() != types.len() {
        return Err(format!(
            "expected {} tuple fields, got {}",
            types.len(),
            items.len()
        ));
    }
    types
        .iter()
        .zip(items)
        .map(|(ty, item)| to_sol_value(ty, item))
        .collect::<std::result::Result<_, _>>()
        .map(DynSolValue::Tuple)
}

/// Comma-joined rendering used in progress logs
pub fn display_args(args: &[Value]) -> String {
    args.iter()
        .map(sol_literal)
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders a JSON value in Solidity literal syntax. Objects become tuples in
/// field order.
fn sol_literal(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => format!(
            "[{}]",
            items
                .iter()
                .map(sol_literal)
                .collect::<Vec<_>>()
                .join(",")
        ),
        Value::Object(map) => format!(
            "({})",
            map.values()
                .map(sol_literal)
                .collect::<Vec<_>>()
                .join(",")
        ),
    }
}
