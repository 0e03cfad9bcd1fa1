//! Witness file parsing and argument flattening.
//!
//! The CLI writes the witness as text, one `<variable> <value>` pair per
//! line. Public outputs are the `~out_<n>` variables.

use serde_json::Value;

use zk_provider_core::artifacts::Abi;
use zk_provider_core::error::{ProviderError, Result};

/// Values of `~out_<n>` in index order.
pub fn parse_outputs(witness: &str) -> Result<Vec<String>> {
    let mut outputs: Vec<(usize, String)> = Vec::new();
    for line in witness.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            return Err(ProviderError::Witness(format!("malformed witness line: {line}")));
        };
        if let Some(index) = name.strip_prefix("~out_") {
            let index: usize = index
                .parse()
                .map_err(|_| ProviderError::Witness(format!("malformed output variable: {name}")))?;
            outputs.push((index, value.to_string()));
        }
    }
    outputs.sort_by_key(|(index, _)| *index);
    Ok(outputs.into_iter().map(|(_, value)| value).collect())
}

/// Decode raw output values into a structured value.
///
/// With an ABI the values are consumed in order against the output type:
/// arrays and tuples become lists, structs become objects keyed by member
/// name, and leaves follow the scalar rules (`bool` to a JSON bool, `u<N>` to
/// zero-padded hex, `field` to a decimal string). Without one every output is
/// a field string.
pub fn decode_output(raw: Vec<String>, abi: Option<&Abi>) -> Result<Value> {
    let Some(abi) = abi else {
        return Ok(Value::Array(raw.into_iter().map(Value::String).collect()));
    };
    let mut values = raw.into_iter();
    let decoded = match &abi.output {
        Some(ty) => decode_type(&ty.ty, ty.components.as_ref(), &mut values)?,
        None => Value::Array(Vec::new()),
    };
    let left = values.count();
    if left > 0 {
        return Err(ProviderError::Witness(format!(
            "{left} output values not described by the abi"
        )));
    }
    Ok(decoded)
}

fn decode_type(
    ty: &str,
    components: Option<&Value>,
    values: &mut impl Iterator<Item = String>,
) -> Result<Value> {
    match ty {
        "array" => {
            let size = components
                .and_then(|c| c.get("size"))
                .and_then(Value::as_u64)
                .ok_or_else(|| malformed("array without size"))?;
            let (inner, inner_components) = element_type(components)?;
            (0..size)
                .map(|_| decode_type(inner, inner_components, &mut *values))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "tuple" => {
            let elements = components
                .and_then(|c| c.get("elements"))
                .and_then(Value::as_array)
                .ok_or_else(|| malformed("tuple without elements"))?;
            elements
                .iter()
                .map(|element| {
                    let (inner, inner_components) = element_type(Some(element))?;
                    decode_type(inner, inner_components, &mut *values)
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "struct" => {
            let members = components
                .and_then(|c| c.get("members"))
                .and_then(Value::as_array)
                .ok_or_else(|| malformed("struct without members"))?;
            let mut object = serde_json::Map::new();
            for member in members {
                let name = member
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("struct member without name"))?;
                let (inner, inner_components) = element_type(Some(member))?;
                let value = decode_type(inner, inner_components, &mut *values)?;
                object.insert(name.to_string(), value);
            }
            Ok(Value::Object(object))
        }
        leaf => {
            let value = values.next().ok_or_else(|| {
                ProviderError::Witness("fewer outputs than the abi describes".into())
            })?;
            Ok(decode_scalar(&value, leaf))
        }
    }
}

/// `type` and `components` of a nested type description.
fn element_type(description: Option<&Value>) -> Result<(&str, Option<&Value>)> {
    let ty = description
        .and_then(|d| d.get("type"))
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("nested type without a name"))?;
    Ok((ty, description.and_then(|d| d.get("components"))))
}

fn malformed(what: &str) -> ProviderError {
    ProviderError::Witness(format!("malformed abi output: {what}"))
}

fn decode_scalar(value: &str, ty: &str) -> Value {
    match ty {
        "bool" => Value::Bool(value != "0"),
        bits @ ("u8" | "u16" | "u32" | "u64") => {
            let width = bits[1..].parse::<usize>().unwrap_or(64) / 4;
            match value.parse::<u64>() {
                Ok(n) => Value::String(format!("0x{n:0width$x}")),
                Err(_) => Value::String(value.to_string()),
            }
        }
        _ => Value::String(value.to_string()),
    }
}

/// Flatten a JSON argument list into the positional field elements the CLI
/// expects for ABI-less programs.
pub fn flatten_args(args: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(args).map_err(ProviderError::ArgumentEncoding)?;
    let mut out = Vec::new();
    flatten_into(&value, &mut out)?;
    Ok(out)
}

fn flatten_into(value: &Value, out: &mut Vec<String>) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out)?;
            }
        }
        Value::String(s) => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(if *b { "1" } else { "0" }.to_string()),
        other => {
            return Err(ProviderError::Witness(format!(
                "programs without an ABI take field elements only, got {other}"
            )))
        }
    }
    Ok(())
}
