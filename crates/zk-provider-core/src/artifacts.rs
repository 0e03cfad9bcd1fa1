//! Result records and opaque blobs passed between pipeline operations.
//!
//! Every record here is built only after all of its fields were extracted,
//! so a value of one of these types is always fully populated.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single typed entry of an [`Abi`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiType {
    /// Type name: `field`, `bool`, `u8`..`u64`, `array`, `struct`, `tuple`.
    #[serde(rename = "type")]
    pub ty: String,
    /// Nested structure for composite types, kept as the engine wrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Value>,
}

impl AbiType {
    pub fn field() -> Self {
        Self {
            ty: "field".into(),
            components: None,
        }
    }
}

/// A named parameter of the entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiInput {
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(flatten)]
    pub ty: AbiType,
}

/// Callable interface of a compiled program's entry point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Abi {
    #[serde(default)]
    pub inputs: Vec<AbiInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<AbiType>,
}

impl Abi {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Number of values the entry point returns. The empty tuple counts as none.
    pub fn output_count(&self) -> usize {
        match &self.output {
            None => 0,
            Some(ty) if ty.ty == "tuple" => ty
                .components
                .as_ref()
                .and_then(|c| c.get("elements"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            Some(_) => 1,
        }
    }
}

/// Output of `compile`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileArtifact {
    pub program: Vec<u8>,
    pub abi: Abi,
    /// Present only when snarkjs output was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snarkjs_program: Option<Vec<u8>>,
}

/// Output of `compute_witness`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WitnessResult {
    pub witness: Vec<u8>,
    /// Public output of the program, decoded by the engine.
    pub output: Value,
    /// Present only when snarkjs output was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snarkjs_witness: Option<Vec<u8>>,
}

/// Program passed to `compute_witness`: either a bare program blob, or a
/// program together with its ABI.
///
/// ABI-less low-level programs are passed as [`ProgramInput::ProgramOnly`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramInput<'a> {
    ProgramOnly(Cow<'a, [u8]>),
    ProgramWithAbi {
        program: Cow<'a, [u8]>,
        abi: Cow<'a, Abi>,
    },
}

impl ProgramInput<'_> {
    pub fn program(&self) -> &[u8] {
        match self {
            Self::ProgramOnly(program) | Self::ProgramWithAbi { program, .. } => &**program,
        }
    }

    pub fn abi(&self) -> Option<&Abi> {
        match self {
            Self::ProgramOnly(_) => None,
            Self::ProgramWithAbi { abi, .. } => Some(&**abi),
        }
    }
}

impl<'a> From<&'a [u8]> for ProgramInput<'a> {
    fn from(program: &'a [u8]) -> Self {
        Self::ProgramOnly(Cow::Borrowed(program))
    }
}

impl<'a> From<&'a Vec<u8>> for ProgramInput<'a> {
    fn from(program: &'a Vec<u8>) -> Self {
        Self::ProgramOnly(Cow::Borrowed(program.as_slice()))
    }
}

impl From<Vec<u8>> for ProgramInput<'static> {
    fn from(program: Vec<u8>) -> Self {
        Self::ProgramOnly(Cow::Owned(program))
    }
}

impl<'a> From<&'a CompileArtifact> for ProgramInput<'a> {
    fn from(artifact: &'a CompileArtifact) -> Self {
        Self::ProgramWithAbi {
            program: Cow::Borrowed(artifact.program.as_slice()),
            abi: Cow::Borrowed(&artifact.abi),
        }
    }
}

impl From<CompileArtifact> for ProgramInput<'static> {
    fn from(artifact: CompileArtifact) -> Self {
        Self::ProgramWithAbi {
            program: Cow::Owned(artifact.program),
            abi: Cow::Owned(artifact.abi),
        }
    }
}

macro_rules! opaque_blob {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Vec<u8>);

        impl $name {
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }
    };
}

opaque_blob!(
    /// Engine-defined proof encoding.
    Proof
);
opaque_blob!(
    /// Engine-defined verification key encoding.
    VerificationKey
);
opaque_blob!(
    /// Engine-defined proving key encoding.
    ProvingKey
);
opaque_blob!(
    /// Structured reference string from a universal setup.
    Srs
);

/// Keys produced by `setup` and `setup_with_srs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupKeypair {
    pub verification_key: VerificationKey,
    pub proving_key: ProvingKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_single_field_output() {
        let abi = Abi::from_json(r#"{"inputs":[],"output":{"type":"field"}}"#).unwrap();
        assert!(abi.inputs.is_empty());
        assert_eq!(abi.output_count(), 1);
        assert_eq!(abi.output, Some(AbiType::field()));
    }

    #[test]
    fn test_abi_inputs_and_tuple_output() {
        let abi = Abi::from_json(
            r#"{
                "inputs": [
                    {"name": "a", "public": true, "type": "field"},
                    {"name": "b", "public": false, "type": "array",
                     "components": {"size": 2, "type": "u32"}}
                ],
                "output": {"type": "tuple", "components": {"elements": [
                    {"type": "field"}, {"type": "bool"}
                ]}}
            }"#,
        )
        .unwrap();
        assert_eq!(abi.inputs.len(), 2);
        assert_eq!(abi.inputs[1].ty.ty, "array");
        assert!(!abi.inputs[1].public);
        assert_eq!(abi.output_count(), 2);
    }

    #[test]
    fn test_abi_unit_output() {
        let abi = Abi::from_json(
            r#"{"inputs":[],"output":{"type":"tuple","components":{"elements":[]}}}"#,
        )
        .unwrap();
        assert_eq!(abi.output_count(), 0);
    }

    #[test]
    fn test_snarkjs_fields_absent_when_not_requested() {
        let artifact = CompileArtifact {
            program: vec![1, 2, 3],
            abi: Abi::default(),
            snarkjs_program: None,
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert!(json.get("snarkjs_program").is_none());

        let witness = WitnessResult {
            witness: vec![0],
            output: Value::from("1"),
            snarkjs_witness: Some(vec![9]),
        };
        let json = serde_json::to_value(&witness).unwrap();
        assert!(json.get("snarkjs_witness").is_some());
    }

    #[test]
    fn test_program_input_from_artifact_and_blob() {
        let artifact = CompileArtifact {
            program: vec![7, 7],
            abi: Abi::default(),
            snarkjs_program: None,
        };
        let with_abi = ProgramInput::from(&artifact);
        let bare = ProgramInput::from(&artifact.program);
        assert_eq!(with_abi.program(), bare.program());
        assert!(with_abi.abi().is_some());
        assert!(bare.abi().is_none());
    }
}
