//! The pipeline operations.
//!
//! Each function resolves its options, forwards to exactly one [`Engine`]
//! entry point, and packages the result. `compile` and `compute_witness`
//! additionally extract every field from the engine handle and release it
//! before returning. There are no retries, no caching, and no state shared
//! between calls.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::args::encode_args;
use crate::artifacts::{
    CompileArtifact, Proof, ProgramInput, ProvingKey, SetupKeypair, Srs, VerificationKey,
    WitnessResult,
};
use crate::engine::{Engine, WitnessConfig};
use crate::error::{ProviderError, Result};
use crate::handle::{CompileHandle, Scoped, WitnessHandle};
use crate::options::{
    CompileOptions, ComputeWitnessOptions, Curve, ProviderOptions, ResolvedCompileOptions,
    ResolvedWitnessOptions,
};
use crate::resolve::{ResolvedSource, Resolver};

/// Wraps the caller's resolver and remembers the first error it raised, so a
/// raising resolver fails the call even if the engine carried on.
struct GuardedResolver<'a> {
    inner: &'a dyn Resolver,
    failure: Mutex<Option<anyhow::Error>>,
}

impl<'a> GuardedResolver<'a> {
    fn new(inner: &'a dyn Resolver) -> Self {
        Self {
            inner,
            failure: Mutex::new(None),
        }
    }

    fn into_failure(self) -> Option<anyhow::Error> {
        match self.failure.into_inner() {
            Ok(failure) => failure,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Resolver for GuardedResolver<'_> {
    fn resolve(
        &self,
        current_location: &str,
        import_path: &str,
    ) -> anyhow::Result<Option<ResolvedSource>> {
        tracing::trace!(current_location, import_path, "resolving import");
        self.inner
            .resolve(current_location, import_path)
            .map_err(|err| {
                let forwarded = anyhow::anyhow!("{err:#}");
                let mut failure = match self.failure.lock() {
                    Ok(failure) => failure,
                    Err(poisoned) => poisoned.into_inner(),
                };
                failure.get_or_insert(err);
                forwarded
            })
    }
}

/// Compile `source` into a program and its ABI.
pub fn compile<E: Engine>(
    engine: &E,
    source: &str,
    options: CompileOptions,
    bound: Option<&ProviderOptions>,
) -> Result<CompileArtifact> {
    const OP: &str = "compile";
    let resolved = ResolvedCompileOptions::resolve(options, bound);
    tracing::debug!(
        engine = engine.name(),
        location = %resolved.location,
        curve = %resolved.curve,
        snarkjs = resolved.snarkjs,
        "compile"
    );

    let guard = GuardedResolver::new(resolved.resolver.as_ref());
    let outcome = engine
        .compile(
            source,
            &resolved.location,
            &guard,
            &resolved.config,
            resolved.curve,
        )
        .map(|handle| Scoped::new(OP, handle));
    if let Some(source) = guard.into_failure() {
        return Err(ProviderError::Callback {
            operation: OP,
            callback: "resolver",
            source,
        });
    }
    let handle = outcome?;

    let program = handle.extract("program", CompileHandle::program)?;
    let abi = handle.extract("abi", CompileHandle::abi)?;
    let snarkjs_program = if resolved.snarkjs {
        Some(handle.extract("snarkjs_program", CompileHandle::snarkjs_program)?)
    } else {
        None
    };
    handle.release();

    tracing::info!(
        program_bytes = program.len(),
        inputs = abi.inputs.len(),
        "compiled {}",
        resolved.location
    );
    Ok(CompileArtifact {
        program,
        abi,
        snarkjs_program,
    })
}

/// Compute a witness for `args`.
///
/// `input` is either a bare program blob or a `{program, abi}` pair such as a
/// [`CompileArtifact`].
pub fn compute_witness<'a, E, T>(
    engine: &E,
    input: impl Into<ProgramInput<'a>>,
    args: &T,
    options: ComputeWitnessOptions,
) -> Result<WitnessResult>
where
    E: Engine,
    T: Serialize + ?Sized,
{
    const OP: &str = "compute_witness";
    let input = input.into();
    let resolved = ResolvedWitnessOptions::resolve(options);
    let args = encode_args(args)?;
    tracing::debug!(
        engine = engine.name(),
        with_abi = input.abi().is_some(),
        snarkjs = resolved.snarkjs,
        "compute_witness"
    );

    let config = WitnessConfig {
        snarkjs: resolved.snarkjs,
    };
    let handle = Scoped::new(
        OP,
        engine.compute_witness(
            input.program(),
            input.abi(),
            &args,
            &config,
            resolved.logger.as_ref(),
        )?,
    );

    let witness = handle.extract("witness", WitnessHandle::witness)?;
    let output = handle.extract("output", WitnessHandle::output)?;
    let snarkjs_witness = if resolved.snarkjs {
        Some(handle.extract("snarkjs_witness", WitnessHandle::snarkjs_witness)?)
    } else {
        None
    };
    handle.release();

    tracing::info!(witness_bytes = witness.len(), "witness computed");
    Ok(WitnessResult {
        witness,
        output,
        snarkjs_witness,
    })
}

/// Run a circuit-specific trusted setup. The engine's result is returned as-is.
pub fn setup<E: Engine>(
    engine: &E,
    program: &[u8],
    entropy: Option<&[u8]>,
    options: &ProviderOptions,
) -> Result<SetupKeypair> {
    tracing::debug!(
        engine = engine.name(),
        backend = %options.backend,
        scheme = %options.scheme,
        "setup"
    );
    engine.setup(program, entropy, options)
}

/// Generate a structured reference string for universal-setup schemes.
pub fn universal_setup<E: Engine>(
    engine: &E,
    curve: Curve,
    size: u32,
    entropy: Option<&[u8]>,
) -> Result<Srs> {
    tracing::debug!(engine = engine.name(), curve = %curve, size, "universal_setup");
    engine.universal_setup(curve, size, entropy)
}

/// Derive circuit keys from an existing structured reference string.
pub fn setup_with_srs<E: Engine>(
    engine: &E,
    srs: &Srs,
    program: &[u8],
    options: &ProviderOptions,
) -> Result<SetupKeypair> {
    tracing::debug!(
        engine = engine.name(),
        backend = %options.backend,
        scheme = %options.scheme,
        "setup_with_srs"
    );
    engine.setup_with_srs(srs, program, options)
}

pub fn generate_proof<E: Engine>(
    engine: &E,
    program: &[u8],
    witness: &[u8],
    proving_key: &ProvingKey,
    entropy: Option<&[u8]>,
    options: &ProviderOptions,
) -> Result<Proof> {
    tracing::debug!(
        engine = engine.name(),
        backend = %options.backend,
        scheme = %options.scheme,
        "generate_proof"
    );
    engine.generate_proof(program, witness, proving_key, entropy, options)
}

pub fn verify<E: Engine>(
    engine: &E,
    verification_key: &VerificationKey,
    proof: &Proof,
    options: &ProviderOptions,
) -> Result<bool> {
    tracing::debug!(
        engine = engine.name(),
        backend = %options.backend,
        scheme = %options.scheme,
        curve = %options.curve,
        "verify"
    );
    engine.verify(verification_key, proof, options)
}

/// Source of an on-chain verifier contract for `verification_key`.
pub fn export_solidity_verifier<E: Engine>(
    engine: &E,
    verification_key: &VerificationKey,
) -> Result<String> {
    engine.export_solidity_verifier(verification_key)
}

pub fn format_proof<E: Engine>(engine: &E, proof: &Proof) -> Result<Value> {
    engine.format_proof(proof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Abi;
    use crate::error::ErrorKind;
    use crate::log::CollectingLogger;
    use crate::mock::{MockConfig, MockEngine};
    use crate::options::{CompileConfig, SNARKJS_FLAG};
    use crate::resolve::MemoryResolver;
    use serde_json::json;
    use std::sync::Arc;

    const RETURN_ONE: &str = "def main() -> field { return 1; }";

    #[test]
    fn test_compile_default_options() {
        let engine = MockEngine::default();
        let artifact = compile(&engine, RETURN_ONE, CompileOptions::default(), None).unwrap();

        assert!(!artifact.program.is_empty());
        assert!(artifact.abi.inputs.is_empty());
        assert_eq!(artifact.abi.output_count(), 1);
        assert!(artifact.snarkjs_program.is_none());

        let call = &engine.calls().compile[0];
        assert_eq!(call.location, "main.zok");
        assert_eq!(call.curve, Curve::Bn128);
        assert_eq!(call.config.flag(SNARKJS_FLAG), Some(&json!(false)));
        assert!(engine.ledger().all_released_once());
    }

    #[test]
    fn test_compile_snarkjs_requested() {
        let engine = MockEngine::default();
        let options = CompileOptions::new()
            .snarkjs(true)
            .config(CompileConfig::new().with_flag(SNARKJS_FLAG, false).with_debug(true));
        let artifact = compile(&engine, RETURN_ONE, options, None).unwrap();

        assert_eq!(artifact.snarkjs_program.as_deref(), Some(&b"mock-r1cs"[..]));
        let call = &engine.calls().compile[0];
        assert_eq!(call.config.flag(SNARKJS_FLAG), Some(&json!(true)));
        assert!(call.config.is_enabled(CompileConfig::DEBUG));
    }

    #[test]
    fn test_compile_skips_snarkjs_extraction_when_not_requested() {
        let engine = MockEngine::default();
        compile(&engine, RETURN_ONE, CompileOptions::default(), None).unwrap();
        let records = engine.ledger().records();
        assert_eq!(records[0].extractions, vec!["program", "abi"]);
    }

    #[test]
    fn test_compile_releases_when_extraction_fails() {
        let engine = MockEngine::new(MockConfig::default().with_broken_field("abi"));
        let err = compile(&engine, RETURN_ONE, CompileOptions::default(), None).unwrap_err();

        match &err {
            ProviderError::Extraction {
                operation, field, ..
            } => {
                assert_eq!(*operation, "compile");
                assert_eq!(*field, "abi");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.ledger().issued(), 1);
        assert!(engine.ledger().all_released_once());
    }

    #[test]
    fn test_compile_error_issues_no_handle() {
        let engine = MockEngine::new(MockConfig::default().with_compile_failure());
        let err = compile(&engine, RETURN_ONE, CompileOptions::default(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);
        assert_eq!(engine.ledger().issued(), 0);
    }

    #[test]
    fn test_resolver_called_in_text_order() {
        let source = r#"
from "./b" import g;
from "./a" import f;
def main() -> field { return f() + g(); }
"#;
        let resolver = MemoryResolver::new()
            .with_source("lib/a.zok", "from \"./c\" import h;\ndef f() -> field { return h(); }")
            .with_source("lib/b.zok", "def g() -> field { return 1; }")
            .with_source("lib/c.zok", "def h() -> field { return 1; }");
        let engine = MockEngine::default();
        let options = CompileOptions::new().location("lib/main.zok").resolver(resolver);
        compile(&engine, source, options, None).unwrap();

        let calls = &engine.calls().compile[0].resolver_calls;
        let expected = vec![
            ("lib/main.zok".to_string(), "./b".to_string()),
            ("lib/main.zok".to_string(), "./a".to_string()),
            ("lib/a.zok".to_string(), "./c".to_string()),
        ];
        assert_eq!(*calls, expected);
    }

    #[test]
    fn test_missing_import_is_compile_error() {
        let engine = MockEngine::default();
        let source = "from \"./missing\" import x;\ndef main() -> field { return x(); }";
        let err = compile(&engine, source, CompileOptions::default(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);
        assert_eq!(engine.ledger().issued(), 0);
    }

    #[test]
    fn test_raising_resolver_aborts_compile() {
        let engine = MockEngine::default();
        let options = CompileOptions::new().resolver(
            |_: &str, path: &str| -> anyhow::Result<Option<ResolvedSource>> {
                anyhow::bail!("refusing to load {path}")
            },
        );
        let source = "import \"./lib\";\ndef main() { return; }";
        let err = compile(&engine, source, options, None).unwrap_err();

        match err {
            ProviderError::Callback {
                operation,
                callback,
                source,
            } => {
                assert_eq!(operation, "compile");
                assert_eq!(callback, "resolver");
                assert_eq!(source.to_string(), "refusing to load ./lib");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolver_failure_aborts_compile_even_when_engine_succeeds() {
        let engine = MockEngine::new(MockConfig::default().with_swallowed_resolver_errors());
        let options = CompileOptions::new().resolver(
            |_: &str, _: &str| -> anyhow::Result<Option<ResolvedSource>> {
                anyhow::bail!("resolver offline")
            },
        );
        let source = "import \"./lib\";\ndef main() -> field { return 1; }";
        let err = compile(&engine, source, options, None).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Callback);
        let records = engine.ledger().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].releases, 1);
        assert!(records[0].extractions.is_empty());
    }

    #[test]
    fn test_compute_witness_output() {
        let engine = MockEngine::default();
        let artifact = compile(&engine, RETURN_ONE, CompileOptions::default(), None).unwrap();
        let args: [Value; 0] = [];
        let result =
            compute_witness(&engine, &artifact, &args, ComputeWitnessOptions::default()).unwrap();

        assert_eq!(result.output, json!("1"));
        assert!(!result.witness.is_empty());
        assert!(result.snarkjs_witness.is_none());
        assert_eq!(engine.calls().compute_witness[0].args, "[]");
        assert_eq!(engine.ledger().issued(), 2);
        assert!(engine.ledger().all_released_once());
    }

    #[test]
    fn test_compute_witness_bare_program_and_with_abi_agree() {
        let engine = MockEngine::default();
        let artifact = compile(&engine, RETURN_ONE, CompileOptions::default(), None).unwrap();
        let args = json!([]);

        let with_abi =
            compute_witness(&engine, &artifact, &args, ComputeWitnessOptions::default()).unwrap();
        let bare = compute_witness(
            &engine,
            artifact.program.as_slice(),
            &args,
            ComputeWitnessOptions::default(),
        )
        .unwrap();

        assert_eq!(with_abi, bare);
        let calls = engine.calls().compute_witness;
        assert_eq!(calls[0].abi, Some(artifact.abi.clone()));
        assert_eq!(calls[1].abi, None::<Abi>);
        assert_eq!(calls[0].program, calls[1].program);
    }

    #[test]
    fn test_compute_witness_snarkjs_requested() {
        let engine = MockEngine::default();
        let result = compute_witness(
            &engine,
            b"mock-program".to_vec(),
            &json!([]),
            ComputeWitnessOptions::new().snarkjs(true),
        )
        .unwrap();
        assert_eq!(result.snarkjs_witness.as_deref(), Some(&b"mock-wtns"[..]));
        assert!(engine.calls().compute_witness[0].config.snarkjs);
    }

    #[test]
    fn test_logger_receives_lines_in_order() {
        let engine =
            MockEngine::new(MockConfig::default().with_log_lines(["x = 1", "y = 2", "done"]));
        let logger = Arc::new(CollectingLogger::new());
        let options = ComputeWitnessOptions::new().shared_logger(logger.clone());
        compute_witness(&engine, b"p".to_vec(), &json!([]), options).unwrap();
        assert_eq!(logger.lines(), vec!["x = 1", "y = 2", "done"]);
    }

    #[test]
    fn test_witness_failure_surfaces_unchanged() {
        let engine = MockEngine::new(MockConfig::default().with_witness_failure());
        let err = compute_witness(&engine, b"p".to_vec(), &json!([]), ComputeWitnessOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Witness);
        assert_eq!(err.to_string(), "witness computation failed: scripted failure");
    }

    #[test]
    fn test_compute_witness_releases_when_output_fails() {
        let engine = MockEngine::new(MockConfig::default().with_broken_field("output"));
        let err = compute_witness(&engine, b"p".to_vec(), &json!([]), ComputeWitnessOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Extraction {
                field: "output",
                ..
            }
        ));
        assert!(engine.ledger().all_released_once());
    }

    #[test]
    fn test_full_pipeline_verifies() {
        let engine = MockEngine::default();
        let options = ProviderOptions::default();
        let artifact = compile(&engine, RETURN_ONE, CompileOptions::default(), None).unwrap();
        let witness =
            compute_witness(&engine, &artifact, &json!([]), ComputeWitnessOptions::default())
                .unwrap();
        let keypair = setup(&engine, &artifact.program, None, &options).unwrap();
        let proof = generate_proof(
            &engine,
            &artifact.program,
            &witness.witness,
            &keypair.proving_key,
            Some(&b"entropy"[..]),
            &options,
        )
        .unwrap();
        assert!(verify(&engine, &keypair.verification_key, &proof, &options).unwrap());
        assert_eq!(
            engine.calls().entropy,
            vec![None, Some(b"entropy".to_vec())]
        );
    }

    #[test]
    fn test_invalid_combination_is_engine_error() {
        let engine = MockEngine::default();
        let options = ProviderOptions::default()
            .with_backend(crate::options::Backend::Bellman)
            .with_scheme(crate::options::Scheme::Marlin);
        let err = setup(&engine, b"p", None, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Setup);
    }

    #[test]
    fn test_universal_setup_then_setup_with_srs() {
        let engine = MockEngine::default();
        let options = ProviderOptions::default().with_scheme(crate::options::Scheme::Marlin);
        let srs = universal_setup(&engine, Curve::Bls12_377, 4, None).unwrap();
        let keypair = setup_with_srs(&engine, &srs, b"p", &options).unwrap();
        assert_eq!(keypair, MockConfig::default().keypair);
        assert_eq!(engine.calls().universal_setup, vec![(Curve::Bls12_377, 4)]);
    }

    #[test]
    fn test_export_and_format() {
        let engine = MockEngine::default();
        let keypair = MockConfig::default().keypair;
        let source = export_solidity_verifier(&engine, &keypair.verification_key).unwrap();
        assert!(source.contains("contract Verifier"));

        let formatted = format_proof(&engine, &Proof(vec![1, 2])).unwrap();
        assert_eq!(formatted["len"], json!(2));

        let err = export_solidity_verifier(&engine, &VerificationKey(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Export);
    }
}
