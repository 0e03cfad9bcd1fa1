//! Providers bound to a `{backend, scheme, curve}` snapshot.
//!
//! A [`Provider`] forwards every operation to [`crate::pipeline`], injecting
//! its bound options. Rebinding with [`Provider::with_options`] yields a new
//! provider and leaves the original untouched. `compile` still honours a
//! per-call curve, so a bound provider can compile for another curve.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::artifacts::{
    CompileArtifact, Proof, ProgramInput, ProvingKey, SetupKeypair, Srs, VerificationKey,
    WitnessResult,
};
use crate::engine::Engine;
use crate::error::Result;
use crate::options::{CompileOptions, ComputeWitnessOptions, ProviderOptions};
use crate::pipeline;

/// A facade instance bound to one option snapshot.
pub struct Provider<E> {
    engine: Arc<E>,
    options: ProviderOptions,
}

impl<E> Clone for Provider<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            options: self.options,
        }
    }
}

impl<E: Engine> Provider<E> {
    /// Provider bound to the default options (`ark`, `g16`, `bn128`).
    pub fn new(engine: E) -> Self {
        Self::with_engine(Arc::new(engine), ProviderOptions::default())
    }

    pub fn with_engine(engine: Arc<E>, options: ProviderOptions) -> Self {
        Self { engine, options }
    }

    /// A new provider sharing this engine, bound to `options`.
    pub fn with_options(&self, options: ProviderOptions) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            options,
        }
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn compile(&self, source: &str, options: CompileOptions) -> Result<CompileArtifact> {
        pipeline::compile(self.engine.as_ref(), source, options, Some(&self.options))
    }

    pub fn compute_witness<'a, T: Serialize + ?Sized>(
        &self,
        input: impl Into<ProgramInput<'a>>,
        args: &T,
        options: ComputeWitnessOptions,
    ) -> Result<WitnessResult> {
        pipeline::compute_witness(self.engine.as_ref(), input, args, options)
    }

    pub fn setup(&self, program: &[u8], entropy: Option<&[u8]>) -> Result<SetupKeypair> {
        pipeline::setup(self.engine.as_ref(), program, entropy, &self.options)
    }

    /// Universal setup on the bound curve.
    pub fn universal_setup(&self, size: u32, entropy: Option<&[u8]>) -> Result<Srs> {
        pipeline::universal_setup(self.engine.as_ref(), self.options.curve, size, entropy)
    }

    pub fn setup_with_srs(&self, srs: &Srs, program: &[u8]) -> Result<SetupKeypair> {
        pipeline::setup_with_srs(self.engine.as_ref(), srs, program, &self.options)
    }

    pub fn generate_proof(
        &self,
        program: &[u8],
        witness: &[u8],
        proving_key: &ProvingKey,
        entropy: Option<&[u8]>,
    ) -> Result<Proof> {
        pipeline::generate_proof(
            self.engine.as_ref(),
            program,
            witness,
            proving_key,
            entropy,
            &self.options,
        )
    }

    pub fn verify(&self, verification_key: &VerificationKey, proof: &Proof) -> Result<bool> {
        pipeline::verify(self.engine.as_ref(), verification_key, proof, &self.options)
    }

    pub fn export_solidity_verifier(&self, verification_key: &VerificationKey) -> Result<String> {
        pipeline::export_solidity_verifier(self.engine.as_ref(), verification_key)
    }

    pub fn format_proof(&self, proof: &Proof) -> Result<Value> {
        pipeline::format_proof(self.engine.as_ref(), proof)
    }
}

impl<E: Engine + 'static> Provider<E> {
    /// [`Provider::compile`] on tokio's blocking pool.
    pub async fn compile_task(
        &self,
        source: impl Into<String>,
        options: CompileOptions,
    ) -> Result<CompileArtifact> {
        let provider = self.clone();
        let source = source.into();
        tokio::task::spawn_blocking(move || provider.compile(&source, options)).await?
    }

    /// [`Provider::compute_witness`] on tokio's blocking pool.
    pub async fn compute_witness_task(
        &self,
        input: impl Into<ProgramInput<'static>>,
        args: Value,
        options: ComputeWitnessOptions,
    ) -> Result<WitnessResult> {
        let provider = self.clone();
        let input = input.into();
        tokio::task::spawn_blocking(move || provider.compute_witness(input, &args, options)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;
    use crate::options::{Backend, Curve, Scheme};
    use serde_json::json;

    const RETURN_ONE: &str = "def main() -> field { return 1; }";

    fn provider() -> Provider<MockEngine> {
        Provider::new(MockEngine::default())
    }

    #[test]
    fn test_default_binding() {
        let p = provider();
        assert_eq!(*p.options(), ProviderOptions::new(Backend::Ark, Scheme::G16, Curve::Bn128));
    }

    #[test]
    fn test_with_options_does_not_mutate_original() {
        let original = provider();
        let rebound = original.with_options(original.options().with_curve(Curve::Bls12_381));

        original.compile(RETURN_ONE, CompileOptions::default()).unwrap();
        rebound.compile(RETURN_ONE, CompileOptions::default()).unwrap();

        let calls = original.engine().calls().compile;
        assert_eq!(calls[0].curve, Curve::Bn128);
        assert_eq!(calls[1].curve, Curve::Bls12_381);
        assert_eq!(original.options().curve, Curve::Bn128);
    }

    #[test]
    fn test_rebinding_chains() {
        let p = provider()
            .with_options(ProviderOptions::default().with_scheme(Scheme::Gm17))
            .with_options(ProviderOptions::default().with_curve(Curve::Bw6_761));
        assert_eq!(p.options().scheme, Scheme::G16);
        assert_eq!(p.options().curve, Curve::Bw6_761);
    }

    #[test]
    fn test_compile_curve_override_on_bound_provider() {
        let p = provider().with_options(ProviderOptions::default().with_curve(Curve::Bls12_381));
        p.compile(RETURN_ONE, CompileOptions::new().curve(Curve::Bls12_377))
            .unwrap();
        assert_eq!(p.engine().calls().compile[0].curve, Curve::Bls12_377);
    }

    #[test]
    fn test_bound_options_reach_setup_prove_verify() {
        let bound = ProviderOptions::new(Backend::Ark, Scheme::Gm17, Curve::Bls12_381);
        let p = provider().with_options(bound);

        let artifact = p.compile(RETURN_ONE, CompileOptions::default()).unwrap();
        let witness = p
            .compute_witness(&artifact, &json!([]), ComputeWitnessOptions::default())
            .unwrap();
        let keypair = p.setup(&artifact.program, None).unwrap();
        let proof = p
            .generate_proof(&artifact.program, &witness.witness, &keypair.proving_key, None)
            .unwrap();
        assert!(p.verify(&keypair.verification_key, &proof).unwrap());

        let calls = p.engine().calls();
        assert_eq!(calls.compile[0].curve, Curve::Bls12_381);
        let entries: Vec<&str> = calls.options.iter().map(|(entry, _)| *entry).collect();
        assert_eq!(entries, vec!["setup", "generate_proof", "verify"]);
        assert!(calls.options.iter().all(|(_, opts)| *opts == bound));
        assert!(p.engine().ledger().all_released_once());
    }

    #[test]
    fn test_universal_setup_uses_bound_curve() {
        let p = provider().with_options(
            ProviderOptions::default()
                .with_scheme(Scheme::Marlin)
                .with_curve(Curve::Bls12_377),
        );
        let srs = p.universal_setup(2, Some(&b"seed"[..])).unwrap();
        let keypair = p.setup_with_srs(&srs, b"program").unwrap();
        assert!(!keypair.proving_key.as_bytes().is_empty());
        assert_eq!(p.engine().calls().universal_setup, vec![(Curve::Bls12_377, 2)]);
    }

    #[test]
    fn test_export_and_format_are_option_free() {
        let p = provider().with_options(ProviderOptions::default().with_backend(Backend::Bellman));
        let vk = VerificationKey(b"mock-vk".to_vec());
        assert!(p.export_solidity_verifier(&vk).unwrap().contains("Verifier"));
        assert!(p.format_proof(&Proof(vec![0])).is_ok());
        assert!(p.engine().calls().options.is_empty());
    }

    #[tokio::test]
    async fn test_compile_and_witness_tasks() {
        let p = provider();
        let artifact = p
            .compile_task(RETURN_ONE, CompileOptions::default())
            .await
            .unwrap();
        let result = p
            .compute_witness_task(artifact, json!([]), ComputeWitnessOptions::default())
            .await
            .unwrap();
        assert_eq!(result.output, json!("1"));
        assert!(p.engine().ledger().all_released_once());
    }
}
