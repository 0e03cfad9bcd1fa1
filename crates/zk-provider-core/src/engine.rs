use serde_json::Value;

use crate::artifacts::{Abi, Proof, ProvingKey, SetupKeypair, Srs, VerificationKey};
use crate::error::Result;
use crate::handle::{CompileHandle, WitnessHandle};
use crate::log::Logger;
use crate::options::{CompileConfig, Curve, ProviderOptions};
use crate::resolve::Resolver;

/// Flags forwarded to the engine's witness entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WitnessConfig {
    pub snarkjs: bool,
}

/// The external proof toolchain.
///
/// Every pipeline operation forwards to exactly one of these entry points.
/// `compile` and `compute_witness` return handles that the facade releases;
/// all other entry points return plain values.
///
/// Implementations report failures with the [`ProviderError`](crate::error::ProviderError)
/// variant matching the entry point (`Compile` for `compile`, `Witness` for
/// `compute_witness`, and so on).
pub trait Engine: Send + Sync {
    type Compiled: CompileHandle;
    type Witness: WitnessHandle;

    /// Human-readable name: "zokrates", "mock".
    fn name(&self) -> &'static str;

    /// Compile `source`, calling `resolver` once per import in text order.
    ///
    /// A resolver error must abort compilation.
    fn compile(
        &self,
        source: &str,
        location: &str,
        resolver: &dyn Resolver,
        config: &CompileConfig,
        curve: Curve,
    ) -> Result<Self::Compiled>;

    /// Compute a witness. `args` is a JSON array; `abi` is absent for
    /// ABI-less programs. `logger` receives program log lines in order.
    fn compute_witness(
        &self,
        program: &[u8],
        abi: Option<&Abi>,
        args: &str,
        config: &WitnessConfig,
        logger: &dyn Logger,
    ) -> Result<Self::Witness>;

    fn setup(
        &self,
        program: &[u8],
        entropy: Option<&[u8]>,
        options: &ProviderOptions,
    ) -> Result<SetupKeypair>;

    /// Generate a structured reference string supporting circuits of up to `2^size` constraints.
    fn universal_setup(&self, curve: Curve, size: u32, entropy: Option<&[u8]>) -> Result<Srs>;

    fn setup_with_srs(
        &self,
        srs: &Srs,
        program: &[u8],
        options: &ProviderOptions,
    ) -> Result<SetupKeypair>;

    fn generate_proof(
        &self,
        program: &[u8],
        witness: &[u8],
        proving_key: &ProvingKey,
        entropy: Option<&[u8]>,
        options: &ProviderOptions,
    ) -> Result<Proof>;

    /// `Ok(false)` is a rejected proof; `Err` means verification could not run.
    fn verify(
        &self,
        verification_key: &VerificationKey,
        proof: &Proof,
        options: &ProviderOptions,
    ) -> Result<bool>;

    fn export_solidity_verifier(&self, verification_key: &VerificationKey) -> Result<String>;

    /// Restructure a proof for display or for an on-chain call.
    fn format_proof(&self, proof: &Proof) -> Result<Value>;
}
