//! Option-driven facade over a zero-knowledge proof toolchain.
//!
//! Exposes compilation, witness computation, trusted setup, proof generation,
//! verification and verifier export as a small set of uniform operations. The
//! toolchain itself is reached only through the [`engine::Engine`] trait.
//!
//! - [`options`] resolves per-call options against the options a provider is bound to.
//! - [`handle`] releases engine-owned result handles exactly once.
//! - [`pipeline`] holds the operations themselves.
//! - [`provider::Provider`] binds `{backend, scheme, curve}` and forwards to the pipeline.
//!
//! Engines live in their own crates:
//! - [`zk_provider_zokrates`](https://docs.rs/zk-provider-zokrates): the ZoKrates CLI
//!
//! ```no_run
//! use zk_provider_core::mock::MockEngine;
//! use zk_provider_core::options::{CompileOptions, ComputeWitnessOptions};
//! use zk_provider_core::provider::Provider;
//!
//! # fn main() -> zk_provider_core::error::Result<()> {
//! let provider = Provider::new(MockEngine::default());
//! let artifact = provider.compile("def main() -> field { return 1; }", CompileOptions::default())?;
//! let result = provider.compute_witness(&artifact, &serde_json::json!([]), ComputeWitnessOptions::default())?;
//! let keypair = provider.setup(&artifact.program, None)?;
//! let proof = provider.generate_proof(&artifact.program, &result.witness, &keypair.proving_key, None)?;
//! assert!(provider.verify(&keypair.verification_key, &proof)?);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod artifacts;
pub mod engine;
pub mod error;
pub mod handle;
pub mod imports;
pub mod log;
pub mod mock;
pub mod options;
pub mod pipeline;
pub mod provider;
pub mod resolve;
