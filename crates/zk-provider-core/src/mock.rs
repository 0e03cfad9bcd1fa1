//! Scripted in-process engine for testing code built on the facade.
//!
//! [`MockEngine`] returns canned results from a [`MockConfig`], records every
//! call it receives, and tracks each handle it issues in a [`HandleLedger`]:
//! how often it was released and whether anything was read after release.
//!
//! `compile` walks the import graph of the source with
//! [`scan_imports`](crate::imports::scan_imports), consulting the resolver
//! once per import in text order, so resolver behaviour can be exercised
//! without a real compiler.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};

use crate::artifacts::{Abi, AbiType, Proof, ProvingKey, SetupKeypair, Srs, VerificationKey};
use crate::engine::{Engine, WitnessConfig};
use crate::error::{ProviderError, Result};
use crate::handle::{CompileHandle, EngineHandle, WitnessHandle};
use crate::imports::scan_imports;
use crate::log::Logger;
use crate::options::{Backend, CompileConfig, Curve, ProviderOptions, Scheme};
use crate::resolve::Resolver;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Canned engine responses.
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub program: Vec<u8>,
    pub abi: Abi,
    pub snarkjs_program: Vec<u8>,
    pub witness: Vec<u8>,
    pub output: Value,
    pub snarkjs_witness: Vec<u8>,
    /// Lines emitted to the logger during `compute_witness`, in order.
    pub log_lines: Vec<String>,
    pub keypair: SetupKeypair,
    pub srs: Srs,
    pub proof: Proof,
    pub solidity_verifier: String,
    /// Whether compile should fail after imports were resolved
    pub compile_fails: bool,
    /// Whether compute_witness should fail after logging
    pub witness_fails: bool,
    /// Handle field whose extraction fails, e.g. `"abi"` or `"output"`
    pub broken_field: Option<&'static str>,
    /// Skip imports whose resolution raised and compile anyway
    pub swallow_resolver_errors: bool,
}

impl Default for MockConfig {
    /// A program equivalent to `def main() -> field { return 1; }`.
    fn default() -> Self {
        Self {
            program: b"mock-program".to_vec(),
            abi: Abi {
                inputs: vec![],
                output: Some(AbiType::field()),
            },
            snarkjs_program: b"mock-r1cs".to_vec(),
            witness: b"~out_0 1\n~one 1\n".to_vec(),
            output: Value::from("1"),
            snarkjs_witness: b"mock-wtns".to_vec(),
            log_lines: vec![],
            keypair: SetupKeypair {
                verification_key: VerificationKey(b"mock-vk".to_vec()),
                proving_key: ProvingKey(b"mock-pk".to_vec()),
            },
            srs: Srs(b"mock-srs".to_vec()),
            proof: Proof(b"mock-proof".to_vec()),
            solidity_verifier: "contract Verifier {}".into(),
            compile_fails: false,
            witness_fails: false,
            broken_field: None,
            swallow_resolver_errors: false,
        }
    }
}

impl MockConfig {
    pub fn with_log_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_broken_field(mut self, field: &'static str) -> Self {
        self.broken_field = Some(field);
        self
    }

    pub fn with_compile_failure(mut self) -> Self {
        self.compile_fails = true;
        self
    }

    pub fn with_witness_failure(mut self) -> Self {
        self.witness_fails = true;
        self
    }

    pub fn with_swallowed_resolver_errors(mut self) -> Self {
        self.swallow_resolver_errors = true;
        self
    }
}

/// Per-handle bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleRecord {
    pub kind: &'static str,
    pub releases: u32,
    pub extractions: Vec<&'static str>,
    pub extracted_after_release: u32,
}

/// Shared log of every handle a [`MockEngine`] issued.
#[derive(Debug, Clone, Default)]
pub struct HandleLedger {
    records: Arc<Mutex<Vec<HandleRecord>>>,
}

impl HandleLedger {
    fn issue(&self, kind: &'static str) -> usize {
        let mut records = lock(&self.records);
        records.push(HandleRecord {
            kind,
            ..HandleRecord::default()
        });
        records.len() - 1
    }

    fn note_extraction(&self, index: usize, field: &'static str) {
        let mut records = lock(&self.records);
        if let Some(record) = records.get_mut(index) {
            if record.releases > 0 {
                record.extracted_after_release += 1;
            }
            record.extractions.push(field);
        }
    }

    fn note_release(&self, index: usize) {
        if let Some(record) = lock(&self.records).get_mut(index) {
            record.releases += 1;
        }
    }

    pub fn records(&self) -> Vec<HandleRecord> {
        lock(&self.records).clone()
    }

    pub fn issued(&self) -> usize {
        lock(&self.records).len()
    }

    /// `true` when every issued handle was released exactly once and never
    /// read afterwards.
    pub fn all_released_once(&self) -> bool {
        lock(&self.records)
            .iter()
            .all(|r| r.releases == 1 && r.extracted_after_release == 0)
    }
}

/// Arguments of one `compile` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileCall {
    pub source: String,
    pub location: String,
    pub config: CompileConfig,
    pub curve: Curve,
    /// `(current_location, import_path)` for every resolver invocation, in order.
    pub resolver_calls: Vec<(String, String)>,
}

/// Arguments of one `compute_witness` call.
#[derive(Debug, Clone, PartialEq)]
pub struct WitnessCall {
    pub program: Vec<u8>,
    pub abi: Option<Abi>,
    pub args: String,
    pub config: WitnessConfig,
}

/// Everything the mock was asked to do.
#[derive(Debug, Clone, Default)]
pub struct MockCalls {
    pub compile: Vec<CompileCall>,
    pub compute_witness: Vec<WitnessCall>,
    /// `(entry point, options)` for setup, setup_with_srs, generate_proof, verify.
    pub options: Vec<(&'static str, ProviderOptions)>,
    pub universal_setup: Vec<(Curve, u32)>,
    pub entropy: Vec<Option<Vec<u8>>>,
}

/// Scripted [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    config: MockConfig,
    ledger: HandleLedger,
    calls: Arc<Mutex<MockCalls>>,
}

impl MockEngine {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            ledger: HandleLedger::default(),
            calls: Arc::default(),
        }
    }

    pub fn ledger(&self) -> &HandleLedger {
        &self.ledger
    }

    pub fn calls(&self) -> MockCalls {
        lock(&self.calls).clone()
    }

    fn record_options(&self, entry: &'static str, options: &ProviderOptions) {
        lock(&self.calls).options.push((entry, *options));
    }

    fn record_entropy(&self, entropy: Option<&[u8]>) {
        lock(&self.calls).entropy.push(entropy.map(<[u8]>::to_vec));
    }

    /// Combinations a real engine refuses.
    fn check_combination(options: &ProviderOptions) -> std::result::Result<(), String> {
        match (options.backend, options.scheme) {
            (Backend::Bellman, scheme) if scheme != Scheme::G16 => Err(format!(
                "backend `bellman` does not support scheme `{scheme}`"
            )),
            _ => Ok(()),
        }
    }

    /// Depth-first walk of the import graph, resolving each import once.
    fn resolve_imports(
        &self,
        source: &str,
        location: &str,
        resolver: &dyn Resolver,
        visited: &mut HashSet<String>,
        calls: &mut Vec<(String, String)>,
    ) -> Result<()> {
        for import in scan_imports(source) {
            calls.push((location.to_string(), import.path.clone()));
            let resolved = match resolver.resolve(location, &import.path) {
                Ok(resolved) => resolved,
                Err(err) if self.config.swallow_resolver_errors => {
                    tracing::debug!("ignoring resolver failure: {err:#}");
                    continue;
                }
                Err(source) => {
                    return Err(ProviderError::Callback {
                        operation: "compile",
                        callback: "resolver",
                        source,
                    })
                }
            };
            let resolved = resolved.ok_or_else(|| {
                ProviderError::Compile(format!("{location}: import not found: {}", import.path))
            })?;
            if visited.insert(resolved.location.clone()) {
                self.resolve_imports(&resolved.source, &resolved.location, resolver, visited, calls)?;
            }
        }
        Ok(())
    }
}

/// Handle returned by [`MockEngine::compile`].
#[derive(Debug)]
pub struct MockCompileHandle {
    index: usize,
    ledger: HandleLedger,
    config: MockConfig,
}

impl MockCompileHandle {
    fn read<T>(&self, field: &'static str, value: impl FnOnce(&MockConfig) -> T) -> Result<T> {
        self.ledger.note_extraction(self.index, field);
        if self.config.broken_field == Some(field) {
            return Err(ProviderError::Resource {
                operation: "compile",
                detail: format!("`{field}` unavailable"),
            });
        }
        Ok(value(&self.config))
    }
}

impl EngineHandle for MockCompileHandle {
    fn release(&mut self) {
        self.ledger.note_release(self.index);
    }
}

impl CompileHandle for MockCompileHandle {
    fn program(&self) -> Result<Vec<u8>> {
        self.read("program", |c| c.program.clone())
    }

    fn abi(&self) -> Result<Abi> {
        self.read("abi", |c| c.abi.clone())
    }

    fn snarkjs_program(&self) -> Result<Vec<u8>> {
        self.read("snarkjs_program", |c| c.snarkjs_program.clone())
    }
}

/// Handle returned by [`MockEngine::compute_witness`].
#[derive(Debug)]
pub struct MockWitnessHandle {
    index: usize,
    ledger: HandleLedger,
    config: MockConfig,
}

impl MockWitnessHandle {
    fn read<T>(&self, field: &'static str, value: impl FnOnce(&MockConfig) -> T) -> Result<T> {
        self.ledger.note_extraction(self.index, field);
        if self.config.broken_field == Some(field) {
            return Err(ProviderError::Resource {
                operation: "compute_witness",
                detail: format!("`{field}` unavailable"),
            });
        }
        Ok(value(&self.config))
    }
}

impl EngineHandle for MockWitnessHandle {
    fn release(&mut self) {
        self.ledger.note_release(self.index);
    }
}

impl WitnessHandle for MockWitnessHandle {
    fn witness(&self) -> Result<Vec<u8>> {
        self.read("witness", |c| c.witness.clone())
    }

    fn output(&self) -> Result<Value> {
        self.read("output", |c| c.output.clone())
    }

    fn snarkjs_witness(&self) -> Result<Vec<u8>> {
        self.read("snarkjs_witness", |c| c.snarkjs_witness.clone())
    }
}

impl Engine for MockEngine {
    type Compiled = MockCompileHandle;
    type Witness = MockWitnessHandle;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn compile(
        &self,
        source: &str,
        location: &str,
        resolver: &dyn Resolver,
        config: &CompileConfig,
        curve: Curve,
    ) -> Result<Self::Compiled> {
        let mut resolver_calls = Vec::new();
        let mut visited = HashSet::from([location.to_string()]);
        let resolved =
            self.resolve_imports(source, location, resolver, &mut visited, &mut resolver_calls);

        lock(&self.calls).compile.push(CompileCall {
            source: source.to_string(),
            location: location.to_string(),
            config: config.clone(),
            curve,
            resolver_calls,
        });
        resolved?;

        if self.config.compile_fails {
            return Err(ProviderError::Compile(format!("{location}: scripted failure")));
        }

        Ok(MockCompileHandle {
            index: self.ledger.issue("compile"),
            ledger: self.ledger.clone(),
            config: self.config.clone(),
        })
    }

    fn compute_witness(
        &self,
        program: &[u8],
        abi: Option<&Abi>,
        args: &str,
        config: &WitnessConfig,
        logger: &dyn Logger,
    ) -> Result<Self::Witness> {
        lock(&self.calls).compute_witness.push(WitnessCall {
            program: program.to_vec(),
            abi: abi.cloned(),
            args: args.to_string(),
            config: *config,
        });

        for line in &self.config.log_lines {
            logger.log(line);
        }

        if self.config.witness_fails {
            return Err(ProviderError::Witness("scripted failure".into()));
        }

        Ok(MockWitnessHandle {
            index: self.ledger.issue("compute_witness"),
            ledger: self.ledger.clone(),
            config: self.config.clone(),
        })
    }

    fn setup(
        &self,
        _program: &[u8],
        entropy: Option<&[u8]>,
        options: &ProviderOptions,
    ) -> Result<SetupKeypair> {
        self.record_options("setup", options);
        self.record_entropy(entropy);
        Self::check_combination(options).map_err(ProviderError::Setup)?;
        Ok(self.config.keypair.clone())
    }

    fn universal_setup(&self, curve: Curve, size: u32, entropy: Option<&[u8]>) -> Result<Srs> {
        lock(&self.calls).universal_setup.push((curve, size));
        self.record_entropy(entropy);
        Ok(self.config.srs.clone())
    }

    fn setup_with_srs(
        &self,
        srs: &Srs,
        _program: &[u8],
        options: &ProviderOptions,
    ) -> Result<SetupKeypair> {
        self.record_options("setup_with_srs", options);
        Self::check_combination(options).map_err(ProviderError::Setup)?;
        if *srs != self.config.srs {
            return Err(ProviderError::Setup("srs does not match".into()));
        }
        Ok(self.config.keypair.clone())
    }

    fn generate_proof(
        &self,
        _program: &[u8],
        witness: &[u8],
        proving_key: &ProvingKey,
        entropy: Option<&[u8]>,
        options: &ProviderOptions,
    ) -> Result<Proof> {
        self.record_options("generate_proof", options);
        self.record_entropy(entropy);
        if *proving_key != self.config.keypair.proving_key {
            return Err(ProviderError::Proof("proving key does not match program".into()));
        }
        if witness != self.config.witness.as_slice() {
            return Err(ProviderError::Proof("witness does not match program".into()));
        }
        Ok(self.config.proof.clone())
    }

    fn verify(
        &self,
        verification_key: &VerificationKey,
        proof: &Proof,
        options: &ProviderOptions,
    ) -> Result<bool> {
        self.record_options("verify", options);
        Self::check_combination(options).map_err(ProviderError::Verify)?;
        Ok(*verification_key == self.config.keypair.verification_key && *proof == self.config.proof)
    }

    fn export_solidity_verifier(&self, verification_key: &VerificationKey) -> Result<String> {
        if verification_key.as_bytes().is_empty() {
            return Err(ProviderError::Export("empty verification key".into()));
        }
        Ok(self.config.solidity_verifier.clone())
    }

    fn format_proof(&self, proof: &Proof) -> Result<Value> {
        Ok(json!({
            "proof": proof.as_bytes(),
            "len": proof.as_bytes().len(),
        }))
    }
}
