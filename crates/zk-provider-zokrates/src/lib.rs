//! ZoKrates engine for zk-provider.
//!
//! Drives the [`zokrates`](https://zokrates.github.io/) command-line toolchain:
//! `compile`, `compute-witness`, `setup`, `universal-setup`, `generate-proof`,
//! `verify`, `export-verifier` and `print-proof`. Every call runs in its own
//! scratch directory. Handles returned by `compile` and `compute_witness` own
//! that directory and delete it on release; all other calls clean up before
//! returning.
//!
//! **Prerequisites**: `zokrates` on `PATH`, or `ZOKRATES_BIN` pointing at it.

mod command;
mod handles;
mod sources;
pub mod witness;

use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

use zk_provider_core::artifacts::{
    Abi, Proof, ProvingKey, SetupKeypair, Srs, VerificationKey,
};
use zk_provider_core::engine::{Engine, WitnessConfig};
use zk_provider_core::error::{ProviderError, Result};
use zk_provider_core::log::Logger;
use zk_provider_core::options::{CompileConfig, Curve, ProviderOptions, Scheme, SNARKJS_FLAG};
use zk_provider_core::resolve::Resolver;

pub use handles::{ZokratesCompileHandle, ZokratesWitnessHandle};

const PROGRAM: &str = "out";
const ABI: &str = "abi.json";
const R1CS: &str = "out.r1cs";
const WITNESS: &str = "witness";
const CIRCOM_WITNESS: &str = "out.wtns";
const PROVING_KEY: &str = "proving.key";
const VERIFICATION_KEY: &str = "verification.key";
const UNIVERSAL_SETUP: &str = "universal_setup.dat";
const PROOF: &str = "proof.json";
const VERIFIER: &str = "verifier.sol";

/// `CompileConfig` flags with a CLI counterpart.
const SUPPORTED_FLAGS: &[&str] = &[
    SNARKJS_FLAG,
    CompileConfig::ISOLATE_BRANCHES,
    CompileConfig::DEBUG,
];

/// Lines `compute-witness` prints about itself rather than on behalf of the program.
const STATUS_PREFIXES: &[&str] = &["Computing witness", "Witness file written"];

/// Where to find the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZokratesConfig {
    /// The `zokrates` executable.
    pub binary: PathBuf,
    /// Standard library root passed as `--stdlib-path`.
    pub stdlib_path: Option<PathBuf>,
}

impl Default for ZokratesConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("zokrates"),
            stdlib_path: None,
        }
    }
}

impl ZokratesConfig {
    pub const BIN_ENV: &'static str = "ZOKRATES_BIN";
    pub const STDLIB_ENV: &'static str = "ZOKRATES_STDLIB";

    /// Read `ZOKRATES_BIN` and `ZOKRATES_STDLIB`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            binary: std::env::var_os(Self::BIN_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.binary),
            stdlib_path: std::env::var_os(Self::STDLIB_ENV).map(PathBuf::from),
        }
    }
}

/// [`Engine`] backed by the `zokrates` CLI.
#[derive(Debug, Clone, Default)]
pub struct ZokratesEngine {
    config: ZokratesConfig,
}

impl ZokratesEngine {
    pub fn new(config: ZokratesConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(ZokratesConfig::from_env())
    }

    pub fn config(&self) -> &ZokratesConfig {
        &self.config
    }

    /// Check that the `zokrates` executable can be found.
    pub fn check_prerequisites(&self) -> Result<()> {
        which::which(&self.config.binary)
            .map(|_| ())
            .map_err(|_| ProviderError::MissingTool {
                name: self.config.binary.display().to_string(),
                install: command::INSTALL_HINT.into(),
            })
    }

    fn run(
        &self,
        dir: &Path,
        args: &[String],
        stdin: Option<&str>,
        fail: fn(String) -> ProviderError,
    ) -> Result<String> {
        command::run(&self.config.binary, dir, args, stdin, fail)
    }
}

fn scratch() -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix("zk-provider-").tempdir()?)
}

fn entropy_args(args: &mut Vec<String>, entropy: Option<&[u8]>) {
    if let Some(entropy) = entropy {
        args.push("--entropy".into());
        args.push(hex::encode(entropy));
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// `zokrates compile` arguments. Only `isolate_branches` and `debug` map to
/// CLI switches; `snarkjs` selects the r1cs output.
pub fn compile_args(
    root: &Path,
    config: &CompileConfig,
    curve: Curve,
    stdlib_path: Option<&Path>,
) -> Vec<String> {
    let mut args = strings(&["compile", "--input"]);
    args.push(root.display().to_string());
    args.extend(strings(&[
        "--output",
        PROGRAM,
        "--abi-spec",
        ABI,
        "--curve",
        curve.as_str(),
    ]));
    if config.is_enabled(SNARKJS_FLAG) {
        args.extend(strings(&["--r1cs", R1CS]));
    }
    if config.is_enabled(CompileConfig::ISOLATE_BRANCHES) {
        args.push("--isolate-branches".into());
    }
    if config.is_enabled(CompileConfig::DEBUG) {
        args.push("--debug".into());
    }
    for (name, _) in config.flags() {
        if !SUPPORTED_FLAGS.contains(&name) {
            tracing::debug!(flag = name, "compiler flag not supported by zokrates CLI");
        }
    }
    if let Some(stdlib) = stdlib_path {
        args.push("--stdlib-path".into());
        args.push(stdlib.display().to_string());
    }
    args
}

/// `zokrates compute-witness` arguments and the stdin payload, if any.
pub fn witness_args(
    abi: Option<&Abi>,
    args_json: &str,
    config: &WitnessConfig,
) -> Result<(Vec<String>, Option<String>)> {
    let mut args = strings(&["compute-witness", "--input", PROGRAM, "--output", WITNESS]);
    let stdin = match abi {
        Some(_) => {
            args.extend(strings(&["--abi-spec", ABI, "--abi", "--stdin"]));
            Some(args_json.to_string())
        }
        None => {
            let values = witness::flatten_args(args_json)?;
            if !values.is_empty() {
                args.push("--arguments".into());
                args.extend(values);
            }
            None
        }
    };
    if config.snarkjs {
        args.extend(strings(&["--circom-witness", CIRCOM_WITNESS]));
    }
    Ok((args, stdin))
}

/// Interpret `zokrates verify` output.
pub fn verification_outcome(stdout: &str, stderr: &str) -> Option<bool> {
    let text = format!("{stdout}\n{stderr}");
    if text.contains("PASSED") {
        Some(true)
    } else if text.contains("FAILED") {
        Some(false)
    } else {
        None
    }
}

/// Parse `print-proof` output. The JSON format prints one value; anything
/// else is wrapped as a list or, failing that, kept as text.
pub fn parse_formatted_proof(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    serde_json::from_str(trimmed)
        .or_else(|_| serde_json::from_str(&format!("[{trimmed}]")))
        .unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

impl Engine for ZokratesEngine {
    type Compiled = ZokratesCompileHandle;
    type Witness = ZokratesWitnessHandle;

    fn name(&self) -> &'static str {
        "zokrates"
    }

    fn compile(
        &self,
        source: &str,
        location: &str,
        resolver: &dyn Resolver,
        config: &CompileConfig,
        curve: Curve,
    ) -> Result<Self::Compiled> {
        let dir = scratch()?;
        let root = sources::SourceTree::new(dir.path(), resolver).write_root(source, location)?;
        let args = compile_args(&root, config, curve, self.config.stdlib_path.as_deref());
        self.run(dir.path(), &args, None, ProviderError::Compile)?;

        let r1cs = config
            .is_enabled(SNARKJS_FLAG)
            .then(|| PathBuf::from(R1CS));
        Ok(ZokratesCompileHandle::new(
            dir,
            PathBuf::from(PROGRAM),
            PathBuf::from(ABI),
            r1cs,
        ))
    }

    fn compute_witness(
        &self,
        program: &[u8],
        abi: Option<&Abi>,
        args: &str,
        config: &WitnessConfig,
        logger: &dyn Logger,
    ) -> Result<Self::Witness> {
        let dir = scratch()?;
        std::fs::write(dir.path().join(PROGRAM), program)?;
        if let Some(abi) = abi {
            let json = serde_json::to_vec(abi)
                .map_err(|e| ProviderError::Witness(format!("unwritable abi: {e}")))?;
            std::fs::write(dir.path().join(ABI), json)?;
        }

        let (cli_args, stdin) = witness_args(abi, args, config)?;
        let stdout = self.run(dir.path(), &cli_args, stdin.as_deref(), ProviderError::Witness)?;
        for line in stdout.lines() {
            if !STATUS_PREFIXES.iter().any(|p| line.starts_with(p)) {
                logger.log(line);
            }
        }

        let circom_witness = config.snarkjs.then(|| PathBuf::from(CIRCOM_WITNESS));
        Ok(ZokratesWitnessHandle::new(
            dir,
            PathBuf::from(WITNESS),
            abi.cloned(),
            circom_witness,
        ))
    }

    fn setup(
        &self,
        program: &[u8],
        entropy: Option<&[u8]>,
        options: &ProviderOptions,
    ) -> Result<SetupKeypair> {
        let dir = scratch()?;
        std::fs::write(dir.path().join(PROGRAM), program)?;
        let mut args = setup_args(options);
        entropy_args(&mut args, entropy);
        self.run(dir.path(), &args, None, ProviderError::Setup)?;
        read_keypair(dir.path())
    }

    fn universal_setup(&self, curve: Curve, size: u32, entropy: Option<&[u8]>) -> Result<Srs> {
        let dir = scratch()?;
        let mut args = strings(&["universal-setup", "--curve", curve.as_str()]);
        args.extend(strings(&["--proving-scheme", Scheme::Marlin.as_str()]));
        args.extend(["--size".to_string(), size.to_string()]);
        args.extend(strings(&["--universal-setup-path", UNIVERSAL_SETUP]));
        entropy_args(&mut args, entropy);
        self.run(dir.path(), &args, None, ProviderError::Setup)?;
        Ok(Srs(std::fs::read(dir.path().join(UNIVERSAL_SETUP))?))
    }

    fn setup_with_srs(
        &self,
        srs: &Srs,
        program: &[u8],
        options: &ProviderOptions,
    ) -> Result<SetupKeypair> {
        let dir = scratch()?;
        std::fs::write(dir.path().join(PROGRAM), program)?;
        std::fs::write(dir.path().join(UNIVERSAL_SETUP), srs.as_bytes())?;
        let mut args = setup_args(options);
        args.extend(strings(&["--universal-setup-path", UNIVERSAL_SETUP]));
        self.run(dir.path(), &args, None, ProviderError::Setup)?;
        read_keypair(dir.path())
    }

    fn generate_proof(
        &self,
        program: &[u8],
        witness: &[u8],
        proving_key: &ProvingKey,
        entropy: Option<&[u8]>,
        options: &ProviderOptions,
    ) -> Result<Proof> {
        let dir = scratch()?;
        std::fs::write(dir.path().join(PROGRAM), program)?;
        std::fs::write(dir.path().join(WITNESS), witness)?;
        std::fs::write(dir.path().join(PROVING_KEY), proving_key.as_bytes())?;
        let mut args = strings(&[
            "generate-proof",
            "--input",
            PROGRAM,
            "--witness",
            WITNESS,
            "--proving-key-path",
            PROVING_KEY,
            "--proof-path",
            PROOF,
            "--backend",
            options.backend.as_str(),
            "--proving-scheme",
            options.scheme.as_str(),
        ]);
        entropy_args(&mut args, entropy);
        self.run(dir.path(), &args, None, ProviderError::Proof)?;
        Ok(Proof(std::fs::read(dir.path().join(PROOF))?))
    }

    fn verify(
        &self,
        verification_key: &VerificationKey,
        proof: &Proof,
        options: &ProviderOptions,
    ) -> Result<bool> {
        let dir = scratch()?;
        std::fs::write(dir.path().join(VERIFICATION_KEY), verification_key.as_bytes())?;
        std::fs::write(dir.path().join(PROOF), proof.as_bytes())?;
        let args = strings(&[
            "verify",
            "--verification-key-path",
            VERIFICATION_KEY,
            "--proof-path",
            PROOF,
            "--backend",
            options.backend.as_str(),
        ]);
        let output =
            command::run_raw(&self.config.binary, dir.path(), &args, None, ProviderError::Verify)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        verification_outcome(&stdout, &stderr).ok_or_else(|| {
            ProviderError::Verify(format!("zokrates verify: {}", stderr.trim()))
        })
    }

    fn export_solidity_verifier(&self, verification_key: &VerificationKey) -> Result<String> {
        let dir = scratch()?;
        std::fs::write(dir.path().join(VERIFICATION_KEY), verification_key.as_bytes())?;
        let args = strings(&[
            "export-verifier",
            "--input",
            VERIFICATION_KEY,
            "--output",
            VERIFIER,
        ]);
        self.run(dir.path(), &args, None, ProviderError::Export)?;
        Ok(std::fs::read_to_string(dir.path().join(VERIFIER))?)
    }

    fn format_proof(&self, proof: &Proof) -> Result<Value> {
        let dir = scratch()?;
        std::fs::write(dir.path().join(PROOF), proof.as_bytes())?;
        let args = strings(&["print-proof", "--proof-path", PROOF, "--format", "json"]);
        let stdout = self.run(dir.path(), &args, None, ProviderError::Format)?;
        Ok(parse_formatted_proof(&stdout))
    }
}

fn setup_args(options: &ProviderOptions) -> Vec<String> {
    strings(&[
        "setup",
        "--input",
        PROGRAM,
        "--proving-key-path",
        PROVING_KEY,
        "--verification-key-path",
        VERIFICATION_KEY,
        "--backend",
        options.backend.as_str(),
        "--proving-scheme",
        options.scheme.as_str(),
    ])
}

fn read_keypair(dir: &Path) -> Result<SetupKeypair> {
    Ok(SetupKeypair {
        verification_key: VerificationKey(std::fs::read(dir.join(VERIFICATION_KEY))?),
        proving_key: ProvingKey(std::fs::read(dir.join(PROVING_KEY))?),
    })
}
