//! Handles over CLI output files.
//!
//! A handle owns the scratch directory the CLI wrote into. Extraction reads
//! the files; release deletes the directory.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

use zk_provider_core::artifacts::Abi;
use zk_provider_core::error::{ProviderError, Result};
use zk_provider_core::handle::{CompileHandle, EngineHandle, WitnessHandle};

use crate::witness;

/// Scratch directory that can be deleted once.
#[derive(Debug)]
struct Scratch {
    operation: &'static str,
    dir: Option<TempDir>,
}

impl Scratch {
    fn new(operation: &'static str, dir: TempDir) -> Self {
        Self {
            operation,
            dir: Some(dir),
        }
    }

    fn path(&self, file: &Path) -> Result<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.path().join(file))
            .ok_or_else(|| ProviderError::Resource {
                operation: self.operation,
                detail: format!("{} read after release", file.display()),
            })
    }

    fn read(&self, file: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.path(file)?)?)
    }

    fn read_optional(&self, file: Option<&Path>, field: &str) -> Result<Vec<u8>> {
        match file {
            Some(file) => self.read(file),
            None => Err(ProviderError::Resource {
                operation: self.operation,
                detail: format!("{field} was not requested"),
            }),
        }
    }

    fn release(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("failed to remove {}: {e}", path.display());
            }
        }
    }
}

/// Output of `zokrates compile`.
#[derive(Debug)]
pub struct ZokratesCompileHandle {
    scratch: Scratch,
    program: PathBuf,
    abi: PathBuf,
    r1cs: Option<PathBuf>,
}

impl ZokratesCompileHandle {
    pub(crate) fn new(dir: TempDir, program: PathBuf, abi: PathBuf, r1cs: Option<PathBuf>) -> Self {
        Self {
            scratch: Scratch::new("compile", dir),
            program,
            abi,
            r1cs,
        }
    }
}

impl EngineHandle for ZokratesCompileHandle {
    fn release(&mut self) {
        self.scratch.release();
    }
}

impl CompileHandle for ZokratesCompileHandle {
    fn program(&self) -> Result<Vec<u8>> {
        self.scratch.read(&self.program)
    }

    fn abi(&self) -> Result<Abi> {
        let bytes = self.scratch.read(&self.abi)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Compile(format!("unreadable abi.json: {e}")))
    }

    fn snarkjs_program(&self) -> Result<Vec<u8>> {
        self.scratch.read_optional(self.r1cs.as_deref(), "snarkjs program")
    }
}

/// Output of `zokrates compute-witness`.
#[derive(Debug)]
pub struct ZokratesWitnessHandle {
    scratch: Scratch,
    witness: PathBuf,
    abi: Option<Abi>,
    circom_witness: Option<PathBuf>,
}

impl ZokratesWitnessHandle {
    pub(crate) fn new(
        dir: TempDir,
        witness: PathBuf,
        abi: Option<Abi>,
        circom_witness: Option<PathBuf>,
    ) -> Self {
        Self {
            scratch: Scratch::new("compute_witness", dir),
            witness,
            abi,
            circom_witness,
        }
    }
}

impl EngineHandle for ZokratesWitnessHandle {
    fn release(&mut self) {
        self.scratch.release();
    }
}

impl WitnessHandle for ZokratesWitnessHandle {
    fn witness(&self) -> Result<Vec<u8>> {
        self.scratch.read(&self.witness)
    }

    fn output(&self) -> Result<Value> {
        let bytes = self.scratch.read(&self.witness)?;
        let raw = witness::parse_outputs(&String::from_utf8_lossy(&bytes))?;
        witness::decode_output(raw, self.abi.as_ref())
    }

    fn snarkjs_witness(&self) -> Result<Vec<u8>> {
        self.scratch
            .read_optional(self.circom_witness.as_deref(), "snarkjs witness")
    }
}
