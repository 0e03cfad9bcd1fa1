//! Writes a program and its resolved imports into a scratch directory.
//!
//! The CLI resolves imports from the filesystem, so every import the caller's
//! resolver knows about is written out as `src_<n>.zok` and the import path in
//! the importing file is rewritten to point at it. Imports the resolver does
//! not know are left as written; the CLI then looks them up itself (e.g. in
//! the standard library) and reports a compile error if that fails too.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use zk_provider_core::error::{ProviderError, Result};
use zk_provider_core::imports::scan_imports;
use zk_provider_core::resolve::Resolver;

pub struct SourceTree<'a> {
    dir: &'a Path,
    resolver: &'a dyn Resolver,
    /// Location -> file stem, so each location is written once.
    written: HashMap<String, String>,
}

impl<'a> SourceTree<'a> {
    pub fn new(dir: &'a Path, resolver: &'a dyn Resolver) -> Self {
        Self {
            dir,
            resolver,
            written: HashMap::new(),
        }
    }

    /// Write the root source and everything it imports. Returns the root file.
    pub fn write_root(mut self, source: &str, location: &str) -> Result<PathBuf> {
        let stem = self.write_unit(source, location)?;
        Ok(self.dir.join(format!("{stem}.zok")))
    }

    fn write_unit(&mut self, source: &str, location: &str) -> Result<String> {
        if let Some(stem) = self.written.get(location) {
            return Ok(stem.clone());
        }
        let stem = format!("src_{}", self.written.len());
        // Registered before recursing so import cycles terminate.
        self.written.insert(location.to_string(), stem.clone());

        let mut rewritten = String::with_capacity(source.len());
        let mut copied_to = 0;
        for import in scan_imports(source) {
            let resolved = self
                .resolver
                .resolve(location, &import.path)
                .map_err(|source| ProviderError::Callback {
                    operation: "compile",
                    callback: "resolver",
                    source,
                })?;
            let Some(resolved) = resolved else {
                tracing::debug!(location, import = %import.path, "import left to zokrates");
                continue;
            };
            let target = self.write_unit(&resolved.source, &resolved.location)?;
            rewritten.push_str(&source[copied_to..import.span.start]);
            rewritten.push_str("./");
            rewritten.push_str(&target);
            copied_to = import.span.end;
        }
        rewritten.push_str(&source[copied_to..]);

        std::fs::write(self.dir.join(format!("{stem}.zok")), rewritten)?;
        Ok(stem)
    }
}
