//! Import resolution during compilation.
//!
//! The engine calls a [`Resolver`] once per unresolved import it meets,
//! synchronously and in the order the imports appear in the program text.
//! A resolver may therefore run zero, one or many times per `compile` call.

use std::collections::HashMap;

/// Source text returned for a resolved import, together with its location.
///
/// The location becomes the "current location" for imports inside `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub source: String,
    pub location: String,
}

impl ResolvedSource {
    pub fn new(source: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            location: location.into(),
        }
    }
}

/// Resolves `import_path` as written in the file at `current_location`.
///
/// `Ok(None)` means "not found"; the engine turns it into a compile error.
/// `Err` aborts the whole `compile` call without producing an artifact.
pub trait Resolver: Send + Sync {
    fn resolve(
        &self,
        current_location: &str,
        import_path: &str,
    ) -> anyhow::Result<Option<ResolvedSource>>;
}

impl<F> Resolver for F
where
    F: Fn(&str, &str) -> anyhow::Result<Option<ResolvedSource>> + Send + Sync,
{
    fn resolve(
        &self,
        current_location: &str,
        import_path: &str,
    ) -> anyhow::Result<Option<ResolvedSource>> {
        self(current_location, import_path)
    }
}

/// Resolver that never finds anything. Used when the caller supplies none.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl Resolver for NoResolver {
    fn resolve(&self, _: &str, _: &str) -> anyhow::Result<Option<ResolvedSource>> {
        Ok(None)
    }
}

/// In-memory resolver keyed by normalized location.
///
/// Relative import paths (`./x`, `../x`) are joined to the directory of the
/// importing file; other paths are looked up as-is. A missing `.zok`
/// extension is appended before lookup.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    sources: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, location: &str, source: impl Into<String>) -> Self {
        self.sources.insert(normalize(location), source.into());
        self
    }
}

impl Resolver for MemoryResolver {
    fn resolve(
        &self,
        current_location: &str,
        import_path: &str,
    ) -> anyhow::Result<Option<ResolvedSource>> {
        let location = join_location(current_location, import_path);
        Ok(self
            .sources
            .get(&location)
            .map(|source| ResolvedSource::new(source.clone(), location)))
    }
}

/// Location an import refers to, relative to the importing file.
pub fn join_location(current_location: &str, import_path: &str) -> String {
    let is_relative = import_path.starts_with("./") || import_path.starts_with("../");
    if !is_relative {
        return normalize(import_path);
    }
    match current_location.rfind('/') {
        Some(idx) => normalize(&format!("{}/{}", &current_location[..idx], import_path)),
        None => normalize(import_path),
    }
}

/// Collapse `.`/`..` segments and append `.zok` when no extension is present.
fn normalize(location: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in location.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // Keep leading `..` when the path escapes its root.
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }
    let mut joined = segments.join("/");
    let has_extension = segments
        .last()
        .is_some_and(|last| last.contains('.') && *last != "..");
    if !has_extension {
        joined.push_str(".zok");
    }
    joined
}
