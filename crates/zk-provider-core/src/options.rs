//! Option model for every pipeline call.
//!
//! The final option set of a call is resolved from three layers, highest
//! priority first:
//!
//! 1. explicit per-call fields ([`CompileOptions`], [`ComputeWitnessOptions`]),
//! 2. the options a [`Provider`](crate::provider::Provider) was bound to,
//! 3. hard-coded defaults.
//!
//! Backend/scheme/curve combinations are not validated here. The engine owns
//! the set of valid combinations and reports invalid ones as its own errors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::log::{Logger, StdoutLogger};
use crate::resolve::{NoResolver, Resolver};

/// Location reported for the root source when the caller does not name one.
pub const DEFAULT_LOCATION: &str = "main.zok";

/// Name of the compiler flag that requests snarkjs-compatible output.
pub const SNARKJS_FLAG: &str = "snarkjs";

/// Proving backend implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Ark,
    Bellman,
}

/// Proving scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    G16,
    Gm17,
    Marlin,
}

/// Elliptic curve the program's field and the proof system are defined over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Curve {
    #[default]
    #[serde(rename = "bn128")]
    Bn128,
    #[serde(rename = "bls12_381")]
    Bls12_381,
    #[serde(rename = "bls12_377")]
    Bls12_377,
    #[serde(rename = "bw6_761")]
    Bw6_761,
}

/// Error returned when parsing an option name fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionParseError {
    pub option: &'static str,
    pub value: String,
}

impl fmt::Display for OptionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.option, self.value)
    }
}

impl std::error::Error for OptionParseError {}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ark => "ark",
            Self::Bellman => "bellman",
        }
    }
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G16 => "g16",
            Self::Gm17 => "gm17",
            Self::Marlin => "marlin",
        }
    }
}

impl Curve {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bn128 => "bn128",
            Self::Bls12_381 => "bls12_381",
            Self::Bls12_377 => "bls12_377",
            Self::Bw6_761 => "bw6_761",
        }
    }
}

macro_rules! display_and_parse {
    ($ty:ty, $option:literal, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = OptionParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.to_ascii_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str() == lower)
                    .ok_or_else(|| OptionParseError {
                        option: $option,
                        value: s.to_string(),
                    })
            }
        }
    };
}

display_and_parse!(Backend, "backend", [Backend::Ark, Backend::Bellman]);
display_and_parse!(Scheme, "scheme", [Scheme::G16, Scheme::Gm17, Scheme::Marlin]);
display_and_parse!(
    Curve,
    "curve",
    [Curve::Bn128, Curve::Bls12_381, Curve::Bls12_377, Curve::Bw6_761]
);

/// The `{backend, scheme, curve}` triple a provider is bound to.
///
/// Immutable once built: the `with_*` helpers return a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    pub backend: Backend,
    pub scheme: Scheme,
    pub curve: Curve,
}

impl ProviderOptions {
    pub fn new(backend: Backend, scheme: Scheme, curve: Curve) -> Self {
        Self {
            backend,
            scheme,
            curve,
        }
    }

    /// Parse options from a JSON object. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_backend(self, backend: Backend) -> Self {
        Self { backend, ..self }
    }

    pub fn with_scheme(self, scheme: Scheme) -> Self {
        Self { scheme, ..self }
    }

    pub fn with_curve(self, curve: Curve) -> Self {
        Self { curve, ..self }
    }
}

/// Ordered mapping of compiler flags forwarded to the engine.
///
/// Unknown flags are kept and forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompileConfig {
    flags: BTreeMap<String, Value>,
}

impl CompileConfig {
    pub const ISOLATE_BRANCHES: &'static str = "isolate_branches";
    pub const DEBUG: &'static str = "debug";

    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flag, replacing any previous value.
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn with_isolate_branches(self, enabled: bool) -> Self {
        self.with_flag(Self::ISOLATE_BRANCHES, enabled)
    }

    pub fn with_debug(self, enabled: bool) -> Self {
        self.with_flag(Self::DEBUG, enabled)
    }

    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }

    /// `true` only when the flag is present and set to boolean `true`.
    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.flags.get(name), Some(Value::Bool(true)))
    }

    pub fn flags(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The config as forwarded to the engine: every explicit flag is kept,
    /// and `snarkjs` is always taken from the top-level request.
    pub fn with_snarkjs(&self, snarkjs: bool) -> Self {
        self.clone().with_flag(SNARKJS_FLAG, snarkjs)
    }
}

/// Per-call options for `compile`.
#[derive(Clone, Default)]
pub struct CompileOptions {
    /// Overrides the bound curve for this call only.
    pub curve: Option<Curve>,
    /// Location of the root source; defaults to [`DEFAULT_LOCATION`].
    pub location: Option<String>,
    /// Import resolver; defaults to [`NoResolver`].
    pub resolver: Option<Arc<dyn Resolver>>,
    pub config: CompileConfig,
    /// Also produce a snarkjs-compatible program.
    pub snarkjs: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn curve(mut self, curve: Curve) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn config(mut self, config: CompileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn snarkjs(mut self, snarkjs: bool) -> Self {
        self.snarkjs = snarkjs;
        self
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("curve", &self.curve)
            .field("location", &self.location)
            .field("resolver", &self.resolver.as_ref().map(|_| ".."))
            .field("config", &self.config)
            .field("snarkjs", &self.snarkjs)
            .finish()
    }
}

/// Per-call options for `compute_witness`.
#[derive(Clone, Default)]
pub struct ComputeWitnessOptions {
    /// Also produce a snarkjs-compatible witness.
    pub snarkjs: bool,
    /// Sink for log lines emitted by the program; defaults to [`StdoutLogger`].
    pub logger: Option<Arc<dyn Logger>>,
}

impl ComputeWitnessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snarkjs(mut self, snarkjs: bool) -> Self {
        self.snarkjs = snarkjs;
        self
    }

    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn shared_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl fmt::Debug for ComputeWitnessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeWitnessOptions")
            .field("snarkjs", &self.snarkjs)
            .field("logger", &self.logger.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Fully resolved `compile` options, as handed to the engine.
#[derive(Clone)]
pub struct ResolvedCompileOptions {
    pub curve: Curve,
    pub location: String,
    pub resolver: Arc<dyn Resolver>,
    /// Compiler flags with `snarkjs` injected.
    pub config: CompileConfig,
    pub snarkjs: bool,
}

impl ResolvedCompileOptions {
    pub fn resolve(call: CompileOptions, bound: Option<&ProviderOptions>) -> Self {
        let curve = call
            .curve
            .or_else(|| bound.map(|b| b.curve))
            .unwrap_or_default();
        Self {
            curve,
            location: call
                .location
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            resolver: call.resolver.unwrap_or_else(|| Arc::new(NoResolver)),
            config: call.config.with_snarkjs(call.snarkjs),
            snarkjs: call.snarkjs,
        }
    }
}

/// Fully resolved `compute_witness` options.
#[derive(Clone)]
pub struct ResolvedWitnessOptions {
    pub snarkjs: bool,
    pub logger: Arc<dyn Logger>,
}

impl ResolvedWitnessOptions {
    pub fn resolve(call: ComputeWitnessOptions) -> Self {
        Self {
            snarkjs: call.snarkjs,
            logger: call.logger.unwrap_or_else(|| Arc::new(StdoutLogger)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_provider_options() {
        let opts = ProviderOptions::default();
        assert_eq!(opts.backend, Backend::Ark);
        assert_eq!(opts.scheme, Scheme::G16);
        assert_eq!(opts.curve, Curve::Bn128);
    }

    #[test]
    fn test_with_curve_returns_new_value() {
        let original = ProviderOptions::default();
        let rebound = original.with_curve(Curve::Bls12_381);
        assert_eq!(original.curve, Curve::Bn128);
        assert_eq!(rebound.curve, Curve::Bls12_381);
        assert_eq!(rebound.scheme, original.scheme);
    }

    #[test]
    fn test_parse_names_case_insensitive() {
        assert_eq!("BN128".parse::<Curve>().unwrap(), Curve::Bn128);
        assert_eq!("bw6_761".parse::<Curve>().unwrap(), Curve::Bw6_761);
        assert_eq!("Marlin".parse::<Scheme>().unwrap(), Scheme::Marlin);
        assert_eq!("bellman".parse::<Backend>().unwrap(), Backend::Bellman);
        let err = "libsnark".parse::<Backend>().unwrap_err();
        assert_eq!(err.to_string(), "unknown backend: libsnark");
    }

    #[test]
    fn test_from_json_partial() {
        let opts = ProviderOptions::from_json(r#"{"scheme":"marlin","curve":"bls12_377"}"#).unwrap();
        assert_eq!(opts.backend, Backend::Ark);
        assert_eq!(opts.scheme, Scheme::Marlin);
        assert_eq!(opts.curve, Curve::Bls12_377);
        assert_eq!(
            serde_json::to_string(&opts).unwrap(),
            r#"{"backend":"ark","scheme":"marlin","curve":"bls12_377"}"#
        );
    }

    #[test]
    fn test_invalid_combination_is_not_rejected() {
        // bellman has no marlin support; the engine reports that, not the options layer.
        let opts = ProviderOptions::new(Backend::Bellman, Scheme::Marlin, Curve::Bw6_761);
        assert_eq!(opts.scheme, Scheme::Marlin);
    }

    #[test]
    fn test_snarkjs_flag_always_from_top_level() {
        let config = CompileConfig::new()
            .with_flag(SNARKJS_FLAG, true)
            .with_isolate_branches(true);
        let merged = config.with_snarkjs(false);
        assert_eq!(merged.flag(SNARKJS_FLAG), Some(&Value::Bool(false)));
        assert!(merged.is_enabled(CompileConfig::ISOLATE_BRANCHES));
        // the caller's config is left alone
        assert!(config.is_enabled(SNARKJS_FLAG));
    }

    #[test]
    fn test_unknown_flags_are_forwarded() {
        let merged = CompileConfig::new()
            .with_flag("future_flag", "on")
            .with_snarkjs(true);
        let names: Vec<&str> = merged.flags().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["future_flag", SNARKJS_FLAG]);
    }

    #[test]
    fn test_compile_defaults() {
        let resolved = ResolvedCompileOptions::resolve(CompileOptions::default(), None);
        assert_eq!(resolved.curve, Curve::Bn128);
        assert_eq!(resolved.location, DEFAULT_LOCATION);
        assert!(!resolved.snarkjs);
        assert_eq!(resolved.config.flag(SNARKJS_FLAG), Some(&Value::Bool(false)));
        assert!(resolved.resolver.resolve("main.zok", "./lib").unwrap().is_none());
    }

    #[test]
    fn test_compile_precedence_call_over_bound() {
        let bound = ProviderOptions::default().with_curve(Curve::Bls12_381);

        let from_bound = ResolvedCompileOptions::resolve(CompileOptions::new(), Some(&bound));
        assert_eq!(from_bound.curve, Curve::Bls12_381);

        let from_call =
            ResolvedCompileOptions::resolve(CompileOptions::new().curve(Curve::Bw6_761), Some(&bound));
        assert_eq!(from_call.curve, Curve::Bw6_761);
    }

    #[test]
    fn test_witness_defaults() {
        let resolved = ResolvedWitnessOptions::resolve(ComputeWitnessOptions::default());
        assert!(!resolved.snarkjs);
    }
}
