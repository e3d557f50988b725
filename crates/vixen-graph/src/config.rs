//! Configuration loading.
//!
//! [`BenchmarkConfig`] is the top-level document a benchmark run loads:
//! execution frame counts, named loops, scenes, memory limits, frame-sync
//! settings, and harness-facing timing knobs. This module provides the
//! generic load/save machinery `BenchmarkConfig` (and any other
//! [`Config`] type) rides on, dispatching `.json`/`.toml`/`.ron` by
//! extension.

pub use serde::{Deserialize, Serialize};

/// Trait for types that can round-trip through a config file on disk.
///
/// Dispatches on file extension: `.json`, `.toml`, or `.ron`.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a file, inferring format from its extension.
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to a file, inferring format from its extension.
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".json") {
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Errors produced while loading or saving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Underlying filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document could not be parsed in its inferred format.
    #[error("parse error: {0}")]
    Parse(String),

    /// The value could not be serialized in its inferred format.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// The file extension did not match any supported format.
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Top-level benchmark/loop configuration document (spec §6
/// "Configuration"). Every field is optional in the source JSON; absent
/// keys fall back to the `Default` impls below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Warmup/measurement frame counts and iteration count.
    pub execution: ExecutionConfig,
    /// Named fixed/variable-step loops to register with the loop manager.
    pub loops: Vec<LoopConfig>,
    /// Scene descriptions for benchmark scenarios.
    pub scenes: Vec<SceneConfig>,
    /// Soft/hard device and host memory budgets.
    pub limits: LimitsConfig,
    /// Frame-in-flight and presentation sync settings.
    pub sync: SyncConfig,
    /// Benchmark-harness-facing knobs; unused by the graph core itself.
    pub timing: TimingConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            loops: Vec::new(),
            scenes: Vec::new(),
            limits: LimitsConfig::default(),
            sync: SyncConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Config for BenchmarkConfig {}

/// `execution.*` keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Frames run before measurement begins.
    pub warmup_frames: u32,
    /// Frames measured after warmup.
    pub measurement_frames: u32,
    /// Number of times to repeat the measured run.
    pub iterations: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { warmup_frames: 100, measurement_frames: 300, iterations: 1 }
    }
}

/// One entry of `loops[]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopConfig {
    /// Stable loop name, used to look it up via `getLoopReference`.
    pub name: String,
    /// `0` selects a variable-step loop; otherwise the fixed timestep in seconds.
    #[serde(default)]
    pub fixed_timestep: f64,
    /// Catch-up behavior when the accumulator outpaces `fixed_timestep`.
    #[serde(default)]
    pub catchup_mode: crate::loop_manager::CatchupMode,
    /// Upper bound on one tick's clamped delta.
    #[serde(default = "default_max_catchup_time")]
    pub max_catchup_time: f64,
}

fn default_max_catchup_time() -> f64 {
    0.25
}

/// One entry of `scenes[]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SceneConfig {
    /// Scene kind identifier, interpreted by whatever benchmark harness reads this.
    #[serde(rename = "type")]
    pub kind: String,
    /// Target resolution, e.g. `[1920, 1080]`.
    pub resolution: [u32; 2],
    /// Relative scene density/complexity knob.
    pub density: f32,
}

/// `limits.*` keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Device-local (VRAM) budget in bytes.
    pub device_budget_bytes: u64,
    /// Host-visible budget in bytes.
    pub host_budget_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { device_budget_bytes: 512 * 1024 * 1024, host_budget_bytes: 256 * 1024 * 1024 }
    }
}

/// `sync.*` keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of frame slots in the ring, clamped to `1..=4` (spec §4.9).
    pub frames_in_flight: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { frames_in_flight: 2 }
    }
}

/// `timing.*` keys. Read only by the (non-goal) outer benchmark harness;
/// the graph core never inspects these.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Skip Vulkan validation layers for the run.
    pub no_validation: bool,
    /// Shorten warmup/measurement frame counts for a fast smoke run.
    pub quick: bool,
    /// Directory results are written to.
    pub output_dir: String,
    /// Human-readable label for whoever ran this pass, at least 2 characters.
    pub tester_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Sample {
        budget_bytes: u64,
        name: String,
    }

    impl Config for Sample {}

    #[test]
    fn json_round_trip() {
        let dir = std::env::temp_dir().join("vixen-graph-config-test.json");
        let path = dir.to_str().unwrap().to_string();
        let original = Sample { budget_bytes: 4096, name: "frame".into() };
        original.save_to_file(&path).unwrap();
        let loaded = Sample::load_from_file(&path).unwrap();
        assert_eq!(original, loaded);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unsupported_extension_errors() {
        let err = Sample::load_from_file("graph.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn benchmark_config_empty_json_uses_documented_defaults() {
        let parsed: BenchmarkConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.execution.warmup_frames, 100);
        assert_eq!(parsed.execution.measurement_frames, 300);
        assert_eq!(parsed.sync.frames_in_flight, 2);
        assert!(parsed.loops.is_empty());
    }

    #[test]
    fn benchmark_config_partial_json_overrides_only_named_keys() {
        let parsed: BenchmarkConfig = serde_json::from_str(r#"{"sync": {"frames_in_flight": 3}}"#).unwrap();
        assert_eq!(parsed.sync.frames_in_flight, 3);
        assert_eq!(parsed.execution.warmup_frames, 100);
    }

    #[test]
    fn benchmark_config_timing_keys_round_trip() {
        let parsed: BenchmarkConfig =
            serde_json::from_str(r#"{"timing": {"quick": true, "tester_name": "ci"}}"#).unwrap();
        assert!(parsed.timing.quick);
        assert!(!parsed.timing.no_validation);
        assert_eq!(parsed.timing.tester_name, "ci");
    }
}
