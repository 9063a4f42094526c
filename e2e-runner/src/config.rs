// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the e2e harness.
//!
//! The embedded [`HarnessConfig::DEFAULT_CONFIG`] is always read first. A repository config
//! (`.config/e2e.toml` in the workspace root, or an explicitly specified file) is layered on top of
//! it.

use crate::errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::{Deserialize, de::IntoDeserializer};
use std::{collections::BTreeMap, time::Duration};
use tracing::warn;

/// Overall configuration for the harness.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    workspace_root: Utf8PathBuf,
    toolchain: ToolchainConfig,
    layout: LayoutConfig,
    expectations: ExpectationConfig,
    default_profile: DefaultProfileImpl,
    other_profiles: BTreeMap<String, ProfileImpl>,
}

impl HarnessConfig {
    /// The default location of the config within the workspace root: `.config/e2e.toml`.
    pub const CONFIG_PATH: &'static str = ".config/e2e.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the config from the given file, or if not specified from `.config/e2e.toml` in the
    /// workspace root.
    ///
    /// If the file isn't specified and the workspace root doesn't have `.config/e2e.toml`, uses the
    /// default config options.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in `{config_file}`: {}",
                unknown.iter().join(", ")
            );
        }

        Self::from_deserialized(workspace_root, config)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))
    }

    /// Returns the workspace root. Relative paths in the config are resolved against it, and all
    /// toolchain processes are run from it.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Returns the toolchain configuration.
    pub fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the expectation configuration.
    pub fn expectations(&self) -> &ExpectationConfig {
        &self.expectations
    }

    /// Returns the absolute test directory.
    pub fn test_dir(&self) -> Utf8PathBuf {
        self.workspace_root.join(&self.layout.test_dir)
    }

    /// Returns the absolute support library directory.
    pub fn support_lib_dir(&self) -> Utf8PathBuf {
        self.workspace_root.join(&self.layout.support_lib_dir)
    }

    /// Returns the absolute directory the compiler writes assembly artifacts into.
    pub fn compiler_output_dir(&self) -> Utf8PathBuf {
        self.workspace_root
            .join(&self.toolchain.compiler_output_dir)
    }

    /// Returns the profile with the given name, or an error if a profile was specified but not
    /// found.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<HarnessProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = if name == Self::DEFAULT_PROFILE {
            None
        } else {
            Some(self.other_profiles.get(name).ok_or_else(|| {
                ProfileNotFound::new(
                    name,
                    std::iter::once(Self::DEFAULT_PROFILE)
                        .chain(self.other_profiles.keys().map(|s| s.as_str())),
                )
            })?)
        };

        let store_root = self.workspace_root.join(&self.layout.store_dir);
        let store_dir = store_root.join(name);

        Ok(HarnessProfile {
            name: name.to_owned(),
            store_root,
            store_dir,
            default_profile: &self.default_profile,
            custom_profile,
        })
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(HarnessConfigDeserialize, Vec<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = Vec::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: HarnessConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already reports the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }

    fn from_deserialized(
        workspace_root: Utf8PathBuf,
        config: HarnessConfigDeserialize,
    ) -> Result<Self, ConfigParseErrorKind> {
        let HarnessConfigDeserialize {
            mut toolchain,
            layout,
            expectations,
            mut profiles,
        } = config;

        toolchain.compiler = resolve_program(&workspace_root, &toolchain.compiler);
        toolchain.assembler = resolve_program(&workspace_root, &toolchain.assembler);
        toolchain.linker = resolve_program(&workspace_root, &toolchain.linker);

        let default_profile = profiles
            .remove(Self::DEFAULT_PROFILE)
            .unwrap_or_default();
        let default_profile = DefaultProfileImpl::new(default_profile)?;

        Ok(Self {
            workspace_root,
            toolchain,
            layout,
            expectations,
            default_profile,
            other_profiles: profiles,
        })
    }
}

/// Resolves a relative program path containing a separator against the workspace root.
///
/// Bare program names such as `ld` are left alone so they're looked up in `PATH`.
fn resolve_program(workspace_root: &Utf8Path, program: &str) -> String {
    let path = Utf8Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        workspace_root.join(path).into_string()
    } else {
        program.to_owned()
    }
}

/// The external toolchain invoked by the pipeline.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolchainConfig {
    /// The compiler under test.
    pub compiler: String,

    /// The directory the compiler writes assembly artifacts into, relative to the workspace root.
    pub compiler_output_dir: Utf8PathBuf,

    /// The assembler, invoked once per assembly artifact.
    pub assembler: String,

    /// Arguments passed to the assembler before the artifact.
    pub assembler_args: Vec<String>,

    /// The linker, invoked once per test case.
    pub linker: String,

    /// Arguments passed to the linker before `-o <executable> <objects...>`.
    pub linker_args: Vec<String>,

    /// The file name of the linked executable inside the output store.
    pub executable_name: String,
}

/// Where test cases, the support library and output stores live, and how files are recognized.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LayoutConfig {
    /// The test directory, relative to the workspace root.
    pub test_dir: Utf8PathBuf,

    /// The support library directory, relative to the workspace root.
    pub support_lib_dir: Utf8PathBuf,

    /// The root of all output stores, relative to the workspace root.
    pub store_dir: Utf8PathBuf,

    /// The extension of source files, without the leading dot.
    pub source_extension: String,

    /// The extension of assembly artifacts emitted by the compiler.
    pub assembly_extension: String,

    /// The extension of object artifacts emitted by the assembler.
    pub object_extension: String,

    /// A source file containing this string is its test case's entry file.
    pub entry_marker: String,
}

/// Naming conventions for expectations.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExpectationConfig {
    /// Suffix of the expected return code side file.
    pub return_code_suffix: String,

    /// Suffix of the expected stdout side file.
    pub stdout_suffix: String,

    /// Test case names containing this marker must be rejected by the compiler.
    pub reject_marker: String,

    /// The compiler exit code expected for rejected test cases.
    pub reject_status: i32,
}

/// A profile, containing settings for how a run should be performed.
#[derive(Clone, Debug)]
pub struct HarnessProfile<'cfg> {
    name: String,
    store_root: Utf8PathBuf,
    store_dir: Utf8PathBuf,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg ProfileImpl>,
}

impl<'cfg> HarnessProfile<'cfg> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the absolute directory holding the stores of every profile.
    pub fn store_root(&self) -> &Utf8Path {
        &self.store_root
    }

    /// Returns the absolute profile-specific store directory. Each test case gets its own output
    /// store underneath it.
    pub fn store_dir(&self) -> &Utf8Path {
        &self.store_dir
    }

    /// Returns true if the run should be cancelled after the first failing test case.
    pub fn fail_fast(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.fail_fast)
            .unwrap_or(self.default_profile.fail_fast)
    }

    /// Returns the per-stage timeout, if any.
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.custom_profile
            .and_then(|profile| profile.stage_timeout)
            .unwrap_or(self.default_profile.stage_timeout)
    }

    /// Returns the JUnit configuration, if a JUnit report should be written.
    pub fn junit(&self) -> Option<JunitConfig<'cfg>> {
        let custom = self.custom_profile.map(|profile| &profile.junit);
        let default = &self.default_profile.junit;

        let path = custom
            .and_then(|custom| custom.path.as_deref())
            .or(default.path.as_deref())?;
        let report_name = custom
            .and_then(|custom| custom.report_name.as_deref())
            .unwrap_or(&default.report_name);
        let store_failure_output = custom
            .and_then(|custom| custom.store_failure_output)
            .unwrap_or(default.store_failure_output);

        Some(JunitConfig {
            path: self.store_dir.join(path),
            report_name,
            store_failure_output,
        })
    }
}

/// JUnit configuration stored within a profile.
#[derive(Clone, Debug)]
pub struct JunitConfig<'cfg> {
    path: Utf8PathBuf,
    report_name: &'cfg str,
    store_failure_output: bool,
}

impl<'cfg> JunitConfig<'cfg> {
    /// Returns the absolute path to the JUnit report.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the name of the JUnit report.
    pub fn report_name(&self) -> &'cfg str {
        self.report_name
    }

    /// Returns true if captured output of failing test cases should be stored.
    pub fn store_failure_output(&self) -> bool {
        self.store_failure_output
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HarnessConfigDeserialize {
    toolchain: ToolchainConfig,
    layout: LayoutConfig,
    expectations: ExpectationConfig,
    #[serde(default, rename = "profile")]
    profiles: BTreeMap<String, ProfileImpl>,
}

// The default profile has every field defined on it.
#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    fail_fast: bool,
    stage_timeout: Option<Duration>,
    junit: DefaultJunitImpl,
}

impl DefaultProfileImpl {
    fn new(data: ProfileImpl) -> Result<Self, ConfigParseErrorKind> {
        let missing = |key| ConfigParseErrorKind::MissingDefaultKey { key };
        Ok(Self {
            fail_fast: data.fail_fast.ok_or_else(|| missing("fail-fast"))?,
            stage_timeout: data.stage_timeout.ok_or_else(|| missing("stage-timeout"))?,
            junit: DefaultJunitImpl {
                path: data.junit.path,
                report_name: data
                    .junit
                    .report_name
                    .ok_or_else(|| missing("junit.report-name"))?,
                store_failure_output: data
                    .junit
                    .store_failure_output
                    .ok_or_else(|| missing("junit.store-failure-output"))?,
            },
        })
    }
}

#[derive(Clone, Debug)]
struct DefaultJunitImpl {
    path: Option<Utf8PathBuf>,
    report_name: String,
    store_failure_output: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ProfileImpl {
    #[serde(default)]
    fail_fast: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_stage_timeout")]
    stage_timeout: Option<Option<Duration>>,
    #[serde(default)]
    junit: JunitImpl,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JunitImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    #[serde(default)]
    report_name: Option<String>,
    #[serde(default)]
    store_failure_output: Option<bool>,
}

/// Deserializes `stage-timeout`: the empty string disables the timeout, anything else is parsed
/// as a humantime duration. The outer `Option` is `None` if the key is absent.
fn deserialize_stage_timeout<'de, D>(deserializer: D) -> Result<Option<Option<Duration>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        Ok(Some(None))
    } else {
        let period: Duration = humantime_serde::deserialize(value.as_str().into_deserializer())?;
        Ok(Some(Some(period)))
    }
}
