//! Configuration loading via `ortho-config` and build preparation.
//!
//! [`BuilderConfig`] holds the raw options exactly as the caller supplied
//! them. [`BuilderConfig::prepare`] applies defaults, parses durations,
//! renders the snapshot name, and validates the whole set, producing an
//! immutable [`BuildConfig`].

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::client::BootSource;

mod duration;
mod error;
mod template;

pub use duration::{DurationError, parse_duration};
pub use error::{ConfigError, ValidationErrors};
pub use template::{TemplateContext, TemplateError, render as render_template};

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "VULTR_API_KEY";
/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "Atlanta";
/// Plan used when none is configured.
pub const DEFAULT_PLAN: &str = "vc2-1c-1gb";
/// Operating system used when none is configured.
pub const DEFAULT_OS: &str = "Debian 12 x64 (bookworm)";
/// Snapshot name template used when none is configured.
pub const DEFAULT_SNAPSHOT_NAME: &str = "kiln-{{timestamp}}";
/// SSH user used when none is configured.
pub const DEFAULT_SSH_USERNAME: &str = "root";
/// SSH port used when none is configured.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Reachability ceiling used when none is configured.
pub const DEFAULT_SSH_TIMEOUT: &str = "1m";
/// Polling ceiling used when none is configured.
pub const DEFAULT_STATE_TIMEOUT: &str = "6m";
/// Command used for the graceful shutdown step.
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "shutdown -P now";

/// Raw build options merged from defaults, configuration files, and
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VULTR",
    discovery(
        app_name = "kiln",
        env_var = "KILN_CONFIG_PATH",
        config_file_name = "kiln.toml",
        dotfile_name = ".kiln.toml",
        project_file_name = "kiln.toml"
    )
)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "networking toggles map one-to-one onto provider flags"
)]
pub struct BuilderConfig {
    /// Vultr API key. Falls back to `VULTR_API_KEY` during preparation.
    pub api_key: Option<String>,
    /// Region label, either a city name (`Atlanta`) or a region id (`atl`).
    pub region: Option<String>,
    /// Plan identifier, for example `vc2-1c-1gb`.
    pub plan: Option<String>,
    /// Operating system label, for example `Debian 12 x64 (bookworm)`.
    pub os: Option<String>,
    /// Snapshot id to boot from instead of a stock operating system.
    pub os_snapshot: Option<String>,
    /// iPXE chain URL for booting a custom operating system.
    pub ipxe_url: Option<String>,
    /// Snapshot name template; supports `{{timestamp}}` and `{{uuid}}`.
    pub snapshot_name: Option<String>,
    /// User for the SSH connection.
    pub ssh_username: Option<String>,
    /// Password for the SSH connection when booting a custom source.
    pub ssh_password: Option<String>,
    /// OpenSSH private key text for the SSH connection.
    pub ssh_private_key: Option<String>,
    /// TCP port for SSH.
    pub ssh_port: Option<u16>,
    /// Ceiling for the SSH reachability wait, as a Go-style duration.
    pub ssh_timeout: Option<String>,
    /// Ceiling for provider state transitions, as a Go-style duration.
    pub state_timeout: Option<String>,
    /// Whether to attach a private network.
    #[ortho_config(default = false)]
    pub private_networking: bool,
    /// Whether to enable IPv6.
    #[ortho_config(default = false)]
    pub ipv6: bool,
    /// Command issued over SSH to power the guest off gracefully.
    pub shutdown_command: Option<String>,
    /// Newline separated commands run over SSH by the command hook.
    pub provision_commands: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl BuilderConfig {
    /// Returns a configuration with every option unset.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            api_key: None,
            region: None,
            plan: None,
            os: None,
            os_snapshot: None,
            ipxe_url: None,
            snapshot_name: None,
            ssh_username: None,
            ssh_password: None,
            ssh_private_key: None,
            ssh_port: None,
            ssh_timeout: None,
            state_timeout: None,
            private_networking: false,
            ipv6: false,
            shutdown_command: None,
            provision_commands: None,
        }
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("kiln")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies defaults and validates every option, rendering the snapshot
    /// name with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing every problem found.
    pub fn prepare(&self) -> Result<BuildConfig, ValidationErrors> {
        self.prepare_with(&TemplateContext::now())
    }

    /// Same as [`BuilderConfig::prepare`] with an explicit template context.
    ///
    /// The raw options are never modified, even when validation fails.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing every problem found.
    pub fn prepare_with(&self, context: &TemplateContext) -> Result<BuildConfig, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let api_key = non_blank(self.api_key.as_deref())
            .map(str::to_owned)
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()));
        if api_key.is_none() {
            errors.push(Self::missing_field(&FieldMetadata::new(
                "Vultr API key",
                API_KEY_ENV,
                "api_key",
            )));
        }

        let os_snapshot = non_blank(self.os_snapshot.as_deref()).map(str::to_owned);
        let ipxe_url = non_blank(self.ipxe_url.as_deref()).map(str::to_owned);
        let ssh_password = non_blank(self.ssh_password.as_deref()).map(str::to_owned);
        let ssh_private_key = non_blank(self.ssh_private_key.as_deref()).map(str::to_owned);

        if os_snapshot.is_some() && ipxe_url.is_some() {
            errors.push(ConfigError::ConflictingBootSource);
        }
        if (os_snapshot.is_some() || ipxe_url.is_some())
            && ssh_password.is_none()
            && ssh_private_key.is_none()
        {
            errors.push(ConfigError::MissingSshSecret);
        }

        let ssh_timeout = Self::duration_field(
            "ssh_timeout",
            self.ssh_timeout.as_deref(),
            DEFAULT_SSH_TIMEOUT,
            &mut errors,
        );
        let state_timeout = Self::duration_field(
            "state_timeout",
            self.state_timeout.as_deref(),
            DEFAULT_STATE_TIMEOUT,
            &mut errors,
        );

        let template = or_default(self.snapshot_name.as_deref(), DEFAULT_SNAPSHOT_NAME);
        let snapshot_name = match render_template(&template, context) {
            Ok(name) => Some(name),
            Err(err) => {
                errors.push(ConfigError::InvalidTemplate(err.to_string()));
                None
            }
        };

        match (api_key, ssh_timeout, state_timeout, snapshot_name) {
            (Some(key), Some(ssh), Some(state), Some(name)) if errors.is_empty() => {
                Ok(BuildConfig {
                    api_key: key,
                    region: or_default(self.region.as_deref(), DEFAULT_REGION),
                    plan: or_default(self.plan.as_deref(), DEFAULT_PLAN),
                    os: or_default(self.os.as_deref(), DEFAULT_OS),
                    os_snapshot,
                    ipxe_url,
                    snapshot_name: name,
                    ssh_username: or_default(self.ssh_username.as_deref(), DEFAULT_SSH_USERNAME),
                    ssh_password,
                    ssh_private_key,
                    ssh_port: self
                        .ssh_port
                        .filter(|port| *port != 0)
                        .unwrap_or(DEFAULT_SSH_PORT),
                    ssh_timeout: ssh,
                    state_timeout: state,
                    private_networking: self.private_networking,
                    ipv6: self.ipv6,
                    shutdown_command: or_default(
                        self.shutdown_command.as_deref(),
                        DEFAULT_SHUTDOWN_COMMAND,
                    ),
                    provision_commands: split_commands(self.provision_commands.as_deref()),
                })
            }
            _ => Err(errors),
        }
    }

    fn missing_field(metadata: &FieldMetadata) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to kiln.toml",
            metadata.description, metadata.env_var, metadata.toml_key
        ))
    }

    fn duration_field(
        field: &'static str,
        raw: Option<&str>,
        default: &str,
        errors: &mut ValidationErrors,
    ) -> Option<Duration> {
        let value = or_default(raw, default);
        match parse_duration(&value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                errors.push(ConfigError::InvalidDuration {
                    field,
                    value,
                    reason: err.to_string(),
                });
                None
            }
        }
    }
}

/// Validated, immutable build configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildConfig {
    /// Vultr API key.
    pub api_key: String,
    /// Region label.
    pub region: String,
    /// Plan identifier.
    pub plan: String,
    /// Operating system label.
    pub os: String,
    /// Snapshot id to boot from, when building from a custom image.
    pub os_snapshot: Option<String>,
    /// iPXE chain URL, when network booting a custom operating system.
    pub ipxe_url: Option<String>,
    /// Snapshot display name, rendered from the template at prepare time.
    pub snapshot_name: String,
    /// SSH user.
    pub ssh_username: String,
    /// Explicit SSH password.
    pub ssh_password: Option<String>,
    /// Explicit SSH private key in OpenSSH format.
    pub ssh_private_key: Option<String>,
    /// SSH port.
    pub ssh_port: u16,
    /// Ceiling for the SSH reachability wait.
    pub ssh_timeout: Duration,
    /// Ceiling for provider state transitions.
    pub state_timeout: Duration,
    /// Whether a private network is attached.
    pub private_networking: bool,
    /// Whether IPv6 is enabled.
    pub ipv6: bool,
    /// Command used to power the guest off gracefully.
    pub shutdown_command: String,
    /// Commands run by [`crate::provision::CommandHook`].
    pub provision_commands: Vec<String>,
}

impl BuildConfig {
    /// Returns `true` when the instance boots from a custom image or iPXE,
    /// in which case the provider does not generate a root password.
    #[must_use]
    pub const fn uses_custom_boot(&self) -> bool {
        self.os_snapshot.is_some() || self.ipxe_url.is_some()
    }

    /// Returns the boot selector sent with the create request.
    #[must_use]
    pub fn boot_source(&self) -> BootSource {
        if let Some(snapshot_id) = &self.os_snapshot {
            return BootSource::Snapshot {
                snapshot_id: snapshot_id.clone(),
            };
        }
        if let Some(chain_url) = &self.ipxe_url {
            return BootSource::Ipxe {
                chain_url: chain_url.clone(),
            };
        }
        BootSource::Os {
            label: self.os.clone(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}

fn or_default(value: Option<&str>, default: &str) -> String {
    non_blank(value).unwrap_or(default).to_owned()
}

fn split_commands(raw: Option<&str>) -> Vec<String> {
    raw.map(|commands| {
        commands
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests;
