//! Request and response values exchanged with a compute client.

use std::fmt;
use std::net::IpAddr;

use super::ClientError;

/// Provider parameter families that have human labels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParamKind {
    /// Datacenter region.
    Region,
    /// Hardware plan.
    Plan,
    /// Operating system image.
    Os,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Region => "region",
            Self::Plan => "plan",
            Self::Os => "os",
        })
    }
}

/// What the new server boots from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BootSource {
    /// A stock operating system, identified by label.
    Os {
        /// Operating system label.
        label: String,
    },
    /// An existing snapshot.
    Snapshot {
        /// Snapshot identifier.
        snapshot_id: String,
    },
    /// A custom operating system booted over iPXE.
    Ipxe {
        /// iPXE chain URL.
        chain_url: String,
    },
}

/// Parameters required to create a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerRequest {
    /// Region label, resolved by the client.
    pub region: String,
    /// Plan label, resolved by the client.
    pub plan: String,
    /// Boot selector.
    pub boot: BootSource,
    /// Display label for the server.
    pub label: String,
    /// Whether to attach a private network.
    pub private_networking: bool,
    /// Whether to enable IPv6.
    pub ipv6: bool,
    /// Registered SSH key to install, if any.
    pub ssh_key_id: Option<String>,
}

impl ServerRequest {
    /// Starts a builder for a [`ServerRequest`].
    #[must_use]
    pub fn builder() -> ServerRequestBuilder {
        ServerRequestBuilder::new()
    }

    /// Validates the request, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] naming the first empty field.
    pub fn validate(&self) -> Result<(), ClientError> {
        let boot_value = match &self.boot {
            BootSource::Os { label } => label,
            BootSource::Snapshot { snapshot_id } => snapshot_id,
            BootSource::Ipxe { chain_url } => chain_url,
        };
        for (field, value) in [
            ("region", &self.region),
            ("plan", &self.plan),
            ("boot", boot_value),
            ("label", &self.label),
        ] {
            if value.is_empty() {
                return Err(ClientError::Decode {
                    message: format!("missing or empty field: {field}"),
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`ServerRequest`] that trims inputs and validates on build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerRequestBuilder {
    region: String,
    plan: String,
    boot: BootSource,
    label: String,
    private_networking: bool,
    ipv6: bool,
    ssh_key_id: Option<String>,
}

impl Default for ServerRequestBuilder {
    fn default() -> Self {
        Self {
            region: String::new(),
            plan: String::new(),
            boot: BootSource::Os {
                label: String::new(),
            },
            label: String::new(),
            private_networking: false,
            ipv6: false,
            ssh_key_id: None,
        }
    }
}

impl ServerRequestBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region label.
    #[must_use]
    pub fn region(mut self, value: impl Into<String>) -> Self {
        self.region = value.into();
        self
    }

    /// Sets the plan label.
    #[must_use]
    pub fn plan(mut self, value: impl Into<String>) -> Self {
        self.plan = value.into();
        self
    }

    /// Sets the boot selector.
    #[must_use]
    pub fn boot(mut self, value: BootSource) -> Self {
        self.boot = value;
        self
    }

    /// Sets the server label.
    #[must_use]
    pub fn label(mut self, value: impl Into<String>) -> Self {
        self.label = value.into();
        self
    }

    /// Toggles private networking.
    #[must_use]
    pub const fn private_networking(mut self, value: bool) -> Self {
        self.private_networking = value;
        self
    }

    /// Toggles IPv6.
    #[must_use]
    pub const fn ipv6(mut self, value: bool) -> Self {
        self.ipv6 = value;
        self
    }

    /// Sets the optional SSH key identifier.
    #[must_use]
    pub fn ssh_key_id(mut self, value: Option<String>) -> Self {
        self.ssh_key_id = value;
        self
    }

    /// Builds and validates the [`ServerRequest`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] when a required field is empty.
    pub fn build(self) -> Result<ServerRequest, ClientError> {
        let boot = match self.boot {
            BootSource::Os { label } => BootSource::Os {
                label: label.trim().to_owned(),
            },
            BootSource::Snapshot { snapshot_id } => BootSource::Snapshot {
                snapshot_id: snapshot_id.trim().to_owned(),
            },
            BootSource::Ipxe { chain_url } => BootSource::Ipxe {
                chain_url: chain_url.trim().to_owned(),
            },
        };
        let request = ServerRequest {
            region: self.region.trim().to_owned(),
            plan: self.plan.trim().to_owned(),
            boot,
            label: self.label.trim().to_owned(),
            private_networking: self.private_networking,
            ipv6: self.ipv6,
            ssh_key_id: self.ssh_key_id.map(|value| value.trim().to_owned()),
        };
        request.validate()?;
        Ok(request)
    }
}

/// Lifecycle status of a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerStatus {
    /// Still being provisioned.
    Pending,
    /// Provisioned and usable.
    Active,
    /// Suspended by the provider.
    Suspended,
    /// Being resized.
    Resizing,
    /// Any status this crate does not know about.
    Other(String),
}

impl From<&str> for ServerStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "active" => Self::Active,
            "suspended" => Self::Suspended,
            "resizing" => Self::Resizing,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Power state of a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PowerStatus {
    /// Powered on.
    Running,
    /// Powered off.
    Stopped,
    /// Any power state this crate does not know about.
    Other(String),
}

impl From<&str> for PowerStatus {
    fn from(value: &str) -> Self {
        match value {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Snapshot of a server's state as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerInfo {
    /// Provider identifier.
    pub id: String,
    /// Lifecycle status.
    pub status: ServerStatus,
    /// Power state.
    pub power_status: PowerStatus,
    /// Primary public address, once assigned.
    pub main_ip: Option<IpAddr>,
    /// Root password generated by the provider, when there is one.
    pub default_password: Option<String>,
}

impl ServerInfo {
    /// Returns the public address once the server is active and routable.
    #[must_use]
    pub fn reachable_ip(&self) -> Option<IpAddr> {
        if self.status != ServerStatus::Active {
            return None;
        }
        self.main_ip.filter(|ip| !ip.is_unspecified())
    }

    /// Returns `true` once the server reports it is powered off.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.power_status == PowerStatus::Stopped
    }
}

/// Progress of a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SnapshotStatus {
    /// Still being captured.
    Pending,
    /// Ready for use.
    Complete,
    /// Any status this crate does not know about.
    Other(String),
}

impl From<&str> for SnapshotStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "complete" => Self::Complete,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// State of a snapshot as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotInfo {
    /// Provider identifier.
    pub id: String,
    /// Description the snapshot was created with.
    pub description: String,
    /// Capture progress.
    pub status: SnapshotStatus,
}
