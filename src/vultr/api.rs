//! Wire payloads for the Vultr v2 API.

use serde::{Deserialize, Serialize};

use crate::client::{
    ParamKind, PowerStatus, ServerInfo, ServerStatus, SnapshotInfo, SnapshotStatus,
};

/// Operating system id Vultr reserves for iPXE boots.
pub(super) const IPXE_OS_ID: u32 = 159;

#[derive(Debug, Serialize)]
pub(super) struct CreateInstanceRequest {
    pub(super) region: String,
    pub(super) plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) os_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) snapshot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) ipxe_chain_url: Option<String>,
    pub(super) label: String,
    pub(super) enable_ipv6: bool,
    pub(super) enable_private_network: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(super) sshkey_id: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct InstanceEnvelope {
    pub(super) instance: Instance,
}

#[derive(Debug, Deserialize)]
pub(super) struct Instance {
    pub(super) id: String,
    #[serde(default)]
    pub(super) main_ip: String,
    #[serde(default)]
    pub(super) default_password: Option<String>,
    #[serde(default)]
    pub(super) status: String,
    #[serde(default)]
    pub(super) power_status: String,
}

impl Instance {
    /// Converts the payload, substituting `password` when the response has
    /// none of its own.
    pub(super) fn into_info(self, password: Option<String>) -> ServerInfo {
        ServerInfo {
            main_ip: self.main_ip.parse().ok(),
            status: ServerStatus::from(self.status.as_str()),
            power_status: PowerStatus::from(self.power_status.as_str()),
            default_password: self
                .default_password
                .filter(|value| !value.is_empty())
                .or(password),
            id: self.id,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreateSnapshotRequest<'a> {
    pub(super) instance_id: &'a str,
    pub(super) description: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct SnapshotEnvelope {
    pub(super) snapshot: Snapshot,
}

#[derive(Debug, Deserialize)]
pub(super) struct Snapshot {
    pub(super) id: String,
    #[serde(default)]
    pub(super) description: String,
    #[serde(default)]
    pub(super) status: String,
}

impl From<Snapshot> for SnapshotInfo {
    fn from(value: Snapshot) -> Self {
        Self {
            status: SnapshotStatus::from(value.status.as_str()),
            id: value.id,
            description: value.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreateSshKeyRequest<'a> {
    pub(super) name: &'a str,
    pub(super) ssh_key: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct SshKeyEnvelope {
    pub(super) ssh_key: SshKey,
}

#[derive(Debug, Deserialize)]
pub(super) struct SshKey {
    pub(super) id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiError {
    pub(super) error: String,
}

#[derive(Debug, Deserialize)]
struct Region {
    id: String,
    #[serde(default)]
    city: String,
}

#[derive(Debug, Deserialize)]
struct Plan {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OperatingSystem {
    id: u32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Regions {
    regions: Vec<Region>,
}

#[derive(Debug, Deserialize)]
struct Plans {
    plans: Vec<Plan>,
}

#[derive(Debug, Deserialize)]
struct OperatingSystems {
    os: Vec<OperatingSystem>,
}

/// Listing endpoint for a parameter family.
pub(super) const fn listing_path(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Region => "/regions",
        ParamKind::Plan => "/plans",
        ParamKind::Os => "/os",
    }
}

/// A decoded listing reduced to `(id, label)` pairs.
#[derive(Debug, Default, Eq, PartialEq)]
pub(super) struct Listing {
    entries: Vec<(String, String)>,
}

impl Listing {
    /// Decodes the listing body returned for `kind`.
    pub(super) fn decode(kind: ParamKind, body: &[u8]) -> Result<Self, serde_json::Error> {
        let entries = match kind {
            ParamKind::Region => serde_json::from_slice::<Regions>(body)?
                .regions
                .into_iter()
                .map(|region| (region.id, region.city))
                .collect(),
            ParamKind::Plan => serde_json::from_slice::<Plans>(body)?
                .plans
                .into_iter()
                .map(|plan| (plan.id.clone(), plan.id))
                .collect(),
            ParamKind::Os => serde_json::from_slice::<OperatingSystems>(body)?
                .os
                .into_iter()
                .map(|os| (os.id.to_string(), os.name))
                .collect(),
        };
        Ok(Self { entries })
    }

    /// Finds the identifier whose label or identifier matches `label`,
    /// ignoring ASCII case.
    pub(super) fn id_for(&self, label: &str) -> Option<&str> {
        let wanted = label.trim();
        self.entries
            .iter()
            .find(|(id, name)| name.eq_ignore_ascii_case(wanted) || id.eq_ignore_ascii_case(wanted))
            .map(|(id, _)| id.as_str())
    }

    /// Finds the label for an exact identifier.
    pub(super) fn label_for(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, name)| name.as_str())
    }
}
