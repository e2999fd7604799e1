//! The snapshot produced by a successful build.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::client::{ClientError, ComputeClient};

/// Identifier reported for artifacts produced by this builder.
pub const BUILDER_ID: &str = "kiln.vultr";

/// A finished snapshot.
pub struct Artifact<C> {
    snapshot_id: String,
    snapshot_name: String,
    region_name: String,
    client: Arc<C>,
}

impl<C: ComputeClient> Artifact<C> {
    /// Creates an artifact for a completed snapshot.
    #[must_use]
    pub fn new(
        snapshot_id: impl Into<String>,
        snapshot_name: impl Into<String>,
        region_name: impl Into<String>,
        client: Arc<C>,
    ) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            snapshot_name: snapshot_name.into(),
            region_name: region_name.into(),
            client,
        }
    }

    /// Provider identifier of the snapshot.
    #[must_use]
    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    /// Display name of the snapshot.
    #[must_use]
    pub fn snapshot_name(&self) -> &str {
        &self.snapshot_name
    }

    /// Human label of the region the snapshot was built in.
    #[must_use]
    pub fn region_name(&self) -> &str {
        &self.region_name
    }

    /// Constant identifying this builder.
    #[must_use]
    pub const fn builder_id(&self) -> &'static str {
        BUILDER_ID
    }

    /// Deletes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] reported by the provider, including when
    /// the snapshot was already deleted.
    pub async fn destroy(&self) -> Result<(), ClientError> {
        info!(snapshot_id = %self.snapshot_id, "destroying snapshot");
        self.client.delete_snapshot(&self.snapshot_id).await
    }
}

impl<C> fmt::Display for Artifact<C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "Vultr snapshot: {} ({}) in {}",
            self.snapshot_name, self.snapshot_id, self.region_name
        )
    }
}

impl<C> fmt::Debug for Artifact<C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Artifact")
            .field("snapshot_id", &self.snapshot_id)
            .field("snapshot_name", &self.snapshot_name)
            .field("region_name", &self.region_name)
            .finish_non_exhaustive()
    }
}
