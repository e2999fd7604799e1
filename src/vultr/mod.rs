//! Vultr v2 implementation of [`ComputeClient`].

mod api;

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::{
    BootSource, ClientError, ClientFuture, ComputeClient, ParamKind, ServerInfo, ServerRequest,
    SnapshotInfo,
};
use api::{
    ApiError, CreateInstanceRequest, CreateSnapshotRequest, CreateSshKeyRequest, IPXE_OS_ID,
    InstanceEnvelope, Listing, SnapshotEnvelope, SshKeyEnvelope, listing_path,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const VULTR_API_BASE: &str = "https://api.vultr.com/v2";
const LISTING_PAGE_SIZE: &str = "500";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Client for the Vultr v2 REST API authenticated with a bearer API key.
///
/// Vultr only returns the generated root password in the create response,
/// so the client remembers it per server and serves it from
/// [`ComputeClient::server_info`].
pub struct VultrClient {
    api_key: String,
    base_url: String,
    passwords: Mutex<HashMap<String, String>>,
}

impl VultrClient {
    /// Creates a client for the public Vultr endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, VULTR_API_BASE)
    }

    /// Creates a client against an alternative API root.
    #[must_use]
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            passwords: Mutex::new(HashMap::new()),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        HTTP_CLIENT
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
    }

    async fn send(request: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|err| ClientError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ClientError::Transport {
                message: err.to_string(),
            })?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let message = serde_json::from_slice::<ApiError>(&body).map_or_else(
            |_| String::from_utf8_lossy(&body).into_owned(),
            |api_err| api_err.error,
        );
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let body = Self::send(request).await?;
        decode(&body)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<T, ClientError> {
        Self::send_json(self.request(Method::POST, path).json(payload)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        Self::send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    async fn listing(&self, kind: ParamKind) -> Result<Listing, ClientError> {
        let request = self
            .request(Method::GET, listing_path(kind))
            .query(&[("per_page", LISTING_PAGE_SIZE)]);
        let body = Self::send(request).await?;
        Listing::decode(kind, &body).map_err(|err| ClientError::Decode {
            message: err.to_string(),
        })
    }

    async fn lookup_id(&self, kind: ParamKind, label: &str) -> Result<String, ClientError> {
        let listing = self.listing(kind).await?;
        listing
            .id_for(label)
            .map(str::to_owned)
            .ok_or_else(|| ClientError::NotFound {
                kind,
                value: label.to_owned(),
            })
    }

    async fn instance_payload(
        &self,
        request: &ServerRequest,
    ) -> Result<CreateInstanceRequest, ClientError> {
        let region = self.lookup_id(ParamKind::Region, &request.region).await?;
        let plan = self.lookup_id(ParamKind::Plan, &request.plan).await?;
        let (os_id, snapshot_id, ipxe_chain_url) = match &request.boot {
            BootSource::Os { label } => {
                let id = self.lookup_id(ParamKind::Os, label).await?;
                let parsed = id.parse::<u32>().map_err(|err| ClientError::Decode {
                    message: format!("os id '{id}' is not numeric: {err}"),
                })?;
                (Some(parsed), None, None)
            }
            BootSource::Snapshot { snapshot_id } => (None, Some(snapshot_id.clone()), None),
            BootSource::Ipxe { chain_url } => (Some(IPXE_OS_ID), None, Some(chain_url.clone())),
        };

        Ok(CreateInstanceRequest {
            region,
            plan,
            os_id,
            snapshot_id,
            ipxe_chain_url,
            label: request.label.clone(),
            enable_ipv6: request.ipv6,
            enable_private_network: request.private_networking,
            sshkey_id: request.ssh_key_id.iter().cloned().collect(),
        })
    }

    fn remember_password(&self, server_id: &str, password: Option<String>) {
        if let Some(value) = password.filter(|value| !value.is_empty()) {
            self.passwords
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(server_id.to_owned(), value);
        }
    }

    fn cached_password(&self, server_id: &str) -> Option<String> {
        self.passwords
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server_id)
            .cloned()
    }

    fn forget_password(&self, server_id: &str) {
        self.passwords
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(server_id);
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(body).map_err(|err| ClientError::Decode {
        message: err.to_string(),
    })
}

impl ComputeClient for VultrClient {
    fn create_ssh_key<'a>(
        &'a self,
        name: &'a str,
        public_key: &'a str,
    ) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let payload = CreateSshKeyRequest {
                name,
                ssh_key: public_key,
            };
            let created: SshKeyEnvelope = self.post_json("/ssh-keys", &payload).await?;
            Ok(created.ssh_key.id)
        })
    }

    fn delete_ssh_key<'a>(&'a self, key_id: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("/ssh-keys/{key_id}")).await })
    }

    fn create_server<'a>(&'a self, request: &'a ServerRequest) -> ClientFuture<'a, String> {
        Box::pin(async move {
            request.validate()?;
            let payload = self.instance_payload(request).await?;
            let created: InstanceEnvelope = self.post_json("/instances", &payload).await?;
            let id = created.instance.id;
            self.remember_password(&id, created.instance.default_password);
            Ok(id)
        })
    }

    fn server_info<'a>(&'a self, server_id: &'a str) -> ClientFuture<'a, ServerInfo> {
        Box::pin(async move {
            let path = format!("/instances/{server_id}");
            let found: InstanceEnvelope =
                Self::send_json(self.request(Method::GET, &path)).await?;
            Ok(found.instance.into_info(self.cached_password(server_id)))
        })
    }

    fn delete_server<'a>(&'a self, server_id: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            self.delete(&format!("/instances/{server_id}")).await?;
            self.forget_password(server_id);
            Ok(())
        })
    }

    fn halt_server<'a>(&'a self, server_id: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("/instances/{server_id}/halt");
            Self::send(self.request(Method::POST, &path)).await?;
            Ok(())
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        server_id: &'a str,
        description: &'a str,
    ) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let payload = CreateSnapshotRequest {
                instance_id: server_id,
                description,
            };
            let created: SnapshotEnvelope = self.post_json("/snapshots", &payload).await?;
            Ok(created.snapshot.id)
        })
    }

    fn snapshot_info<'a>(&'a self, snapshot_id: &'a str) -> ClientFuture<'a, SnapshotInfo> {
        Box::pin(async move {
            let path = format!("/snapshots/{snapshot_id}");
            let found: SnapshotEnvelope =
                Self::send_json(self.request(Method::GET, &path)).await?;
            Ok(SnapshotInfo::from(found.snapshot))
        })
    }

    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("/snapshots/{snapshot_id}")).await })
    }

    fn resolve_id<'a>(&'a self, kind: ParamKind, label: &'a str) -> ClientFuture<'a, String> {
        Box::pin(async move { self.lookup_id(kind, label).await })
    }

    fn resolve_label<'a>(&'a self, kind: ParamKind, id: &'a str) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let listing = self.listing(kind).await?;
            listing
                .label_for(id)
                .map(str::to_owned)
                .ok_or_else(|| ClientError::NotFound {
                    kind,
                    value: id.to_owned(),
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = VultrClient::with_base_url("bar", "http://127.0.0.1:9/v2/");
        assert_eq!(client.base_url, "http://127.0.0.1:9/v2");
    }

    #[test]
    fn remembers_only_non_empty_passwords() {
        let client = VultrClient::new("bar");
        client.remember_password("srv-1", Some(String::new()));
        assert_eq!(client.cached_password("srv-1"), None);

        client.remember_password("srv-1", Some(String::from("secret")));
        assert_eq!(client.cached_password("srv-1").as_deref(), Some("secret"));

        client.forget_password("srv-1");
        assert_eq!(client.cached_password("srv-1"), None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let client = VultrClient::with_base_url("bar", "http://127.0.0.1:9/v2");
        let err = client
            .server_info("srv-1")
            .await
            .expect_err("nothing listens on the discard port");
        assert!(
            matches!(err, ClientError::Transport { .. }),
            "unexpected error: {err}"
        );
    }
}
