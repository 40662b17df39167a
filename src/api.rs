// Registry client module: the `Registry` trait names the handful of
// registry operations a publish run needs, and `AtlasClient` implements
// them with a blocking reqwest client against the Atlas box API.

use crate::error::PublishError;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::time::Duration;

/// Registry used when `ATLAS_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://atlas.hashicorp.com";

/// Invoked with the cumulative number of bytes sent during an upload.
pub type ProgressFn = Box<dyn FnMut(u64) + Send>;

/// A registry account.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
}

/// A box resource, identified by its `owner/name` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxRef {
    pub tag: String,
}

/// A version created on a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRef {
    pub tag: String,
    pub version: String,
}

/// A provider entry attached to a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRef {
    pub tag: String,
    pub version: String,
    pub name: String,
}

/// Operations a publish run performs against the registry. Every call
/// blocks until the registry answers.
pub trait Registry {
    fn find_user(&self, username: &str) -> Result<User, PublishError>;

    fn find_box(&self, tag: &str) -> Result<BoxRef, PublishError>;

    fn create_version(
        &self,
        boxref: &BoxRef,
        version: &str,
        description: &str,
    ) -> Result<VersionRef, PublishError>;

    fn create_provider(&self, version: &VersionRef, name: &str)
        -> Result<ProviderRef, PublishError>;

    /// Upload `len` bytes from `file` as the provider's payload.
    fn upload(
        &self,
        provider: &ProviderRef,
        file: File,
        len: u64,
        progress: ProgressFn,
    ) -> Result<(), PublishError>;

    /// Mark a version as released. Returns whether the registry accepted it.
    fn release(&self, version: &VersionRef) -> Result<bool, PublishError>;
}

#[derive(Serialize, Debug)]
struct VersionFields<'a> {
    version: &'a str,
    description: &'a str,
}

#[derive(Serialize, Debug)]
struct CreateVersionRequest<'a> {
    version: VersionFields<'a>,
}

#[derive(Serialize, Debug)]
struct ProviderFields<'a> {
    name: &'a str,
}

#[derive(Serialize, Debug)]
struct CreateProviderRequest<'a> {
    provider: ProviderFields<'a>,
}

/// Only the fields we read back; the registry sends many more.
#[derive(Deserialize, Debug)]
struct BoxResponse {
    tag: String,
}

#[derive(Deserialize, Debug)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize, Debug)]
struct ProviderResponse {
    name: String,
}

#[derive(Deserialize, Debug)]
struct UploadTarget {
    upload_path: String,
}

/// Reader that reports the running byte count after every read.
struct ProgressReader<R> {
    inner: R,
    sent: u64,
    progress: ProgressFn,
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.sent += n as u64;
            (self.progress)(self.sent);
        }
        Ok(n)
    }
}

/// Blocking client for the Atlas box API. Holds the access token; build
/// it once and share it by reference for the whole run.
#[derive(Clone)]
pub struct AtlasClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for AtlasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AtlasClient {
    /// Create a client from `ATLAS_TOKEN` (required) and `ATLAS_URL`
    /// (optional, defaults to [`DEFAULT_BASE_URL`]).
    pub fn from_env() -> Result<Self, PublishError> {
        let token = std::env::var("ATLAS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PublishError::Configuration("ATLAS_TOKEN not defined".into()))?;
        let base_url = std::env::var("ATLAS_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self::new(&base_url, &token)
    }

    pub fn new(base_url: &str, token: &str) -> Result<Self, PublishError> {
        let client = Client::builder()
            // uploads of multi-gigabyte boxes run far past reqwest's default
            .timeout(None::<Duration>)
            .build()?;
        Ok(AtlasClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<HeaderMap, PublishError> {
        let mut headers = HeaderMap::new();
        let val = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
            PublishError::Configuration("ATLAS_TOKEN contains invalid characters".into())
        })?;
        headers.insert(AUTHORIZATION, val);
        Ok(headers)
    }

    fn send(&self, what: &str, req: RequestBuilder) -> Result<Response, PublishError> {
        let res = req.headers(self.auth_headers()?).send()?;
        tracing::debug!(status = %res.status(), "{what}");
        Ok(res)
    }

    /// Turn a non-2xx response into a registry error carrying the body text.
    fn check(what: &str, res: Response) -> Result<Response, PublishError> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let txt = res.text().unwrap_or_else(|_| "".into());
        Err(PublishError::Registry(format!("{what} failed: {status} - {txt}")))
    }

    fn get_existing(&self, what: &str, path: &str) -> Result<Response, PublishError> {
        let res = self.send(what, self.client.get(self.url(path)))?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(PublishError::NotFound(what.to_string()));
        }
        Self::check(what, res)
    }
}

impl Registry for AtlasClient {
    fn find_user(&self, username: &str) -> Result<User, PublishError> {
        let what = format!("user {username}");
        let res = self.get_existing(&what, &format!("user/{username}"))?;
        Ok(res.json()?)
    }

    fn find_box(&self, tag: &str) -> Result<BoxRef, PublishError> {
        let what = format!("box {tag}");
        let res = self.get_existing(&what, &format!("box/{tag}"))?;
        let body: BoxResponse = res.json()?;
        Ok(BoxRef { tag: body.tag })
    }

    fn create_version(
        &self,
        boxref: &BoxRef,
        version: &str,
        description: &str,
    ) -> Result<VersionRef, PublishError> {
        let what = format!("create version {} v{}", boxref.tag, version);
        let body = CreateVersionRequest {
            version: VersionFields { version, description },
        };
        let req = self
            .client
            .post(self.url(&format!("box/{}/versions", boxref.tag)))
            .json(&body);
        let res = Self::check(&what, self.send(&what, req)?)?;
        let created: VersionResponse = res.json()?;
        Ok(VersionRef {
            tag: boxref.tag.clone(),
            version: created.version,
        })
    }

    fn create_provider(
        &self,
        version: &VersionRef,
        name: &str,
    ) -> Result<ProviderRef, PublishError> {
        let what = format!("create provider {name} for {} v{}", version.tag, version.version);
        let body = CreateProviderRequest {
            provider: ProviderFields { name },
        };
        let path = format!("box/{}/version/{}/providers", version.tag, version.version);
        let req = self.client.post(self.url(&path)).json(&body);
        let res = Self::check(&what, self.send(&what, req)?)?;
        let created: ProviderResponse = res.json()?;
        Ok(ProviderRef {
            tag: version.tag.clone(),
            version: version.version.clone(),
            name: created.name,
        })
    }

    fn upload(
        &self,
        provider: &ProviderRef,
        file: File,
        len: u64,
        progress: ProgressFn,
    ) -> Result<(), PublishError> {
        let what = format!("upload {} v{} ({})", provider.tag, provider.version, provider.name);
        let path = format!(
            "box/{}/version/{}/provider/{}/upload",
            provider.tag, provider.version, provider.name
        );
        let res = Self::check(&what, self.send(&what, self.client.get(self.url(&path)))?)?;
        let target: UploadTarget = res.json()?;

        let reader = ProgressReader {
            inner: file,
            sent: 0,
            progress,
        };
        // The upload URL is pre-signed; it takes no Authorization header.
        let res = self
            .client
            .put(&target.upload_path)
            .body(Body::sized(reader, len))
            .send()?;
        Self::check(&what, res)?;
        Ok(())
    }

    fn release(&self, version: &VersionRef) -> Result<bool, PublishError> {
        let what = format!("release {} v{}", version.tag, version.version);
        let path = format!("box/{}/version/{}/release", version.tag, version.version);
        let res = self.send(&what, self.client.put(self.url(&path)))?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            tracing::warn!(%status, body = %txt, "release rejected");
            return Ok(false);
        }
        Ok(true)
    }
}
