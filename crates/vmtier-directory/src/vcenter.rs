//! vSphere Automation REST API binding.
//!
//! Two sessions are opened against `/api/session` with the same
//! credentials: one for inventory reads (`/api/vcenter/*`) and one for tag
//! operations (`/api/cis/tagging/*`). Both are closed on logout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use vmtier_core::{ConnectionParams, Label, ObjectRef, VmHardware};

use crate::error::{DirectoryError, DirectoryResult};
use crate::service::{Connector, Directory};

/// Header carrying the session token on every authenticated request.
const SESSION_HEADER: &str = "vmware-api-session-id";

/// Upper bound for a single HTTP exchange with vCenter.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects to vCenter over HTTPS.
#[derive(Debug, Clone)]
pub struct VCenterConnector {
    /// Overrides `https://{server}`; used to point at a local test server.
    base_url: Option<String>,
    timeout: Duration,
}

impl Default for VCenterConnector {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl VCenterConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn base_url(&self, params: &ConnectionParams) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", params.server),
        }
    }
}

#[async_trait]
impl Connector for VCenterConnector {
    async fn connect(&self, params: &ConnectionParams) -> DirectoryResult<Arc<dyn Directory>> {
        let client = Client::builder()
            .danger_accept_invalid_certs(params.insecure)
            .timeout(self.timeout)
            .user_agent(concat!("vmtier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base = self.base_url(params);

        let inventory = create_session(&client, &base, params)
            .await
            .map_err(|e| DirectoryError::InventoryLogin(e.to_string()))?;
        debug!(%base, "inventory session created");

        let tagging = match create_session(&client, &base, params).await {
            Ok(token) => token,
            Err(e) => {
                if let Err(logout_err) = delete_session(&client, &base, &inventory).await {
                    warn!(error = %logout_err, "releasing inventory session failed");
                }
                return Err(DirectoryError::TaggingLogin(e.to_string()));
            }
        };
        debug!(%base, "tagging session created");

        Ok(Arc::new(VCenterDirectory {
            client,
            base,
            inventory,
            tagging,
        }))
    }
}

async fn create_session(
    client: &Client,
    base: &str,
    params: &ConnectionParams,
) -> DirectoryResult<String> {
    let resp = client
        .post(format!("{base}/api/session"))
        .basic_auth(&params.user, Some(&params.password))
        .send()
        .await?;
    let resp = check_status(resp, "POST /api/session")?;
    Ok(resp.json::<String>().await?)
}

async fn delete_session(client: &Client, base: &str, token: &str) -> DirectoryResult<()> {
    let resp = client
        .delete(format!("{base}/api/session"))
        .header(SESSION_HEADER, token)
        .send()
        .await?;
    check_status(resp, "DELETE /api/session")?;
    Ok(())
}

/// An id usable as a single path segment. Dot segments are dropped by URL
/// normalization, so they are refused outright.
fn object_id(id: &str) -> DirectoryResult<&str> {
    match id {
        "" | "." | ".." => Err(DirectoryError::Rejected(format!("invalid object id {id:?}"))),
        _ => Ok(id),
    }
}

fn check_status(resp: Response, endpoint: &str) -> DirectoryResult<Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(DirectoryError::Status {
            endpoint: endpoint.to_string(),
            status: resp.status().as_u16(),
        })
    }
}

/// A connected vCenter with its inventory and tagging sessions.
pub struct VCenterDirectory {
    client: Client,
    base: String,
    inventory: String,
    tagging: String,
}

#[derive(Debug, Deserialize)]
struct VmInfo {
    cpu: Option<CpuInfo>,
    memory: Option<MemoryInfo>,
}

#[derive(Debug, Deserialize)]
struct CpuInfo {
    count: u32,
}

#[derive(Debug, Deserialize)]
struct MemoryInfo {
    #[serde(rename = "size_MiB")]
    size_mib: u64,
}

#[derive(Debug, Deserialize)]
struct CategoryModel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    id: String,
    name: String,
    category_id: String,
}

impl VCenterDirectory {
    /// Build `{base}/{segments...}[?query]`.
    ///
    /// Each segment is percent-encoded, so ids taken from an event can
    /// never address a different path.
    fn url(&self, segments: &[&str], query: Option<&str>) -> DirectoryResult<Url> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| DirectoryError::Rejected(format!("invalid base url {}: {e}", self.base)))?;
        url.path_segments_mut()
            .map_err(|()| DirectoryError::Rejected(format!("base url {} has no path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        url.set_query(query);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: Option<&str>,
        token: &str,
    ) -> DirectoryResult<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.url(segments, query)?)
            .header(SESSION_HEADER, token))
    }

    fn tagging_request(
        &self,
        method: Method,
        segments: &[&str],
        query: Option<&str>,
    ) -> DirectoryResult<RequestBuilder> {
        self.request(method, segments, query, &self.tagging)
    }

    async fn send(&self, req: RequestBuilder, endpoint: &str) -> DirectoryResult<Response> {
        check_status(req.send().await?, endpoint)
    }

    async fn category_id(&self, category: &str) -> DirectoryResult<String> {
        let ids: Vec<String> = self
            .send(
                self.tagging_request(Method::GET, &["api", "cis", "tagging", "category"], None)?,
                "list categories",
            )
            .await?
            .json()
            .await?;

        if ids.iter().any(|id| id == category) {
            return Ok(category.to_string());
        }

        for id in &ids {
            let model: CategoryModel = self
                .send(
                    self.tagging_request(Method::GET, &["api", "cis", "tagging", "category", id.as_str()], None)?,
                    "get category",
                )
                .await?
                .json()
                .await?;
            if model.name == category {
                return Ok(model.id);
            }
        }

        Err(DirectoryError::CategoryNotFound(category.to_string()))
    }
}

#[async_trait]
impl Directory for VCenterDirectory {
    async fn vm_hardware(&self, vm: &ObjectRef) -> DirectoryResult<Option<VmHardware>> {
        let id = object_id(&vm.value)?;
        let req = self.request(Method::GET, &["api", "vcenter", "vm", id], None, &self.inventory)?;
        let resp = req.send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(vm = %vm, "vm not found");
            return Ok(None);
        }

        let info: VmInfo = check_status(resp, "get vm")?.json().await?;
        Ok(match (info.cpu, info.memory) {
            (Some(cpu), Some(memory)) => Some(VmHardware {
                num_cpu: cpu.count,
                memory_mb: memory.size_mib,
            }),
            _ => None,
        })
    }

    async fn tags_for_category(&self, category: &str) -> DirectoryResult<Vec<Label>> {
        let category_id = self.category_id(category).await?;

        let tag_ids: Vec<String> = self
            .send(
                self.tagging_request(
                    Method::POST,
                    &["api", "cis", "tagging", "tag"],
                    Some("action=list-tags-for-category"),
                )?
                .json(&json!({ "category_id": category_id })),
                "list tags for category",
            )
            .await?
            .json()
            .await?;

        let mut labels = Vec::with_capacity(tag_ids.len());
        for id in &tag_ids {
            let tag: TagModel = self
                .send(
                    self.tagging_request(Method::GET, &["api", "cis", "tagging", "tag", id.as_str()], None)?,
                    "get tag",
                )
                .await?
                .json()
                .await?;
            labels.push(Label {
                id: tag.id,
                name: tag.name,
                category_id: tag.category_id,
            });
        }

        debug!(category, count = labels.len(), "listed tags");
        Ok(labels)
    }

    async fn attach_tag(&self, tag_id: &str, object: &ObjectRef) -> DirectoryResult<()> {
        let req = self
            .tagging_request(
                Method::POST,
                &["api", "cis", "tagging", "tag-association", object_id(tag_id)?],
                Some("action=attach"),
            )?
            .json(&json!({ "object_id": { "type": object.kind, "id": object.value } }));
        self.send(req, "attach tag").await?;
        Ok(())
    }

    async fn logout(&self) -> DirectoryResult<()> {
        let mut failures = Vec::new();

        for (name, token) in [("inventory", &self.inventory), ("tagging", &self.tagging)] {
            if let Err(e) = delete_session(&self.client, &self.base, token).await {
                failures.push(format!("{name}: {e}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DirectoryError::Logout(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response as HyperResponse};
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    const INVENTORY_TOKEN: &str = "inventory-token";
    const TAGGING_TOKEN: &str = "tagging-token";

    /// Canned vCenter that checks which token each API family receives.
    #[derive(Default)]
    struct FakeVCenter {
        logins: AtomicUsize,
        reject_second_login: AtomicBool,
        requests: Mutex<Vec<String>>,
    }

    impl FakeVCenter {
        fn log(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        async fn route(&self, req: Request<Incoming>) -> HyperResponse<Full<Bytes>> {
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            let query = req.uri().query().unwrap_or_default().to_string();
            let token = req
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let has_basic_auth = req.headers().contains_key("authorization");
            let body = req.into_body().collect().await.unwrap().to_bytes();

            self.requests.lock().unwrap().push(format!("{method} {path} [{token}]"));

            let wants = |expected: &str| token == expected;

            match (method.as_str(), path.as_str()) {
                ("POST", "/api/session") => {
                    if !has_basic_auth {
                        return reply(401, "");
                    }
                    let n = self.logins.fetch_add(1, Ordering::SeqCst);
                    match n {
                        0 => reply(201, &json!(INVENTORY_TOKEN).to_string()),
                        _ if self.reject_second_login.load(Ordering::SeqCst) => reply(401, ""),
                        _ => reply(201, &json!(TAGGING_TOKEN).to_string()),
                    }
                }
                ("DELETE", "/api/session") => reply(204, ""),
                ("GET", "/api/vcenter/vm/vm-42") if wants(INVENTORY_TOKEN) => reply(
                    200,
                    r#"{"name":"web-01","power_state":"POWERED_ON",
                        "cpu":{"count":2,"cores_per_socket":1,"hot_add_enabled":false},
                        "memory":{"size_MiB":4096,"hot_add_enabled":false}}"#,
                ),
                ("GET", "/api/vcenter/vm/vm-template") if wants(INVENTORY_TOKEN) => {
                    reply(200, r#"{"name":"template"}"#)
                }
                ("GET", "/api/vcenter/vm/vm-gone") if wants(INVENTORY_TOKEN) => reply(404, ""),
                ("GET", "/api/cis/tagging/category") if wants(TAGGING_TOKEN) => {
                    reply(200, r#"["cat-cpu","cat-mem"]"#)
                }
                ("GET", "/api/cis/tagging/category/cat-cpu") if wants(TAGGING_TOKEN) => reply(
                    200,
                    r#"{"id":"cat-cpu","name":"config.hardware.numCPU","cardinality":"SINGLE"}"#,
                ),
                ("GET", "/api/cis/tagging/category/cat-mem") if wants(TAGGING_TOKEN) => reply(
                    200,
                    r#"{"id":"cat-mem","name":"config.hardware.memoryMB","cardinality":"SINGLE"}"#,
                ),
                ("POST", "/api/cis/tagging/tag")
                    if wants(TAGGING_TOKEN) && query == "action=list-tags-for-category" =>
                {
                    let req: serde_json::Value = serde_json::from_slice(&body).unwrap();
                    match req["category_id"].as_str() {
                        Some("cat-cpu") => reply(200, r#"["tag-cpu-3","tag-cpu-4"]"#),
                        _ => reply(200, "[]"),
                    }
                }
                ("GET", "/api/cis/tagging/tag/tag-cpu-3") if wants(TAGGING_TOKEN) => reply(
                    200,
                    r#"{"id":"tag-cpu-3","name":"3","category_id":"cat-cpu","description":""}"#,
                ),
                ("GET", "/api/cis/tagging/tag/tag-cpu-4") if wants(TAGGING_TOKEN) => reply(
                    200,
                    r#"{"id":"tag-cpu-4","name":"4","category_id":"cat-cpu","description":""}"#,
                ),
                ("POST", "/api/cis/tagging/tag-association/tag-cpu-3")
                    if wants(TAGGING_TOKEN) && query == "action=attach" =>
                {
                    let req: serde_json::Value = serde_json::from_slice(&body).unwrap();
                    if req["object_id"]["type"] == "VirtualMachine" && req["object_id"]["id"] == "vm-42" {
                        reply(204, "")
                    } else {
                        reply(400, "")
                    }
                }
                _ => reply(403, ""),
            }
        }
    }

    fn reply(status: u16, body: &str) -> HyperResponse<Full<Bytes>> {
        HyperResponse::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn spawn_fake(fake: Arc<FakeVCenter>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let fake = fake.clone();
                tokio::spawn(async move {
                    let svc = service_fn(move |req| {
                        let fake = fake.clone();
                        async move { Ok::<_, hyper::Error>(fake.route(req).await) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        addr
    }

    fn params() -> ConnectionParams {
        ConnectionParams {
            server: "vcsa.lab.local".to_string(),
            user: "administrator@vsphere.local".to_string(),
            password: "secret".to_string(),
            insecure: true,
        }
    }

    async fn connect(fake: Arc<FakeVCenter>) -> DirectoryResult<Arc<dyn Directory>> {
        let addr = spawn_fake(fake).await;
        VCenterConnector::new()
            .with_base_url(format!("http://{addr}/"))
            .connect(&params())
            .await
    }

    #[test]
    fn base_url_defaults_to_https_server() {
        let connector = VCenterConnector::new();
        assert_eq!(connector.base_url(&params()), "https://vcsa.lab.local");
        let connector = connector.with_base_url("http://127.0.0.1:9000/");
        assert_eq!(connector.base_url(&params()), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn reads_vm_hardware_with_inventory_session() {
        let fake = Arc::new(FakeVCenter::default());
        let dir = connect(fake.clone()).await.unwrap();

        let hw = dir.vm_hardware(&ObjectRef::vm("vm-42")).await.unwrap();
        assert_eq!(hw, Some(VmHardware { num_cpu: 2, memory_mb: 4096 }));
        assert_eq!(fake.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_vm_or_config_is_none() {
        let dir = connect(Arc::new(FakeVCenter::default())).await.unwrap();
        assert_eq!(dir.vm_hardware(&ObjectRef::vm("vm-gone")).await.unwrap(), None);
        assert_eq!(dir.vm_hardware(&ObjectRef::vm("vm-template")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn vm_id_stays_one_path_segment() {
        let fake = Arc::new(FakeVCenter::default());
        let dir = connect(fake.clone()).await.unwrap();

        let err = dir
            .vm_hardware(&ObjectRef::vm("vm-evil/../vm-42"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Status { status: 403, .. }));

        let log = fake.log();
        assert!(log.contains(&format!("GET /api/vcenter/vm/vm-evil%2F..%2Fvm-42 [{INVENTORY_TOKEN}]")));
        assert!(!log.iter().any(|line| line.starts_with("GET /api/vcenter/vm/vm-42")));

        dir.vm_hardware(&ObjectRef::vm("vm-42?x=1")).await.unwrap_err();
        assert!(!fake.log().iter().any(|line| line.starts_with("GET /api/vcenter/vm/vm-42 ")));
    }

    #[tokio::test]
    async fn dot_vm_ids_are_rejected_without_a_request() {
        let fake = Arc::new(FakeVCenter::default());
        let dir = connect(fake.clone()).await.unwrap();
        let before = fake.log().len();

        for id in ["..", "."] {
            let err = dir.vm_hardware(&ObjectRef::vm(id)).await.unwrap_err();
            assert!(matches!(err, DirectoryError::Rejected(_)));
        }
        assert_eq!(fake.log().len(), before);
    }

    #[tokio::test]
    async fn unresponsive_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let connector = VCenterConnector::new()
            .with_base_url(format!("http://{addr}"))
            .with_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = connector.connect(&params()).await.err().unwrap();

        assert!(matches!(err, DirectoryError::InventoryLogin(_)));
        assert!(started.elapsed() < DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn lists_tags_by_category_name() {
        let dir = connect(Arc::new(FakeVCenter::default())).await.unwrap();

        let labels = dir.tags_for_category("config.hardware.numCPU").await.unwrap();
        let names: Vec<_> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["3", "4"]);
        assert!(labels.iter().all(|l| l.category_id == "cat-cpu"));

        // Category ids are accepted as-is.
        let by_id = dir.tags_for_category("cat-cpu").await.unwrap();
        assert_eq!(by_id, labels);

        let empty = dir.tags_for_category("config.hardware.memoryMB").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let dir = connect(Arc::new(FakeVCenter::default())).await.unwrap();
        let err = dir.tags_for_category("config.hardware.disks").await.unwrap_err();
        assert!(matches!(err, DirectoryError::CategoryNotFound(_)));
    }

    #[tokio::test]
    async fn attaches_tag_to_vm() {
        let fake = Arc::new(FakeVCenter::default());
        let dir = connect(fake.clone()).await.unwrap();

        dir.attach_tag("tag-cpu-3", &ObjectRef::vm("vm-42")).await.unwrap();
        assert!(
            fake.log()
                .contains(&format!("POST /api/cis/tagging/tag-association/tag-cpu-3 [{TAGGING_TOKEN}]"))
        );

        let err = dir.attach_tag("tag-cpu-3", &ObjectRef::vm("vm-7")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn logout_closes_both_sessions() {
        let fake = Arc::new(FakeVCenter::default());
        let dir = connect(fake.clone()).await.unwrap();

        dir.logout().await.unwrap();
        let log = fake.log();
        assert!(log.contains(&format!("DELETE /api/session [{INVENTORY_TOKEN}]")));
        assert!(log.contains(&format!("DELETE /api/session [{TAGGING_TOKEN}]")));
    }

    #[tokio::test]
    async fn second_login_failure_releases_first_session() {
        let fake = Arc::new(FakeVCenter::default());
        fake.reject_second_login.store(true, Ordering::SeqCst);

        let err = connect(fake.clone()).await.err().unwrap();
        assert!(matches!(err, DirectoryError::TaggingLogin(_)));
        assert!(fake.log().contains(&format!("DELETE /api/session [{INVENTORY_TOKEN}]")));
    }
}
