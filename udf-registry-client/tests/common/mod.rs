//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::codec::{Decoder, Encoder};
use udf_registry_client::{
    CallPolicy, HashAlgorithm, NodeSelection, NodeTransport, RegistryConfig, Result, UdfError,
    UdfRegistry,
};
use udf_registry_core::content::{decode_from_wire, encode_for_wire};
use udf_registry_core::protocol::Fields;
use udf_registry_core::InfoCodec;

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Content containing every byte value, repeated to `len` bytes.
pub fn every_byte(len: usize) -> Vec<u8> {
    (0..=255u8).cycle().take(len).collect()
}

/// A policy that fails fast: no backoff jitter, short timeout.
pub fn quick_policy(max_retries: u32) -> CallPolicy {
    CallPolicy::builder()
        .timeout(Duration::from_millis(200))
        .max_retries(max_retries)
        .initial_backoff(Duration::from_millis(1))
        .max_backoff(Duration::from_millis(5))
        .jitter(0.0)
        .build()
        .unwrap()
}

/// A registry over `cluster` with the given chunk size.
pub fn registry(cluster: MockCluster, chunk_size: usize) -> UdfRegistry<MockCluster> {
    let config = RegistryConfig::builder()
        .chunk_size(chunk_size)
        .default_policy(quick_policy(2))
        .build()
        .unwrap();
    UdfRegistry::new(cluster, config)
}

/// Fault applied to the next call reaching the mock.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Answer normally.
    Pass,
    /// Fail with a transport error without touching cluster state.
    Transport,
    /// Apply the command, then lose the reply.
    DropReply,
    /// Wait before answering.
    Delay(Duration),
}

#[derive(Debug, Clone)]
struct StoredModule {
    udf_type: String,
    hash: String,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct PendingUpload {
    hash: String,
    size: u64,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    modules: BTreeMap<String, StoredModule>,
    uploads: HashMap<String, PendingUpload>,
    faults: VecDeque<Fault>,
    calls: Vec<String>,
    targets: Vec<NodeSelection>,
    corrupt_content: bool,
    change_hash_after_first_chunk: bool,
    ignore_max_size: bool,
    reject_uploads: Option<String>,
    list_override: Option<String>,
}

/// In-memory node implementing the UDF info commands.
///
/// Cloning shares the state, so a test can keep a handle for inspection
/// after moving one into a registry.
#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a module directly, bypassing the upload path.
    pub fn with_module(self, name: &str, content: &[u8]) -> Self {
        self.state.lock().unwrap().modules.insert(
            name.to_string(),
            StoredModule {
                udf_type: "LUA".to_string(),
                hash: HashAlgorithm::Sha1.fingerprint(content),
                content: content.to_vec(),
            },
        );
        self
    }

    pub fn inject(&self, fault: Fault) {
        self.state.lock().unwrap().faults.push_back(fault);
    }

    pub fn fail_next(&self, count: usize) {
        for _ in 0..count {
            self.inject(Fault::Transport);
        }
    }

    pub fn corrupt_content(&self, enabled: bool) {
        self.state.lock().unwrap().corrupt_content = enabled;
    }

    pub fn change_hash_after_first_chunk(&self, enabled: bool) {
        self.state.lock().unwrap().change_hash_after_first_chunk = enabled;
    }

    /// Serves the whole remainder of a module regardless of `max-size`.
    pub fn ignore_max_size(&self, enabled: bool) {
        self.state.lock().unwrap().ignore_max_size = enabled;
    }

    pub fn reject_uploads(&self, message: &str) {
        self.state.lock().unwrap().reject_uploads = Some(message.to_string());
    }

    /// Replaces the `udf-list` value with raw text.
    pub fn override_list(&self, body: &str) {
        self.state.lock().unwrap().list_override = Some(body.to_string());
    }

    /// Total number of commands received, faulted ones included.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Number of commands received with the given name.
    pub fn calls_to(&self, command: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    pub fn targets(&self) -> Vec<NodeSelection> {
        self.state.lock().unwrap().targets.clone()
    }

    pub fn module(&self, name: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .modules
            .get(name)
            .map(|m| m.content.clone())
    }

    pub fn module_count(&self) -> usize {
        self.state.lock().unwrap().modules.len()
    }

    /// Answers one command as a node would, echo and newline included.
    pub fn respond(&self, command: &str) -> String {
        let command = command.trim_end_matches('\n');
        let (name, params) = command.split_once(':').unwrap_or((command, ""));
        let fields = match Fields::parse(params, ';') {
            Ok(fields) => fields,
            Err(_) => return format!("{}\tERROR:4:malformed parameters\n", command),
        };

        let mut state = self.state.lock().unwrap();
        let value = match name {
            "udf-list" => state.list(),
            "udf-get" => state.get(&fields),
            "udf-put" => state.put(&fields),
            "udf-remove" => state.remove(&fields),
            _ => "ERROR:4:unknown command".to_string(),
        };
        format!("{}\t{}\n", command, value)
    }
}

impl State {
    fn list(&self) -> String {
        if let Some(body) = &self.list_override {
            return body.clone();
        }
        self.modules
            .iter()
            .map(|(name, m)| {
                format!(
                    "filename={},hash={},type={},size={};",
                    name,
                    m.hash,
                    m.udf_type,
                    m.content.len()
                )
            })
            .collect()
    }

    fn get(&self, fields: &Fields<'_>) -> String {
        let name = fields.get("filename").unwrap_or_default();
        let module = match self.modules.get(name) {
            Some(module) => module,
            None => return format!("error=not_found;file={}", name),
        };
        let offset = fields
            .get("offset")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let max = fields
            .get("max-size")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|_| !self.ignore_max_size)
            .unwrap_or(usize::MAX);

        let start = offset.min(module.content.len());
        let end = start.saturating_add(max).min(module.content.len());
        let mut payload = module.content[start..end].to_vec();
        if self.corrupt_content {
            if let Some(byte) = payload.first_mut() {
                *byte ^= 0xff;
            }
        }

        let hash = if self.change_hash_after_first_chunk && offset > 0 {
            HashAlgorithm::Sha1.fingerprint(b"a different revision")
        } else {
            module.hash.clone()
        };

        format!(
            "filename={};type={};hash={};size={};offset={};content-len={};content={};",
            name,
            module.udf_type,
            hash,
            module.content.len(),
            offset,
            payload.len(),
            encode_for_wire(&payload)
        )
    }

    fn put(&mut self, fields: &Fields<'_>) -> String {
        let name = fields.get("filename").unwrap_or_default().to_string();
        if let Some(message) = &self.reject_uploads {
            return format!(
                "error=compile_error;file={};line=1;message={}",
                name,
                encode_for_wire(message.as_bytes())
            );
        }

        let (hash, size, offset, payload) = match (
            fields.get("hash"),
            fields.require_u64("size"),
            fields.require_u64("offset"),
            fields.get("content").map(decode_from_wire),
        ) {
            (Some(hash), Ok(size), Ok(offset), Some(Ok(payload))) => {
                (hash.to_string(), size, offset, payload)
            }
            _ => return "ERROR:4:malformed upload".to_string(),
        };

        let end = offset + payload.len() as u64;

        // a re-sent chunk whose reply was lost is acknowledged again
        if let Some(upload) = self.uploads.get(&name) {
            if upload.hash == hash && end <= upload.content.len() as u64 {
                return "ok".to_string();
            }
        }
        if !self.uploads.contains_key(&name) && offset > 0 {
            if let Some(module) = self.modules.get(&name) {
                if module.hash == hash && end <= module.content.len() as u64 {
                    return "ok".to_string();
                }
            }
        }

        if offset == 0 {
            self.uploads.insert(
                name.clone(),
                PendingUpload {
                    hash: hash.clone(),
                    size,
                    content: Vec::new(),
                },
            );
        }
        let upload = match self.uploads.get_mut(&name) {
            Some(upload) if upload.content.len() as u64 == offset && upload.hash == hash => upload,
            _ => return "ERROR:4:out of order chunk".to_string(),
        };
        upload.content.extend_from_slice(&payload);

        if upload.content.len() as u64 == upload.size {
            let Some(upload) = self.uploads.remove(&name) else {
                return "ERROR:1:upload vanished".to_string();
            };
            let algorithm = if upload.hash.len() == 64 {
                HashAlgorithm::Sha256
            } else {
                HashAlgorithm::Sha1
            };
            if algorithm.fingerprint(&upload.content) != upload.hash {
                return "ERROR:4:hash does not match content".to_string();
            }
            self.modules.insert(
                name,
                StoredModule {
                    udf_type: fields.get("type").unwrap_or("LUA").to_string(),
                    hash: upload.hash,
                    content: upload.content,
                },
            );
        }
        "ok".to_string()
    }

    fn remove(&mut self, fields: &Fields<'_>) -> String {
        let name = fields.get("filename").unwrap_or_default();
        match self.modules.remove(name) {
            Some(_) => "ok".to_string(),
            None => format!("FAIL:2:{} not found", name),
        }
    }
}

#[async_trait]
impl NodeTransport for MockCluster {
    async fn send(&self, target: &NodeSelection, command: &str) -> Result<String> {
        let fault = {
            let mut state = self.state.lock().unwrap();
            let name = command.split(|c: char| c == ':' || c == '\n').next().unwrap_or_default();
            state.calls.push(name.to_string());
            state.targets.push(*target);
            state.faults.pop_front()
        };

        match fault {
            Some(Fault::Transport) => {
                return Err(UdfError::Transport("injected connection reset".to_string()))
            }
            Some(Fault::DropReply) => {
                self.respond(command);
                return Err(UdfError::Transport("injected lost reply".to_string()));
            }
            Some(Fault::Delay(delay)) => tokio::time::sleep(delay).await,
            Some(Fault::Pass) | None => {}
        }

        Ok(self.respond(command))
    }
}

/// Serves `cluster` over the info protocol on a loopback port.
///
/// Each accepted connection is handled until the peer closes it.
pub async fn spawn_info_server(cluster: MockCluster) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let cluster = cluster.clone();
            tokio::spawn(async move {
                let mut codec = InfoCodec::new();
                let mut buf = BytesMut::new();
                loop {
                    match codec.decode(&mut buf) {
                        Ok(Some(request)) => {
                            let reply = cluster.respond(&request);
                            let mut out = BytesMut::new();
                            codec.encode(reply.as_str(), &mut out).unwrap();
                            if socket.write_all(&out).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => match socket.read_buf(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) => {}
                        },
                        Err(_) => return,
                    }
                }
            });
        }
    });

    addr
}
