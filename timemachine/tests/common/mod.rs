//! Shared fixtures: a call-counting HTTP stub and a served packet tree.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use parking_lot::Mutex;
use prost::Message;

use timemachine::codec::{compress_packet, proto, XorKey};
use timemachine::provider::{AsyncHttpClient, ConditionalResponse, HttpResponse, ProviderError};
use timemachine::store::Manifest;
use timemachine::Database;

pub const ROOT_EPOCH: u32 = 900;

pub fn key() -> XorKey {
    XorKey::new((0..256u32).map(|i| (i * 31 + 7) as u8).collect::<Vec<_>>()).unwrap()
}

/// HTTP stub serving canned bodies and counting requests per URL.
#[derive(Default)]
pub struct StubHttp {
    routes: Mutex<HashMap<String, (Vec<u8>, Option<SystemTime>)>>,
    hits: Mutex<HashMap<String, usize>>,
    latency: Duration,
}

impl StubHttp {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn serve(&self, url: &str, body: Vec<u8>, last_modified: Option<SystemTime>) {
        self.routes
            .lock()
            .insert(url.to_string(), (body, last_modified));
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().values().sum()
    }

    async fn lookup(&self, url: &str) -> Result<(Vec<u8>, Option<SystemTime>), ProviderError> {
        *self.hits.lock().entry(url.to_string()).or_default() += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.routes
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}

impl AsyncHttpClient for StubHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        let (body, last_modified) = self.lookup(url).await?;
        Ok(HttpResponse {
            body: Bytes::from(body),
            last_modified,
        })
    }

    async fn get_if_modified_since(
        &self,
        url: &str,
        since: SystemTime,
    ) -> Result<ConditionalResponse, ProviderError> {
        let (body, last_modified) = self.lookup(url).await?;
        match last_modified {
            Some(modified) if modified <= since => Ok(ConditionalResponse::NotModified),
            _ => Ok(ConditionalResponse::Modified(HttpResponse {
                body: Bytes::from(body),
                last_modified,
            })),
        }
    }
}

/// Encrypts a payload the way the service frames packets.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut wire = compress_packet(payload).unwrap();
    key().apply(&mut wire);
    wire
}

pub fn serve_manifest(http: &StubHttp, database: Database, last_modified: Option<SystemTime>) {
    let body = Manifest::new(key(), ROOT_EPOCH).to_bytes().unwrap();
    http.serve(&database.dbroot_url(), body, last_modified);
}

/// Serves a `tm` packet built from `(subindex, node)` pairs.
pub fn serve_packet(http: &StubHttp, path: &str, epoch: u32, nodes: Vec<(u32, proto::QuadtreeNode)>) {
    let packet = proto::QuadtreePacket {
        packet_epoch: epoch as i32,
        sparse_quadtree_node: nodes
            .into_iter()
            .map(|(index, node)| proto::quadtree_packet::SparseQuadtreeNode {
                index: index as i32,
                node: Some(node),
            })
            .collect(),
    };
    http.serve(
        &Database::TimeMachine.packet_url(path, epoch),
        frame(&packet.encode_to_vec()),
        None,
    );
}

pub fn packet_url(path: &str, epoch: u32) -> String {
    Database::TimeMachine.packet_url(path, epoch)
}

pub fn node(cache_node_epoch: i32) -> proto::QuadtreeNode {
    proto::QuadtreeNode {
        cache_node_epoch: Some(cache_node_epoch),
        ..Default::default()
    }
}

pub fn imagery(epoch: i32, provider: i32) -> proto::QuadtreeLayer {
    proto::QuadtreeLayer {
        r#type: proto::quadtree_layer::LayerType::Imagery as i32,
        layer_epoch: epoch,
        provider: Some(provider),
        dates_layer: None,
    }
}

/// An imagery-history layer listing `(packed date, epoch, provider)` entries.
pub fn history(entries: &[(u32, i32, i32)]) -> proto::QuadtreeLayer {
    proto::QuadtreeLayer {
        r#type: proto::quadtree_layer::LayerType::ImageryHistory as i32,
        layer_epoch: 1,
        provider: None,
        dates_layer: Some(proto::QuadtreeImageryDates {
            dated_tile: entries
                .iter()
                .map(|&(date, epoch, provider)| proto::QuadtreeImageryDatedTile {
                    date: date as i32,
                    dated_tile_epoch: epoch,
                    provider,
                })
                .collect(),
            shared_tile_date: None,
            coarse_tile_dates: vec![],
        }),
    }
}
