//! Database manifest (dbRoot)
//!
//! The manifest is an `EncryptedDbRootProto` whose `encryption_data` is the
//! session XOR key and whose `dbroot_data` is an encrypted, compressed
//! `DbRootProto`. The only value the store needs from it is the quadtree
//! version, which is the epoch of the root packet.

use prost::Message;

use super::StoreError;
use crate::codec::proto::{DatabaseVersionProto, DbRootProto, EncryptedDbRootProto};
use crate::codec::{compress_packet, decompress_packet, XorKey};

/// Session key and root epoch read from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    key: XorKey,
    root_epoch: u32,
}

impl Manifest {
    pub fn new(key: XorKey, root_epoch: u32) -> Self {
        Self { key, root_epoch }
    }

    /// Decodes a manifest as served by the `dbRoot.v5` endpoint.
    pub fn parse(data: &[u8]) -> Result<Self, StoreError> {
        let envelope = EncryptedDbRootProto::decode(data)
            .map_err(|e| StoreError::Manifest(format!("envelope: {}", e)))?;

        let key = envelope
            .encryption_data
            .ok_or_else(|| StoreError::Manifest("missing encryption key".to_string()))?;
        let key = XorKey::new(key)?;

        let mut payload = envelope
            .dbroot_data
            .ok_or_else(|| StoreError::Manifest("missing dbroot data".to_string()))?;
        key.apply(&mut payload);
        let payload = decompress_packet(&payload)?;

        let dbroot = DbRootProto::decode(payload.as_slice())
            .map_err(|e| StoreError::Manifest(format!("dbroot: {}", e)))?;
        let version = dbroot
            .database_version
            .ok_or_else(|| StoreError::Manifest("missing database version".to_string()))?;

        Ok(Self {
            key,
            root_epoch: version.quadtree_version,
        })
    }

    /// Encodes the manifest in its served form.
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let dbroot = DbRootProto {
            imagery_present: Some(true),
            database_version: Some(DatabaseVersionProto {
                quadtree_version: self.root_epoch,
            }),
        };
        let mut payload = compress_packet(&dbroot.encode_to_vec())?;
        self.key.apply(&mut payload);

        let envelope = EncryptedDbRootProto {
            encryption_type: Some(0),
            encryption_data: Some(self.key.as_bytes().to_vec()),
            dbroot_data: Some(payload),
        };
        Ok(envelope.encode_to_vec())
    }

    pub fn key(&self) -> &XorKey {
        &self.key
    }

    /// Epoch of the root packet.
    pub fn root_epoch(&self) -> u32 {
        self.root_epoch
    }
}
