//! Protobuf wire messages for quadtree packets and the database manifest.
//!
//! Field numbers follow the service's `quadtreeset.proto` and `dbroot.proto`.
//! Only the fields this crate reads are declared; prost skips the rest.

/// A quadtree packet: a sparse list of `(subindex, node)` pairs.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuadtreePacket {
    #[prost(int32, required, tag = "1")]
    pub packet_epoch: i32,
    #[prost(group, repeated, tag = "2")]
    pub sparse_quadtree_node: Vec<quadtree_packet::SparseQuadtreeNode>,
}

pub mod quadtree_packet {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SparseQuadtreeNode {
        #[prost(int32, required, tag = "3")]
        pub index: i32,
        #[prost(message, optional, tag = "4")]
        pub node: ::core::option::Option<super::QuadtreeNode>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuadtreeNode {
    #[prost(int32, optional, tag = "1")]
    pub flags: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub cache_node_epoch: Option<i32>,
    #[prost(message, repeated, tag = "3")]
    pub layer: Vec<QuadtreeLayer>,
    #[prost(message, repeated, tag = "4")]
    pub channel: Vec<QuadtreeChannel>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuadtreeLayer {
    #[prost(enumeration = "quadtree_layer::LayerType", required, tag = "1")]
    pub r#type: i32,
    #[prost(int32, required, tag = "2")]
    pub layer_epoch: i32,
    #[prost(int32, optional, tag = "3")]
    pub provider: Option<i32>,
    #[prost(message, optional, tag = "4")]
    pub dates_layer: Option<QuadtreeImageryDates>,
}

pub mod quadtree_layer {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum LayerType {
        Imagery = 0,
        Terrain = 1,
        Vector = 2,
        ImageryHistory = 3,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuadtreeImageryDates {
    #[prost(message, repeated, tag = "1")]
    pub dated_tile: Vec<QuadtreeImageryDatedTile>,
    #[prost(int32, optional, tag = "2")]
    pub shared_tile_date: Option<i32>,
    #[prost(int32, repeated, packed = "false", tag = "3")]
    pub coarse_tile_dates: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuadtreeImageryDatedTile {
    #[prost(int32, required, tag = "1")]
    pub date: i32,
    #[prost(int32, required, tag = "2")]
    pub dated_tile_epoch: i32,
    #[prost(int32, required, tag = "3")]
    pub provider: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuadtreeChannel {
    #[prost(int32, required, tag = "1")]
    pub r#type: i32,
    #[prost(int32, required, tag = "2")]
    pub channel_epoch: i32,
}

/// Outer manifest envelope: the XOR key plus the encrypted `DbRootProto`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EncryptedDbRootProto {
    #[prost(enumeration = "encrypted_db_root_proto::EncryptionType", optional, tag = "1")]
    pub encryption_type: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub encryption_data: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub dbroot_data: Option<Vec<u8>>,
}

pub mod encrypted_db_root_proto {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum EncryptionType {
        EncryptionXor = 0,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DbRootProto {
    #[prost(bool, optional, tag = "1")]
    pub imagery_present: Option<bool>,
    #[prost(message, optional, tag = "13")]
    pub database_version: Option<DatabaseVersionProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DatabaseVersionProto {
    #[prost(uint32, required, tag = "1")]
    pub quadtree_version: u32,
}
