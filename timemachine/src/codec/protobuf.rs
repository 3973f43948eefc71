//! Protobuf packet decoder

use prost::Message;
use tracing::debug;

use super::proto::{self, quadtree_layer::LayerType};
use super::{CodecError, PacketContext, PacketDecoder};
use crate::packet::{Channel, DatedEntry, ImageDate, Layer, LayerKind, Node, Packet};

/// Decodes `QuadtreePacket` messages served by the named databases.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufDecoder;

impl PacketDecoder for ProtobufDecoder {
    fn decode(&self, payload: &[u8], _context: PacketContext) -> Result<Packet, CodecError> {
        let message = proto::QuadtreePacket::decode(payload)
            .map_err(|e| CodecError::InvalidPacketData(format!("protobuf: {}", e)))?;

        let mut packet = Packet::new(non_negative(message.packet_epoch));
        for sparse in message.sparse_quadtree_node {
            let index = u32::try_from(sparse.index).map_err(|_| {
                CodecError::InvalidPacketData(format!("negative node index {}", sparse.index))
            })?;
            let node = sparse.node.ok_or_else(|| {
                CodecError::InvalidPacketData(format!("node {} has no body", index))
            })?;
            packet.insert(index, convert_node(node));
        }
        Ok(packet)
    }
}

fn convert_node(node: proto::QuadtreeNode) -> Node {
    let mut converted = Node {
        cache_node_epoch: node.cache_node_epoch.map(non_negative).unwrap_or(0),
        layers: Vec::with_capacity(node.layer.len()),
        channels: node
            .channel
            .iter()
            .map(|channel| Channel {
                kind: channel.r#type,
                epoch: channel.channel_epoch,
            })
            .collect(),
    };

    for layer in node.layer {
        let kind = match LayerType::try_from(layer.r#type) {
            Ok(LayerType::Imagery) => LayerKind::Imagery,
            Ok(LayerType::ImageryHistory) => LayerKind::ImageryHistory,
            Ok(LayerType::Terrain) => LayerKind::Terrain,
            Ok(LayerType::Vector) => LayerKind::Vector,
            Err(_) => {
                debug!(layer_type = layer.r#type, "Skipping unknown layer type");
                continue;
            }
        };

        let dates = layer
            .dates_layer
            .map(|dates| {
                dates
                    .dated_tile
                    .iter()
                    .map(|tile| DatedEntry {
                        date: ImageDate::from_packed(non_negative(tile.date)),
                        epoch: non_negative(tile.dated_tile_epoch),
                        provider: non_negative(tile.provider),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let layer = Layer::new(
            kind,
            non_negative(layer.layer_epoch),
            layer.provider.map(non_negative).unwrap_or(0),
        )
        .with_dates(dates);

        if !converted.push_layer(layer) {
            debug!(?kind, "Ignoring duplicate layer");
        }
    }

    converted
}

#[inline]
fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
