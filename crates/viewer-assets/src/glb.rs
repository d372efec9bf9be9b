//! Binary glTF (GLB) container validation.
//!
//! Only the container is checked here: the 12-byte header, the mandatory JSON
//! chunk and the optional BIN chunk. Mesh decoding belongs to the renderer.

use serde::{Deserialize, Serialize};
use viewer_core::AssetError;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Facts read from a GLB container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlbSummary {
    pub version: u32,
    pub total_length: u32,
    pub json_length: u32,
    pub binary_length: Option<u32>,
    pub mesh_count: usize,
    pub material_count: usize,
}

#[derive(Deserialize)]
struct GltfJson {
    #[serde(default)]
    meshes: Vec<serde_json::Value>,
    #[serde(default)]
    materials: Vec<serde_json::Value>,
}

impl GlbSummary {
    /// Parse and validate a GLB byte buffer.
    pub fn parse(data: &[u8]) -> Result<Self, AssetError> {
        if data.len() < HEADER_LEN + CHUNK_HEADER_LEN {
            return Err(decode(format!("{} bytes is too short for a GLB", data.len())));
        }

        let magic = read_u32(data, 0);
        if magic != GLB_MAGIC {
            return Err(decode(format!("bad magic {:#010x}", magic)));
        }

        let version = read_u32(data, 4);
        if version != 2 {
            return Err(decode(format!("unsupported glTF version {}", version)));
        }

        let total_length = read_u32(data, 8);
        if total_length as usize != data.len() {
            return Err(decode(format!(
                "header length {} does not match {} bytes received",
                total_length,
                data.len()
            )));
        }

        let json_length = read_u32(data, HEADER_LEN);
        let json_type = read_u32(data, HEADER_LEN + 4);
        if json_type != CHUNK_JSON {
            return Err(decode("first chunk is not JSON"));
        }

        let json_start = HEADER_LEN + CHUNK_HEADER_LEN;
        let json_end = json_start + json_length as usize;
        if json_end > data.len() {
            return Err(decode("JSON chunk overruns the container"));
        }

        let gltf: GltfJson = serde_json::from_slice(trim_padding(&data[json_start..json_end]))
            .map_err(|e| decode(format!("invalid JSON chunk: {}", e)))?;

        let binary_length = if json_end == data.len() {
            None
        } else if json_end + CHUNK_HEADER_LEN <= data.len() {
            let bin_length = read_u32(data, json_end);
            let bin_type = read_u32(data, json_end + 4);
            if bin_type != CHUNK_BIN {
                return Err(decode(format!("unexpected chunk type {:#010x}", bin_type)));
            }
            if json_end + CHUNK_HEADER_LEN + bin_length as usize > data.len() {
                return Err(decode("BIN chunk overruns the container"));
            }
            Some(bin_length)
        } else {
            return Err(decode(format!(
                "{} stray bytes after the JSON chunk",
                data.len() - json_end
            )));
        };

        Ok(Self {
            version,
            total_length,
            json_length,
            binary_length,
            mesh_count: gltf.meshes.len(),
            material_count: gltf.materials.len(),
        })
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

// JSON chunks are space-padded to 4-byte alignment.
fn trim_padding(json: &[u8]) -> &[u8] {
    let end = json
        .iter()
        .rposition(|b| !matches!(b, b' ' | 0))
        .map(|i| i + 1)
        .unwrap_or(0);
    &json[..end]
}

fn decode(message: impl Into<String>) -> AssetError {
    AssetError::Decode(message.into())
}

/// Build a GLB container from a JSON document and an optional binary payload.
///
/// Both chunks are padded to 4-byte alignment as the format requires.
pub fn encode_glb(json: &str, bin: Option<&[u8]>) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let bin = bin.map(|b| {
        let mut b = b.to_vec();
        while b.len() % 4 != 0 {
            b.push(0);
        }
        b
    });

    let mut total = HEADER_LEN + CHUNK_HEADER_LEN + json.len();
    if let Some(b) = &bin {
        total += CHUNK_HEADER_LEN + b.len();
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    if let Some(b) = bin {
        out.extend_from_slice(&(b.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&b);
    }
    out
}
