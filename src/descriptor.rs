/// Quixel descriptor parsing and normalization
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::constants::GAME_SUBDIR;

/// Error types for descriptor reading. Every variant marks the whole
/// descriptor file as malformed; the batch skips the file and moves on.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid descriptor data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("descriptor field `{0}` is missing")]
    MissingField(&'static str),
    #[error("`pack` field has an unsupported value")]
    UnsupportedPack,
    #[error("invalid color string `{0}`")]
    BadColor(String),
}

/// One texture slot resolved at the requested resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct QuixelTexture {
    /// Slot name (`Albedo`, `Roughness`, ...).
    pub name: String,
    /// Source image path relative to the descriptor's folder.
    pub path: String,
    pub color_space: String,
    pub min_intensity: f32,
    pub max_intensity: f32,
    /// Normalized RGB decoded from the descriptor's hex color.
    pub average_color: [f32; 3],
}

/// One mesh variant of an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct QuixelModel {
    /// Detail ordinal; 0 is the highest-detail mesh.
    pub lod: i32,
    /// Source mesh path relative to the descriptor's folder.
    pub path: String,
    /// Declared triangle count, -1 when the descriptor omits it.
    pub tri_count: i32,
    /// Variation id inside a collection, -1 for single assets.
    pub variation: i32,
}

/// A normalized asset ready for material and mesh processing.
#[derive(Debug, Clone)]
pub struct QuixelAsset {
    /// Human-readable name, suffixed with the variation id for collections.
    pub name: String,
    /// Game-relative model name (`props_megascans/<slug>[_<variation>]`).
    pub game_name: String,
    /// Shared material identity; collection variants all carry the same one.
    pub material_name: String,
    /// Texture slots keyed by slot name.
    pub textures: HashMap<String, QuixelTexture>,
    /// Mesh variants sorted by ascending LOD ordinal.
    pub models: Vec<QuixelModel>,
    /// Flattened descriptor properties.
    pub properties: HashMap<String, String>,
}

/// Variant resolution parameters applied while reading a descriptor.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Resolution string matched against variant declarations (`4096x4096`).
    pub resolution: String,
    /// Accepted raster mime type.
    pub texture_mime: String,
    /// Accepted mesh mime type.
    pub mesh_mime: String,
}

#[derive(Deserialize)]
struct RawDescriptor {
    name: String,
    pack: Value,
    properties: Vec<RawProperty>,
    maps: Option<Vec<Value>>,
    models: Option<Vec<Value>>,
    components: Option<Vec<Value>>,
    meshes: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawProperty {
    key: String,
    value: Value,
}

/// Flattened per-format texture entry, used by collection descriptors.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMap {
    uri: String,
    resolution: String,
    mime_type: String,
    name: Option<String>,
    color_space: Option<String>,
    average_color: Option<String>,
}

/// Per-variation mesh entry, used by collection descriptors.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackModel {
    mime_type: String,
    uri: Option<String>,
    variation: Option<i32>,
    lod: Option<i32>,
    tris: Option<i32>,
}

/// Texture component with nested resolution/format variants, used by
/// single-asset descriptors.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComponent {
    name: String,
    color_space: String,
    min_intensity: f32,
    max_intensity: f32,
    average_color: String,
    uris: Vec<RawComponentUri>,
}

#[derive(Deserialize)]
struct RawComponentUri {
    resolutions: Option<Vec<RawResolution>>,
}

#[derive(Deserialize)]
struct RawResolution {
    resolution: String,
    formats: Option<Vec<RawFormat>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormat {
    mime_type: String,
    uri: Option<String>,
}

/// Mesh entry with per-format uris, used by single-asset descriptors.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMesh {
    uris: Vec<RawMeshUri>,
    tris: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeshUri {
    mime_type: String,
    uri: Option<String>,
}

/// Descriptor form, decided once from the `pack` field before any
/// shape-specific key is touched.
enum DescriptorShape {
    Collection { pack_name: String },
    Single,
}

fn classify_pack(pack: &Value) -> Result<DescriptorShape, DescriptorError> {
    match pack {
        Value::Null | Value::Bool(false) => Ok(DescriptorShape::Single),
        Value::String(s) if s.is_empty() => Ok(DescriptorShape::Single),
        Value::Array(items) if items.is_empty() => Ok(DescriptorShape::Single),
        Value::Number(n) if n.as_f64() == Some(0.0) => Ok(DescriptorShape::Single),
        Value::Object(fields) => {
            if fields.is_empty() {
                return Ok(DescriptorShape::Single);
            }
            let pack_name = fields
                .get("name")
                .and_then(Value::as_str)
                .ok_or(DescriptorError::MissingField("pack.name"))?;
            Ok(DescriptorShape::Collection {
                pack_name: pack_name.to_string(),
            })
        }
        _ => Err(DescriptorError::UnsupportedPack),
    }
}

/// Reads one descriptor file into zero or more normalized assets.
pub fn read_descriptor(
    path: &Path,
    options: &ReadOptions,
) -> Result<Vec<QuixelAsset>, DescriptorError> {
    let contents = fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    parse_descriptor(&contents, &stem, options)
}

/// Parses descriptor JSON. `stem` is the descriptor filename without
/// extension and becomes part of the game-relative name.
pub fn parse_descriptor(
    contents: &str,
    stem: &str,
    options: &ReadOptions,
) -> Result<Vec<QuixelAsset>, DescriptorError> {
    let raw: RawDescriptor = serde_json::from_str(contents)?;

    let slug = raw.name.to_lowercase().replace(' ', "_");
    let game_name = format!("{}/{}_{}", GAME_SUBDIR, slug, stem);
    let properties = read_properties(&raw.properties)?;

    match classify_pack(&raw.pack)? {
        DescriptorShape::Collection { pack_name } => {
            println!("| Reading meta as collection... ({pack_name})");
            read_collection(raw, &game_name, properties, options)
        }
        DescriptorShape::Single => read_single(raw, &game_name, properties, options),
    }
}

/// Collection arm: flat maps become the shared texture set, model entries
/// are grouped into one asset per variation id.
fn read_collection(
    raw: RawDescriptor,
    game_name: &str,
    properties: HashMap<String, String>,
    options: &ReadOptions,
) -> Result<Vec<QuixelAsset>, DescriptorError> {
    let maps = raw.maps.ok_or(DescriptorError::MissingField("maps"))?;
    let models = raw.models.ok_or(DescriptorError::MissingField("models"))?;

    let mut textures = HashMap::new();
    for entry in maps {
        let map: RawMap = serde_json::from_value(entry)?;
        if let Some(texture) = read_map(&map, options)? {
            textures.insert(texture.name.clone(), texture);
        }
    }

    let mut variants: BTreeMap<i32, QuixelAsset> = BTreeMap::new();
    for entry in models {
        let model: RawPackModel = serde_json::from_value(entry)?;
        let Some(model) = read_pack_model(&model, options)? else {
            continue;
        };
        let variant = variants.entry(model.variation).or_insert_with(|| QuixelAsset {
            name: format!("{} {}", raw.name, model.variation),
            game_name: format!("{}_{}", game_name, model.variation),
            material_name: game_name.to_string(),
            textures: textures.clone(),
            models: Vec::new(),
            properties: properties.clone(),
        });
        variant.models.push(model);
    }

    let mut assets: Vec<QuixelAsset> = variants.into_values().collect();
    for asset in &mut assets {
        asset.models.sort_by_key(|m| m.lod);
    }

    println!("| Found {} variants in collection!", assets.len());
    Ok(assets)
}

/// Single arm: components become the texture set, mesh entries become the
/// LOD chain in declaration order.
fn read_single(
    raw: RawDescriptor,
    game_name: &str,
    properties: HashMap<String, String>,
    options: &ReadOptions,
) -> Result<Vec<QuixelAsset>, DescriptorError> {
    let components = raw
        .components
        .ok_or(DescriptorError::MissingField("components"))?;
    let meshes = raw.meshes.ok_or(DescriptorError::MissingField("meshes"))?;

    let mut textures = HashMap::new();
    for entry in components {
        let component: RawComponent = serde_json::from_value(entry)?;
        if let Some(texture) = read_component(&component, options)? {
            textures.insert(texture.name.clone(), texture);
        }
    }

    let mut models = Vec::new();
    for (index, entry) in meshes.into_iter().enumerate() {
        let mesh: RawMesh = serde_json::from_value(entry)?;
        if let Some(model) = read_mesh(&mesh, index, options)? {
            models.push(model);
        }
    }

    Ok(vec![QuixelAsset {
        name: raw.name,
        game_name: game_name.to_string(),
        material_name: game_name.to_string(),
        textures,
        models,
        properties,
    }])
}

/// Filters one flat map entry against the requested resolution and mime
/// type. Collections declare no intensity range, so the full one is used.
fn read_map(
    map: &RawMap,
    options: &ReadOptions,
) -> Result<Option<QuixelTexture>, DescriptorError> {
    if map.resolution != options.resolution || map.mime_type != options.texture_mime {
        return Ok(None);
    }

    let name = map
        .name
        .clone()
        .ok_or(DescriptorError::MissingField("maps[].name"))?;
    let color_space = map
        .color_space
        .clone()
        .ok_or(DescriptorError::MissingField("maps[].colorSpace"))?;
    let average_color = map
        .average_color
        .as_deref()
        .ok_or(DescriptorError::MissingField("maps[].averageColor"))?;

    Ok(Some(QuixelTexture {
        name,
        path: map.uri.clone(),
        color_space,
        min_intensity: 0.0,
        max_intensity: 255.0,
        average_color: read_color(average_color)?,
    }))
}

fn read_pack_model(
    model: &RawPackModel,
    options: &ReadOptions,
) -> Result<Option<QuixelModel>, DescriptorError> {
    if model.mime_type != options.mesh_mime {
        return Ok(None);
    }

    let path = model
        .uri
        .clone()
        .ok_or(DescriptorError::MissingField("models[].uri"))?;
    let variation = model
        .variation
        .ok_or(DescriptorError::MissingField("models[].variation"))?;

    Ok(Some(QuixelModel {
        // Collections reserve ordinal 0 for entries without a lod key.
        lod: model.lod.map_or(0, |lod| lod + 1),
        path,
        tri_count: model.tris.unwrap_or(-1),
        variation,
    }))
}

/// Searches a component's resolution entries for the requested resolution,
/// then its formats for the accepted mime type. No match means the slot is
/// absent at this resolution and the component is dropped.
fn read_component(
    component: &RawComponent,
    options: &ReadOptions,
) -> Result<Option<QuixelTexture>, DescriptorError> {
    let uri = component
        .uris
        .first()
        .ok_or(DescriptorError::MissingField("components[].uris"))?;
    let resolutions = uri
        .resolutions
        .as_ref()
        .ok_or(DescriptorError::MissingField("components[].uris[].resolutions"))?;

    let mut path = None;
    'search: for entry in resolutions {
        if entry.resolution != options.resolution {
            continue;
        }
        let formats = entry
            .formats
            .as_ref()
            .ok_or(DescriptorError::MissingField("resolutions[].formats"))?;
        for format in formats {
            if format.mime_type != options.texture_mime {
                continue;
            }
            let uri = format
                .uri
                .clone()
                .ok_or(DescriptorError::MissingField("formats[].uri"))?;
            path = Some(uri);
            break 'search;
        }
    }

    let average_color = read_color(&component.average_color)?;
    Ok(path.map(|path| QuixelTexture {
        name: component.name.clone(),
        path,
        color_space: component.color_space.clone(),
        min_intensity: component.min_intensity,
        max_intensity: component.max_intensity,
        average_color,
    }))
}

/// Picks the first uri entry matching the accepted mesh mime type. The
/// enumeration index is the LOD ordinal.
fn read_mesh(
    mesh: &RawMesh,
    index: usize,
    options: &ReadOptions,
) -> Result<Option<QuixelModel>, DescriptorError> {
    for uri in &mesh.uris {
        if uri.mime_type != options.mesh_mime {
            continue;
        }
        let path = uri
            .uri
            .clone()
            .ok_or(DescriptorError::MissingField("meshes[].uris[].uri"))?;
        return Ok(Some(QuixelModel {
            lod: index as i32,
            path,
            tri_count: mesh.tris.unwrap_or(-1),
            variation: -1,
        }));
    }
    Ok(None)
}

/// Decodes a `#RRGGBB` hex color into normalized RGB.
pub fn read_color(color: &str) -> Result<[f32; 3], DescriptorError> {
    let digits = color
        .strip_prefix('#')
        .filter(|d| d.len() == 6)
        .ok_or_else(|| DescriptorError::BadColor(color.to_string()))?;

    let channel = |start: usize| -> Result<f32, DescriptorError> {
        let pair = digits
            .get(start..start + 2)
            .ok_or_else(|| DescriptorError::BadColor(color.to_string()))?;
        let value = u8::from_str_radix(pair, 16)
            .map_err(|_| DescriptorError::BadColor(color.to_string()))?;
        Ok(value as f32 / 255.0)
    };

    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Flattens descriptor properties into a string map; later duplicates of a
/// key overwrite earlier ones.
fn read_properties(
    raw: &[RawProperty],
) -> Result<HashMap<String, String>, DescriptorError> {
    let mut properties = HashMap::new();
    for prop in raw {
        let value = match &prop.value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(DescriptorError::MissingField("properties[].value")),
        };
        properties.insert(prop.key.clone(), value);
    }
    Ok(properties)
}
