/// Material request construction and description generation
use crate::constants::{ENVMAP_ROUGHNESS_THRESHOLD, MATERIAL_ROOT};
use crate::descriptor::QuixelAsset;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("failed to read texture `{}`: {}", .path.display(), .source)]
    TextureRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bake failed: {0}")]
    Bake(String),
}

/// Shading profile for a baked material. Low-roughness surfaces get the
/// envmap variant so they pick up cubemap reflections in-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialMode {
    Phong,
    PhongEnvmap,
}

/// Where a slot's pixel data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// On-disk image referenced by the descriptor.
    File(PathBuf),
    /// Constant single-channel fill for a slot the bake always consumes.
    Flat(f32),
}

/// Normalized bake request for one shared material. Slots resolve to
/// on-disk files only; a referenced image that is missing from the
/// download leaves its slot empty rather than failing the asset.
#[derive(Debug, Clone)]
pub struct MaterialRequest {
    /// Game-relative material name (`models/<material identity>`).
    pub name: String,
    pub mode: MaterialMode,
    /// Square output resolution edge.
    pub resolution: u32,
    pub albedo: Option<TextureSource>,
    pub roughness: Option<TextureSource>,
    /// Always present; a missing Metalness slot bakes as non-metal.
    pub metallic: TextureSource,
    pub transmission: Option<TextureSource>,
    pub ao: Option<TextureSource>,
    pub normal: Option<TextureSource>,
    pub displacement: Option<TextureSource>,
}

/// One baked texture: the material name plus `suffix` names the file.
#[derive(Debug, Clone)]
pub struct BakedTexture {
    pub suffix: String,
    pub data: Vec<u8>,
}

/// A named material with its baked texture set, ready to be written.
#[derive(Debug, Clone)]
pub struct BakedMaterial {
    pub name: String,
    pub textures: Vec<BakedTexture>,
}

/// Capability interface for the texture bake pipeline. Pixel processing
/// and container encoding live behind this seam.
pub trait MaterialBaker {
    fn bake(&self, request: &MaterialRequest) -> Result<BakedMaterial, MaterialError>;
}

fn slot_source(folder: &Path, asset: &QuixelAsset, slot: &str) -> Option<TextureSource> {
    let texture = asset.textures.get(slot)?;
    let path = folder.join(&texture.path);
    if !path.exists() {
        return None;
    }
    Some(TextureSource::File(path))
}

/// Builds the bake request for an asset's shared material. `descriptor_path`
/// anchors the descriptor-relative texture paths.
pub fn build_request(
    descriptor_path: &Path,
    asset: &QuixelAsset,
    resolution: u32,
) -> MaterialRequest {
    let folder = descriptor_path.parent().unwrap_or(Path::new("."));

    let mode = match asset.textures.get("Roughness") {
        Some(roughness) if roughness.min_intensity < ENVMAP_ROUGHNESS_THRESHOLD => {
            MaterialMode::PhongEnvmap
        }
        _ => MaterialMode::Phong,
    };

    MaterialRequest {
        name: format!("{}/{}", MATERIAL_ROOT, asset.material_name),
        mode,
        resolution,
        albedo: slot_source(folder, asset, "Albedo"),
        roughness: slot_source(folder, asset, "Roughness"),
        metallic: slot_source(folder, asset, "Metalness").unwrap_or(TextureSource::Flat(0.0)),
        transmission: slot_source(folder, asset, "Transmission"),
        ao: slot_source(folder, asset, "AO"),
        normal: slot_source(folder, asset, "Normal"),
        displacement: slot_source(folder, asset, "Displacement"),
    }
}

/// Output filename suffix for each slot of a request, in bake order.
fn request_slots(request: &MaterialRequest) -> [(&'static str, Option<&TextureSource>); 7] {
    [
        ("", request.albedo.as_ref()),
        ("_rough", request.roughness.as_ref()),
        ("_metal", Some(&request.metallic)),
        ("_trans", request.transmission.as_ref()),
        ("_ao", request.ao.as_ref()),
        ("_bump", request.normal.as_ref()),
        ("_height", request.displacement.as_ref()),
    ]
}

/// Default baker: copies each file-backed slot's bytes through unchanged.
/// Channel packing, resizing and VTF encoding belong to a substituted
/// implementation; flat fills produce no output here.
pub struct PassthroughBaker;

impl MaterialBaker for PassthroughBaker {
    fn bake(&self, request: &MaterialRequest) -> Result<BakedMaterial, MaterialError> {
        let mut textures = Vec::new();
        for (suffix, source) in request_slots(request) {
            if let Some(TextureSource::File(path)) = source {
                let data = fs::read(path).map_err(|source| MaterialError::TextureRead {
                    path: path.clone(),
                    source,
                })?;
                textures.push(BakedTexture {
                    suffix: suffix.to_string(),
                    data,
                });
            }
        }
        Ok(BakedMaterial {
            name: request.name.clone(),
            textures,
        })
    }
}

/// Renders the engine-side material description for a request.
pub fn make_vmt(request: &MaterialRequest) -> String {
    let mut lines = vec![
        "\"VertexLitGeneric\"".to_string(),
        "{".to_string(),
        format!("\t\"$basetexture\" \"{}\"", request.name),
    ];
    if request.normal.is_some() {
        lines.push(format!("\t\"$bumpmap\" \"{}_bump\"", request.name));
    }
    lines.push("\t\"$phong\" \"1\"".to_string());
    lines.push("\t\"$phongboost\" \"1\"".to_string());
    lines.push("\t\"$phongfresnelranges\" \"[0 0.5 1]\"".to_string());
    if request.mode == MaterialMode::PhongEnvmap {
        lines.push("\t\"$envmap\" \"env_cubemap\"".to_string());
    }
    lines.push("}".to_string());
    lines.join("\n") + "\n"
}
