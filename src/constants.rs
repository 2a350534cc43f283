/// Shared configuration for the Megascans conversion pipeline

/// Game directory namespace every converted asset lives under
pub const GAME_SUBDIR: &str = "props_megascans";

/// Root folder (below `materials/`) for compiled material references
pub const MATERIAL_ROOT: &str = "models";

/// Default square texture resolution requested from descriptors
pub const DEFAULT_RESOLUTION: u32 = 4096;

/// Default raster format accepted when resolving texture variants
pub const DEFAULT_TEXTURE_MIME: &str = "image/jpeg";

/// Default mesh format accepted when resolving geometry variants
pub const DEFAULT_MESH_MIME: &str = "application/x-fbx";

/// Maximum number of LOD meshes selected per asset
pub const MAX_LOD_COUNT: usize = 5;

/// Leading entries of a sorted variant list that are never selected
pub const RESERVED_MODEL_SLOTS: usize = 2;

/// Roughness floor below which a material gets an environment map
pub const ENVMAP_ROUGHNESS_THRESHOLD: f32 = 0.6;

/// Model compiler executable expected inside the configured bin directory
pub const COMPILER_BINARY: &str = "studiomdl.exe";

/// Descriptor file extension recognized during discovery
pub const DESCRIPTOR_EXTENSION: &str = "json";

pub struct SizeClass {
    pub size: &'static str,
    pub base_distance: u32,
}

/// LOD base distance per descriptor `size` property
pub const SIZE_CLASSES: &[SizeClass] = &[
    SizeClass {
        size: "large",
        base_distance: 100,
    },
    SizeClass {
        size: "medium",
        base_distance: 10,
    },
];

/// Base distance applied when `size` is absent or unlisted
pub const FALLBACK_BASE_DISTANCE: u32 = 6;

pub fn get_base_distance(size: Option<&str>) -> u32 {
    SIZE_CLASSES
        .iter()
        .find(|c| Some(c.size) == size)
        .map_or(FALLBACK_BASE_DISTANCE, |c| c.base_distance)
}
