/// Primary and LOD mesh selection over an asset's sorted variants
use crate::constants::{MAX_LOD_COUNT, RESERVED_MODEL_SLOTS, get_base_distance};
use crate::descriptor::{QuixelAsset, QuixelModel};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LodError {
    #[error("no usable primary model ({0} variants, first {RESERVED_MODEL_SLOTS} reserved)")]
    NoPrimaryModel(usize),
}

/// One selected LOD mesh with the distance at which it takes over.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedLod {
    pub model: QuixelModel,
    pub distance: u32,
}

/// Export plan for one asset: the primary mesh plus distance-tagged LODs.
#[derive(Debug, Clone)]
pub struct LodPlan {
    pub primary: QuixelModel,
    pub lods: Vec<SelectedLod>,
}

/// Base LOD distance from the asset's declared physical size.
pub fn base_lod_distance(asset: &QuixelAsset) -> u32 {
    get_base_distance(asset.properties.get("size").map(String::as_str))
}

/// Walks the sorted variant list and picks the primary model and up to
/// [`MAX_LOD_COUNT`] LOD models.
///
/// The first two entries are always passed over, the next becomes the
/// primary, and among the remaining entries every second one (the even
/// post-skip indices) is accepted. Transition distances scale linearly
/// with the post-skip index. The selection constants are tuned against
/// Megascans variant lists as shipped and are not derived from anything.
pub fn select_lods(models: &[QuixelModel], base_distance: u32) -> Result<LodPlan, LodError> {
    let mut primary = None;
    let mut lods = Vec::new();

    for (i, model) in models.iter().skip(RESERVED_MODEL_SLOTS).enumerate() {
        if primary.is_none() {
            primary = Some(model.clone());
            continue;
        }
        if i % 2 == 1 {
            continue;
        }
        if lods.len() >= MAX_LOD_COUNT {
            break;
        }
        lods.push(SelectedLod {
            model: model.clone(),
            distance: i as u32 * base_distance,
        });
    }

    let primary = primary.ok_or(LodError::NoPrimaryModel(models.len()))?;
    Ok(LodPlan { primary, lods })
}
