use serde::{Deserialize, Serialize};

/// Terrain-follow reference: absolute altitude target = ground elevation + AGL offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainReference {
    pub agl_offset_m: f64,
}

impl TerrainReference {
    pub fn new(agl_offset_m: f64) -> Self {
        Self { agl_offset_m }
    }

    pub fn target_asl(&self, terrain_elev_m: f64) -> f64 {
        terrain_elev_m + self.agl_offset_m
    }
}

impl Default for TerrainReference {
    fn default() -> Self {
        Self::new(60.0)
    }
}
