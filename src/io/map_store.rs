//! Occupancy map storage.
//!
//! A saved map is a small metadata file plus one serialized grid per layer:
//!
//! - `{name}.json` - metadata (resolution, cell counts, layer file names)
//! - `{name}.binary.json` - free/occupied classification
//! - `{name}.probability.json` - weighted occupancy estimates
//! - `{name}.frontier.json` - frontier cells

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithms::mapping::{OccupancyGrids, OccupancyState};
use crate::core::grid::SpatialGrid;
use crate::error::{MargaError, Result};

/// Metadata written next to the grid layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    /// Map name, also the file stem.
    pub name: String,
    /// World units per cell.
    pub resolution: f64,
    /// Known (free or occupied) unit cells.
    pub known_cells: usize,
    /// Frontier unit cells.
    pub frontier_cells: usize,
    /// Layer file names, relative to the metadata file.
    pub binary: String,
    pub probability: String,
    pub frontier: String,
}

/// Paths written by [`save_grids`].
#[derive(Debug, Clone, PartialEq)]
pub struct MapFiles {
    pub metadata: PathBuf,
    pub binary: PathBuf,
    pub probability: PathBuf,
    pub frontier: PathBuf,
}

/// Save all three layers of `grids` under `dir` as `name`.
pub fn save_grids<P: AsRef<Path>>(dir: P, name: &str, grids: &OccupancyGrids) -> Result<MapFiles> {
    let dir = dir.as_ref();
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(MargaError::Config(format!("invalid map name '{}'", name)));
    }
    fs::create_dir_all(dir)?;

    let info = MapInfo {
        name: name.to_string(),
        resolution: grids.resolution,
        known_cells: grids.binary.cells().count(),
        frontier_cells: grids.frontier.cells().count(),
        binary: format!("{}.binary.json", name),
        probability: format!("{}.probability.json", name),
        frontier: format!("{}.frontier.json", name),
    };
    let files = MapFiles {
        metadata: dir.join(format!("{}.json", name)),
        binary: dir.join(&info.binary),
        probability: dir.join(&info.probability),
        frontier: dir.join(&info.frontier),
    };

    fs::write(&files.binary, grids.binary.serialize()?)?;
    fs::write(&files.probability, grids.probability.serialize()?)?;
    fs::write(&files.frontier, grids.frontier.serialize()?)?;
    fs::write(&files.metadata, serde_json::to_string_pretty(&info)?)?;

    log::info!(
        "Saved map '{}' ({} known cells, {} frontier cells) to {}",
        name,
        info.known_cells,
        info.frontier_cells,
        dir.display()
    );
    Ok(files)
}

/// Load the metadata and the binary layer of a saved map.
pub fn load_binary_grid<P: AsRef<Path>>(
    metadata: P,
) -> Result<(MapInfo, SpatialGrid<OccupancyState, 2>)> {
    let metadata = metadata.as_ref();
    let info: MapInfo = serde_json::from_str(&fs::read_to_string(metadata)?)?;
    let dir = metadata.parent().unwrap_or_else(|| Path::new("."));
    let binary = SpatialGrid::deserialize(&fs::read_to_string(dir.join(&info.binary))?)?;
    Ok((info, binary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::mapping::OccupancyMapper;
    use tempfile::TempDir;

    fn grids() -> OccupancyGrids {
        let mut binary = SpatialGrid::new();
        for x in -2..=2 {
            binary.set([x, 0], OccupancyState::Free);
        }
        binary.set([3, 0], OccupancyState::Occupied);
        OccupancyGrids {
            resolution: 10.0,
            frontier: OccupancyMapper::frontier_grid(&binary),
            binary,
            ..OccupancyGrids::default()
        }
    }

    #[test]
    fn test_save_and_load_binary_layer() {
        let dir = TempDir::new().unwrap();
        let grids = grids();
        let files = save_grids(dir.path(), "kitchen", &grids).unwrap();
        assert!(files.probability.exists());
        assert!(files.frontier.exists());

        let (info, binary) = load_binary_grid(&files.metadata).unwrap();
        assert_eq!(info.name, "kitchen");
        assert_eq!(info.known_cells, 6);
        assert_eq!(binary, grids.binary);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            save_grids(dir.path(), "../escape", &grids()),
            Err(MargaError::Config(_))
        ));
    }

    #[test]
    fn test_corrupt_layer_rejected() {
        let dir = TempDir::new().unwrap();
        let files = save_grids(dir.path(), "map", &grids()).unwrap();
        let three_d = concat!(
            r#"{"dimensions": 3, "root": "#,
            r#"{"level": 0, "cell": {"kind": "leaf", "value": null}}}"#,
        );
        fs::write(&files.binary, three_d).unwrap();
        assert!(matches!(load_binary_grid(&files.metadata), Err(MargaError::GridFormat(_))));
    }
}
