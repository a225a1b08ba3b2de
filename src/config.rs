//! TOML configuration for the navigation stack.
//!
//! Every section and field is optional; missing values take the defaults
//! below. Sections map onto the algorithm configs through the `build_*`
//! functions.
//!
//! ```toml
//! [slam]
//! min_overlap = 0.4
//!
//! [matcher]
//! max_iterations = 50
//!
//! [map]
//! resolution = 10.0
//!
//! [planner]
//! unknown_penalty = 2.0
//!
//! [robot]
//! track_width = 15.0
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::algorithms::mapping::OccupancyConfig;
use crate::algorithms::matching::IcpConfig;
use crate::algorithms::planning::PlannerConfig;
use crate::control::ControllerConfig;
use crate::engine::slam::SlamConfig;
use crate::error::{MargaError, Result};

/// Default locations searched when no config path is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["marga-slam.toml", "/etc/marga-slam.toml"];

/// Top-level configuration file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct MargaConfig {
    #[serde(default)]
    pub slam: SlamSection,
    #[serde(default)]
    pub matcher: MatcherSection,
    #[serde(default)]
    pub map: MapSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub robot: RobotSection,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SlamSection {
    /// Strength of odometry constraints
    pub odometry_strength: f64,
    /// Gap that splits a sweep into surfaces
    pub surface_threshold: f64,
    /// Candidate penalty per squared distance
    pub distance_weight: f64,
    /// Minimum expected overlap of a match candidate
    pub min_overlap: f64,
    /// Candidates scoring at or above this are dropped
    pub max_score: f64,
    /// Candidates matched per scan
    pub max_candidates: usize,
    /// Scan-match strength multiplier
    pub match_strength_scale: f64,
    /// Strength factor for matches that converged early
    pub converged_factor: f64,
    /// Upper bound on scan-match strength
    pub max_match_strength: f64,
    /// Relaxation passes after new scan-match constraints
    pub relaxation_passes: usize,
}

impl Default for SlamSection {
    fn default() -> Self {
        let defaults = SlamConfig::default();
        Self {
            odometry_strength: defaults.odometry_strength,
            surface_threshold: defaults.surface_threshold,
            distance_weight: defaults.distance_weight,
            min_overlap: defaults.min_overlap,
            max_score: defaults.max_score,
            max_candidates: defaults.max_candidates,
            match_strength_scale: defaults.match_strength_scale,
            converged_factor: defaults.converged_factor,
            max_match_strength: defaults.max_match_strength,
            relaxation_passes: defaults.relaxation_passes,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MatcherSection {
    pub max_iterations: u32,
    /// Smallest trimming ratio tried
    pub min_overlap: f64,
    /// Largest trimming ratio tried
    pub max_overlap: f64,
    /// Trimming ratio step
    pub overlap_step: f64,
    /// Overlap penalty exponent
    pub lambda: f64,
}

impl Default for MatcherSection {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            min_overlap: 0.4,
            max_overlap: 1.0,
            overlap_step: 0.05,
            lambda: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MapSection {
    /// World units per cell
    pub resolution: f64,
    pub min_weight: f64,
    pub occupied_threshold: f64,
    pub min_batch_size: usize,
    pub parallel: bool,
}

impl Default for MapSection {
    fn default() -> Self {
        Self {
            resolution: 10.0,
            min_weight: 1.0,
            occupied_threshold: 0.2,
            min_batch_size: 16,
            parallel: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PlannerSection {
    pub occupied_penalty: f64,
    pub clearance_penalty: f64,
    pub unknown_penalty: f64,
    /// Cells (Chebyshev) an obstacle must be away to avoid the clearance penalty
    pub clearance_cells: i64,
    /// World-unit radius searched for frontier cells
    pub frontier_search_radius: f64,
    pub max_expansions: usize,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            occupied_penalty: 1e6,
            clearance_penalty: 4.0,
            unknown_penalty: 2.0,
            clearance_cells: 1,
            frontier_search_radius: 200.0,
            max_expansions: 200_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RobotSection {
    /// Distance between the wheels
    pub track_width: f64,
    pub manual_speed_limit: f64,
    /// Wheel travel between scans in manual mode
    pub scan_travel_threshold: f64,
    /// Longest straight leg per plan step
    pub max_leg: f64,
    pub plan_lookahead: usize,
    pub goal_tolerance: f64,
    pub max_plan_cycles: usize,
    /// Manual control period (ms)
    pub manual_tick_ms: u64,
}

impl Default for RobotSection {
    fn default() -> Self {
        Self {
            track_width: 15.0,
            manual_speed_limit: 100.0,
            scan_travel_threshold: 100.0,
            max_leg: 40.0,
            plan_lookahead: 3,
            goal_tolerance: 15.0,
            max_plan_cycles: 500,
            manual_tick_ms: 33, // ~30 Hz
        }
    }
}

impl MargaConfig {
    /// Parse configuration from TOML text.
    ///
    /// Constraint strengths must be finite and non-negative.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = basic_toml::from_str(text)?;
        let strength = config.slam.odometry_strength;
        if !(strength.is_finite() && strength >= 0.0) {
            return Err(MargaError::Config(format!(
                "slam.odometry_strength must be finite and >= 0, got {strength}"
            )));
        }
        Ok(config)
    }

    pub fn build_slam_config(&self) -> SlamConfig {
        let s = &self.slam;
        SlamConfig {
            odometry_strength: s.odometry_strength,
            surface_threshold: s.surface_threshold,
            distance_weight: s.distance_weight,
            min_overlap: s.min_overlap,
            max_score: s.max_score,
            max_candidates: s.max_candidates,
            match_strength_scale: s.match_strength_scale,
            converged_factor: s.converged_factor,
            max_match_strength: s.max_match_strength,
            relaxation_passes: s.relaxation_passes,
        }
    }

    pub fn build_icp_config(&self) -> IcpConfig {
        let m = &self.matcher;
        IcpConfig {
            max_iterations: m.max_iterations,
            min_overlap: m.min_overlap,
            max_overlap: m.max_overlap,
            overlap_step: m.overlap_step,
            lambda: m.lambda,
        }
    }

    pub fn build_occupancy_config(&self) -> OccupancyConfig {
        let m = &self.map;
        OccupancyConfig {
            resolution: m.resolution,
            min_weight: m.min_weight,
            occupied_threshold: m.occupied_threshold,
            min_batch_size: m.min_batch_size,
            parallel: m.parallel,
        }
    }

    pub fn build_planner_config(&self) -> PlannerConfig {
        let p = &self.planner;
        PlannerConfig {
            occupied_penalty: p.occupied_penalty,
            clearance_penalty: p.clearance_penalty,
            unknown_penalty: p.unknown_penalty,
            clearance_cells: p.clearance_cells,
            frontier_search_radius: p.frontier_search_radius,
            max_expansions: p.max_expansions,
        }
    }

    pub fn build_controller_config(&self) -> ControllerConfig {
        let r = &self.robot;
        ControllerConfig {
            track_width: r.track_width,
            manual_speed_limit: r.manual_speed_limit,
            scan_travel_threshold: r.scan_travel_threshold,
            max_leg: r.max_leg,
            plan_lookahead: r.plan_lookahead,
            goal_tolerance: r.goal_tolerance,
            max_plan_cycles: r.max_plan_cycles,
            manual_tick_ms: r.manual_tick_ms,
        }
    }
}

/// Load configuration from `path`, or from the default locations.
///
/// Unreadable or malformed files fall back to defaults with a warning.
pub fn load_config(path: Option<&Path>) -> MargaConfig {
    match path {
        Some(path) => match fs::read_to_string(path) {
            Ok(contents) => match MargaConfig::from_toml(&contents) {
                Ok(cfg) => {
                    log::info!("Loaded config from {}", path.display());
                    cfg
                }
                Err(e) => {
                    log::warn!("Failed to parse config {}: {}", path.display(), e);
                    MargaConfig::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read config {}: {}", path.display(), e);
                MargaConfig::default()
            }
        },
        None => {
            for path in DEFAULT_CONFIG_PATHS {
                if let Ok(contents) = fs::read_to_string(path)
                    && let Ok(cfg) = MargaConfig::from_toml(&contents)
                {
                    log::info!("Loaded config from {}", path);
                    return cfg;
                }
            }
            MargaConfig::default()
        }
    }
}
