//! MargaSLAM - offline mapping from a recorded drive/scan log
//!
//! Replays a log through the controller (odometry, scan matching, pose-graph
//! relaxation), rebuilds the occupancy grids and saves them.
//!
//! # Usage
//!
//! ```bash
//! # Replay with default config
//! cargo run --release -- --replay session.json
//!
//! # With custom config file and output location
//! cargo run --release -- --config marga-slam.toml --replay session.json \
//!     --output maps --name kitchen
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use marga_slam::config::{MargaConfig, load_config};
use marga_slam::control::{RobotController, create_shared_snapshot};
use marga_slam::engine::slam::Slam;
use marga_slam::error::Result;
use marga_slam::io::{ReplayDriver, save_grids};
use marga_slam::utils::{CancellationFlag, setup_ctrl_c_handler};

// ============================================================================
// CLI Arguments
// ============================================================================

struct Args {
    config_path: Option<PathBuf>,
    replay_path: Option<PathBuf>,
    output_dir: PathBuf,
    map_name: String,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut result = Args {
        config_path: None,
        replay_path: None,
        output_dir: PathBuf::from("maps"),
        map_name: "map".to_string(),
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--config" | "-c", Some(v)) => result.config_path = Some(PathBuf::from(v)),
            ("--replay" | "-r", Some(v)) => result.replay_path = Some(PathBuf::from(v)),
            ("--output" | "-o", Some(v)) => result.output_dir = PathBuf::from(v),
            ("--name" | "-n", Some(v)) => result.map_name = v,
            ("--help" | "-h", _) => {
                print_help();
                std::process::exit(0);
            }
            (other, _) => {
                eprintln!("Unknown or incomplete argument: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
        i += 2;
    }

    result
}

fn print_help() {
    println!("marga-slam - pose-graph SLAM over recorded drive/scan logs");
    println!();
    println!("USAGE:");
    println!("    marga-slam --replay <FILE> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -r, --replay <FILE>     Recorded log (JSON steps of odometry + scan)");
    println!("    -c, --config <FILE>     Configuration file (default: marga-slam.toml)");
    println!("    -o, --output <DIR>      Directory for the saved map (default: maps)");
    println!("    -n, --name <NAME>       Map name (default: map)");
    println!("    -h, --help              Print help information");
    println!();
    println!("CONFIGURATION:");
    println!("    [slam] [matcher] [map] [planner] [robot] sections of the TOML file");
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = parse_args();
    let config = load_config(args.config_path.as_deref());

    let Some(replay_path) = args.replay_path.as_deref() else {
        eprintln!("No replay log given");
        print_help();
        std::process::exit(1);
    };

    log::info!("marga-slam starting");
    log::info!("  Replay: {}", replay_path.display());
    log::info!("  Output: {} ({})", args.output_dir.display(), args.map_name);
    log::info!(
        "  Map resolution: {}, candidates per scan: {}",
        config.map.resolution,
        config.slam.max_candidates
    );

    let running = match setup_ctrl_c_handler() {
        Ok(running) => running,
        Err(e) => {
            log::warn!("Failed to install Ctrl-C handler: {}", e);
            Arc::new(AtomicBool::new(true))
        }
    };

    if let Err(e) = run_replay(&config, replay_path, &args, running) {
        log::error!("Replay failed: {}", e);
        std::process::exit(1);
    }

    log::info!("marga-slam finished");
}

fn run_replay(
    config: &MargaConfig,
    replay_path: &Path,
    args: &Args,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let driver = ReplayDriver::from_path(replay_path)?;
    let slam = Slam::new(
        config.build_slam_config(),
        config.build_icp_config(),
        config.build_occupancy_config(),
    );
    let mut controller = RobotController::new(
        driver,
        slam,
        config.build_controller_config(),
        config.build_planner_config(),
        create_shared_snapshot(),
    );

    let cancel = CancellationFlag::new();
    let total = controller.driver().remaining();
    while controller.driver().remaining() > 0 {
        if !running.load(Ordering::SeqCst) {
            cancel.cancel();
            log::info!(
                "Replay interrupted after {} of {} steps",
                controller.driver().consumed(),
                total
            );
            break;
        }
        // The log decides the motion; the command only advances it
        controller.drive(0.0, 0.0)?;
        let summary = controller.scan_and_match(&cancel)?;
        log::debug!(
            "Step {}/{}: pose {} with {} candidates, {} edges",
            controller.driver().consumed(),
            total,
            summary.pose,
            summary.candidates,
            summary.edges_added
        );
    }

    let graph = controller.slam().graph();
    log::info!(
        "Graph: {} poses, {} constraints",
        graph.node_count(),
        graph.constraint_count()
    );

    controller.rebuild_grids(&CancellationFlag::new())?;
    let grids = controller.slam().grids();
    let files = save_grids(&args.output_dir, &args.map_name, grids)?;
    log::info!("Map metadata written to {}", files.metadata.display());
    Ok(())
}
