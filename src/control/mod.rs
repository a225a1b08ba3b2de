//! Robot control: one driving strategy at a time on top of SLAM.
//!
//! ```text
//!   StrategySupervisor ──owns──► RobotController ──► RobotDriver (wheels, sensor)
//!          │                           │
//!          │ cancel                    ├──► Slam (graph, scans, grids)
//!          ▼                           └──► SharedSnapshot (read by observers)
//!   strategy thread
//! ```

pub mod controller;
pub mod driver;
pub mod state;
pub mod strategy;

pub use controller::{ControllerConfig, ManualCommand, RobotController};
pub use driver::RobotDriver;
pub use state::{SharedSnapshot, SlamSnapshot, create_shared_snapshot};
pub use strategy::{StrategyKind, StrategyOutcome, StrategySupervisor, run_strategy};
