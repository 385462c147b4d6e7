pub mod api;
pub mod config;
pub mod fault;
pub mod loader;
pub mod locator;
pub mod replay;
pub mod scheduler;
pub mod snapshot;
pub mod world;

pub use config::{load_config_from_path, ConfigError, PlayerConfig};
pub use fault::{FaultKind, FaultPhase, ResourceError, RuntimeFault, RuntimeHost, SourceLocation};
pub use locator::{ChunkTraceLocator, ErrorLocator};
pub use replay::{load_input_script_from_path, FrameInput, InputScript};
pub use scheduler::{FrameOutcome, FrameRequest, Runtime, RuntimeError, SchedulerState};
pub use snapshot::{
    default_project, load_snapshot_from_path, save_snapshot_to_path, Snapshot, SnapshotError,
    SnapshotWatcher,
};
pub use world::{SoundPlay, World};
