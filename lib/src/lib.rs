mod artifact;
mod campaign;
mod errors;
mod heartbeat;
mod network;
mod persistence;
mod process;
mod resources;
mod session;
mod spectral;
mod stats;
mod upload;

// Public re-export
pub use crate::artifact::{
    artifact_filename, Mode, ObservationArtifact, ObservationMetadata, ARTIFACT_EXTENSION,
};
pub use crate::campaign::{
    CampaignConfig, CampaignOrchestrator, CampaignSummary, DEFAULT_CRITICAL_SPACE_MB,
    DEFAULT_LOW_SPACE_MB,
};
pub use crate::errors::{
    CampaignError, HeartbeatError, PersistenceError, ProcessError, RunError, SpectralError,
    UploadError,
};
pub use crate::heartbeat::{
    HeartbeatClient, DEFAULT_BACKEND_URL, DEFAULT_INTERVAL_S, DEFAULT_NODE_ID,
};
pub use crate::network::{check_sudo, InterfaceControl, NetworkControl, DEFAULT_INTERFACES};
pub use crate::persistence::{read_artifact, write_artifact};
pub use crate::process::{ProcessOutput, ProcessRunner, SystemRunner};
pub use crate::resources::{DiskUsage, SystemDisk};
pub use crate::session::{run_capture_session, AirspyRx, CaptureTool, ObservationParams};
pub use crate::spectral::{frequency_axis, SpectralAccumulator, DEFAULT_FFT_SIZE};
pub use crate::stats::{
    radial_velocity_km_s, RfiAssessment, SnrAssessment, SpectrumStatistics, HYDROGEN_LINE_HZ,
    SPEED_OF_LIGHT_KM_S,
};
pub use crate::upload::{RcloneUploader, Uploader};
