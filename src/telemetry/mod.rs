pub mod decoder;
pub mod pipeline;
pub mod ring;
pub mod router;
pub mod snapshot;
pub mod state;
pub mod store;

pub use pipeline::{LinkEvent, LinkEventKind, TelemetryPipeline};
pub use router::MissingValuePolicy;
pub use snapshot::Snapshot;
pub use state::LinkId;
