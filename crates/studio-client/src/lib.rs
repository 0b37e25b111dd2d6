pub mod api;
pub mod runner;
pub mod session;
pub mod sse;

pub mod prelude {
    pub use crate::api::StudioClient;
    pub use crate::runner::{StreamController, StreamOutcome, run_stream};
    pub use crate::session::{StreamRun, WebCreatorSession, WorkflowSession};
    pub use crate::sse::{FrameStream, SseDecoder, sse_frame_stream};
}
