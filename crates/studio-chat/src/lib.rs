pub mod library;
pub mod preview;
pub mod reducer;
pub mod store;
pub mod task_id;

pub mod prelude {
    pub use crate::library::{WorkflowBackend, WorkflowLibrary};
    pub use crate::preview::{PreviewHistory, PreviewState, PreviewTab, preview_url};
    pub use crate::reducer::{ChatReducer, stage_progress};
    pub use crate::store::{StudioState, UiState};
    pub use crate::task_id::TaskIdStore;
}
