//! Time-segment planning and the on-disk segment workspace.
//!
//! Splits one long input into fixed-length time segments, persists the plan
//! beside the encoded segments, and builds the concat list that joins them.

mod plan;
mod workspace;

pub use plan::{segment_count, PlanMismatch, Segment, SegmentPlan};
pub use workspace::{
    Prepared, Workspace, WorkspaceError, CONCAT_LIST_NAME, META_FILE_NAME, WORKSPACE_ROOT_NAME,
};
