pub mod classifier;
pub mod session;

pub use classifier::{
    classify, classify_side, BuildupCategory, BuildupConfig, BuildupError, BuildupReport,
    SideBuildup,
};
pub use session::{summarize_session, SessionError, SessionSummary, WindowSummary};
