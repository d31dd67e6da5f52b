pub mod pipeline_runner;

pub use pipeline_runner::{
    cancel_on_ctrl_c, NoProgress, PipelineRunner, RunOptions, RunProgress, RunReport,
};
