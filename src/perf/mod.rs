//! Frame-rate monitoring and the resource budgets derived from it.

mod monitor;
mod sampler;

pub use monitor::{
    PerformanceMonitor, PerformanceSnapshot, Recommendations, ENTER_PERFORMANCE_MODE_FPS,
    EXIT_PERFORMANCE_MODE_FPS, SAMPLE_WINDOW,
};
pub use sampler::FrameSampler;
