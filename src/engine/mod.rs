pub mod readiness;
pub mod scheduler;

pub use readiness::{
    OverallStatus, ProbeFuture, ReadinessAggregator, ReadinessProbe, ReadinessReport,
    ServiceStatus,
};
pub use scheduler::{CallbackError, PeriodicScheduler, SchedulerStatus, StateCheck};
