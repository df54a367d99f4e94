pub mod mutation;
pub mod overview;
pub mod scheduler;

pub use mutation::OptimisticCoordinator;
pub use overview::OverviewService;
pub use scheduler::AlertScheduler;
