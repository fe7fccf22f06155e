pub mod notifier;
pub mod stalenesses;
pub mod thresholds;
