pub mod classifier;
pub mod element_resolver;
pub mod generation;
pub mod region_locator;
pub mod session;

pub use classifier::VisualClassifier;
pub use element_resolver::{run_cascade, AttachStrategy, ElementResolver, Outcome};
pub use generation::{GenerationMonitor, GenerationState};
pub use region_locator::RegionLocator;
pub use session::{SessionManager, SessionState};
