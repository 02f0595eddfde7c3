pub mod candidate;
pub mod geometry;
pub mod loaders;
pub mod region;

pub use candidate::ElementCandidate;
pub use geometry::{BoundingBox, Viewport};
pub use loaders::{load_image_batch, ImageFile};
pub use region::Region;
