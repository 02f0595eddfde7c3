pub mod image_loader;

pub use image_loader::{load_image_batch, load_images_from_folder, ImageFile};
