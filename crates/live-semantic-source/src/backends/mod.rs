#[cfg(feature = "backend-mock")]
pub mod mock;

#[cfg(feature = "backend-image-dir")]
pub mod image_dir;
