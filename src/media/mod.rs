pub mod archive;
pub mod upload;

pub use upload::UploadService;
