mod facade;
mod single_shot;

pub use facade::UploadClient;
pub use single_shot::SingleShotUploader;
