pub mod library;
pub mod media;
pub mod upload;

pub use library::LibraryService;
pub use media::MediaService;
pub use upload::{AcceptedUpload, RejectedUpload, UploadOutcome, UploadService};
