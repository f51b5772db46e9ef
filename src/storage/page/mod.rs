pub mod bucket_page;
pub mod directory_page;
pub mod error;
pub mod layout;
pub mod table_page;

pub use bucket_page::{bucket_capacity, BucketMut, BucketRef, FixedBytes};
pub use directory_page::{DirectoryMut, DirectoryRef, DIRECTORY_ARRAY_SIZE, MAX_DEPTH};
pub use error::PageError;
pub use table_page::TablePage;
