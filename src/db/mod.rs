//! SQLite-backed persistence: the global account store and one
//! file-metadata store per home directory.

pub mod account;
pub mod filemeta;

pub use account::AccountStore;
pub use filemeta::FileMetaStore;
