pub mod checksum;

pub use checksum::file_checksum;
