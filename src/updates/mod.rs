pub mod compatibility;
pub mod release_feed;
pub mod version_compare;
