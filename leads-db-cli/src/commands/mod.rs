pub mod add;
pub mod cutover;
pub mod delete;
pub mod import;
pub mod init;
pub mod list;
pub mod migrate;
pub mod shards;
pub mod update;
