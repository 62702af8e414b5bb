pub mod identity;
pub mod ingest;
pub mod storage;
pub mod videos;
