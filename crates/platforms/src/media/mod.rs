pub mod snapshot;

pub use snapshot::LiveStreamSnapshot;
