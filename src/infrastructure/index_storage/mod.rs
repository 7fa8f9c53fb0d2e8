mod local;

pub use local::LocalIndexStorage;
