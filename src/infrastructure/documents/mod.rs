mod directory;

pub use directory::DirectoryDocumentSource;
