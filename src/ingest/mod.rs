pub mod importer;
pub mod scanner;
