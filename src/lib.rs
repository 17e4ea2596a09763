pub mod error;
pub mod graph;
pub mod group;
pub mod manifest;
pub mod plugin;
pub mod sorter;

pub use error::SortError;
pub use graph::EdgeType;
pub use group::Group;
pub use plugin::{PluginData, Priority, RecordId};
pub use sorter::{build_and_sort, SortReport, SortResult};
