pub mod manager;
pub mod view;

pub use manager::{DirectoryManager, Phase};
pub use view::DirectoryFilter;
