#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod detect;
pub mod edit;
pub mod naming;
pub mod objects;
pub mod pretty_print;
pub mod range;
pub mod store;
pub mod tree;
pub mod ui_state;

pub use config::format_diagnostics;
pub use config::Config;
pub use config::Diagnostic;
pub use config::Diagnostics;
pub use config::LogLevel;
pub use detect::DetectedDevice;
pub use detect::DetectorState;
pub use detect::DeviceAggregator;
pub use detect::DeviceReport;
pub use detect::PatternMatcher;
pub use objects::ObjectRecord;
pub use objects::Objects;
pub use range::children_of;
pub use tree::build_tree;
pub use tree::TreeNode;
pub use tree::TreeOptions;
