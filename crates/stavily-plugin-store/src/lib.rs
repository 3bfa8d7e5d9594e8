//! Plugin Store (§4.3) and Runtime Detector (§4.4). The detector is a
//! sibling module here rather than its own crate: both are small, stateless
//! steps between fetch and execute, the same way the teacher keeps closely
//! related concerns together instead of splitting at every seam.

mod error;
mod fetch;
mod runtime_detect;
mod source;
mod store;
mod validate;

pub use error::{PluginError, PluginResult};
pub use fetch::{resolve_download_plan, DownloadPlan, RefSpec, DEFAULT_GIT_TIMEOUT};
pub use runtime_detect::detect;
pub use source::GitSource;
pub use store::{describe_installation, PluginStore};
