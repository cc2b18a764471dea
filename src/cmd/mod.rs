//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled             |
//! |------------|------------------------------|
//! | `project`  | `Init`, `Status`, `Agent`    |
//! | `phase`    | `Advance`                    |
//! | `snapshot` | `Events`, `Export`, `Import` |

pub mod phase;
pub mod project;
pub mod snapshot;

pub use phase::cmd_advance;
pub use project::{cmd_agent, cmd_init, cmd_status};
pub use snapshot::{cmd_events, cmd_export, cmd_import};
