//! CLI command implementations.
//!
//! | Module    | Commands handled         |
//! |-----------|--------------------------|
//! | `run`     | `Review`, `Test`, `Commit` |
//! | `hook`    | `Hook`                   |
//! | `config`  | `Config`                 |

pub mod config;
pub mod hook;
pub mod run;

pub use config::cmd_config;
pub use hook::cmd_hook;
pub use run::{cmd_commit, cmd_task};
