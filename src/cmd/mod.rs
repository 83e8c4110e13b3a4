//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled       |
//! |------------|------------------------|
//! | `generate` | `Generate`, `Watch`    |
//! | `status`   | `Status`, `Reset`      |
//! | `config`   | `Config`               |

pub mod config;
pub mod generate;
pub mod status;

pub use config::cmd_config;
pub use generate::{cmd_generate, cmd_watch};
pub use status::{cmd_reset, cmd_status};
