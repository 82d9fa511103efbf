//! dkll client: tails the server's REST API and prints records.
//!
//! [`ApiClient`] talks to `/v1` under a fixed-delay [`retry::FixedDelay`]
//! strategy; [`CliClient`] runs the tail/follow loop with grep and color
//! options. Interrupts are not errors: a canceled run returns cleanly.

pub mod api;
pub mod cli;
pub mod retry;

pub use api::{ApiClient, ClientError};
pub use cli::{CliClient, DisplayParams};
pub use retry::FixedDelay;
