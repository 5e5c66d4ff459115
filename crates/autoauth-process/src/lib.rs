//! # autoauth-process
//!
//! Control of the CLI being logged in.
//!
//! - [`command`]: the [`LoginProcess`] capability, the tokio-backed
//!   [`CliLoginProcess`] and the scripted [`MockLoginProcess`]
//! - [`launcher`]: reading output until the authorization URL appears
//! - [`relay`]: writing the code back and draining the remaining output, plus
//!   the operator prompt used when automation fails

pub mod command;
pub mod launcher;
pub mod relay;

pub use command::{AfterScript, CliLoginProcess, LineRead, LoginCommand, LoginProcess, MockLoginProcess};
pub use launcher::{capture_auth_url, AuthUrlMatcher};
pub use relay::{relay_code, CodePrompt, DrainEnd, DrainPolicy, ReaderPrompt, RelayReport, StdinPrompt};
