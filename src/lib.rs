//! An async LDAPv3 client built on Tokio.
//!
//! [`Client`] opens a connection, reconnects it under a configurable
//! policy, and multiplexes concurrent operations over it from a single
//! background task. Operations live as `Client` methods in [`dispatch`];
//! [`SearchStream`](client::SearchStream) streams a Search's entries as
//! they arrive.
//!
//! ```no_run
//! use ldap_client::{Client, LdapConnSettings};
//!
//! # async fn run() -> ldap_client::error::Result<()> {
//! let client = Client::new("ldap://localhost:389", LdapConnSettings::new());
//! client.simple_bind("cn=admin,dc=example,dc=org", "secret").await?.success()?;
//! client.unbind().await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
pub extern crate log;

mod actor;
mod client;
mod codec;
mod conn;
pub mod controls;
mod dispatch;
pub mod error;
pub mod exop;
mod filter;
mod message;
mod paged;
mod pending;
mod queue;
mod reconnect;
pub mod result;
mod settings;
mod util;

pub use client::{Client, HookFuture, RestrictedClient, SearchStream, SetupHook};
pub use dispatch::{DerefAliases, Mod, Scope};
pub use error::LdapError;
pub use filter::parse as parse_filter;
pub use message::{Outcome, SearchEntry, SearchItem};
pub use result::{CompareResult, LdapResult, SearchResult};
pub use settings::{LdapConnSettings, QueuePolicy, ReconnectPolicy};
pub use util::{dn_escape, ldap_escape};

pub use actor::ClientEvent;
