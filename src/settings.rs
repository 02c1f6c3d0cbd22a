//! Connection configuration, in the teacher's `set_*` builder idiom.

use std::sync::Arc;
use std::time::Duration;

use crate::client::{HookFuture, RestrictedClient, SetupHook};

/// Exponential backoff policy for the reconnect driver (4.F).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub fail_after: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            fail_after: None,
        }
    }
}

/// Request-queue bounds (4.D).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueuePolicy {
    pub enabled: bool,
    pub size: usize,
    pub timeout: Option<Duration>,
}

impl Default for QueuePolicy {
    fn default() -> QueuePolicy {
        QueuePolicy {
            enabled: true,
            size: 100,
            timeout: None,
        }
    }
}

/// Connection-wide settings, mirroring the teacher's `LdapConnSettings`
/// builder but expanded to carry every option 4.E/4.F/4.G/6 name.
#[derive(Clone)]
pub struct LdapConnSettings {
    conn_timeout: Option<Duration>,
    request_timeout: Duration,
    idle_timeout: Option<Duration>,
    reconnect: Option<ReconnectPolicy>,
    queue: QueuePolicy,
    no_tls_verify: bool,
    starttls: bool,
    setup_hooks: Vec<SetupHook>,
}

impl std::fmt::Debug for LdapConnSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnSettings")
            .field("conn_timeout", &self.conn_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("reconnect", &self.reconnect)
            .field("queue", &self.queue)
            .field("no_tls_verify", &self.no_tls_verify)
            .field("starttls", &self.starttls)
            .field("setup_hooks", &self.setup_hooks.len())
            .finish()
    }
}

impl Default for LdapConnSettings {
    fn default() -> LdapConnSettings {
        LdapConnSettings {
            conn_timeout: None,
            request_timeout: Duration::from_secs(0),
            idle_timeout: None,
            reconnect: None,
            queue: QueuePolicy::default(),
            no_tls_verify: false,
            starttls: false,
            setup_hooks: Vec::new(),
        }
    }
}

impl LdapConnSettings {
    pub fn new() -> LdapConnSettings {
        LdapConnSettings::default()
    }

    /// Dial timeout; `Duration::ZERO` or unset disables it.
    pub fn set_conn_timeout(mut self, timeout: Duration) -> LdapConnSettings {
        self.conn_timeout = Some(timeout);
        self
    }

    pub fn conn_timeout(&self) -> Option<Duration> {
        self.conn_timeout
    }

    /// Per-request timeout; zero disables it (6: `timeout (ms)`).
    pub fn set_request_timeout(mut self, timeout: Duration) -> LdapConnSettings {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Emit `ClientEvent::Idle` after this much time with an empty
    /// request table.
    pub fn set_idle_timeout(mut self, timeout: Duration) -> LdapConnSettings {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    pub fn set_reconnect(mut self, policy: ReconnectPolicy) -> LdapConnSettings {
        self.reconnect = Some(policy);
        self
    }

    pub fn reconnect(&self) -> Option<ReconnectPolicy> {
        self.reconnect
    }

    /// If `false`, the request queue starts frozen (6: `queuing`).
    pub fn set_queuing(mut self, enabled: bool) -> LdapConnSettings {
        self.queue.enabled = enabled;
        self
    }

    pub fn set_queue_size(mut self, size: usize) -> LdapConnSettings {
        self.queue.size = size;
        self
    }

    pub fn set_queue_timeout(mut self, timeout: Duration) -> LdapConnSettings {
        self.queue.timeout = Some(timeout);
        self
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        self.queue
    }

    /// Skip TLS certificate verification. Off by default; only
    /// meaningful with the `tls` feature.
    pub fn set_no_tls_verify(mut self, no_verify: bool) -> LdapConnSettings {
        self.no_tls_verify = no_verify;
        self
    }

    pub fn no_tls_verify(&self) -> bool {
        self.no_tls_verify
    }

    /// Negotiate StartTLS on a plain `ldap://` connection before use.
    pub fn set_starttls(mut self, starttls: bool) -> LdapConnSettings {
        self.starttls = starttls;
        self
    }

    pub fn starttls(&self) -> bool {
        self.starttls
    }

    /// Register a setup hook, run in registration order against a
    /// [`RestrictedClient`] right after each successful dial and before
    /// the request queue is flushed. A hook returning `Err` fails the
    /// connect attempt the same way a dial error would.
    pub fn set_setup_hook<F>(mut self, hook: F) -> LdapConnSettings
    where
        F: Fn(RestrictedClient) -> HookFuture + Send + Sync + 'static,
    {
        self.setup_hooks.push(Arc::new(hook));
        self
    }

    pub(crate) fn setup_hooks(&self) -> Vec<SetupHook> {
        self.setup_hooks.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder_chains() {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(5))
            .set_request_timeout(Duration::from_millis(500))
            .set_queuing(false);
        assert_eq!(settings.conn_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(settings.request_timeout(), Duration::from_millis(500));
        assert!(!settings.queue_policy().enabled);
    }
}
