//! Per-invocation orchestration context.
//!
//! One [`OpsContext`] is created for each orchestration run and threaded
//! through every operation. It owns the credential cache, the notification
//! channel, and the tracing span that tags every log line of the run. Nothing
//! here is process-wide, so tests get isolation by building a fresh context.

use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{Span, debug, info_span};
use uuid::Uuid;

use crate::session::CredentialCache;
use crate::types::{ProjectId, ResourceId, RunId};

/// Notifications raised by operations for whoever drives the context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OpsEvent {
    /// A code-hosting project was created.
    ProjectCreated {
        /// Identifier assigned by the backend.
        project: ProjectId,
        /// Name the project was created with.
        name: String,
    },
    /// A site left its provisioning state.
    SiteReady {
        /// Site identifier.
        site: ResourceId,
        /// State the site settled in.
        state: String,
    },
    /// A deployment run reached a terminal status.
    DeploymentFinished {
        /// Owning project.
        project: ProjectId,
        /// Run identifier.
        run: RunId,
        /// Terminal status reported by the backend.
        status: String,
    },
}

impl fmt::Display for OpsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectCreated { project, name } => {
                write!(f, "project {name} created with id {project}")
            }
            Self::SiteReady { site, state } => write!(f, "site {site} is {state}"),
            Self::DeploymentFinished {
                project,
                run,
                status,
            } => write!(f, "deployment {project}/{run} finished: {status}"),
        }
    }
}

/// State scoped to one orchestration invocation.
pub struct OpsContext {
    invocation: Uuid,
    span: Span,
    credentials: CredentialCache,
    sender: UnboundedSender<OpsEvent>,
    receiver: UnboundedReceiver<OpsEvent>,
}

impl OpsContext {
    /// Creates a context with an empty cache and a fresh invocation id.
    #[must_use]
    pub fn new() -> Self {
        let invocation = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            invocation,
            span: info_span!("siteops", invocation = %invocation),
            credentials: CredentialCache::new(),
            sender,
            receiver,
        }
    }

    /// Identifier recorded on every log line of this invocation.
    #[must_use]
    pub const fn invocation_id(&self) -> Uuid {
        self.invocation
    }

    /// Span operations run under.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Credentials minted so far in this invocation.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    /// Mutable access to the credential cache.
    pub const fn credentials_mut(&mut self) -> &mut CredentialCache {
        &mut self.credentials
    }

    /// Queues a notification.
    pub fn emit(&self, event: OpsEvent) {
        debug!(event = %event, "operation event");
        if self.sender.send(event).is_err() {
            debug!("event receiver closed");
        }
    }

    /// Removes and returns every queued notification in emission order.
    pub fn drain(&mut self) -> Vec<OpsEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for OpsContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OpsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpsContext")
            .field("invocation", &self.invocation)
            .field("credentials", &self.credentials.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn drain_returns_events_in_emission_order() {
        let mut ctx = OpsContext::new();
        ctx.emit(OpsEvent::SiteReady {
            site: ResourceId::from("7"),
            state: String::from("active"),
        });
        ctx.emit(OpsEvent::ProjectCreated {
            project: ProjectId::from("12"),
            name: String::from("blog"),
        });

        let events = ctx.drain();

        assert_eq!(events.len(), 2);
        assert!(matches!(events.first(), Some(OpsEvent::SiteReady { .. })));
        assert!(ctx.drain().is_empty());
    }

    #[rstest]
    fn fresh_contexts_share_nothing() {
        let first = OpsContext::new();
        let mut second = OpsContext::new();

        first.emit(OpsEvent::ProjectCreated {
            project: ProjectId::from("1"),
            name: String::from("one"),
        });

        assert!(second.drain().is_empty());
        assert_ne!(first.invocation_id(), second.invocation_id());
        assert!(first.credentials().is_empty());
    }

    #[rstest]
    fn event_display_is_human_readable() {
        let event = OpsEvent::DeploymentFinished {
            project: ProjectId::from("3"),
            run: RunId::from("9"),
            status: String::from("success"),
        };
        assert_eq!(event.to_string(), "deployment 3/9 finished: success");
    }
}
