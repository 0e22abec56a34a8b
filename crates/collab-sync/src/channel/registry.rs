//! Channel registry — one shared, reference-counted session per scope.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tracing::{debug, info};

use collab_core::config::channel::ChannelConfig;
use collab_core::traits::transport::RealtimeTransport;
use collab_core::types::ScopeKey;

use crate::metrics::EngineMetrics;

use super::session::ChannelSession;

/// Registry of all active channel sessions.
pub struct ChannelRegistry {
    sessions: DashMap<String, Arc<ChannelSession>>,
    config: ChannelConfig,
    transport: Arc<dyn RealtimeTransport>,
    metrics: Arc<EngineMetrics>,
}

impl ChannelRegistry {
    /// Creates a new registry.
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn RealtimeTransport>,
        metrics: Arc<EngineMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            config,
            transport,
            metrics,
        })
    }

    /// Open (or join) the channel for a scope. All consumers of the same
    /// scope share one session; the returned guard releases the
    /// reference on drop, and the session closes when the last guard is
    /// gone.
    pub fn open(self: &Arc<Self>, scope: &ScopeKey) -> ChannelGuard {
        let session = self
            .sessions
            .entry(scope.as_str().to_string())
            .or_insert_with(|| {
                info!(scope = %scope, "Opening channel session");
                EngineMetrics::incr(&self.metrics.channels_opened);
                ChannelSession::spawn(
                    scope.clone(),
                    self.config.clone(),
                    self.transport.clone(),
                    self.metrics.clone(),
                )
            })
            .clone();

        session.refs.fetch_add(1, Ordering::SeqCst);
        ChannelGuard {
            registry: self.clone(),
            session,
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Close every session regardless of reference counts. Used at
    /// context shutdown.
    pub fn close_all(&self) {
        let scopes: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for scope in scopes {
            if let Some((_, session)) = self.sessions.remove(&scope) {
                session.close();
                EngineMetrics::incr(&self.metrics.channels_closed);
            }
        }
    }

    fn release(&self, session: &Arc<ChannelSession>) {
        if session.refs.fetch_sub(1, Ordering::SeqCst) == 1 {
            let scope = session.scope().as_str().to_string();
            debug!(scope = %scope, "Last consumer detached, closing channel");
            self.sessions.remove(&scope);
            session.close();
            EngineMetrics::incr(&self.metrics.channels_closed);
        }
    }
}

/// Reference-counted handle to a channel session.
pub struct ChannelGuard {
    registry: Arc<ChannelRegistry>,
    session: Arc<ChannelSession>,
}

impl ChannelGuard {
    /// The underlying shared session.
    pub fn session(&self) -> &Arc<ChannelSession> {
        &self.session
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.registry.release(&self.session);
    }
}
