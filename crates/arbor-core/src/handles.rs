//! Typed channel endpoints and unforgeable handle tokens.
//!
//! Transport is out of scope for the orchestrator: the only signal a peer
//! can observe is whether the other side of a connection is still alive.
//! `ServerEnd`/`ClientEnd` model exactly that — a paired handle whose drop
//! closes the connection and wakes anyone waiting on `on_closed`.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use uuid::Uuid;

/// Shared state of one endpoint pair.
#[derive(Debug)]
struct ChannelState {
    closed: AtomicBool,
    notify: Notify,
}

impl ChannelState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn wait_closed(&self) {
        while !self.is_closed() {
            let mut notified = std::pin::pin!(self.notify.notified());
            // Register before re-checking so a close landing in between
            // still wakes this waiter.
            notified.as_mut().enable();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

/// Guard that closes the underlying connection when dropped.
#[derive(Debug)]
struct CloseGuard(Arc<ChannelState>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// The server half of a connection request.
///
/// Dropping an unbound server end closes the connection, which the client
/// observes as peer-closed. Binding it (see [`ServerEnd::bind`]) keeps the
/// connection open for as long as the binding lives.
#[derive(Debug)]
pub struct ServerEnd<M> {
    guard: CloseGuard,
    _marker: PhantomData<fn() -> M>,
}

impl<M> ServerEnd<M> {
    /// Whether the client half has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.guard.0.is_closed()
    }

    /// Wait until the client half goes away.
    pub async fn on_closed(&self) {
        self.guard.0.wait_closed().await;
    }

    /// Consume this end, keeping the connection open while the returned
    /// binding is retained.
    #[must_use]
    pub fn bind(self) -> BoundHandle {
        BoundHandle {
            _guard: self.guard,
        }
    }
}

/// The client half of a connection.
///
/// Dropping it closes the connection; the server observes peer-closed.
#[derive(Debug)]
pub struct ClientEnd<M> {
    guard: CloseGuard,
    _marker: PhantomData<fn() -> M>,
}

impl<M> ClientEnd<M> {
    /// Whether the server half has gone away (request dropped or binding
    /// released).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.guard.0.is_closed()
    }

    /// Wait until the server half goes away.
    pub async fn on_closed(&self) {
        self.guard.0.wait_closed().await;
    }
}

/// A retained server binding. The connection stays open until this handle
/// is dropped.
#[derive(Debug)]
pub struct BoundHandle {
    _guard: CloseGuard,
}

/// Create a connected endpoint pair.
#[must_use]
pub fn endpoints<M>() -> (ClientEnd<M>, ServerEnd<M>) {
    let state = ChannelState::new();
    (
        ClientEnd {
            guard: CloseGuard(Arc::clone(&state)),
            _marker: PhantomData,
        },
        ServerEnd {
            guard: CloseGuard(state),
            _marker: PhantomData,
        },
    )
}

/// Marker for environment-admin connections.
#[derive(Debug)]
pub struct EnvironmentMarker;

/// Marker for environment-controller connections.
#[derive(Debug)]
pub struct ControllerMarker;

/// Marker for application-launcher connections.
#[derive(Debug)]
pub struct LauncherMarker;

/// Marker for service-set (provider) connections.
#[derive(Debug)]
pub struct ServiceProviderMarker;

/// Marker for a single named service connection.
#[derive(Debug)]
pub struct ServiceMarker;

/// Marker for directory connections.
#[derive(Debug)]
pub struct DirectoryMarker;

/// Marker for application-controller connections.
#[derive(Debug)]
pub struct AppControllerMarker;

/// Request for an environment-admin binding.
pub type EnvironmentRequest = ServerEnd<EnvironmentMarker>;
/// Request for an environment-controller binding.
pub type ControllerRequest = ServerEnd<ControllerMarker>;
/// Request for a launcher binding.
pub type LauncherRequest = ServerEnd<LauncherMarker>;
/// Request for a service-set binding.
pub type ServiceProviderRequest = ServerEnd<ServiceProviderMarker>;
/// Request for a single named service connection.
pub type ServiceRequest = ServerEnd<ServiceMarker>;
/// Request for a directory binding.
pub type DirectoryRequest = ServerEnd<DirectoryMarker>;
/// Request for an application-controller binding.
pub type AppControllerRequest = ServerEnd<AppControllerMarker>;

/// An unforgeable token naming an open directory.
///
/// Acts as a capability: holders can place it into a namespace but cannot
/// forge one for a directory they were never handed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryHandle(Uuid);

impl DirectoryHandle {
    /// Mint a fresh directory handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DirectoryHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DirectoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An unforgeable token naming an output/input byte sink handed to a
/// spawned process (stdout/stderr forwarding).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IoHandle(Uuid);

impl IoHandle {
    /// Mint a fresh I/O handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IoHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IoHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
