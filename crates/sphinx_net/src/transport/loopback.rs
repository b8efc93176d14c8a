//! # Loopback Transport
//!
//! In-process transport. One endpoint listens, any number connect; messages
//! go straight into the peer's inbox. Link conditions can drop or duplicate
//! datagrams, driven by a seeded RNG so runs are reproducible.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Transport, TransportEvent};
use crate::error::{NetError, NetResult};
use crate::identity::ConnectionHandle;

/// Simulated link quality, applied per datagram.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkConditions {
    /// Packet loss percentage (0-100).
    pub drop_percent: u8,
    /// Duplicate packet percentage (0-100).
    pub duplicate_percent: u8,
}

impl LinkConditions {
    /// Lossless, duplicate-free.
    pub const PERFECT: Self = Self {
        drop_percent: 0,
        duplicate_percent: 0,
    };

    /// Mobile-grade: some loss, some duplication.
    pub const LOSSY: Self = Self {
        drop_percent: 10,
        duplicate_percent: 5,
    };
}

type Endpoint = usize;

struct HubState {
    inboxes: Vec<VecDeque<TransportEvent>>,
    /// (endpoint, local handle) -> (peer endpoint, peer's handle)
    links: HashMap<(Endpoint, ConnectionHandle), (Endpoint, ConnectionHandle)>,
    listener: Option<Endpoint>,
    next_handle: u32,
    conditions: LinkConditions,
    rng: ChaCha8Rng,
}

impl HubState {
    fn add_endpoint(&mut self) -> Endpoint {
        self.inboxes.push(VecDeque::new());
        self.inboxes.len() - 1
    }

    fn allocate_handle(&mut self) -> ConnectionHandle {
        let handle = ConnectionHandle::new(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        handle
    }

    fn roll(&mut self, percent: u8) -> bool {
        percent > 0 && self.rng.gen_range(0..100u8) < percent
    }

    fn close_link(&mut self, endpoint: Endpoint, connection: ConnectionHandle) {
        let Some((peer, peer_connection)) = self.links.remove(&(endpoint, connection)) else {
            return;
        };
        self.links.remove(&(peer, peer_connection));
        self.inboxes[endpoint].push_back(TransportEvent::Closed(connection));
        self.inboxes[peer].push_back(TransportEvent::Closed(peer_connection));
    }
}

/// Shared in-memory network. Cheap to clone.
#[derive(Clone)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    /// Perfect links; `seed` only matters once conditions are changed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_conditions(LinkConditions::PERFECT, seed)
    }

    /// Hub applying `conditions` to every datagram.
    #[must_use]
    pub fn with_conditions(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                inboxes: Vec::new(),
                links: HashMap::new(),
                listener: None,
                next_handle: 1,
                conditions,
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Changes link conditions for subsequent datagrams.
    pub fn set_conditions(&self, conditions: LinkConditions) {
        self.state.lock().conditions = conditions;
    }

    /// Creates the listening endpoint. A later call replaces the listener.
    #[must_use]
    pub fn listen(&self) -> LoopbackTransport {
        let mut state = self.state.lock();
        let endpoint = state.add_endpoint();
        state.listener = Some(endpoint);
        LoopbackTransport {
            endpoint,
            state: Arc::clone(&self.state),
        }
    }

    /// Creates an endpoint connected to the listener.
    ///
    /// Both sides see `Connecting` then `Established` on their next poll.
    ///
    /// # Errors
    ///
    /// [`NetError::Transport`] if nothing is listening.
    pub fn connect(&self) -> NetResult<LoopbackTransport> {
        let mut state = self.state.lock();
        let listener = state
            .listener
            .ok_or_else(|| NetError::Transport("no loopback listener".into()))?;

        let endpoint = state.add_endpoint();
        let client_side = state.allocate_handle();
        let server_side = state.allocate_handle();
        state.links.insert((endpoint, client_side), (listener, server_side));
        state.links.insert((listener, server_side), (endpoint, client_side));

        for (ep, handle) in [(endpoint, client_side), (listener, server_side)] {
            state.inboxes[ep].push_back(TransportEvent::Connecting(handle));
            state.inboxes[ep].push_back(TransportEvent::Established(handle));
        }

        tracing::trace!(%client_side, %server_side, "loopback link opened");
        Ok(LoopbackTransport {
            endpoint,
            state: Arc::clone(&self.state),
        })
    }
}

impl std::fmt::Debug for LoopbackHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoopbackHub")
            .field("endpoints", &state.inboxes.len())
            .field("links", &(state.links.len() / 2))
            .field("conditions", &state.conditions)
            .finish()
    }
}

/// One endpoint on a [`LoopbackHub`]. Dropping it closes its connections.
pub struct LoopbackTransport {
    endpoint: Endpoint,
    state: Arc<Mutex<HubState>>,
}

impl LoopbackTransport {
    /// Open connections of this endpoint.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionHandle> {
        let state = self.state.lock();
        let mut handles: Vec<_> = state
            .links
            .keys()
            .filter(|(ep, _)| *ep == self.endpoint)
            .map(|(_, handle)| *handle)
            .collect();
        handles.sort_unstable();
        handles
    }
}

impl Transport for LoopbackTransport {
    fn poll(&mut self) -> Vec<TransportEvent> {
        self.state.lock().inboxes[self.endpoint].drain(..).collect()
    }

    fn send(&mut self, connection: ConnectionHandle, bytes: &[u8]) -> NetResult<()> {
        let mut state = self.state.lock();
        let (peer, peer_connection) = *state
            .links
            .get(&(self.endpoint, connection))
            .ok_or(NetError::InvalidConnection(connection))?;

        let conditions = state.conditions;
        if state.roll(conditions.drop_percent) {
            tracing::trace!(%connection, len = bytes.len(), "loopback dropped datagram");
            return Ok(());
        }
        let copies = if state.roll(conditions.duplicate_percent) { 2 } else { 1 };
        for _ in 0..copies {
            state.inboxes[peer].push_back(TransportEvent::Message(peer_connection, bytes.to_vec()));
        }
        Ok(())
    }

    fn close(&mut self, connection: ConnectionHandle) {
        self.state.lock().close_link(self.endpoint, connection);
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        let own: Vec<_> = state
            .links
            .keys()
            .filter(|(ep, _)| *ep == self.endpoint)
            .map(|(_, handle)| *handle)
            .collect();
        for handle in own {
            state.close_link(self.endpoint, handle);
        }
        if state.listener == Some(self.endpoint) {
            state.listener = None;
        }
        state.inboxes[self.endpoint].clear();
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_exchange() {
        let hub = LoopbackHub::new(1);
        let mut server = hub.listen();
        let mut client = hub.connect().unwrap();

        let server_events = server.poll();
        let client_events = client.poll();
        assert_eq!(server_events.len(), 2);
        assert_eq!(client_events.len(), 2);

        let TransportEvent::Established(to_server) = &client_events[1] else {
            panic!("expected established, got {:?}", client_events[1]);
        };
        client.send(*to_server, b"hello").unwrap();

        let TransportEvent::Established(to_client) = &server_events[1] else {
            panic!("expected established, got {:?}", server_events[1]);
        };
        assert_eq!(server.poll(), vec![TransportEvent::Message(*to_client, b"hello".to_vec())]);
    }

    #[test]
    fn test_close_notifies_both_sides() {
        let hub = LoopbackHub::new(1);
        let mut server = hub.listen();
        let mut client = hub.connect().unwrap();
        server.poll();
        client.poll();

        let conn = server.connections()[0];
        server.close(conn);
        assert_eq!(server.poll(), vec![TransportEvent::Closed(conn)]);
        assert!(matches!(client.poll()[..], [TransportEvent::Closed(_)]));
        assert!(server.send(conn, b"late").is_err());
    }

    #[test]
    fn test_dropping_endpoint_closes_links() {
        let hub = LoopbackHub::new(1);
        let mut server = hub.listen();
        let client = hub.connect().unwrap();
        server.poll();

        drop(client);
        assert!(matches!(server.poll()[..], [TransportEvent::Closed(_)]));
        assert!(server.connections().is_empty());
    }

    #[test]
    fn test_connect_without_listener_fails() {
        let hub = LoopbackHub::new(1);
        assert!(matches!(hub.connect(), Err(NetError::Transport(_))));
    }

    #[test]
    fn test_link_conditions_are_deterministic() {
        fn delivered(conditions: LinkConditions, seed: u64) -> usize {
            let hub = LoopbackHub::with_conditions(conditions, seed);
            let mut server = hub.listen();
            let mut client = hub.connect().unwrap();
            server.poll();
            let conn = client.connections()[0];
            for i in 0..200u8 {
                client.send(conn, &[i]).unwrap();
            }
            server.poll().len()
        }

        assert_eq!(delivered(LinkConditions::LOSSY, 42), delivered(LinkConditions::LOSSY, 42));
        assert_eq!(delivered(LinkConditions::PERFECT, 7), 200);

        let black_hole = LinkConditions {
            drop_percent: 100,
            duplicate_percent: 0,
        };
        assert_eq!(delivered(black_hole, 7), 0);

        let echo = LinkConditions {
            drop_percent: 0,
            duplicate_percent: 100,
        };
        assert_eq!(delivered(echo, 7), 400);
    }
}
