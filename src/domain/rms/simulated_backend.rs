use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::api::rms_config_dto::rms_dto::SimulatedBackendDto;
use crate::domain::reservation::node::{Node, NodeId};
use crate::domain::reservation::reservation::Reservation;
use crate::domain::reservation::reservation_request::ReservationRequestKind;
use crate::domain::reservation::reservation_wait::ReservationWait;
use crate::domain::rms::reservation_interface::ReservationInterface;
use crate::domain::utils::id::BackendId;
use crate::error::{Error, Result};

/// Allocation failures of the simulated node pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Backend {backend} cannot grant {requested} node(s) at location '{location}': only {available} free")]
    Exhausted { backend: BackendId, requested: usize, available: usize, location: String },
}

#[derive(Debug, Clone)]
struct PoolEntry {
    node: Node,
    location: String,
    free: bool,
}

#[derive(Debug)]
struct NodePool {
    entries: Vec<PoolEntry>,
}

impl NodePool {
    /// Takes `num_nodes` free nodes at `location` (any location if empty),
    /// or none at all.
    fn take(&mut self, backend: &BackendId, num_nodes: usize, location: &str) -> std::result::Result<Reservation, PoolError> {
        let candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.free && (location.is_empty() || entry.location == location))
            .map(|(i, _)| i)
            .collect();

        if candidates.len() < num_nodes {
            return Err(PoolError::Exhausted { backend: backend.clone(), requested: num_nodes, available: candidates.len(), location: location.to_string() });
        }

        let mut nodes = Vec::with_capacity(num_nodes);
        for &i in candidates.iter().take(num_nodes) {
            self.entries[i].free = false;
            nodes.push(self.entries[i].node.clone());
        }
        Ok(Reservation::new(nodes))
    }

    fn free_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.free).count()
    }
}

/// An in-process backend over a fixed pool of nodes.
///
/// Allocations sleep for the configured delay on the wait's worker and then
/// take free nodes from the pool. `stop_reservation` gives them back.
#[derive(Debug)]
pub struct SimulatedBackend {
    id: BackendId,
    allocation_delay: Duration,
    allocation_jitter_ms: u64,
    pool: Arc<Mutex<NodePool>>,
}

impl SimulatedBackend {
    pub fn new(id: BackendId, allocation_delay: Duration, nodes: Vec<(Node, String)>) -> Result<Self> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut entries = Vec::with_capacity(nodes.len());

        for (node, location) in nodes {
            if !seen.insert(node.node_id()) {
                return Err(Error::InvalidArgument(format!("Backend {}: node id {} is configured more than once.", id, node.node_id())));
            }
            entries.push(PoolEntry { node, location, free: true });
        }

        if entries.is_empty() {
            log::info!("Empty SimulatedBackend: backend {} contains no nodes.", id);
        }

        Ok(SimulatedBackend { id, allocation_delay, allocation_jitter_ms: 0, pool: Arc::new(Mutex::new(NodePool { entries })) })
    }

    pub fn with_jitter(mut self, allocation_jitter_ms: u64) -> Self {
        self.allocation_jitter_ms = allocation_jitter_ms;
        self
    }

    pub fn id(&self) -> &BackendId {
        &self.id
    }

    pub fn free_nodes(&self) -> usize {
        self.lock_pool().free_count()
    }

    pub fn total_nodes(&self) -> usize {
        self.lock_pool().entries.len()
    }

    fn lock_pool(&self) -> MutexGuard<'_, NodePool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_delay(&self) -> Duration {
        if self.allocation_jitter_ms == 0 {
            return self.allocation_delay;
        }
        let jitter = rand::rng().random_range(0..=self.allocation_jitter_ms);
        self.allocation_delay + Duration::from_millis(jitter)
    }
}

impl TryFrom<SimulatedBackendDto> for SimulatedBackend {
    type Error = Error;

    fn try_from(dto: SimulatedBackendDto) -> Result<Self> {
        let nodes = dto.nodes.into_iter().map(|pool_node| (pool_node.node, pool_node.location)).collect();
        let backend = SimulatedBackend::new(BackendId::new(dto.id), Duration::from_millis(dto.allocation_delay_ms), nodes)?;
        Ok(backend.with_jitter(dto.allocation_jitter_ms))
    }
}

impl ReservationInterface for SimulatedBackend {
    fn reserve(&self, request: ReservationRequestKind) -> Result<ReservationWait> {
        let request = request.as_request();
        request.validate()?;

        let backend_id = self.id.clone();
        let pool = Arc::clone(&self.pool);
        let num_nodes = request.num_nodes();
        let location = request.location().to_string();
        let delay = self.next_delay();

        log::info!("Backend {}: reserving {} node(s) at location '{}' (delay {:?}).", self.id, num_nodes, location, delay);

        Ok(ReservationWait::new(move || {
            thread::sleep(delay);
            let mut pool = pool.lock().unwrap_or_else(PoisonError::into_inner);
            pool.take(&backend_id, num_nodes, &location)
        }))
    }

    fn stop_reservation(&self, reservation: &Reservation) -> Result<()> {
        let mut pool = self.lock_pool();

        let mut positions = Vec::with_capacity(reservation.len());
        for node in reservation.nodes() {
            let position = pool.entries.iter().position(|entry| entry.node.node_id() == node.node_id()).ok_or_else(|| {
                Error::NotFound(format!("Backend {}: node {} ({}) does not belong to this backend.", self.id, node.node_id(), node.hostname()))
            })?;
            positions.push(position);
        }

        for position in positions {
            let entry = &mut pool.entries[position];
            if entry.free {
                log::warn!("Backend {}: node {} was already free.", self.id, entry.node.node_id());
            }
            entry.free = true;
        }

        log::info!("Backend {}: released {} node(s).", self.id, reservation.len());
        Ok(())
    }
}
