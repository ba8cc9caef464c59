// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-process communication substrate where every rank is a thread.
//!
//! [`LocalWorld`] creates a fixed number of ranks sharing one message fabric. Each rank gets a
//! [`LocalProcess`], which implements [`Substrate`] with its own initialized and finalized flags,
//! the way a real process would.
//!
//! Messages travel over unbounded channels keyed by (context, source, destination), so sends are
//! buffered and never block. Receives block until a message with the requested tag arrives;
//! messages with other tags are parked and matched later, so messages between a pair of ranks with
//! the same tag are never reordered.

use crate::{
    errors::SubstrateError,
    substrate::{Communicator, Rank, Substrate, Tag},
};
use crossbeam_channel::{Receiver, Sender};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    panic,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

type ContextId = u64;

const WORLD_CONTEXT: ContextId = 0;

/// A set of in-process ranks sharing a message fabric.
#[derive(Clone, Debug)]
pub struct LocalWorld {
    shared: Arc<WorldShared>,
}

impl LocalWorld {
    /// Creates a new world with `size` ranks.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "a world must contain at least one rank");
        Self {
            shared: Arc::new(WorldShared {
                size,
                routes: Mutex::new(HashMap::new()),
                contexts: Mutex::new(ContextRegistry::default()),
            }),
        }
    }

    /// Returns the number of ranks in this world.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Returns the process handle for `rank`, or `None` if it is out of range.
    ///
    /// Each call returns a fresh, uninitialized process: call it once per rank.
    pub fn process(&self, rank: Rank) -> Option<LocalProcess> {
        (rank < self.shared.size).then(|| LocalProcess {
            rank,
            shared: self.shared.clone(),
            state: Arc::new(ProcessState::default()),
        })
    }

    /// Runs `f` on one thread per rank and returns the results in rank order.
    ///
    /// The processes passed to `f` are not initialized. A panic on any rank is propagated once
    /// every thread has been joined.
    pub fn run<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(LocalProcess) -> T + Sync,
    {
        let world = Self::new(size);
        let processes: Vec<_> = (0..size).filter_map(|rank| world.process(rank)).collect();
        let f = &f;

        thread::scope(|scope| {
            let handles: Vec<_> = processes
                .into_iter()
                .map(|process| scope.spawn(move || f(process)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .collect()
        })
    }
}

#[derive(Debug)]
struct WorldShared {
    size: usize,
    routes: Mutex<HashMap<RouteKey, (Sender<Envelope>, Receiver<Envelope>)>>,
    contexts: Mutex<ContextRegistry>,
}

impl WorldShared {
    fn route(&self, key: RouteKey) -> (Sender<Envelope>, Receiver<Envelope>) {
        let mut routes = lock(&self.routes);
        let (tx, rx) = routes.entry(key).or_insert_with(crossbeam_channel::unbounded);
        (tx.clone(), rx.clone())
    }
}

/// Maps (parent context, duplicate sequence number) to the context every rank agrees on.
#[derive(Debug, Default)]
struct ContextRegistry {
    last: ContextId,
    by_origin: HashMap<(ContextId, u64), ContextId>,
}

impl ContextRegistry {
    fn context_for(&mut self, parent: ContextId, seq: u64) -> ContextId {
        let last = &mut self.last;
        *self.by_origin.entry((parent, seq)).or_insert_with(|| {
            *last += 1;
            *last
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct RouteKey {
    context: ContextId,
    source: Rank,
    dest: Rank,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum MessageClass {
    PointToPoint(Tag),
    Gather,
}

#[derive(Debug)]
enum Payload {
    Int(i32),
    Bytes(Vec<u8>),
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Payload::Int(_) => "integer",
            Payload::Bytes(_) => "byte",
        }
    }
}

#[derive(Debug)]
struct Envelope {
    class: MessageClass,
    payload: Payload,
}

#[derive(Debug, Default)]
struct ProcessState {
    initialized: AtomicBool,
    finalized: AtomicBool,
    duplicates: Mutex<HashMap<ContextId, u64>>,
    freed: Mutex<HashSet<ContextId>>,
    parked: Mutex<HashMap<RouteKey, VecDeque<Envelope>>>,
}

/// One rank of a [`LocalWorld`].
///
/// Cloning a `LocalProcess` produces another handle to the same rank.
#[derive(Clone, Debug)]
pub struct LocalProcess {
    rank: Rank,
    shared: Arc<WorldShared>,
    state: Arc<ProcessState>,
}

impl LocalProcess {
    /// Returns the rank of this process in the world.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Initializes the substrate on this process.
    ///
    /// This is the embedding program's job; initializing twice, or after finalization, fails.
    pub fn init(&self) -> Result<(), SubstrateError> {
        if self.state.finalized.load(Ordering::Acquire) {
            return Err(SubstrateError::Finalized);
        }
        if self.state.initialized.swap(true, Ordering::AcqRel) {
            return Err(SubstrateError::AlreadyInitialized);
        }
        Ok(())
    }

    fn check_active(&self) -> Result<(), SubstrateError> {
        if !self.state.initialized.load(Ordering::Acquire) {
            Err(SubstrateError::NotInitialized)
        } else if self.state.finalized.load(Ordering::Acquire) {
            Err(SubstrateError::Finalized)
        } else {
            Ok(())
        }
    }
}

impl Substrate for LocalProcess {
    type Communicator = LocalCommunicator;

    fn is_initialized(&self) -> Result<bool, SubstrateError> {
        Ok(self.state.initialized.load(Ordering::Acquire))
    }

    fn is_finalized(&self) -> Result<bool, SubstrateError> {
        Ok(self.state.finalized.load(Ordering::Acquire))
    }

    fn finalize(&self) -> Result<(), SubstrateError> {
        self.check_active()?;
        self.state.finalized.store(true, Ordering::Release);
        Ok(())
    }

    fn world(&self) -> Result<LocalCommunicator, SubstrateError> {
        self.check_active()?;
        Ok(LocalCommunicator {
            context: WORLD_CONTEXT,
            process: self.clone(),
        })
    }
}

/// A communicator over the ranks of a [`LocalWorld`].
#[derive(Debug)]
pub struct LocalCommunicator {
    context: ContextId,
    process: LocalProcess,
}

impl LocalCommunicator {
    fn check_usable(&self) -> Result<(), SubstrateError> {
        self.process.check_active()?;
        if lock(&self.process.state.freed).contains(&self.context) {
            return Err(SubstrateError::CommunicatorFreed);
        }
        Ok(())
    }

    fn check_rank(&self, rank: Rank) -> Result<(), SubstrateError> {
        let size = self.process.shared.size;
        if rank < size {
            Ok(())
        } else {
            Err(SubstrateError::InvalidRank { rank, size })
        }
    }

    fn post(&self, dest: Rank, class: MessageClass, payload: Payload) -> Result<(), SubstrateError> {
        let key = RouteKey {
            context: self.context,
            source: self.process.rank,
            dest,
        };
        let (tx, _) = self.process.shared.route(key);
        tx.send(Envelope { class, payload })
            .map_err(|_| SubstrateError::Disconnected { peer: dest })
    }

    fn take(&self, source: Rank, class: MessageClass) -> Result<Payload, SubstrateError> {
        let key = RouteKey {
            context: self.context,
            source,
            dest: self.process.rank,
        };

        {
            let mut parked = lock(&self.process.state.parked);
            if let Some(queue) = parked.get_mut(&key) {
                if let Some(envelope) = queue
                    .iter()
                    .position(|envelope| envelope.class == class)
                    .and_then(|pos| queue.remove(pos))
                {
                    return Ok(envelope.payload);
                }
            }
        }

        let (_, rx) = self.process.shared.route(key);
        loop {
            let envelope = rx
                .recv()
                .map_err(|_| SubstrateError::Disconnected { peer: source })?;
            if envelope.class == class {
                return Ok(envelope.payload);
            }
            lock(&self.process.state.parked)
                .entry(key)
                .or_default()
                .push_back(envelope);
        }
    }

    fn take_int(&self, source: Rank, class: MessageClass) -> Result<i32, SubstrateError> {
        match self.take(source, class)? {
            Payload::Int(value) => Ok(value),
            other => Err(SubstrateError::PayloadMismatch {
                source_rank: source,
                expected: "integer",
                actual: other.kind(),
            }),
        }
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> Result<Rank, SubstrateError> {
        self.check_usable()?;
        Ok(self.process.rank)
    }

    fn size(&self) -> Result<usize, SubstrateError> {
        self.check_usable()?;
        Ok(self.process.shared.size)
    }

    fn duplicate(&self) -> Result<Self, SubstrateError> {
        self.check_usable()?;
        let seq = {
            let mut duplicates = lock(&self.process.state.duplicates);
            let seq = duplicates.entry(self.context).or_default();
            *seq += 1;
            *seq
        };
        let context = lock(&self.process.shared.contexts).context_for(self.context, seq);
        tracing::trace!(
            rank = self.process.rank,
            parent = self.context,
            context,
            "duplicated communicator"
        );
        Ok(Self {
            context,
            process: self.process.clone(),
        })
    }

    fn free(self) -> Result<(), SubstrateError> {
        self.check_usable()?;
        lock(&self.process.state.freed).insert(self.context);
        Ok(())
    }

    fn gather_i32(&self, value: i32, root: Rank) -> Result<Option<Vec<i32>>, SubstrateError> {
        self.check_usable()?;
        self.check_rank(root)?;

        if self.process.rank != root {
            self.post(root, MessageClass::Gather, Payload::Int(value))?;
            return Ok(None);
        }

        (0..self.process.shared.size)
            .map(|source| {
                if source == root {
                    Ok(value)
                } else {
                    self.take_int(source, MessageClass::Gather)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn send_i32(&self, value: i32, dest: Rank, tag: Tag) -> Result<(), SubstrateError> {
        self.check_usable()?;
        self.check_rank(dest)?;
        self.post(dest, MessageClass::PointToPoint(tag), Payload::Int(value))
    }

    fn recv_i32(&self, source: Rank, tag: Tag) -> Result<i32, SubstrateError> {
        self.check_usable()?;
        self.check_rank(source)?;
        self.take_int(source, MessageClass::PointToPoint(tag))
    }

    fn send_bytes(&self, bytes: &[u8], dest: Rank, tag: Tag) -> Result<(), SubstrateError> {
        self.check_usable()?;
        self.check_rank(dest)?;
        self.post(
            dest,
            MessageClass::PointToPoint(tag),
            Payload::Bytes(bytes.to_vec()),
        )
    }

    fn recv_bytes(
        &self,
        capacity: usize,
        source: Rank,
        tag: Tag,
    ) -> Result<Vec<u8>, SubstrateError> {
        self.check_usable()?;
        self.check_rank(source)?;
        match self.take(source, MessageClass::PointToPoint(tag))? {
            Payload::Bytes(bytes) if bytes.len() > capacity => Err(SubstrateError::Truncated {
                source_rank: source,
                capacity,
                actual: bytes.len(),
            }),
            Payload::Bytes(bytes) => Ok(bytes),
            other => Err(SubstrateError::PayloadMismatch {
                source_rank: source,
                expected: "byte",
                actual: other.kind(),
            }),
        }
    }
}

// No critical section in this module can panic, so a poisoned lock still holds consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
