//! Deterministic randomness shared by every generator in a process.
//!
//! A [`SharedRandomness`] domain owns the shared `ChaCha8Rng`, the global
//! index counter and a reentrant turnstile. Population runs while holding
//! the turnstile and every shared draw enters it, so index increments and
//! draws from concurrent callers never interleave. The owning thread may re-enter, which lets a rule
//! build nested objects with other generators.
//!
//! Each generator owns a [`RandomContext`] that captures the epoch indexes
//! and optionally a locally seeded stream.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Process-wide randomness domain.
#[derive(Debug)]
pub struct SharedRandomness {
    turnstile: Mutex<Turnstile>,
    released: Condvar,
    state: Mutex<SharedState>,
}

#[derive(Debug, Default)]
struct Turnstile {
    owner: Option<ThreadId>,
    depth: usize,
}

#[derive(Debug)]
struct SharedState {
    rng: ChaCha8Rng,
    next_index: u64,
}

impl SharedRandomness {
    /// Domain seeded from the thread RNG.
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            turnstile: Mutex::new(Turnstile::default()),
            released: Condvar::new(),
            state: Mutex::new(SharedState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                next_index: 0,
            }),
        }
    }

    /// The lazily created default domain of this process.
    pub fn global() -> Arc<SharedRandomness> {
        static GLOBAL: OnceLock<Arc<SharedRandomness>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SharedRandomness::new())))
    }

    /// Replaces the shared stream. Generators with a local seed are unaffected.
    pub fn reseed(&self, seed: u64) {
        let _turn = self.enter();
        self.lock_state().rng = ChaCha8Rng::seed_from_u64(seed);
        debug!(seed, "shared randomness reseeded");
    }

    /// Restarts the global index at zero.
    pub fn reset_index(&self) {
        let _turn = self.enter();
        self.lock_state().next_index = 0;
    }

    /// Index the next epoch will receive.
    pub fn peek_index(&self) -> u64 {
        self.lock_state().next_index
    }

    /// Blocks until the calling thread owns the turnstile.
    ///
    /// Re-entering from the owning thread succeeds immediately.
    pub fn enter(&self) -> TurnstileGuard<'_> {
        let me = thread::current().id();
        let mut turnstile = self
            .turnstile
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            match turnstile.owner {
                None => {
                    turnstile.owner = Some(me);
                    turnstile.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    turnstile.depth += 1;
                    break;
                }
                Some(_) => {
                    turnstile = self
                        .released
                        .wait(turnstile)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        TurnstileGuard { domain: self }
    }

    fn next_global_index(&self) -> u64 {
        let mut state = self.lock_state();
        let index = state.next_index;
        state.next_index += 1;
        index
    }

    /// Every draw from the shared stream waits for the turnstile, so a
    /// caller that does not hold it cannot interleave with a running epoch.
    fn with_rng<R>(&self, draw: impl FnOnce(&mut ChaCha8Rng) -> R) -> R {
        let _turn = self.enter();
        draw(&mut self.lock_state().rng)
    }

    fn lock_state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn leave(&self) {
        let mut turnstile = self
            .turnstile
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        turnstile.depth = turnstile.depth.saturating_sub(1);
        if turnstile.depth == 0 {
            turnstile.owner = None;
            self.released.notify_one();
        }
    }
}

impl Default for SharedRandomness {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive, reentrant hold on a [`SharedRandomness`] domain.
#[must_use = "the turnstile is released when the guard is dropped"]
#[derive(Debug)]
pub struct TurnstileGuard<'a> {
    domain: &'a SharedRandomness,
}

impl Drop for TurnstileGuard<'_> {
    fn drop(&mut self) {
        self.domain.leave();
    }
}

/// Per-generator view of the randomness domain handed to every rule.
///
/// Implements [`RngCore`], so all `rand::Rng` helpers are available. Draws
/// come from the local stream when a seed was applied with
/// [`RandomContext::use_seed`], otherwise from the shared stream.
#[derive(Debug)]
pub struct RandomContext {
    shared: Arc<SharedRandomness>,
    local: Option<ChaCha8Rng>,
    locale: String,
    next_faker_index: u64,
    index_faker: u64,
    index_global: u64,
    has_context: bool,
}

impl RandomContext {
    pub fn new(shared: Arc<SharedRandomness>, locale: impl Into<String>) -> Self {
        Self {
            shared,
            local: None,
            locale: locale.into(),
            next_faker_index: 0,
            index_faker: 0,
            index_global: 0,
            has_context: false,
        }
    }

    pub fn shared(&self) -> &Arc<SharedRandomness> {
        &self.shared
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Switches to a private stream seeded with `seed`.
    pub fn use_seed(&mut self, seed: u64) {
        self.local = Some(ChaCha8Rng::seed_from_u64(seed));
    }

    pub fn has_local_seed(&self) -> bool {
        self.local.is_some()
    }

    /// Starts a new epoch, capturing the next global and per-generator index.
    pub fn new_context(&mut self) {
        self.index_faker = self.next_faker_index;
        self.next_faker_index += 1;
        self.index_global = self.shared.next_global_index();
        self.has_context = true;
    }

    /// True once an epoch has been started on this context.
    pub fn has_context(&self) -> bool {
        self.has_context
    }

    /// Zero-based epoch index within this generator.
    pub fn index_faker(&self) -> u64 {
        self.index_faker
    }

    /// Zero-based epoch index across the whole domain.
    pub fn index_global(&self) -> u64 {
        self.index_global
    }

    /// Forgets epoch progress; the next epoch gets per-generator index zero.
    pub fn reset_index(&mut self) {
        self.next_faker_index = 0;
        self.index_faker = 0;
        self.index_global = 0;
        self.has_context = false;
    }
}

impl RngCore for RandomContext {
    fn next_u32(&mut self) -> u32 {
        match self.local.as_mut() {
            Some(rng) => rng.next_u32(),
            None => self.shared.with_rng(|rng| rng.next_u32()),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self.local.as_mut() {
            Some(rng) => rng.next_u64(),
            None => self.shared.with_rng(|rng| rng.next_u64()),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self.local.as_mut() {
            Some(rng) => rng.fill_bytes(dest),
            None => self.shared.with_rng(|rng| rng.fill_bytes(dest)),
        }
    }
}
