use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::auth::authority::{AuthError, CredentialAuthority, IssuedToken};
use crate::auth::credential::{Credential, Scopes};

type Acquisition = Shared<BoxFuture<'static, Result<Credential, AuthError>>>;
type Slots = Mutex<HashMap<Scopes, Slot>>;

#[derive(Default)]
struct Slot {
    current: Option<Credential>,
    /// (generation, acquisition) while a refresh is running
    in_flight: Option<(u64, Acquisition)>,
}

/// Supplies credentials per scope set, refreshing before expiry.
///
/// Refreshes are single-flight: while an acquisition for a scope set is
/// running, every other caller awaits that same acquisition. The slot lock is
/// only held to inspect or swap state, never across the authority call.
pub struct TokenProvider {
    authority: Arc<dyn CredentialAuthority>,
    safety_margin: Duration,
    slots: Arc<Slots>,
    generation: Mutex<u64>,
}

impl TokenProvider {
    pub fn new(authority: Arc<dyn CredentialAuthority>, safety_margin: Duration) -> Self {
        Self {
            authority,
            safety_margin,
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: Mutex::new(0),
        }
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Cached credential if it outlives the safety margin, otherwise a freshly
    /// acquired one.
    pub async fn get_token(&self, scopes: &Scopes) -> Result<Credential, AuthError> {
        let acquisition = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(scopes.clone()).or_default();
            if let Some(credential) = slot.current.as_ref().filter(|c| c.is_fresh(self.safety_margin)) {
                return Ok(credential.clone());
            }
            self.join_or_start(slot, scopes)
        };
        acquisition.await
    }

    /// Drops the cached credential and acquires a new one, joining a refresh
    /// that is already running.
    pub async fn refresh_token(&self, scopes: &Scopes) -> Result<Credential, AuthError> {
        let acquisition = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(scopes.clone()).or_default();
            slot.current = None;
            self.join_or_start(slot, scopes)
        };
        acquisition.await
    }

    fn join_or_start(&self, slot: &mut Slot, scopes: &Scopes) -> Acquisition {
        if let Some((_, acquisition)) = &slot.in_flight {
            debug!(scopes = %scopes, "joining in-flight credential refresh");
            return acquisition.clone();
        }

        let generation = {
            let mut counter = self.generation.lock();
            *counter += 1;
            *counter
        };
        let acquisition = acquire(
            Arc::clone(&self.authority),
            Arc::downgrade(&self.slots),
            scopes.clone(),
            self.safety_margin,
            generation,
        )
        .boxed()
        .shared();
        slot.in_flight = Some((generation, acquisition.clone()));
        acquisition
    }
}

async fn acquire(
    authority: Arc<dyn CredentialAuthority>,
    slots: Weak<Slots>,
    scopes: Scopes,
    safety_margin: Duration,
    generation: u64,
) -> Result<Credential, AuthError> {
    info!(scopes = %scopes, "acquiring credential");
    let result = authority
        .acquire(&scopes)
        .await
        .and_then(|issued| validate(issued, &scopes, safety_margin));

    match &result {
        Ok(credential) => info!(scopes = %scopes, remaining = ?credential.remaining(), "credential refreshed"),
        Err(e) => warn!(scopes = %scopes, error = %e, "credential refresh failed"),
    }

    if let Some(slots) = slots.upgrade() {
        let mut slots = slots.lock();
        if let Some(slot) = slots.get_mut(&scopes) {
            if matches!(&slot.in_flight, Some((g, _)) if *g == generation) {
                slot.in_flight = None;
            }
            if let Ok(credential) = &result {
                slot.current = Some(credential.clone());
            }
        }
    }
    result
}

fn validate(
    issued: IssuedToken,
    scopes: &Scopes,
    safety_margin: Duration,
) -> Result<Credential, AuthError> {
    if issued.token.trim().is_empty() {
        return Err(AuthError::Malformed("empty token".to_owned()));
    }
    let expires_at = issued
        .expires_at
        .ok_or_else(|| AuthError::Malformed("missing expiry".to_owned()))?;

    let credential = Credential::new(issued.token, expires_at, scopes.clone());
    if !credential.is_fresh(safety_margin) {
        return Err(AuthError::Malformed(format!(
            "credential lifetime {:?} does not exceed safety margin {:?}",
            credential.remaining(),
            safety_margin
        )));
    }
    Ok(credential)
}
