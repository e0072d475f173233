// Copyright (c) 2024 The Machine-Auth Maintainers and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! License decision logic: given a machine id and an optional key, decide
//! whether the machine may proceed, binding a key to a machine on first use.
//!
//! All state lives in the backing store; the functions here are pure apart
//! from the store calls, and expiry is evaluated against the `now` passed in
//! by the caller.

use chrono::NaiveDateTime;

use crate::error::Result;

pub const MSG_MACHINE_ID_REQUIRED: &str =
    "Machine ID is required. Please provide a valid machineId.";
pub const MSG_NOT_REGISTERED: &str = "Machine not registered. Please activate.";
pub const MSG_LICENSE_EXPIRED: &str = "Your license has expired.";
pub const MSG_WELCOME_BACK: &str = "Welcome back! Login successful.";
pub const MSG_INVALID_KEY: &str = "Invalid key.";
pub const MSG_KEY_EXPIRED: &str = "This key has expired.";
pub const MSG_LOGIN_OK: &str = "Login successful.";
pub const MSG_KEY_IN_USE: &str = "Key is already in use by another machine.";
pub const MSG_ACTIVATED: &str = "Key successfully activated. Login successful.";
pub const MSG_INTERNAL: &str = "Internal Server Error.";

/// A license record as seen by the decision logic. Records are provisioned
/// out of band; this module only ever reads them and binds `machine_id` once.
#[derive(Clone, Debug, PartialEq)]
pub struct License {
    pub key_value:  String,
    pub machine_id: Option<String>,
    pub expires_at: NaiveDateTime,
}

impl License {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool { self.expires_at < now }
}

/// Store operations the decision logic needs. `bind_machine` must be a
/// single conditional write (set machine_id where key_value matches AND
/// machine_id is unset) so that concurrent activations of the same key
/// cannot both win; it returns whether this caller took the binding.
pub trait LicenseStore {
    fn find_by_machine_id(&mut self, machine_id: &str) -> Result<Option<License>>;

    fn find_by_key(&mut self, key: &str) -> Result<Option<License>>;

    fn bind_machine(&mut self, key: &str, machine_id: &str) -> Result<bool>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    Internal,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::Internal => 500,
        }
    }
}

/// The authorization result handed back to the caller: whether the machine
/// may proceed, the human-readable message, and the status class.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub authorized: bool,
    pub message:    &'static str,
    pub status:     Status,
}

impl Decision {
    fn allow(message: &'static str) -> Decision {
        Decision { authorized: true,
                   message,
                   status: Status::Ok }
    }

    fn deny(status: Status, message: &'static str) -> Decision {
        Decision { authorized: false,
                   message,
                   status }
    }

    pub fn machine_id_required() -> Decision {
        Decision::deny(Status::BadRequest, MSG_MACHINE_ID_REQUIRED)
    }
}

/// Request mode, dispatched on key presence. An empty key string counts as
/// absent, matching client behavior on first launch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AuthMode<'a> {
    AutoLogin { machine_id: &'a str },
    Activate { machine_id: &'a str, key: &'a str },
}

impl<'a> AuthMode<'a> {
    pub fn new(machine_id: &'a str, key: Option<&'a str>) -> Option<AuthMode<'a>> {
        if machine_id.is_empty() {
            return None;
        }
        match key.filter(|k| !k.is_empty()) {
            Some(key) => Some(AuthMode::Activate { machine_id, key }),
            None => Some(AuthMode::AutoLogin { machine_id }),
        }
    }
}

/// Authorize a request. A missing machine id fails fast without touching the
/// store; otherwise the request dispatches to auto-login or activation.
pub fn authorize<S>(store: &mut S,
                    machine_id: &str,
                    key: Option<&str>,
                    now: NaiveDateTime)
                    -> Result<Decision>
    where S: LicenseStore
{
    match AuthMode::new(machine_id, key) {
        None => Ok(Decision::machine_id_required()),
        Some(AuthMode::AutoLogin { machine_id }) => auto_login(store, machine_id, now),
        Some(AuthMode::Activate { machine_id, key }) => activate(store, machine_id, key, now),
    }
}

// Mode A: no key supplied. Check whether the machine already holds a valid
// binding.
fn auto_login<S>(store: &mut S, machine_id: &str, now: NaiveDateTime) -> Result<Decision>
    where S: LicenseStore
{
    debug!("Auto-login attempt for machine id {}", machine_id);

    let license = match store.find_by_machine_id(machine_id)? {
        Some(license) => license,
        None => {
            debug!("Machine id {} not found for auto-login", machine_id);
            return Ok(Decision::deny(Status::NotFound, MSG_NOT_REGISTERED));
        }
    };

    if license.is_expired(now) {
        debug!("License for machine id {} has expired", machine_id);
        return Ok(Decision::deny(Status::Forbidden, MSG_LICENSE_EXPIRED));
    }

    Ok(Decision::allow(MSG_WELCOME_BACK))
}

// Mode B: key supplied. Validate the key and bind it to this machine on
// first use. Expiry is checked before any binding state, so an expired key
// is rejected regardless of which machine holds it.
fn activate<S>(store: &mut S, machine_id: &str, key: &str, now: NaiveDateTime) -> Result<Decision>
    where S: LicenseStore
{
    debug!("Activation attempt with key on machine id {}", machine_id);

    let license = match store.find_by_key(key)? {
        Some(license) => license,
        None => return Ok(Decision::deny(Status::NotFound, MSG_INVALID_KEY)),
    };

    if license.is_expired(now) {
        return Ok(Decision::deny(Status::Forbidden, MSG_KEY_EXPIRED));
    }

    match license.machine_id {
        Some(ref bound) if bound == machine_id => Ok(Decision::allow(MSG_LOGIN_OK)),
        Some(_) => Ok(Decision::deny(Status::Forbidden, MSG_KEY_IN_USE)),
        None => {
            if store.bind_machine(key, machine_id)? {
                info!("Key activated for machine id {}", machine_id);
                return Ok(Decision::allow(MSG_ACTIVATED));
            }
            // Lost the conditional write to a concurrent activation; re-read
            // to see who holds the binding now.
            match store.find_by_key(key)? {
                Some(ref l) if l.machine_id.as_deref() == Some(machine_id) => {
                    Ok(Decision::allow(MSG_LOGIN_OK))
                }
                Some(ref l) if l.machine_id.is_some() => {
                    Ok(Decision::deny(Status::Forbidden, MSG_KEY_IN_USE))
                }
                _ => {
                    // The conditional write reported no rows but the key is
                    // still unbound (or gone). A logic error, not an infra
                    // failure.
                    error!("Activation reached an unresolvable state for machine id {}",
                           machine_id);
                    Ok(Decision::deny(Status::Internal, MSG_INTERNAL))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::Error;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
                                        .and_hms_opt(0, 0, 0)
                                        .unwrap()
    }

    fn now() -> NaiveDateTime { date(2024, 6, 1) }

    #[derive(Default)]
    struct MemStore {
        records: Vec<License>,
        reads:   usize,
        binds:   usize,
    }

    impl MemStore {
        fn with(records: Vec<License>) -> MemStore {
            MemStore { records,
                       ..Default::default() }
        }

        fn record(&self, key: &str) -> &License {
            self.records
                .iter()
                .find(|l| l.key_value == key)
                .expect("no such key")
        }
    }

    impl LicenseStore for MemStore {
        fn find_by_machine_id(&mut self, machine_id: &str) -> Result<Option<License>> {
            self.reads += 1;
            Ok(self.records
                   .iter()
                   .find(|l| l.machine_id.as_deref() == Some(machine_id))
                   .cloned())
        }

        fn find_by_key(&mut self, key: &str) -> Result<Option<License>> {
            self.reads += 1;
            Ok(self.records.iter().find(|l| l.key_value == key).cloned())
        }

        fn bind_machine(&mut self, key: &str, machine_id: &str) -> Result<bool> {
            let bound = match self.records
                                  .iter_mut()
                                  .find(|l| l.key_value == key && l.machine_id.is_none())
            {
                Some(license) => {
                    license.machine_id = Some(machine_id.to_string());
                    true
                }
                None => false,
            };
            if bound {
                self.binds += 1;
            }
            Ok(bound)
        }
    }

    // A store that fails every call; decisions reached before store access
    // must never see these errors.
    struct BrokenStore;

    impl LicenseStore for BrokenStore {
        fn find_by_machine_id(&mut self, _: &str) -> Result<Option<License>> {
            Err(Error::Store("connection refused".to_string()))
        }

        fn find_by_key(&mut self, _: &str) -> Result<Option<License>> {
            Err(Error::Store("connection refused".to_string()))
        }

        fn bind_machine(&mut self, _: &str, _: &str) -> Result<bool> {
            Err(Error::Store("connection refused".to_string()))
        }
    }

    fn unbound(key: &str, expires_at: NaiveDateTime) -> License {
        License { key_value:  key.to_string(),
                  machine_id: None,
                  expires_at, }
    }

    fn bound(key: &str, machine_id: &str, expires_at: NaiveDateTime) -> License {
        License { key_value:  key.to_string(),
                  machine_id: Some(machine_id.to_string()),
                  expires_at, }
    }

    #[test]
    fn missing_machine_id_fails_fast_without_store_access() {
        let mut store = MemStore::with(vec![bound("K1", "M1", date(2099, 1, 1))]);
        let decision = authorize(&mut store, "", Some("K1"), now()).unwrap();

        assert!(!decision.authorized);
        assert_eq!(decision.status, Status::BadRequest);
        assert_eq!(decision.message, MSG_MACHINE_ID_REQUIRED);
        assert_eq!(store.reads, 0);
        assert_eq!(store.binds, 0);

        // Even a dead store is never reached.
        let decision = authorize(&mut BrokenStore, "", None, now()).unwrap();
        assert_eq!(decision.status, Status::BadRequest);
    }

    #[test]
    fn empty_key_is_auto_login() {
        assert_eq!(AuthMode::new("M1", Some("")),
                   Some(AuthMode::AutoLogin { machine_id: "M1" }));
        assert_eq!(AuthMode::new("M1", None),
                   Some(AuthMode::AutoLogin { machine_id: "M1" }));
        assert_eq!(AuthMode::new("M1", Some("K1")),
                   Some(AuthMode::Activate { machine_id: "M1",
                                             key:        "K1", }));
        assert_eq!(AuthMode::new("", Some("K1")), None);
    }

    #[test]
    fn auto_login_unregistered_machine_is_not_found() {
        let mut store = MemStore::with(vec![bound("K1", "M1", date(2099, 1, 1))]);
        let decision = authorize(&mut store, "M2", None, now()).unwrap();

        assert!(!decision.authorized);
        assert_eq!(decision.status, Status::NotFound);
        assert_eq!(decision.message, MSG_NOT_REGISTERED);
    }

    #[test]
    fn auto_login_expired_license_is_forbidden() {
        let mut store = MemStore::with(vec![bound("K1", "M1", date(2020, 1, 1))]);
        let decision = authorize(&mut store, "M1", None, now()).unwrap();

        assert!(!decision.authorized);
        assert_eq!(decision.status, Status::Forbidden);
        assert_eq!(decision.message, MSG_LICENSE_EXPIRED);
    }

    #[test]
    fn auto_login_valid_binding_succeeds() {
        let mut store = MemStore::with(vec![bound("K1", "M1", date(2099, 1, 1))]);
        let decision = authorize(&mut store, "M1", None, now()).unwrap();

        assert!(decision.authorized);
        assert_eq!(decision.status, Status::Ok);
        assert_eq!(decision.message, MSG_WELCOME_BACK);
    }

    #[test]
    fn activation_with_unknown_key_is_not_found() {
        let mut store = MemStore::with(vec![unbound("K1", date(2099, 1, 1))]);
        let decision = authorize(&mut store, "M1", Some("NOPE"), now()).unwrap();

        assert!(!decision.authorized);
        assert_eq!(decision.status, Status::NotFound);
        assert_eq!(decision.message, MSG_INVALID_KEY);
    }

    #[test]
    fn expired_key_is_rejected_regardless_of_binding() {
        // Unbound and expired
        let mut store = MemStore::with(vec![unbound("OLD1", date(2020, 1, 1))]);
        let decision = authorize(&mut store, "M1", Some("OLD1"), now()).unwrap();
        assert_eq!(decision.status, Status::Forbidden);
        assert_eq!(decision.message, MSG_KEY_EXPIRED);
        assert_eq!(store.binds, 0);

        // Bound to this machine and expired
        let mut store = MemStore::with(vec![bound("OLD1", "M1", date(2020, 1, 1))]);
        let decision = authorize(&mut store, "M1", Some("OLD1"), now()).unwrap();
        assert_eq!(decision.status, Status::Forbidden);
        assert_eq!(decision.message, MSG_KEY_EXPIRED);

        // Bound to another machine and expired
        let mut store = MemStore::with(vec![bound("OLD1", "M2", date(2020, 1, 1))]);
        let decision = authorize(&mut store, "M1", Some("OLD1"), now()).unwrap();
        assert_eq!(decision.status, Status::Forbidden);
        assert_eq!(decision.message, MSG_KEY_EXPIRED);
    }

    #[test]
    fn activation_is_idempotent_for_the_bound_machine() {
        let mut store = MemStore::with(vec![bound("K1", "M1", date(2099, 1, 1))]);

        for _ in 0..2 {
            let decision = authorize(&mut store, "M1", Some("K1"), now()).unwrap();
            assert!(decision.authorized);
            assert_eq!(decision.status, Status::Ok);
            assert_eq!(decision.message, MSG_LOGIN_OK);
        }
        assert_eq!(store.binds, 0);
    }

    #[test]
    fn activation_conflict_does_not_mutate_the_store() {
        let mut store = MemStore::with(vec![bound("K1", "M1", date(2099, 1, 1))]);
        let decision = authorize(&mut store, "M2", Some("K1"), now()).unwrap();

        assert!(!decision.authorized);
        assert_eq!(decision.status, Status::Forbidden);
        assert_eq!(decision.message, MSG_KEY_IN_USE);
        assert_eq!(store.binds, 0);
        assert_eq!(store.record("K1").machine_id.as_deref(), Some("M1"));
    }

    #[test]
    fn first_activation_binds_exactly_once() {
        let mut store = MemStore::with(vec![unbound("ABC123", date(2099, 1, 1))]);

        let decision = authorize(&mut store, "M1", Some("ABC123"), now()).unwrap();
        assert!(decision.authorized);
        assert_eq!(decision.status, Status::Ok);
        assert_eq!(decision.message, MSG_ACTIVATED);
        assert_eq!(store.binds, 1);
        assert_eq!(store.record("ABC123").machine_id.as_deref(), Some("M1"));

        // Another machine can no longer take the key
        let decision = authorize(&mut store, "M2", Some("ABC123"), now()).unwrap();
        assert!(!decision.authorized);
        assert_eq!(decision.status, Status::Forbidden);
        assert_eq!(decision.message, MSG_KEY_IN_USE);

        // The bound machine now auto-logs-in
        let decision = authorize(&mut store, "M1", None, now()).unwrap();
        assert!(decision.authorized);
        assert_eq!(decision.status, Status::Ok);
        assert_eq!(decision.message, MSG_WELCOME_BACK);

        // Re-activation is an idempotent login, not a second write
        let decision = authorize(&mut store, "M1", Some("ABC123"), now()).unwrap();
        assert_eq!(decision.message, MSG_LOGIN_OK);
        assert_eq!(store.binds, 1);
    }

    // Store whose first read sees the key unbound, but where the binding is
    // taken before the conditional write lands, as in two concurrent
    // activations.
    struct RacingStore {
        inner: MemStore,
        winner: &'static str,
        raced: bool,
    }

    impl LicenseStore for RacingStore {
        fn find_by_machine_id(&mut self, machine_id: &str) -> Result<Option<License>> {
            self.inner.find_by_machine_id(machine_id)
        }

        fn find_by_key(&mut self, key: &str) -> Result<Option<License>> {
            self.inner.find_by_key(key)
        }

        fn bind_machine(&mut self, key: &str, machine_id: &str) -> Result<bool> {
            if !self.raced {
                self.raced = true;
                self.inner.bind_machine(key, self.winner)?;
            }
            self.inner.bind_machine(key, machine_id)
        }
    }

    #[test]
    fn lost_activation_race_to_another_machine_is_a_conflict() {
        let mut store = RacingStore { inner:  MemStore::with(vec![unbound("K1",
                                                                          date(2099, 1, 1))]),
                                      winner: "M2",
                                      raced:  false, };

        let decision = authorize(&mut store, "M1", Some("K1"), now()).unwrap();
        assert!(!decision.authorized);
        assert_eq!(decision.status, Status::Forbidden);
        assert_eq!(decision.message, MSG_KEY_IN_USE);
        assert_eq!(store.inner.record("K1").machine_id.as_deref(), Some("M2"));
    }

    #[test]
    fn lost_activation_race_to_the_same_machine_is_a_login() {
        let mut store = RacingStore { inner:  MemStore::with(vec![unbound("K1",
                                                                          date(2099, 1, 1))]),
                                      winner: "M1",
                                      raced:  false, };

        let decision = authorize(&mut store, "M1", Some("K1"), now()).unwrap();
        assert!(decision.authorized);
        assert_eq!(decision.status, Status::Ok);
        assert_eq!(decision.message, MSG_LOGIN_OK);
    }

    // Store where the conditional write reports no rows yet the key remains
    // unbound; the decision logic treats this as an internal logic error.
    struct StuckStore {
        inner: MemStore,
    }

    impl LicenseStore for StuckStore {
        fn find_by_machine_id(&mut self, machine_id: &str) -> Result<Option<License>> {
            self.inner.find_by_machine_id(machine_id)
        }

        fn find_by_key(&mut self, key: &str) -> Result<Option<License>> {
            self.inner.find_by_key(key)
        }

        fn bind_machine(&mut self, _: &str, _: &str) -> Result<bool> { Ok(false) }
    }

    #[test]
    fn unresolvable_activation_state_is_an_internal_error() {
        let mut store = StuckStore { inner: MemStore::with(vec![unbound("K1",
                                                                        date(2099, 1, 1))]), };

        let decision = authorize(&mut store, "M1", Some("K1"), now()).unwrap();
        assert!(!decision.authorized);
        assert_eq!(decision.status, Status::Internal);
        assert_eq!(decision.message, MSG_INTERNAL);
    }

    #[test]
    fn store_failures_propagate() {
        assert!(authorize(&mut BrokenStore, "M1", None, now()).is_err());
        assert!(authorize(&mut BrokenStore, "M1", Some("K1"), now()).is_err());
    }

    #[test]
    fn status_codes_match_http_mapping() {
        assert_eq!(Status::Ok.code(), 200);
        assert_eq!(Status::BadRequest.code(), 400);
        assert_eq!(Status::Forbidden.code(), 403);
        assert_eq!(Status::NotFound.code(), 404);
        assert_eq!(Status::Internal.code(), 500);
    }
}
