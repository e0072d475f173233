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

//! Diesel-backed implementation of the core `LicenseStore` trait. One store
//! wraps one pooled connection for the duration of a request.

use diesel::pg::PgConnection;

use crate::auth_core::{error::{Error,
                               Result},
                       license::{License,
                                 LicenseStore}};

use crate::models::license_keys::LicenseKey;

pub struct DieselLicenseStore<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> DieselLicenseStore<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self { DieselLicenseStore { conn } }
}

impl LicenseStore for DieselLicenseStore<'_> {
    fn find_by_machine_id(&mut self, machine_id: &str) -> Result<Option<License>> {
        LicenseKey::get_by_machine_id(machine_id, self.conn).map(|rec| rec.map(License::from))
                                                            .map_err(store_err)
    }

    fn find_by_key(&mut self, key: &str) -> Result<Option<License>> {
        LicenseKey::get_by_key(key, self.conn).map(|rec| rec.map(License::from))
                                              .map_err(store_err)
    }

    fn bind_machine(&mut self, key: &str, machine_id: &str) -> Result<bool> {
        LicenseKey::bind_machine(key, machine_id, self.conn).map(|rows| rows > 0)
                                                            .map_err(store_err)
    }
}

impl From<LicenseKey> for License {
    fn from(rec: LicenseKey) -> License {
        License { key_value:  rec.key_value,
                  machine_id: rec.machine_id,
                  expires_at: rec.expires_at, }
    }
}

fn store_err(err: diesel::result::Error) -> Error { Error::Store(err.to_string()) }
