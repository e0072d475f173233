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

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations,
                        EmbeddedMigrations,
                        MigrationHarness};

use crate::error::{Error,
                   Result};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn run_pending(conn: &mut PgConnection) -> Result<()> {
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(Error::Migration)?;
    for migration in applied {
        info!("Applied migration {}", migration);
    }
    Ok(())
}
