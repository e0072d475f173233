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

use actix_web::{http::StatusCode,
                web::{self,
                      Data,
                      Path,
                      ServiceConfig},
                HttpResponse};

use chrono::{NaiveDateTime,
             Utc};

use crate::db::models::license_keys::LicenseKey;

use crate::server::{error::{Error,
                            Result},
                    AppState};

#[derive(Clone, Debug, Serialize)]
pub struct MachineStatus {
    pub machine_id: String,
    pub expires_at: NaiveDateTime,
    pub is_expired: bool,
    pub status:     &'static str,
}

pub struct Machines {}

impl Machines {
    // Route registration
    //
    pub fn register(cfg: &mut ServiceConfig) {
        cfg.route("/machines/{machine_id}/status",
                  web::get().to(get_machine_status));
    }
}

// Route handlers - these functions can return any Responder trait
//
#[allow(clippy::needless_pass_by_value)]
async fn get_machine_status(path: Path<String>, state: Data<AppState>) -> HttpResponse {
    let machine_id = path.into_inner();
    debug!("get_machine_status called, machine_id = {}", machine_id);

    match do_get_machine_status(&machine_id, &state) {
        Ok(Some(status)) => HttpResponse::Ok().json(status),
        Ok(None) => HttpResponse::new(StatusCode::NOT_FOUND),
        Err(err) => {
            error!("{}", err);
            err.into()
        }
    }
}

// Internal - these functions should return Result<..>
//
fn do_get_machine_status(machine_id: &str, state: &AppState) -> Result<Option<MachineStatus>> {
    let mut conn = state.db.get_conn().map_err(Error::DbError)?;

    let record = LicenseKey::get_by_machine_id(machine_id, &mut conn).map_err(Error::DieselError)?;

    Ok(record.map(|rec| {
        let is_expired = rec.expires_at < Utc::now().naive_utc();
        MachineStatus { machine_id: machine_id.to_string(),
                        expires_at: rec.expires_at,
                        is_expired,
                        status: if is_expired { "expired" } else { "active" } }
    }))
}
