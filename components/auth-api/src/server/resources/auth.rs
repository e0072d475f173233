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
                      Json,
                      ServiceConfig},
                HttpResponse};

use chrono::Utc;

use crate::auth_core::license::{self,
                                Decision};
use crate::db::store::DieselLicenseStore;

use crate::server::{error::{Error,
                            Result},
                    AppState};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthRequest {
    /// A missing machineId deserializes to empty and is rejected before any
    /// store access.
    #[serde(rename = "machineId", default)]
    pub machine_id: String,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

pub struct Auth {}

impl Auth {
    // Route registration
    //
    pub fn register(cfg: &mut ServiceConfig) {
        cfg.route("/auth", web::post().to(authenticate));
    }
}

// Route handlers - these functions can return any Responder trait
//
#[allow(clippy::needless_pass_by_value)]
async fn authenticate(body: Json<AuthRequest>, state: Data<AppState>) -> HttpResponse {
    debug!("authenticate called, machine_id = {}", body.machine_id);

    match do_authenticate(&body, &state) {
        Ok(decision) => {
            let status = StatusCode::from_u16(decision.status.code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(AuthResponse { success: decision.authorized,
                                                            message: decision.message
                                                                             .to_string(), })
        }
        Err(err) => {
            // Infra failures stay opaque to the caller; the detail is logged
            // here only.
            error!("{}", err);
            HttpResponse::InternalServerError().json(AuthResponse {
                success: false,
                message: license::MSG_INTERNAL.to_string(),
            })
        }
    }
}

// Internal - these functions should return Result<..>
//
fn do_authenticate(req: &AuthRequest, state: &AppState) -> Result<Decision> {
    // Fail fast on a missing machine id; no connection is acquired.
    if req.machine_id.is_empty() {
        return Ok(Decision::machine_id_required());
    }

    let mut conn = state.db.get_conn().map_err(Error::DbError)?;
    let mut store = DieselLicenseStore::new(&mut conn);

    license::authorize(&mut store,
                       &req.machine_id,
                       req.key.as_deref(),
                       Utc::now().naive_utc()).map_err(Error::AuthCore)
}
