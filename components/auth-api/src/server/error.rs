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
                HttpResponse,
                ResponseError};
use std::{error,
          fmt,
          io,
          result};

use crate::{auth_core,
            db};

#[derive(Debug)]
pub enum Error {
    AuthCore(auth_core::error::Error),
    BadRequest,
    DbError(db::error::Error),
    DieselError(diesel::result::Error),
    IO(io::Error),
    NotFound,
    System,
}

pub type Result<T> = result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Error::AuthCore(ref e) => format!("{}", e),
            Error::BadRequest => "Bad request".to_string(),
            Error::DbError(ref e) => format!("{}", e),
            Error::DieselError(ref e) => format!("{}", e),
            Error::IO(ref e) => format!("{}", e),
            Error::NotFound => "Entity not found".to_string(),
            Error::System => "Internal error".to_string(),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::AuthCore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest => StatusCode::BAD_REQUEST,
            Error::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::DieselError(ref e) => diesel_err_to_http(e),
            Error::IO(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::System => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse { HttpResponse::new(self.status_code()) }
}

impl From<Error> for HttpResponse {
    fn from(err: Error) -> HttpResponse { err.error_response() }
}

fn diesel_err_to_http(err: &diesel::result::Error) -> StatusCode {
    match err {
        diesel::result::Error::NotFound => StatusCode::NOT_FOUND,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// From handlers - these make application level error handling cleaner

impl From<auth_core::error::Error> for Error {
    fn from(err: auth_core::error::Error) -> Error { Error::AuthCore(err) }
}

impl From<db::error::Error> for Error {
    fn from(err: db::error::Error) -> Error { Error::DbError(err) }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Error { Error::DieselError(err) }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self { Error::IO(err) }
}
