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

use std::{error,
          fmt,
          result};

#[derive(Debug)]
pub enum Error {
    ConnectionTimeout(r2d2::Error),
    DieselError(diesel::result::Error),
    Migration(Box<dyn error::Error + Send + Sync>),
}

pub type Result<T> = result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Error::ConnectionTimeout(ref e) => format!("Connection timeout, {}", e),
            Error::DieselError(ref e) => format!("{}", e),
            Error::Migration(ref e) => format!("Migration failure, {}", e),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Error { Error::ConnectionTimeout(err) }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Error { Error::DieselError(err) }
}
