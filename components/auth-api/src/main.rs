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

#[macro_use]
extern crate log;

use std::{fmt,
          process,
          str::FromStr};

use clap::{Arg,
           ArgMatches,
           Command};

use machine_auth_api as auth_api;

use crate::auth_api::{config::Config,
                      server};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const CFG_DEFAULT_PATH: &str = "/etc/machine-auth/config.toml";

#[actix_rt::main]
async fn main() {
    env_logger::init();
    let matches = app().get_matches();
    debug!("CLI matches: {:?}", matches);
    match server::run(config_from_args(&matches)).await {
        Ok(_) => process::exit(0),
        Err(e) => exit_with(e, 1),
    }
}

fn app() -> Command {
    Command::new("machine-auth-api")
        .version(VERSION)
        .about("Machine authentication API")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("start")
                .about("Run the machine-auth-api server")
                .arg(Arg::new("config").short('c').long("config").value_name("FILE").help(
                    "Filepath to configuration file. [default: /etc/machine-auth/config.toml]",
                ))
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .help("Listen port. [default: 9636]"),
                ),
        )
}

fn config_from_args(matches: &ArgMatches) -> Config {
    let (_, args) = matches.subcommand().unwrap();
    let mut config = match args.get_one::<String>("config") {
        Some(cfg_path) => Config::from_file(cfg_path).unwrap(),
        None => Config::from_file(CFG_DEFAULT_PATH).unwrap_or_default(),
    };

    if let Some(port) = args.get_one::<String>("port") {
        u16::from_str(port).map(|p| config.http.port = p)
                           .expect("Specified port must be a valid u16");
    }

    config
}

fn exit_with<T>(err: T, code: i32)
    where T: fmt::Display
{
    println!("{}", err);
    process::exit(code)
}
