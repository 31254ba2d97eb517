// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! `knita version`

use crate::exit_error::ExitError;

pub fn run() -> Result<(), ExitError> {
    println!("{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
