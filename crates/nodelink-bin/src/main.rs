// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! NODELINK command line entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    nodelink_bin::run()
}
