//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `sprintboard_core` linkage.
//! - Open a database (file path argument or in-memory) and report schema state.
//! - Keep output deterministic for quick local sanity checks.

use std::process::ExitCode;

use sprintboard_core::db::migrations::{latest_version, schema_version};
use sprintboard_core::{open_db, open_db_in_memory, DbResult};

fn main() -> ExitCode {
    println!("sprintboard_core ping={}", sprintboard_core::ping());
    println!("sprintboard_core version={}", sprintboard_core::core_version());

    let target = std::env::args().nth(1);
    match check_schema(target.as_deref()) {
        Ok(version) => {
            println!(
                "sprintboard_core schema_version={} latest_version={}",
                version,
                latest_version()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("sprintboard_core db_open failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn check_schema(path: Option<&str>) -> DbResult<u32> {
    let conn = match path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    schema_version(&conn)
}
