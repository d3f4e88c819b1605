//! Validate command implementation

use anyhow::{Context, Result};
use podnet_namespace::{namespace_id, validator, NamespaceKind};
use std::path::Path;

pub fn execute(path: &Path) -> Result<()> {
    print!("Checking {}... ", path.display());

    match validator::validate(path) {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            println!("❌ NOT FOUND");
            return Err(e.into());
        }
        Err(e) if e.is_not_namespace() => {
            println!("❌ NOT A NAMESPACE");
            return Err(e.into());
        }
        Err(e) => {
            println!("❌ ERROR");
            return Err(e).context("Could not inspect path");
        }
    }

    let id = namespace_id(path).context("Could not read namespace identity")?;

    // procfs entries such as /proc/<pid>/ns/mnt pass validation but are not served
    match NamespaceKind::from_path(path) {
        Ok(kind) => println!("✅ {kind} namespace {id}"),
        Err(_) => println!("✅ namespace {id}"),
    }

    Ok(())
}
