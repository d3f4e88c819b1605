//! Namespaces command implementation

use anyhow::{Context, Result};
use podnet_core::ProcessId;
use podnet_namespace::NamespaceInfo;

pub fn execute(pid: Option<i32>, json: bool) -> Result<()> {
    let target_pid = pid.map_or_else(ProcessId::current, ProcessId::from_raw);

    let ns_info =
        NamespaceInfo::for_pid(target_pid).context("Failed to get namespace information")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ns_info)?);
        return Ok(());
    }

    println!("\n🔒 Namespace Information for PID {target_pid}");
    println!("{:-<60}", "");

    print!("{ns_info}");

    match ns_info.is_isolated() {
        Ok(true) => println!("\n✅ Process is in isolated namespaces"),
        Ok(false) => println!("\n⚠️  Process is in host namespaces"),
        Err(e) => println!("\n❌ Failed to check isolation: {e}"),
    }

    Ok(())
}
