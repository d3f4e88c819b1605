use anyhow::Result;
use podnet_core::ThreadId;
use podnet_namespace::{current_thread_path, validate, NamespaceKind};
use std::path::Path;

/// Execute health check command
pub fn execute() -> Result<()> {
    println!("\n🏥 podnet Health Check\n");
    println!("{:-<60}", "");

    check_namespace_support()?;
    check_thread_namespaces()?;
    check_permissions();
    check_ipv6()?;

    println!("{:-<60}", "");
    println!("\n✅ All systems operational!\n");

    Ok(())
}

fn check_namespace_support() -> Result<()> {
    print!("Checking namespace support... ");

    let ns_dir = Path::new("/proc/self/ns");
    if !ns_dir.exists() {
        println!("❌ NOT SUPPORTED");
        anyhow::bail!(
            "Kernel doesn't support namespaces\n\
             \n\
             Your kernel may be too old or compiled without namespace support."
        );
    }

    let missing: Vec<&str> = NamespaceKind::ALL
        .iter()
        .map(|kind| kind.proc_name())
        .filter(|name| validate(ns_dir.join(name)).is_err())
        .collect();

    if !missing.is_empty() {
        println!("❌ INCOMPLETE");
        println!("   Missing: {}", missing.join(", "));
        anyhow::bail!("Required namespace types not available");
    }

    println!("✅ OK (net, pid)");
    Ok(())
}

/// Per-thread paths are what the switcher restores from
fn check_thread_namespaces() -> Result<()> {
    print!("Checking per-thread namespace paths... ");

    let path = current_thread_path(NamespaceKind::Network);
    if let Err(e) = validate(&path) {
        println!("❌ UNAVAILABLE");
        anyhow::bail!("{} is not usable: {e}", path.display());
    }

    println!("✅ OK (tid {})", ThreadId::current());
    Ok(())
}

fn check_permissions() {
    print!("Checking permissions... ");

    if nix::unistd::geteuid().is_root() {
        println!("✅ OK (root)");
    } else {
        println!("⚠️  NOT ROOT");
        println!("   Joining namespaces and binding port 547 need CAP_SYS_ADMIN and CAP_NET_BIND_SERVICE");
    }
}

fn check_ipv6() -> Result<()> {
    print!("Checking IPv6 support... ");

    if !Path::new("/proc/net/if_inet6").exists() {
        println!("❌ DISABLED");
        anyhow::bail!(
            "IPv6 is not available in this namespace\n\
             \n\
             The DHCPv6 server needs an IPv6-enabled kernel."
        );
    }

    println!("✅ OK");
    Ok(())
}
