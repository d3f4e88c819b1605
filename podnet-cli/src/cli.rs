//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::net::{IpAddr, Ipv6Addr};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "podnet")]
#[command(about = "Pod network namespace tools and single-client DHCPv6 server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve one address to one VM over DHCPv6
    Serve {
        /// Interface facing the VM
        #[arg(short, long)]
        interface: String,

        /// VM network configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to lease, overrides the configuration file
        #[arg(long)]
        client_ip: Option<Ipv6Addr>,

        /// Extra DNS server to advertise
        #[arg(long)]
        dns: Vec<IpAddr>,

        /// Network namespace owning the interface
        #[arg(long)]
        netns: Option<PathBuf>,

        /// Restarts allowed after the serve loop fails
        #[arg(long, default_value = "5")]
        max_restarts: u32,
    },

    /// Check whether a path is a namespace
    Validate {
        /// Path to inspect (e.g. /proc/1/ns/net, /var/run/netns/pod)
        path: PathBuf,
    },

    /// Show namespace information
    Namespaces {
        /// Process ID (default: current process)
        #[arg(short, long)]
        pid: Option<i32>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run a command inside a network namespace
    Exec {
        /// Network namespace to enter
        #[arg(long)]
        netns: PathBuf,

        /// Command to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Check system requirements
    Health,
}
