//! Serve command implementation

use anyhow::{Context, Result};
use podnet_core::{DhcpEvent, InterfaceName, VmNetworkConfig};
use podnet_dhcp::{DhcpServerConfig, SingleClientDhcpv6Server, Supervisor};
use std::net::{IpAddr, Ipv6Addr};
use std::path::PathBuf;
use tokio::sync::mpsc;

pub struct ServeArgs {
    pub interface: String,
    pub config: Option<PathBuf>,
    pub client_ip: Option<Ipv6Addr>,
    pub dns: Vec<IpAddr>,
    pub netns: Option<PathBuf>,
    pub max_restarts: u32,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let network = load_network(&args)?;
    let interface = InterfaceName::new(&args.interface).context("Invalid interface name")?;

    let mut config = DhcpServerConfig::new(interface).with_max_restarts(args.max_restarts);
    if let Some(ref netns) = args.netns {
        config = config.with_netns(netns);
    }

    print_configuration(&config, &network);

    let (tx, rx) = mpsc::channel(config.event_capacity);
    let server = SingleClientDhcpv6Server::new(config, network)
        .context("Invalid server configuration")?
        .with_events(tx);

    let handle = Supervisor::new(server)
        .start()
        .await
        .context("Failed to start DHCPv6 server")?;

    println!("\n✅ DHCPv6 server running (Ctrl-C to stop)\n");

    let printer = tokio::spawn(print_events(rx));

    let result = handle
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await;

    printer.await?;
    result.context("DHCPv6 server stopped")?;

    println!("\n✅ DHCPv6 server stopped");

    Ok(())
}

fn load_network(args: &ServeArgs) -> Result<VmNetworkConfig> {
    let mut network = match (&args.config, args.client_ip) {
        (Some(path), _) => VmNetworkConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        (None, Some(ip)) => VmNetworkConfig::new(ip),
        (None, None) => anyhow::bail!("Either --config or --client-ip is required"),
    };

    if let Some(ip) = args.client_ip {
        network.client_ip = ip;
    }
    for server in &args.dns {
        if !network.dns.contains(server) {
            network.dns.push(*server);
        }
    }

    Ok(network)
}

fn print_configuration(config: &DhcpServerConfig, network: &VmNetworkConfig) {
    println!("🌐 DHCPv6 on {}", config.interface);
    println!("   Client address: {}", network.client_ip);

    let dns = network.dns_v6();
    if !dns.is_empty() {
        let dns: Vec<String> = dns.iter().map(ToString::to_string).collect();
        println!("   DNS: {}", dns.join(", "));
    }

    match config.netns {
        Some(ref netns) => println!("   Namespace: {}", netns.display()),
        None => println!("   Namespace: current"),
    }
    println!("   Restart budget: {}", config.max_restarts);
}

async fn print_events(mut rx: mpsc::Receiver<DhcpEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            DhcpEvent::Restarting { .. } => println!("🔄 {event}"),
            DhcpEvent::Stopped { error: Some(_), .. } => println!("❌ {event}"),
            _ => {}
        }
    }
}
