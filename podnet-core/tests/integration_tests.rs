use podnet_core::*;
use std::net::{IpAddr, Ipv6Addr};
use std::time::SystemTime;

#[test]
fn test_interface_name_validation() {
    // Valid names
    assert!(InterfaceName::new("eth0").is_ok());
    assert!(InterfaceName::new("veth0").is_ok());
    assert!(InterfaceName::new("tap-vm_01").is_ok());
    assert!(InterfaceName::new("a".repeat(15)).is_ok());

    // Invalid names
    assert!(InterfaceName::new("").is_err());
    assert!(InterfaceName::new("a".repeat(16)).is_err());
    assert!(InterfaceName::new("eth:0").is_err());
    assert!(InterfaceName::new("eth\t0").is_err());
    assert!(InterfaceName::new(".").is_err());
}

#[test]
fn test_interface_name_display() {
    let name = InterfaceName::new("veth0").unwrap();
    assert_eq!(format!("{name}"), "veth0");
    assert_eq!(name.as_str(), "veth0");

    let parsed: InterfaceName = "veth0".parse().unwrap();
    assert_eq!(parsed, name);
}

#[test]
fn test_mac_address_serialization() {
    let mac = MacAddress::new([0x02, 0x42, 0xac, 0x11, 0x00, 0x02]);

    let json = serde_json::to_string(&mac).unwrap();
    assert_eq!(json, "\"02:42:ac:11:00:02\"");

    let deserialized: MacAddress = serde_json::from_str(&json).unwrap();
    assert_eq!(mac, deserialized);
}

#[test]
fn test_vm_network_config_full_payload() {
    let json = r#"{
        "client_ip": "fd00::5",
        "dns": ["fd00::53", "10.0.0.53"],
        "routes": [
            {"destination": "::", "prefix_len": 0, "gateway": "fd00::1"}
        ],
        "search_domains": ["svc.cluster.local"],
        "mtu": 1450
    }"#;

    let config = VmNetworkConfig::from_json(json).unwrap();

    assert_eq!(config.client_ip, "fd00::5".parse::<Ipv6Addr>().unwrap());
    assert_eq!(config.dns.len(), 2);
    assert_eq!(config.dns_v6(), vec!["fd00::53".parse::<Ipv6Addr>().unwrap()]);
    assert_eq!(config.routes.len(), 1);
    assert_eq!(
        config.routes[0].gateway,
        Some("fd00::1".parse::<IpAddr>().unwrap())
    );
    assert_eq!(config.search_domains, vec!["svc.cluster.local".to_string()]);
    assert_eq!(config.mtu, 1450);
}

#[test]
fn test_vm_network_config_rejects_bad_client_ip() {
    assert!(VmNetworkConfig::from_json(r#"{"client_ip": "::1"}"#).is_err());
    assert!(VmNetworkConfig::from_json(r#"{"client_ip": "ff02::1"}"#).is_err());
    assert!(VmNetworkConfig::from_json(r#"{"client_ip": "10.0.0.5"}"#).is_err());
    assert!(VmNetworkConfig::from_json(r"{}").is_err());
}

#[test]
fn test_vm_network_config_roundtrip() {
    let config = VmNetworkConfig::new("fd00::5".parse().unwrap())
        .with_dns("fd00::53".parse::<Ipv6Addr>().unwrap())
        .with_custom_option(240, "extra");

    let json = serde_json::to_string(&config).unwrap();
    let parsed = VmNetworkConfig::from_json(&json).unwrap();

    assert_eq!(config, parsed);
}

#[test]
fn test_error_display() {
    let err = Error::InterfaceNotFound {
        name: "veth9".to_string(),
    };
    assert_eq!(err.to_string(), "Interface not found: veth9");

    let err = Error::protocol("truncated header");
    assert_eq!(err.to_string(), "DHCP protocol error: truncated header");

    let err = Error::ConnectionClosed;
    assert_eq!(err.to_string(), "Packet connection closed");
}

#[test]
fn test_error_from_serde() {
    let err: Error = serde_json::from_str::<VmNetworkConfig>("not json")
        .unwrap_err()
        .into();
    assert!(matches!(err, Error::Serialization(_)));
}

#[test]
fn test_dhcp_event_accessors() {
    let interface = InterfaceName::new("veth0").unwrap();
    let timestamp = SystemTime::now();

    let event = DhcpEvent::Restarting {
        interface: interface.clone(),
        attempt: 2,
        timestamp,
    };

    assert_eq!(event.interface(), &interface);
    assert_eq!(event.timestamp(), timestamp);
    assert!(!event.is_critical());
    assert_eq!(event.to_string(), "DHCPv6 on veth0 restarting (attempt 2)");
}
