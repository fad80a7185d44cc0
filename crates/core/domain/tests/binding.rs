use domain::{Command, DeviceKind, Transport, TransportBinding};

#[test]
fn binding_address_matches_transport() {
    let binding = TransportBinding::Http {
        endpoint: "http://localhost:3001/devices/d1".to_string(),
    };
    assert_eq!(binding.transport(), Transport::Http);
    assert_eq!(binding.address(), "http://localhost:3001/devices/d1");

    let binding = TransportBinding::Topic {
        topic: "predio/torreA/d1".to_string(),
    };
    assert_eq!(binding.transport(), Transport::Topic);
    assert_eq!(binding.address(), "predio/torreA/d1");
}

#[test]
fn kind_and_transport_round_trip() {
    for kind in [DeviceKind::Tank, DeviceKind::Valve, DeviceKind::Sensor] {
        assert_eq!(DeviceKind::parse(kind.as_str()), Some(kind));
    }
    for transport in [Transport::Http, Transport::Socket, Transport::Topic] {
        assert_eq!(Transport::parse(transport.as_str()), Some(transport));
    }
    assert_eq!(DeviceKind::parse("pump"), None);
}

#[test]
fn command_parse_and_power_value() {
    assert_eq!(Command::parse("power_on"), Some(Command::PowerOn));
    assert_eq!(Command::parse("power_off"), Some(Command::PowerOff));
    assert_eq!(Command::parse("reboot"), None);
    assert!(Command::PowerOn.power_value());
    assert!(!Command::PowerOff.power_value());
}
