use domain::{DeviceEndpoint, DeviceIdentity, EncodedRecord, EntityDescriptor, EntityKind};

#[test]
fn endpoint_formats_address() {
    let endpoint = DeviceEndpoint::new("porch.local", 6053, "secret");

    assert_eq!(endpoint.address(), "porch.local:6053");
    assert_eq!(endpoint.password, "secret");
}

#[test]
fn sensor_descriptor_builds() {
    let entity = EntityDescriptor::sensor(1, "temp", "C", "porch_temp");

    assert_eq!(entity.key, 1);
    assert_eq!(entity.kind, EntityKind::Sensor);
    assert_eq!(entity.unit_of_measurement, "C");
    assert!(entity.object_id.is_empty());
}

#[test]
fn identity_and_record_display() {
    let identity = DeviceIdentity::named("porch");
    assert_eq!(identity.name, "porch");
    assert!(identity.model.is_none());

    let record = EncodedRecord::new("temp  state=1.0");
    assert_eq!(record.to_string(), "temp  state=1.0");
    assert_eq!(record.into_string(), "temp  state=1.0");
}
