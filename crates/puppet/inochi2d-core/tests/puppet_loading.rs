use inochi2d_core::{
    config::Config,
    error::PuppetError,
    format::{read_inp, write_inp},
    node::NodeKind,
    puppet::Puppet,
    NodeId,
};
use inochi2d_test_fixtures::{build_inp, puppets, solid_png};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

#[test]
fn every_fixture_loads() {
    for name in puppets::keys() {
        let bytes = puppets::inp_bytes(&name).expect("fixture bytes");
        Puppet::from_bytes(&bytes).unwrap_or_else(|e| panic!("{name}: {e}"));
    }
}

#[test]
fn basic_puppet_metadata_and_contents() {
    let bytes = puppets::inp_bytes("basic").unwrap();
    let puppet = Puppet::from_bytes(&bytes).unwrap();

    assert_eq!(puppet.name(), "Basic Puppet");
    assert_eq!(puppet.meta().version, "1.0-alpha");
    assert_eq!(puppet.meta().artist.as_deref(), Some("Fixture Artist"));
    assert_eq!(puppet.meta().thumbnail_id, None);
    assert_eq!(puppet.nodes().len(), 2);
    assert_eq!(puppet.parameters().len(), 3);
    assert!(puppet.extensions().is_empty());

    let body = puppet.nodes().find(NodeId(2)).expect("body node");
    assert_eq!(body.name, "Body");
    assert!(matches!(body.kind, NodeKind::Part(_)));
    let root = puppet.nodes().root().unwrap();
    assert_eq!(root.children, vec![1]);
}

#[test]
fn physics_block_overrides_config_defaults() {
    let bytes = puppets::inp_bytes("basic").unwrap();
    let puppet = Puppet::from_bytes(&bytes).unwrap();
    approx(puppet.pixels_per_meter(), 500.0, 1e-6);
    approx(puppet.gravity(), 9.8, 1e-6);

    let cfg = Config {
        physics_enabled: false,
        pixels_per_meter: 42.0,
        ..Config::default()
    };
    let puppet = Puppet::from_bytes_with_config(&bytes, &cfg).unwrap();
    assert!(!puppet.physics_enabled());
    // the file's own value still wins over the configured default
    approx(puppet.pixels_per_meter(), 500.0, 1e-6);

    let json = r#"{ "meta": { "name": "bare" }, "nodes": { "uuid": 1 } }"#;
    let puppet = Puppet::from_bytes_with_config(&build_inp(json, &[]), &cfg).unwrap();
    approx(puppet.pixels_per_meter(), 42.0, 1e-6);
}

#[test]
fn physics_setters_ignore_invalid_values() {
    let bytes = puppets::inp_bytes("basic").unwrap();
    let mut puppet = Puppet::from_bytes(&bytes).unwrap();
    puppet.set_pixels_per_meter(-1.0);
    puppet.set_pixels_per_meter(f32::NAN);
    approx(puppet.pixels_per_meter(), 500.0, 1e-6);
    puppet.set_pixels_per_meter(250.0);
    approx(puppet.pixels_per_meter(), 250.0, 1e-6);

    puppet.set_gravity(f32::INFINITY);
    approx(puppet.gravity(), 9.8, 1e-6);
    puppet.set_gravity(-3.0);
    approx(puppet.gravity(), -3.0, 1e-6);
}

#[test]
fn loads_from_disk() {
    let path = puppets::inp_path("layered").unwrap();
    let puppet = Puppet::load(&path).unwrap();
    assert_eq!(puppet.name(), "Layered Puppet");
    assert_eq!(puppet.texture_cache().len(), 2);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = Puppet::load("/definitely/not/here.inp").unwrap_err();
    assert!(matches!(err, PuppetError::Io(_)), "{err}");
}

#[test]
fn malformed_input_is_rejected() {
    assert!(matches!(Puppet::from_bytes(&[]), Err(PuppetError::Empty)));
    assert!(matches!(
        Puppet::from_bytes(b"PK\x03\x04 definitely a zip"),
        Err(PuppetError::BadMagic)
    ));

    let bytes = puppets::inp_bytes("basic").unwrap();
    let truncated = &bytes[..bytes.len() - 3];
    assert!(matches!(
        Puppet::from_bytes(truncated),
        Err(PuppetError::Truncated { .. })
    ));

    let bad_json = build_inp("{ not json", &[]);
    assert!(matches!(
        Puppet::from_bytes(&bad_json),
        Err(PuppetError::Json(_))
    ));
}

#[test]
fn undecodable_texture_is_rejected() {
    let json = puppets::json("basic").unwrap();
    let bytes = build_inp(&json, &[b"not a png".to_vec()]);
    assert!(matches!(
        Puppet::from_bytes(&bytes),
        Err(PuppetError::TextureDecode(_))
    ));
}

#[test]
fn mask_referencing_unknown_node_is_rejected() {
    let json = r#"{ "nodes": { "uuid": 1, "children": [
        { "uuid": 2, "type": "Part", "textures": [0],
          "mesh": { "verts": [0,0,1,0,0,1], "uvs": [0,0,1,0,0,1], "indices": [0,1,2] },
          "masks": [ { "source": 77, "mode": "Mask" } ] }
    ] } }"#;
    let png = solid_png(1, 1, [0, 0, 0, 255]).unwrap();
    let err = Puppet::from_bytes(&build_inp(json, &[png])).unwrap_err();
    assert!(matches!(err, PuppetError::UnknownNode(NodeId(77), _)), "{err}");
}

#[test]
fn extensions_survive_loading() {
    let mut file = read_inp(&puppets::inp_bytes("basic").unwrap()).unwrap();
    file.extensions
        .push(("com.example.tracking".into(), vec![1, 2, 3]));
    let bytes = write_inp(&file);
    let puppet = Puppet::from_bytes(&bytes).unwrap();
    assert_eq!(
        puppet.extensions(),
        &[("com.example.tracking".to_string(), vec![1, 2, 3])]
    );
}
