use inochi2d_core::{puppet::Puppet, NodeId, Vec2};
use inochi2d_test_fixtures::puppets;

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn basic() -> Puppet {
    let bytes = puppets::inp_bytes("basic").expect("basic fixture");
    Puppet::from_bytes(&bytes).expect("basic puppet loads")
}

/// First drawn vertex of the only part, in puppet space.
fn first_vertex(puppet: &mut Puppet) -> Vec2 {
    puppet.draw(0.0);
    let v = puppet.drawlist().vertices()[0].vtx;
    Vec2::new(v.x, v.y)
}

#[test]
fn parameters_report_their_definition() {
    let puppet = basic();
    let params = puppet.parameters();
    let names: Vec<&str> = params.iter().map(|p| p.name()).collect();
    assert_eq!(names, ["Body X", "Body Squash", "Inactive"]);

    let body_x = &params[0];
    assert!(!body_x.is_vec2());
    assert_eq!(body_x.dimensions(), 1);
    assert_eq!(body_x.min(), Vec2::new(-1.0, 0.0));
    assert_eq!(body_x.max(), Vec2::new(1.0, 0.0));
    assert_eq!(body_x.value(), Vec2::ZERO);

    assert!(params[1].is_vec2());
    assert_eq!(params[1].dimensions(), 2);
    assert!(!params[2].active());
    assert_eq!(params[2].value(), Vec2::new(5.0, 0.0));
    assert_eq!(puppet.find_parameter("Body Squash"), Some(1));
    assert_eq!(puppet.find_parameter("nope"), None);
}

#[test]
fn set_value_clamps_to_range() {
    let mut puppet = basic();
    let p = puppet.parameter_mut(0).unwrap();
    p.set_value(Vec2::new(5.0, 3.0));
    // 1D parameters keep y at min.y
    assert_eq!(p.value(), Vec2::new(1.0, 0.0));
    p.set_value(Vec2::new(-5.0, 0.0));
    assert_eq!(p.value(), Vec2::new(-1.0, 0.0));
    p.set_value(Vec2::new(f32::NAN, 0.0));
    assert_eq!(p.value(), Vec2::new(-1.0, 0.0));

    let squash = puppet.parameter_mut(1).unwrap();
    squash.set_value(Vec2::new(0.25, 7.0));
    assert_eq!(squash.value(), Vec2::new(0.25, 1.0));
}

#[test]
fn normalized_value_maps_into_unit_square() {
    let mut puppet = basic();
    let p = puppet.parameter_mut(0).unwrap();
    approx(p.normalized_value().x, 0.5, 1e-6);
    p.set_value(Vec2::new(0.5, 0.0));
    approx(p.normalized_value().x, 0.75, 1e-6);
    // the degenerate y axis reports 0
    approx(p.normalized_value().y, 0.0, 1e-6);

    p.set_normalized_value(Vec2::new(0.0, 0.0));
    assert_eq!(p.value(), Vec2::new(-1.0, 0.0));
    p.reset();
    assert_eq!(p.value(), Vec2::ZERO);
}

#[test]
fn translation_binding_moves_the_part() {
    let mut puppet = basic();
    // Body sits at (100, 50); vertex 0 is (-10, -10) local
    let rest = first_vertex(&mut puppet);
    approx(rest.x, 90.0, 1e-4);
    approx(rest.y, 40.0, 1e-4);

    puppet.parameter_mut(0).unwrap().set_value(Vec2::new(1.0, 0.0));
    approx(first_vertex(&mut puppet).x, 110.0, 1e-4);

    puppet.parameter_mut(0).unwrap().set_value(Vec2::new(-0.5, 0.0));
    approx(first_vertex(&mut puppet).x, 80.0, 1e-4);
}

#[test]
fn deform_binding_interpolates_and_fills_unset_points() {
    let mut puppet = basic();
    let squash = puppet.find_parameter("Body Squash").unwrap();

    puppet
        .parameter_mut(squash)
        .unwrap()
        .set_value(Vec2::new(1.0, 0.0));
    puppet.draw(0.0);
    approx(puppet.drawlist().vertices()[0].vtx.x, 92.0, 1e-4);

    puppet
        .parameter_mut(squash)
        .unwrap()
        .set_value(Vec2::new(0.5, 0.0));
    puppet.draw(0.0);
    approx(puppet.drawlist().vertices()[0].vtx.x, 91.0, 1e-4);

    // (1, 1) is unset and is filled from (0, 1) along the x axis
    puppet
        .parameter_mut(squash)
        .unwrap()
        .set_value(Vec2::new(1.0, 1.0));
    puppet.draw(0.0);
    let verts = puppet.drawlist().vertices();
    approx(verts[0].vtx.x, 90.0, 1e-4);
    approx(verts[2].vtx.y, 64.0, 1e-4);
    approx(verts[3].vtx.y, 64.0, 1e-4);
}

#[test]
fn inactive_parameters_do_not_apply() {
    let mut puppet = basic();
    let rest = first_vertex(&mut puppet);
    puppet
        .parameter_mut(2)
        .unwrap()
        .set_value(Vec2::new(10.0, 0.0));
    approx(first_vertex(&mut puppet).y, rest.y, 1e-5);

    puppet.parameter_mut(2).unwrap().set_active(true);
    approx(first_vertex(&mut puppet).y, rest.y + 100.0, 1e-4);
}

#[test]
fn bound_node_is_tracked_by_id() {
    let puppet = basic();
    let binding = &puppet.parameters()[0].bindings[0];
    assert_eq!(binding.node, NodeId(2));
}
