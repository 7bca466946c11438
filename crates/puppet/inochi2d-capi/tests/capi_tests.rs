use std::ffi::{c_void, CStr, CString};
use std::mem::size_of;
use std::ptr;

use inochi2d::*;
use inochi2d_core::{BlendMode, DrawState, NO_ALLOC};
use inochi2d_test_fixtures::puppets;

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn load(name: &str) -> *mut PuppetHandle {
    let bytes = puppets::inp_bytes(name).expect("fixture bytes");
    let p = unsafe { in_puppet_load_from_memory(bytes.as_ptr(), bytes.len() as u32) };
    assert!(!p.is_null(), "load failed: {}", last_error());
    p
}

fn last_error() -> String {
    let msg = in_get_last_error();
    if msg.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

unsafe fn c_str(p: *const std::ffi::c_char) -> String {
    CStr::from_ptr(p).to_string_lossy().into_owned()
}

unsafe fn parameters(p: *mut PuppetHandle) -> Vec<*mut ParameterHandle> {
    let mut count = 0;
    let arr = in_puppet_get_parameters(p, &mut count);
    std::slice::from_raw_parts(arr, count as usize).to_vec()
}

unsafe fn textures(p: *mut PuppetHandle) -> Vec<*mut TextureHandle> {
    let cache = in_puppet_get_texture_cache(p);
    let mut count = 0;
    let arr = in_texture_cache_get_textures(cache, &mut count);
    if count == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(arr, count as usize).to_vec()
}

#[test]
fn load_from_memory_and_read_properties() {
    let p = load("basic");
    unsafe {
        assert_eq!(c_str(in_puppet_get_name(p)), "Basic Puppet");
        assert!(in_puppet_get_physics_enabled(p));
        approx(in_puppet_get_pixels_per_meter(p), 500.0, 1e-6);
        approx(in_puppet_get_gravity(p), 9.8, 1e-6);

        in_puppet_set_physics_enabled(p, false);
        assert!(!in_puppet_get_physics_enabled(p));
        in_puppet_set_pixels_per_meter(p, 0.0);
        approx(in_puppet_get_pixels_per_meter(p), 500.0, 1e-6);
        in_puppet_set_gravity(p, 1.5);
        approx(in_puppet_get_gravity(p), 1.5, 1e-6);

        in_puppet_free(p);
    }
}

#[test]
fn load_from_file() {
    let path = puppets::inp_path("layered").unwrap();
    let c_path = CString::new(path.to_str().unwrap()).unwrap();
    unsafe {
        let p = in_puppet_load(c_path.as_ptr());
        assert!(!p.is_null(), "{}", last_error());
        assert_eq!(c_str(in_puppet_get_name(p)), "Layered Puppet");
        in_puppet_free(p);
    }
}

#[test]
fn failed_loads_return_null_and_set_last_error() {
    unsafe {
        assert!(in_puppet_load_from_memory(ptr::null(), 0).is_null());
        assert!(last_error().contains("empty"), "{}", last_error());

        let junk = b"definitely not a puppet";
        assert!(in_puppet_load_from_memory(junk.as_ptr(), junk.len() as u32).is_null());
        assert!(last_error().contains("bad magic"), "{}", last_error());

        assert!(in_puppet_load_from_memory(ptr::null(), 12).is_null());
        assert!(last_error().contains("data is null"), "{}", last_error());

        assert!(in_puppet_load(ptr::null()).is_null());
        assert!(last_error().contains("file is null"));

        let missing = CString::new("/no/such/puppet.inp").unwrap();
        assert!(in_puppet_load(missing.as_ptr()).is_null());
        assert!(last_error().starts_with("in_puppet_load"));
    }
}

#[test]
fn last_error_survives_successful_calls() {
    unsafe {
        assert!(in_puppet_load_from_memory(ptr::null(), 0).is_null());
        let before = last_error();
        let p = load("basic");
        in_puppet_update(p, 0.016);
        assert_eq!(last_error(), before);
        in_puppet_free(p);
    }
}

#[test]
fn retain_and_release_count_references() {
    let p = load("basic");
    unsafe {
        let obj = p.cast::<c_void>();
        assert_eq!(in_retain(obj), obj);
        assert_eq!(in_retain(obj), obj);
        assert_eq!(in_release(obj), obj);
        assert_eq!(in_release(obj), obj);
        assert!(in_release(obj).is_null());

        assert!(in_retain(ptr::null_mut()).is_null());
        assert!(in_release(ptr::null_mut()).is_null());
    }
}

#[test]
fn puppet_free_respects_extra_references() {
    let p = load("basic");
    unsafe {
        in_retain(p.cast());
        in_puppet_free(p);
        assert_eq!(c_str(in_puppet_get_name(p)), "Basic Puppet");
        assert!(in_release(p.cast()).is_null());
    }
}

#[test]
fn retained_sub_objects_outlive_their_puppet() {
    let p = load("basic");
    unsafe {
        let param = parameters(p)[0];
        let drawlist = in_puppet_get_drawlist(p);
        in_retain(param.cast());
        in_retain(drawlist.cast());
        in_puppet_free(p);

        assert_eq!(c_str(in_parameter_get_name(param)), "Body X");
        in_parameter_set_value(param, in_vec2_t { x: 0.5, y: 0.0 });
        approx(in_parameter_get_value(param).x, 0.5, 1e-6);
        assert!(!in_drawlist_get_use_base_vertex(drawlist));

        assert!(in_release(param.cast()).is_null());
        assert!(in_release(drawlist.cast()).is_null());
    }
}

#[test]
fn parameters_clamp_and_normalize() {
    let p = load("basic");
    unsafe {
        let params = parameters(p);
        assert_eq!(params.len(), 3);
        let names: Vec<String> = params
            .iter()
            .map(|h| c_str(in_parameter_get_name(*h)))
            .collect();
        assert_eq!(names, ["Body X", "Body Squash", "Inactive"]);

        let body_x = params[0];
        assert!(in_parameter_get_active(body_x));
        assert!(!in_parameter_get_active(params[2]));
        assert_eq!(in_parameter_get_dimensions(body_x), 1);
        assert_eq!(in_parameter_get_dimensions(params[1]), 2);
        assert_eq!(
            in_parameter_get_min_value(body_x),
            in_vec2_t { x: -1.0, y: 0.0 }
        );
        assert_eq!(
            in_parameter_get_max_value(body_x),
            in_vec2_t { x: 1.0, y: 0.0 }
        );

        in_parameter_set_value(body_x, in_vec2_t { x: 0.25, y: 0.0 });
        assert_eq!(in_parameter_get_value(body_x), in_vec2_t { x: 0.25, y: 0.0 });
        approx(in_parameter_get_normalized_value(body_x).x, 0.625, 1e-6);

        in_parameter_set_value(body_x, in_vec2_t { x: 9.0, y: 9.0 });
        assert_eq!(in_parameter_get_value(body_x), in_vec2_t { x: 1.0, y: 0.0 });

        let squash = params[1];
        in_parameter_set_normalized_value(squash, in_vec2_t { x: 0.5, y: 2.0 });
        assert_eq!(in_parameter_get_value(squash), in_vec2_t { x: 0.5, y: 1.0 });

        in_puppet_free(p);
    }
}

#[test]
fn parameter_changes_show_up_in_the_next_draw() {
    let p = load("basic");
    unsafe {
        let drawlist = in_puppet_get_drawlist(p);
        let mut bytes = 0;

        in_puppet_draw(p, 0.0);
        let v = in_drawlist_get_vertex_data(drawlist, &mut bytes);
        approx((*v).vtx.x, 90.0, 1e-4);

        in_parameter_set_value(parameters(p)[0], in_vec2_t { x: 1.0, y: 0.0 });
        in_puppet_draw(p, 0.0);
        let v = in_drawlist_get_vertex_data(drawlist, &mut bytes);
        approx((*v).vtx.x, 110.0, 1e-4);

        in_puppet_free(p);
    }
}

#[test]
fn texture_accessors_and_operations() {
    let p = load("basic");
    unsafe {
        let cache = in_puppet_get_texture_cache(p);
        assert_eq!(in_texture_cache_get_size(cache), 1);
        let tex = in_texture_cache_get_texture(cache, 0);
        assert!(!tex.is_null());
        assert!(in_texture_cache_get_texture(cache, 1).is_null());
        assert_eq!(textures(p), vec![tex]);

        assert_eq!(in_texture_get_width(tex), 4);
        assert_eq!(in_texture_get_height(tex), 2);
        assert_eq!(in_texture_get_channels(tex), 4);

        let pixels = in_texture_get_pixels(tex).cast::<u8>();
        assert_eq!(std::slice::from_raw_parts(pixels, 4), &[200, 100, 50, 128]);

        in_texture_premultiply(tex);
        let pixels = in_texture_get_pixels(tex).cast::<u8>();
        assert_eq!(std::slice::from_raw_parts(pixels, 4), &[100, 50, 25, 128]);
        in_texture_unpremultiply(tex);
        let pixels = in_texture_get_pixels(tex).cast::<u8>();
        let px = std::slice::from_raw_parts(pixels, 4);
        for (got, want) in px.iter().zip([200u8, 100, 50, 128]) {
            assert!((*got as i32 - want as i32).abs() <= 1);
        }

        in_texture_flip_vertically(tex);
        in_texture_flip_vertically(tex);
        in_texture_pad(tex, 1);
        assert_eq!(in_texture_get_width(tex), 6);
        assert_eq!(in_texture_get_height(tex), 4);

        let res = tex.cast::<ResourceHandle>();
        assert_eq!(in_resource_get_length(res), 6 * 4 * 4);
        assert!(in_resource_get_id(res).is_null());
        in_resource_set_id(res, 42usize as *mut c_void);
        assert_eq!(in_resource_get_id(res) as usize, 42);
        assert_eq!(in_texture_from_resource(res), tex);

        in_puppet_free(p);
    }
}

#[test]
fn handles_of_the_wrong_kind_are_rejected() {
    let p = load("basic");
    unsafe {
        let as_resource = p.cast::<ResourceHandle>();
        assert!(in_texture_from_resource(as_resource).is_null());
        assert!(last_error().contains("expected a texture handle"), "{}", last_error());
        assert_eq!(in_resource_get_length(as_resource), 0);

        let param = parameters(p)[0];
        assert!(in_puppet_get_name(param.cast()).is_null());
        assert!(last_error().contains("got a parameter handle"), "{}", last_error());

        assert_eq!(in_texture_get_width(ptr::null_mut()), 0);
        assert!(last_error().contains("texture is null"));

        in_puppet_free(p);
    }
}

#[test]
fn drawlist_arrays_match_their_counts() {
    let p = load("layered");
    unsafe {
        let drawlist = in_puppet_get_drawlist(p);
        let mut count = 0u32;
        assert!(in_drawlist_get_commands(drawlist, &mut count).is_null());
        assert_eq!(count, 0);

        in_puppet_draw(p, 0.0);

        let cmds = in_drawlist_get_commands(drawlist, &mut count);
        assert_eq!(count, 9);
        let cmds = std::slice::from_raw_parts(cmds, count as usize);
        assert_eq!(cmds[2].state, DrawState::DefineMask);
        assert_eq!(cmds[8].state, DrawState::CompositeBlit);
        assert_eq!(cmds[8].blend_mode, BlendMode::Multiply);
        assert_eq!(cmds[8].alloc_id, NO_ALLOC);
        assert_eq!(cmds[8].kind, 3);

        let tex = textures(p);
        assert_eq!(cmds[3].sources[0], tex[1]);
        assert!(cmds[3].sources[1].is_null());
        assert_eq!(cmds[3].sources[2], tex[0]);

        let mut vbytes = 0u32;
        let verts = in_drawlist_get_vertex_data(drawlist, &mut vbytes);
        assert_eq!(vbytes as usize, 15 * size_of::<in_vtxdata_t>());
        let mut ibytes = 0u32;
        let indices = in_drawlist_get_index_data(drawlist, &mut ibytes).cast::<u32>();
        assert_eq!(ibytes, 15 * 4);
        let mut acount = 0u32;
        let allocs = in_drawlist_get_allocations(drawlist, &mut acount);
        assert_eq!(acount, 5);

        let allocs = std::slice::from_raw_parts(allocs, acount as usize);
        let indices = std::slice::from_raw_parts(indices, (ibytes / 4) as usize);
        for alloc in allocs {
            let start = alloc.idx_offset as usize;
            for &i in &indices[start..start + alloc.idx_count as usize] {
                assert!(i >= alloc.vtx_offset && i < alloc.vtx_offset + alloc.vtx_count);
            }
        }

        // stable until the next mutating call
        assert_eq!(in_drawlist_get_vertex_data(drawlist, &mut vbytes), verts);
        in_puppet_update(p, 0.016);
        assert_eq!(in_drawlist_get_vertex_data(drawlist, &mut vbytes), verts);

        in_puppet_free(p);
    }
}

#[test]
fn base_vertex_mode_keeps_indices_local() {
    let p = load("layered");
    unsafe {
        let drawlist = in_puppet_get_drawlist(p);
        in_drawlist_set_use_base_vertex(drawlist, true);
        assert!(in_drawlist_get_use_base_vertex(drawlist));
        in_puppet_draw(p, 0.0);

        let mut ibytes = 0u32;
        let indices = in_drawlist_get_index_data(drawlist, &mut ibytes).cast::<u32>();
        let indices = std::slice::from_raw_parts(indices, (ibytes / 4) as usize);
        assert!(indices.iter().all(|i| *i < 3));
        in_puppet_free(p);
    }
}

#[test]
fn prune_keeps_surviving_texture_handles() {
    let p = load("unused-texture");
    unsafe {
        let cache = in_puppet_get_texture_cache(p);
        let before = textures(p);
        assert_eq!(before.len(), 3);

        in_texture_cache_prune(cache);
        assert_eq!(in_texture_cache_get_size(cache), 2);
        assert_eq!(textures(p), vec![before[0], before[2]]);

        in_puppet_draw(p, 0.0);
        let drawlist = in_puppet_get_drawlist(p);
        let mut count = 0u32;
        let cmds = in_drawlist_get_commands(drawlist, &mut count);
        let cmds = std::slice::from_raw_parts(cmds, count as usize);
        assert_eq!(cmds[1].sources[0], before[2]);

        in_puppet_free(p);
    }
}

#[test]
fn physics_runs_through_update() {
    let p = load("physics");
    unsafe {
        let params = parameters(p);
        let swing = params[0];
        let head = params[1];
        in_puppet_update(p, 1.0 / 60.0);
        in_parameter_set_value(head, in_vec2_t { x: 1.0, y: 0.0 });
        in_puppet_update(p, 1.0 / 60.0);
        assert!(in_parameter_get_value(swing).x < -0.3);

        in_puppet_reset_drivers(p);
        assert_eq!(in_parameter_get_value(swing), in_vec2_t::default());
        in_puppet_free(p);
    }
}

#[test]
fn prune_updates_commands_of_the_current_frame() {
    let p = load("unused-texture");
    unsafe {
        let cache = in_puppet_get_texture_cache(p);
        let drawlist = in_puppet_get_drawlist(p);
        let before = textures(p);
        in_puppet_draw(p, 0.0);

        let mut count = 0u32;
        let first = in_drawlist_get_commands(drawlist, &mut count);
        assert_eq!(std::slice::from_raw_parts(first, count as usize)[1].sources[0], before[2]);

        in_texture_cache_prune(cache);
        let cmds = in_drawlist_get_commands(drawlist, &mut count);
        let cmds = std::slice::from_raw_parts(cmds, count as usize);
        assert_eq!(cmds[0].sources[0], before[0]);
        assert_eq!(cmds[1].sources[0], before[2]);

        in_puppet_free(p);
    }
}

#[test]
fn commands_are_converted_once_per_frame() {
    let p = load("layered");
    unsafe {
        let drawlist = in_puppet_get_drawlist(p);
        in_puppet_draw(p, 0.0);
        let mut count = 0u32;
        let first = in_drawlist_get_commands(drawlist, &mut count);
        let snapshot: Vec<u32> = std::slice::from_raw_parts(first, count as usize)
            .iter()
            .map(|c| c.alloc_id)
            .collect();

        let again = in_drawlist_get_commands(drawlist, &mut count);
        assert_eq!(again, first);
        let ids: Vec<u32> = std::slice::from_raw_parts(again, count as usize)
            .iter()
            .map(|c| c.alloc_id)
            .collect();
        assert_eq!(ids, snapshot);

        in_puppet_free(p);
    }
}

#[test]
fn oversized_pad_sets_last_error_and_keeps_the_texture() {
    let p = load("basic");
    unsafe {
        let tex = textures(p)[0];
        in_texture_pad(tex, u32::MAX);
        assert!(last_error().starts_with("in_texture_pad"), "{}", last_error());
        assert!(last_error().contains("invalid texture"), "{}", last_error());
        assert_eq!(in_texture_get_width(tex), 4);
        assert_eq!(in_texture_get_height(tex), 2);
        in_puppet_free(p);
    }
}
