//! Simulated multi-frame run of the draw planner and frame ring.
//!
//! Drives the CPU side of the frame loop for a scene with one plain
//! textured cube and one instanced field of 8192 cubes, without a device:
//! each simulated frame advances the ring, moves the camera along a
//! monotonically increasing timeline, and rebuilds the draw plan exactly
//! as `Renderer::render_frame` does.

use deferred_renderer::plan::INDIRECT_COMMAND_STRIDE;
use deferred_renderer::{
    DrawCaps, DrawKind, DrawRef, FramePlan, FrameRing, MAX_FRAMES_IN_FLIGHT, PassLists,
    PlannedDraw, ViewUniform,
};
use deferred_scene::Camera;
use glam::Vec3;

const CUBE_FIELD_INSTANCES: u32 = 8192;
const SIMULATED_FRAMES: usize = 10;

/// One plain cube plus an indirect-instanced field of 8192 cubes.
fn cube_field_scene() -> PassLists {
    let mut lists = PassLists::default();
    lists.plain.push(DrawRef::new(0, DrawKind::Plain));
    lists.indirect_instanced.push(DrawRef::new(
        1,
        DrawKind::IndirectInstanced {
            commands: CUBE_FIELD_INSTANCES,
        },
    ));
    lists
}

/// Count of geometry draw calls recorded for the instanced field.
fn field_draw_calls(plan: &FramePlan) -> usize {
    plan.draw_calls_for(1)
}

#[test]
fn test_ten_frames_present_with_monotonic_camera_time() {
    let lists = cube_field_scene();
    let caps = DrawCaps {
        multi_draw_indirect: true,
    };

    let mut ring = FrameRing::new();
    let mut camera = Camera::new();
    let mut view = ViewUniform::default();

    let mut time = 0.0_f32;
    let mut presented = 0_usize;
    let mut last_time = -1.0_f32;
    let mut slots = Vec::new();

    for frame in 0..SIMULATED_FRAMES {
        // Fixed timestep, as the app's frame timer would deliver.
        time += 1.0 / 60.0;
        assert!(time > last_time);
        last_time = time;

        camera.position = Vec3::new(time.sin() * 8.0, 4.0, time.cos() * 8.0);
        view.set_camera(camera.position, 45.0_f32.to_radians(), 0.1, 45.0);
        assert_eq!(view.camera_info.x, camera.position.x);
        assert_eq!(view.camera_info.z, camera.position.z);

        let plan = FramePlan::build(&lists, caps, 0);
        assert_eq!(plan.geometry.len(), 2);
        assert_eq!(plan.shadow.len(), plan.geometry.len());
        assert!(plan.draws_sky());

        // Fence wait, record, submit: the slot must be free before reuse.
        ring.mark_observed();
        assert!(!ring.current_in_flight());
        slots.push(ring.current_frame());
        ring.set_image_index((frame % 3) as u32);
        ring.mark_submitted();
        presented += 1;
        ring.advance();
    }

    assert_eq!(presented, SIMULATED_FRAMES);

    // The ring must strictly alternate between the two in-flight slots.
    assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
    let expected: Vec<usize> = (0..SIMULATED_FRAMES).map(|f| f % 2).collect();
    assert_eq!(slots, expected);
}

#[test]
fn test_cube_field_is_one_call_with_multi_draw() {
    let lists = cube_field_scene();
    let plan = FramePlan::build(
        &lists,
        DrawCaps {
            multi_draw_indirect: true,
        },
        0,
    );

    assert_eq!(field_draw_calls(&plan), 1);
    assert_eq!(
        plan.geometry.iter().find(|d| d.object() == 1),
        Some(&PlannedDraw::IndexedIndirect {
            object: 1,
            offset: 0,
            draw_count: CUBE_FIELD_INSTANCES,
        })
    );
}

#[test]
fn test_cube_field_expands_without_multi_draw() {
    let lists = cube_field_scene();
    let plan = FramePlan::build(
        &lists,
        DrawCaps {
            multi_draw_indirect: false,
        },
        0,
    );

    assert_eq!(field_draw_calls(&plan), CUBE_FIELD_INSTANCES as usize);

    // Each expanded call consumes exactly one command, at its own offset.
    for (i, draw) in plan
        .geometry
        .iter()
        .filter(|d| d.object() == 1)
        .enumerate()
    {
        assert_eq!(
            *draw,
            PlannedDraw::IndexedIndirect {
                object: 1,
                offset: i as u64 * u64::from(INDIRECT_COMMAND_STRIDE),
                draw_count: 1,
            }
        );
    }
}

#[test]
fn test_both_forks_draw_identical_objects() {
    let lists = cube_field_scene();
    let with_mdi = FramePlan::build(
        &lists,
        DrawCaps {
            multi_draw_indirect: true,
        },
        0,
    );
    let without_mdi = FramePlan::build(
        &lists,
        DrawCaps {
            multi_draw_indirect: false,
        },
        0,
    );

    // The fork changes submission count, never which objects are drawn or
    // how many commands the GPU consumes in total.
    let commands = |plan: &FramePlan| -> u32 {
        plan.geometry
            .iter()
            .map(|d| match *d {
                PlannedDraw::Indexed { .. } => 1,
                PlannedDraw::IndexedIndirect { draw_count, .. } => draw_count,
            })
            .sum()
    };
    assert_eq!(commands(&with_mdi), commands(&without_mdi));
    assert_eq!(commands(&with_mdi), 1 + CUBE_FIELD_INSTANCES);

    // Every object the geometry pass draws also casts a shadow, on both
    // sides of the fork.
    for plan in [&with_mdi, &without_mdi] {
        let geometry: Vec<usize> = plan.geometry.iter().map(|d| d.object()).collect();
        let shadow: Vec<usize> = plan.shadow.iter().map(|d| d.object()).collect();
        assert_eq!(geometry, shadow);
    }
}
