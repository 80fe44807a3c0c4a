//! Demo application for the deferred renderer.
//!
//! Renders a textured cube on a wide stage platform next to an instanced
//! field of 8192 small cubes drawn through a single indirect buffer, lit by
//! one animated directional light.
//!
//! Keys: `1`..`9` and `0` select a shader variant (0 = full shading),
//! `Space` toggles stage rotation, `L` toggles the light orbit.

use std::path::Path;

use anyhow::Result;
use glam::{Mat4, Vec3};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::WindowId;

use deferred_core::Timer;
use deferred_platform::{InputState, Window};
use deferred_renderer::Renderer;
use deferred_resources::{MeshData, TextureData};
use deferred_rhi::vertex::InstanceData;
use deferred_rhi::vk;
use deferred_scene::DirectionalLight;

/// Field of instanced cubes: 32 x 8 x 32.
const FIELD_SIDE: i32 = 32;
const FIELD_LAYERS: i32 = 8;
const FIELD_SPACING: f32 = 1.5;

fn build_scene(renderer: &mut Renderer) -> Result<()> {
    renderer.set_background(&gradient_texture(
        256,
        [16, 22, 46, 255],
        [118, 60, 38, 255],
    ))?;
    // The dome's equirectangular mapping turns this into a zenith-to-nadir
    // sweep.
    renderer.set_sky(&gradient_texture(
        256,
        [24, 34, 72, 255],
        [126, 74, 48, 255],
    ))?;

    let cube = MeshData::cube();

    // Stage platform under everything.
    let stage_texture = TextureData::solid_color([90, 90, 100, 255], 2, 2);
    renderer.add_object(
        &cube,
        &[stage_texture],
        Mat4::from_scale_rotation_translation(
            Vec3::new(60.0, 0.5, 60.0),
            glam::Quat::IDENTITY,
            Vec3::new(0.0, -1.0, 0.0),
        ),
    )?;

    // Hero cube with a checkered texture.
    renderer.add_object(
        &cube,
        &[checker_texture(64, [235, 180, 60, 255], [40, 40, 48, 255])],
        Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
    )?;

    // Instanced cube field: one mesh, one indirect buffer, 8192 commands.
    // Each command draws one instance so the no-multi-draw fallback can
    // replay them one by one.
    let mut instances = Vec::with_capacity((FIELD_SIDE * FIELD_LAYERS * FIELD_SIDE) as usize);
    for y in 0..FIELD_LAYERS {
        for z in 0..FIELD_SIDE {
            for x in 0..FIELD_SIDE {
                let jitter = ((x * 7 + z * 13 + y * 29) % 10) as f32 * 0.05;
                instances.push(InstanceData::new(
                    Vec3::new(
                        (x - FIELD_SIDE / 2) as f32 * FIELD_SPACING,
                        2.0 + y as f32 * FIELD_SPACING + jitter,
                        (z - FIELD_SIDE / 2) as f32 * FIELD_SPACING,
                    ),
                    Vec3::new(0.0, jitter * 6.0, 0.0),
                    0.3,
                    ((x + z) % 2) as u8,
                ));
            }
        }
    }
    let commands: Vec<vk::DrawIndexedIndirectCommand> = (0..instances.len() as u32)
        .map(|i| vk::DrawIndexedIndirectCommand {
            index_count: cube.index_count() as u32,
            instance_count: 1,
            first_index: 0,
            vertex_offset: 0,
            first_instance: i,
        })
        .collect();
    renderer.add_indirect_instanced_object(
        &cube,
        &[
            TextureData::solid_color([70, 140, 220, 255], 2, 2),
            TextureData::solid_color([210, 80, 90, 255], 2, 2),
        ],
        Mat4::from_translation(Vec3::new(0.0, 0.0, -16.0)),
        &instances,
        &commands,
    )?;
    info!(instances = instances.len(), "Scene built");

    renderer.lights.push_directional(DirectionalLight {
        position: Vec3::new(10.0, 14.0, 2.0),
        direction: Vec3::new(-10.0, -14.0, -2.0).normalize(),
        color: Vec3::new(1.0, 0.96, 0.88),
        intensity: 2.5,
    });

    renderer.camera.position = Vec3::new(14.0, 10.0, 24.0);
    renderer.camera.rotation =
        glam::Quat::from_rotation_y(0.45) * glam::Quat::from_rotation_x(-0.25);
    renderer.animate_lights = true;

    Ok(())
}

/// Vertical gradient from `top` to `bottom`, used as the sky backdrop.
fn gradient_texture(size: u32, top: [u8; 4], bottom: [u8; 4]) -> TextureData {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        let t = y as f32 / (size - 1) as f32;
        let row: Vec<u8> = top
            .iter()
            .zip(&bottom)
            .map(|(&a, &b)| (a as f32 + (b as f32 - a as f32) * t) as u8)
            .collect();
        for _ in 0..size {
            pixels.extend_from_slice(&row);
        }
    }
    TextureData {
        pixels,
        width: size,
        height: size,
    }
}

fn checker_texture(size: u32, a: [u8; 4], b: [u8; 4]) -> TextureData {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let cell = (x / 8 + y / 8) % 2 == 0;
            pixels.extend_from_slice(if cell { &a } else { &b });
        }
    }
    TextureData {
        pixels,
        width: size,
        height: size,
    }
}

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    timer: Timer,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            renderer: None,
            input: InputState::new(),
            timer: Timer::new(),
        }
    }

    fn handle_keys(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        const VARIANT_KEYS: [KeyCode; 10] = [
            KeyCode::Digit0,
            KeyCode::Digit1,
            KeyCode::Digit2,
            KeyCode::Digit3,
            KeyCode::Digit4,
            KeyCode::Digit5,
            KeyCode::Digit6,
            KeyCode::Digit7,
            KeyCode::Digit8,
            KeyCode::Digit9,
        ];
        for (variant, key) in VARIANT_KEYS.iter().enumerate() {
            if self.input.is_key_just_pressed(*key) {
                renderer.variant = variant as u32;
                info!(variant, "Switched shader variant");
            }
        }

        if self.input.is_key_just_pressed(KeyCode::Space) {
            renderer.animate_stage = !renderer.animate_stage;
        }
        if self.input.is_key_just_pressed(KeyCode::KeyL) {
            renderer.animate_lights = !renderer.animate_lights;
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let result = Window::new(event_loop, 1280, 720, "Deferred Renderer")
            .map_err(anyhow::Error::from)
            .and_then(|window| {
                let mut renderer = Renderer::new(&window, Path::new("shaders"))?;
                build_scene(&mut renderer)?;
                Ok((window, renderer))
            });

        match result {
            Ok((window, renderer)) => {
                info!("Initialization complete, entering main loop");
                self.window = Some(window);
                self.renderer = Some(renderer);
            }
            Err(e) => {
                error!("Initialization failed: {e:?}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.handle_keys();
                let delta = self.timer.delta_secs();

                if let Some(ref mut renderer) = self.renderer
                    && let Err(e) = renderer.render_frame(delta)
                {
                    error!("Render error: {e:?}");
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::PhysicalKey;
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.input.begin_frame();
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    deferred_core::init_logging();
    info!("Starting deferred renderer");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    Ok(())
}
