use std::error::Error;
use std::ffi::c_void;
use std::fmt::Display;
use std::rc::Rc;
use std::time::Instant;

use glam::{Quat, Vec3};
use gltf_stage::device::{Device, GlDevice};
use gltf_stage::scene::import;
use gltf_stage::{Application, BuildOptions, InstanceId};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::video::GLProfile;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: gltf-stage <model.gltf|model.glb>"))?;

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    gl_attr.set_depth_size(24);
    // The built-in fragment shader writes sRGB itself.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let window = video_subsystem
        .window(env!("CARGO_PKG_NAME"), 948, 533)
        .resizable()
        .opengl()
        .build()?;
    let _gl_context = window.gl_create_context().map_err(SdlErr)?;
    video_subsystem.gl_set_swap_interval(1).map_err(SdlErr)?;
    let mut event_pump = sdl_context.event_pump().map_err(SdlErr)?;

    let gl_device = Rc::new(GlDevice::load_with(|s| {
        video_subsystem.gl_get_proc_address(s) as *const c_void
    }));
    let (width, height) = window.drawable_size();
    gl_device.resize(width as i32, height as i32);
    let device: Rc<dyn Device> = gl_device.clone();
    let mut app = Application::with_builtin_shaders(device);
    app.camera.aspect_ratio = width as f32 / height.max(1) as f32;

    let (document, buffers, images) = gltf::import(&path)?;
    let scene = import::from_gltf(&document, &buffers, &images);
    let options = BuildOptions {
        clear_cache: true,
        ..Default::default()
    };
    let model = app.build_model(scene, &options)?;
    log::info!("loaded {path}: {model:?}");
    let id = app.spawn(&model, None)?;
    if !model.animations().is_empty() {
        if let Some(instance) = app.instance_mut(id) {
            instance.new_player(0, |player| player.looping = true)?;
        }
    }

    let start = Instant::now();
    let mut last_frame = start;
    loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => return Ok(()),
                Event::Window {
                    win_event: WindowEvent::Resized(w, h),
                    ..
                } => {
                    gl_device.resize(w, h);
                    app.camera.aspect_ratio = w as f32 / h.max(1) as f32;
                }
                Event::KeyDown {
                    keycode: Some(Keycode::Space),
                    ..
                } => toggle_pause(&mut app, id),
                _ => {}
            }
        }

        let now = Instant::now();
        let elapsed = (now - last_frame).as_secs_f32();
        last_frame = now;
        if let Some(instance) = app.instance_mut(id) {
            let angle = (now - start).as_secs_f32() * 0.5;
            instance.set_rotation(Quat::from_axis_angle(Vec3::Y, angle));
        }
        app.update(elapsed);

        gl_device.begin_frame([0.05, 0.05, 0.08, 1.0]);
        app.render();
        window.gl_swap_window();
    }
}

fn toggle_pause(app: &mut Application, id: InstanceId) {
    if let Some(player) = app.instance_mut(id).and_then(|i| i.player_mut()) {
        player.speed = if player.speed == 0.0 { 1.0 } else { 0.0 };
    }
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
