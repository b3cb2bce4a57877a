/// Relief Web - WGPU terrain viewer for the browser and the desktop
///
/// The same event loop runs natively in a winit window and on wasm32 inside
/// a canvas. In the browser, the page hands over image bytes and control
/// values through the exported functions at the bottom of this file.
use std::sync::Arc;

use anyhow::Context;
use relief_core::viewer::HEIGHT_STEP;
use relief_core::{InputEvent, PointerButton, ProjectionMode, Scene, SceneCommand, Viewer};
use tracing::{error, info, warn};
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

pub mod renderer;

pub use renderer::{GpuRenderer, Uniforms};

const TITLE: &str = "Relief";

/// Requests from the host page, delivered through the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    LoadBytes { source: String, bytes: Vec<u8> },
    SetProjection(ProjectionMode),
    SetRotation { y: f32, z: f32 },
    SetScale(f32),
    SetHeightPercent(f32),
}

/// Apply a host command to the viewer state.
pub fn apply_host_command(viewer: &mut Viewer, command: HostCommand) {
    match command {
        HostCommand::LoadBytes { source, bytes } => viewer.load_bytes(&source, bytes),
        HostCommand::SetProjection(mode) => viewer.params_mut().projection = mode,
        HostCommand::SetRotation { y, z } => {
            let params = viewer.params_mut();
            params.y_rotation = y;
            params.z_rotation = z;
        }
        HostCommand::SetScale(scale) => viewer.params_mut().scale = scale,
        HostCommand::SetHeightPercent(percent) => viewer.params_mut().height_percent = percent,
    }
}

/// Map a winit mouse button onto the left/other split the controller uses
pub fn pointer_button(button: MouseButton) -> PointerButton {
    match button {
        MouseButton::Left => PointerButton::Left,
        MouseButton::Right => PointerButton::Right,
        MouseButton::Middle => PointerButton::Middle,
        _ => PointerButton::Other,
    }
}

/// Wheel delta in browser convention: negative scrolls up.
pub fn wheel_delta(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y,
        MouseScrollDelta::PixelDelta(position) => -position.y as f32,
    }
}

/// The newest load error if the scene failed again since `reported` was
/// last updated.
pub fn unreported_failure<'a>(scene: &'a Scene, reported: &mut u64) -> Option<&'a str> {
    if scene.failure_count() == *reported {
        return None;
    }
    *reported = scene.failure_count();
    scene.last_error()
}

/// Window, renderer and viewer state driven by the event loop
struct App {
    window: Arc<Window>,
    renderer: GpuRenderer,
    viewer: Viewer,
    cursor: PhysicalPosition<f64>,
    reported_failures: u64,
}

impl App {
    fn handle_window_event(&mut self, event: WindowEvent, target: &EventLoopWindowTarget<HostCommand>) {
        match event {
            WindowEvent::CloseRequested => target.exit(),
            WindowEvent::Resized(size) => self.renderer.resize(size.width, size.height),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                self.viewer.push_input(InputEvent::PointerMove {
                    x: position.x as f32,
                    y: position.y as f32,
                });
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let input = match state {
                    ElementState::Pressed => InputEvent::PointerDown {
                        button: pointer_button(button),
                        x: self.cursor.x as f32,
                        y: self.cursor.y as f32,
                    },
                    ElementState::Released => InputEvent::PointerUp,
                };
                self.viewer.push_input(input);
            }
            WindowEvent::CursorLeft { .. } => self.viewer.push_input(InputEvent::PointerLeave),
            WindowEvent::MouseWheel { delta, .. } => {
                self.viewer.push_input(InputEvent::Wheel {
                    delta_y: wheel_delta(delta),
                });
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.handle_key(logical_key, target),
            #[cfg(not(target_arch = "wasm32"))]
            WindowEvent::DroppedFile(path) => self.viewer.load_path(&path),
            WindowEvent::RedrawRequested => self.redraw(target),
            _ => {}
        }
    }

    fn handle_key(&mut self, key: Key, target: &EventLoopWindowTarget<HostCommand>) {
        match key.as_ref() {
            Key::Named(NamedKey::Escape) | Key::Character("q") => target.exit(),
            Key::Character("p") => self.viewer.toggle_projection(),
            Key::Character("]") => self.viewer.adjust_height(HEIGHT_STEP),
            Key::Character("[") => self.viewer.adjust_height(-HEIGHT_STEP),
            #[cfg(not(target_arch = "wasm32"))]
            Key::Character("r") => {
                self.viewer.reload();
            }
            _ => {}
        }
    }

    fn redraw(&mut self, target: &EventLoopWindowTarget<HostCommand>) {
        if self.viewer.update() {
            self.window.set_title(&self.title());
        }
        self.report_load_error();

        if let Err(error) = self.renderer.sync_mesh(self.viewer.scene()) {
            let source = self.viewer.scene().source().unwrap_or("terrain").to_string();
            if self
                .viewer
                .command_sender()
                .send(SceneCommand::LoadFailed { source, error })
                .is_err()
            {
                warn!("viewer stopped before the upload error could be reported");
            }
        }
        let frame = self.viewer.frame(self.renderer.aspect());

        match self.renderer.render(&frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.renderer.reconfigure()
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("out of GPU memory, exiting");
                target.exit();
            }
            Err(e) => warn!(error = ?e, "dropped frame"),
        }
    }

    fn title(&self) -> String {
        match self.viewer.current_path() {
            Some(path) => format!("{} - {}", TITLE, path.display()),
            None => TITLE.to_string(),
        }
    }

    /// Tell the user about each failed load once.
    fn report_load_error(&mut self) {
        let Some(message) = unreported_failure(self.viewer.scene(), &mut self.reported_failures)
        else {
            return;
        };

        #[cfg(target_arch = "wasm32")]
        {
            if let Some(window) = web_sys::window() {
                let text = format!("The selected file could not be loaded as an image.\n{}", message);
                let _ = window.alert_with_message(&text);
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.window
                .set_title(&format!("{}: load failed ({})", TITLE, message));
        }
    }
}

/// Open a window (or canvas) and render until it is closed.
pub async fn run(viewer: Viewer) -> anyhow::Result<()> {
    let event_loop = EventLoopBuilder::<HostCommand>::with_user_event()
        .build()
        .context("creating event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let window = Arc::new(
        WindowBuilder::new()
            .with_title(TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(1024.0, 768.0))
            .build(&event_loop)
            .context("creating window")?,
    );

    #[cfg(target_arch = "wasm32")]
    web::attach(&window, event_loop.create_proxy())?;

    let renderer = GpuRenderer::new(window.clone(), viewer.scene().active_mesh()).await?;
    info!("renderer ready");

    let mut app = App {
        window,
        renderer,
        viewer,
        cursor: PhysicalPosition::new(0.0, 0.0),
        reported_failures: 0,
    };

    event_loop
        .run(move |event, target| match event {
            Event::WindowEvent { event, window_id } if window_id == app.window.id() => {
                app.handle_window_event(event, target)
            }
            Event::UserEvent(command) => apply_host_command(&mut app.viewer, command),
            Event::AboutToWait => app.window.request_redraw(),
            Event::LoopExiting => app.viewer.shutdown(),
            _ => {}
        })
        .context("running event loop")?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;

    use relief_core::{ProjectionMode, Viewer};
    use wasm_bindgen::prelude::*;
    use winit::event_loop::EventLoopProxy;
    use winit::platform::web::WindowExtWebSys;
    use winit::window::Window;

    use super::HostCommand;

    /// Element the canvas is appended to; falls back to the page body
    const CONTAINER_ID: &str = "relief";

    thread_local! {
        static PROXY: RefCell<Option<EventLoopProxy<HostCommand>>> = RefCell::new(None);
    }

    pub(super) fn attach(window: &Window, proxy: EventLoopProxy<HostCommand>) -> anyhow::Result<()> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| anyhow::anyhow!("no document"))?;
        let canvas = window
            .canvas()
            .ok_or_else(|| anyhow::anyhow!("window has no canvas"))?;
        let container = match document.get_element_by_id(CONTAINER_ID) {
            Some(element) => element,
            None => document
                .body()
                .map(web_sys::Element::from)
                .ok_or_else(|| anyhow::anyhow!("page has no body"))?,
        };
        container
            .append_child(&canvas)
            .map_err(|e| anyhow::anyhow!("could not attach canvas: {:?}", e))?;

        PROXY.with(|p| *p.borrow_mut() = Some(proxy));
        Ok(())
    }

    fn send(command: HostCommand) -> Result<(), JsValue> {
        PROXY.with(|p| match p.borrow().as_ref() {
            Some(proxy) => proxy
                .send_event(command)
                .map_err(|_| JsValue::from_str("viewer has stopped")),
            None => Err(JsValue::from_str("viewer is not running yet")),
        })
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        wasm_bindgen_futures::spawn_local(async {
            if let Err(e) = super::run(Viewer::default()).await {
                web_sys::console::error_1(&JsValue::from_str(&format!("{:#}", e)));
            }
        });
    }

    /// Decode an image the page read from a file input.
    #[wasm_bindgen]
    pub fn load_heightmap(name: String, bytes: Vec<u8>) -> Result<(), JsValue> {
        send(HostCommand::LoadBytes {
            source: name,
            bytes,
        })
    }

    /// `"perspective"` or `"orthographic"`
    #[wasm_bindgen]
    pub fn set_projection(mode: &str) -> Result<(), JsValue> {
        let mode: ProjectionMode = mode.parse().map_err(|e: String| JsValue::from_str(&e))?;
        send(HostCommand::SetProjection(mode))
    }

    #[wasm_bindgen]
    pub fn set_rotation(y: f32, z: f32) -> Result<(), JsValue> {
        send(HostCommand::SetRotation { y, z })
    }

    #[wasm_bindgen]
    pub fn set_scale(scale: f32) -> Result<(), JsValue> {
        send(HostCommand::SetScale(scale))
    }

    #[wasm_bindgen]
    pub fn set_height(percent: f32) -> Result<(), JsValue> {
        send(HostCommand::SetHeightPercent(percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_core::{DrawCall, ReliefError};
    use std::time::{Duration, Instant};

    fn settle(viewer: &mut Viewer) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while viewer.is_loading() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        viewer.update()
    }

    #[test]
    fn test_pointer_buttons() {
        assert_eq!(pointer_button(MouseButton::Left), PointerButton::Left);
        assert_eq!(pointer_button(MouseButton::Right), PointerButton::Right);
        assert_eq!(pointer_button(MouseButton::Middle), PointerButton::Middle);
        assert_eq!(pointer_button(MouseButton::Other(7)), PointerButton::Other);
    }

    #[test]
    fn test_wheel_delta_sign() {
        // winit reports scrolling up as positive
        assert_eq!(wheel_delta(MouseScrollDelta::LineDelta(0.0, 1.0)), -1.0);
        assert_eq!(
            wheel_delta(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -30.0))),
            30.0
        );
    }

    #[test]
    fn test_host_controls() {
        let mut viewer = Viewer::default();
        apply_host_command(&mut viewer, HostCommand::SetProjection(ProjectionMode::Orthographic));
        apply_host_command(&mut viewer, HostCommand::SetRotation { y: 90.0, z: 45.0 });
        apply_host_command(&mut viewer, HostCommand::SetScale(-2.0));
        apply_host_command(&mut viewer, HostCommand::SetHeightPercent(300.0));

        let params = viewer.params();
        assert_eq!(params.projection, ProjectionMode::Orthographic);
        assert_eq!((params.y_rotation, params.z_rotation), (90.0, 45.0));
        assert_eq!(params.scale, -2.0);
        assert_eq!(params.height_percent, 300.0);
    }

    #[test]
    fn test_host_load_bytes() {
        use image::{ImageFormat, Rgba, RgbaImage};
        use std::io::Cursor;

        let mut bytes = Vec::new();
        RgbaImage::from_pixel(4, 3, Rgba([10, 200, 30, 255]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let mut viewer = Viewer::default();
        apply_host_command(
            &mut viewer,
            HostCommand::LoadBytes {
                source: "upload.png".to_string(),
                bytes,
            },
        );
        assert!(settle(&mut viewer));
        assert_eq!(
            viewer.frame(1.0).draw,
            DrawCall::Indexed {
                index_count: 6 * 3 * 2
            }
        );
    }

    #[test]
    fn test_same_broken_file_reported_twice() {
        let mut scene = Scene::new();
        let mut reported = 0;
        let broken = || SceneCommand::LoadFailed {
            source: "bad.png".to_string(),
            error: ReliefError::EmptyImage {
                width: 0,
                height: 0,
            },
        };

        assert_eq!(unreported_failure(&scene, &mut reported), None);

        scene.apply(broken());
        let first = unreported_failure(&scene, &mut reported).map(str::to_string);
        assert!(first.is_some());
        assert_eq!(unreported_failure(&scene, &mut reported), None);

        scene.apply(broken());
        assert_eq!(
            unreported_failure(&scene, &mut reported).map(str::to_string),
            first
        );
    }

    #[test]
    fn test_upload_error_reaches_scene() {
        let mut viewer = Viewer::default();
        viewer
            .command_sender()
            .send(SceneCommand::LoadFailed {
                source: "huge.png".to_string(),
                error: ReliefError::BufferTooLarge {
                    bytes: 402_420_600,
                    limit: 268_435_456,
                },
            })
            .unwrap();
        viewer.update();

        let mut reported = 0;
        let message = unreported_failure(viewer.scene(), &mut reported).unwrap();
        assert!(message.starts_with("huge.png"));
        assert_eq!(viewer.frame(1.0).draw, DrawCall::NonIndexed { vertex_count: 36 });
    }
}
