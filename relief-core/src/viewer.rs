/// Viewer state owned by a front end's render loop
use std::path::{Path, PathBuf};

use crossbeam_channel::{unbounded, Receiver, Sender};
use nalgebra::Matrix4;
use tracing::{debug, info, trace};

use crate::config::ViewerConfig;
use crate::interaction::{InputEvent, InputQueue, InteractionController};
use crate::loader::LoadTask;
use crate::projection::Camera;
use crate::scene::{DrawCall, Scene, SceneCommand};
use crate::transform::ViewParams;

/// Step for the height exaggeration keys, in percent
pub const HEIGHT_STEP: f32 = 10.0;

/// Matrices and draw call for one rendered frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub model_view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub draw: DrawCall,
}

impl Frame {
    pub fn mvp(&self) -> Matrix4<f32> {
        self.projection * self.model_view
    }
}

/// Run the transform pipeline for the given view state.
///
/// `extent` is the largest heightfield dimension, or `None` before anything
/// is loaded. Nothing is cached between frames.
pub fn compute_frame(
    params: &ViewParams,
    extent: Option<usize>,
    aspect: f32,
    draw: DrawCall,
) -> Frame {
    let camera = Camera::for_extent(extent, aspect, params.projection);

    let model = params.model_matrix();
    let view = params.pan_matrix() * camera.view_matrix();

    Frame {
        model,
        view,
        model_view: view * model,
        projection: camera.projection_matrix(),
        draw,
    }
}

/// Everything a front end needs between frames: the scene, the view
/// parameters, pending input and pending load results.
pub struct Viewer {
    scene: Scene,
    params: ViewParams,
    controller: InteractionController,
    input: InputQueue,
    commands: Receiver<SceneCommand>,
    sender: Sender<SceneCommand>,
    tasks: Vec<LoadTask>,
    current_path: Option<PathBuf>,
}

impl Viewer {
    pub fn new(config: &ViewerConfig) -> Self {
        let (sender, commands) = unbounded();
        Self {
            scene: Scene::new(),
            params: config.view,
            controller: InteractionController::new(config.input),
            input: InputQueue::new(),
            commands,
            sender,
            tasks: Vec::new(),
            current_path: None,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ViewParams {
        &mut self.params
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn push_input(&mut self, event: InputEvent) {
        self.input.push(event);
    }

    /// Channel load tasks report to. Hosts that decode elsewhere can send
    /// commands here directly.
    pub fn command_sender(&self) -> Sender<SceneCommand> {
        self.sender.clone()
    }

    /// Start loading an image file in the background.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_path(&mut self, path: &Path) {
        info!(path = %path.display(), "loading heightmap");
        self.current_path = Some(path.to_path_buf());
        self.tasks.retain(|task| !task.is_finished());
        self.tasks
            .push(LoadTask::spawn_path(path.to_path_buf(), self.sender.clone()));
    }

    /// Decode image bytes supplied by the host in the background.
    pub fn load_bytes(&mut self, source: &str, bytes: Vec<u8>) {
        info!(%source, len = bytes.len(), "decoding heightmap");
        self.tasks.retain(|task| !task.is_finished());
        self.tasks
            .push(LoadTask::spawn_bytes(source, bytes, self.sender.clone()));
    }

    /// Whether any load is still running
    pub fn is_loading(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Load the last requested file again.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn reload(&mut self) -> bool {
        match self.current_path.clone() {
            Some(path) => {
                self.load_path(&path);
                true
            }
            None => false,
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn toggle_projection(&mut self) {
        self.params.projection = self.params.projection.toggled();
        debug!(mode = ?self.params.projection, "projection changed");
    }

    pub fn adjust_height(&mut self, delta_percent: f32) {
        self.params.height_percent += delta_percent;
        debug!(percent = self.params.height_percent, "height exaggeration changed");
    }

    /// Apply finished loads and queued input. Returns `true` when the mesh
    /// was replaced.
    pub fn update(&mut self) -> bool {
        let mut replaced = false;
        while let Ok(command) = self.commands.try_recv() {
            replaced |= self.scene.apply(command);
        }
        self.controller.process(&mut self.input, &mut self.params);
        replaced
    }

    /// Matrices and draw call for the current state.
    pub fn frame(&self, aspect: f32) -> Frame {
        let frame = compute_frame(
            &self.params,
            self.scene.extent(),
            aspect,
            self.scene.draw_call(),
        );
        trace!(draw = ?frame.draw, "frame");
        frame
    }

    /// Cancel any load still in flight.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.cancel();
        }
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(&ViewerConfig::default())
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
