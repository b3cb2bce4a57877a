/// Terminal front end for the heightmap viewer
use crossterm::{
    cursor,
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use relief_core::viewer::HEIGHT_STEP;
use relief_core::{InputEvent, PointerButton, ProjectionMode, Viewer};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub mod renderer;

pub use renderer::AsciiRenderer;

/// Approximate size of a terminal cell in pixels. Mouse positions arrive in
/// cells and are scaled so drag deltas feel like pixel deltas.
pub const CELL_WIDTH_PX: f32 = 8.0;
pub const CELL_HEIGHT_PX: f32 = 16.0;

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    viewer: Viewer,
    renderer: AsciiRenderer,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    pub fn new(viewer: Viewer) -> io::Result<Self> {
        let (width, height) = terminal::size()?;

        Ok(Self {
            viewer,
            // Bottom row is kept for the status line
            renderer: AsciiRenderer::new(width as usize, height.saturating_sub(1) as usize),
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        enter_screen(&mut stdout())?;

        let result = self.main_loop();

        // Cleanup
        self.viewer.shutdown();
        leave_screen(&mut stdout())?;
        terminal::disable_raw_mode()?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            // Collect all pending input before drawing
            while event::poll(Duration::from_millis(0))? {
                let event = event::read()?;
                self.handle_event(event);
            }

            if self.viewer.update() {
                info!("terrain replaced");
            }

            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) => self.handle_key(code),
            Event::Mouse(mouse) => {
                if let Some(input) = pointer_input(&mouse) {
                    self.viewer.push_input(input);
                }
            }
            Event::FocusLost => self.viewer.push_input(InputEvent::PointerLeave),
            Event::Resize(width, height) => {
                debug!(width, height, "terminal resized");
                self.renderer
                    .resize(width as usize, height.saturating_sub(1) as usize);
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
            }
            KeyCode::Char('p') => self.viewer.toggle_projection(),
            KeyCode::Char(']') => self.viewer.adjust_height(HEIGHT_STEP),
            KeyCode::Char('[') => self.viewer.adjust_height(-HEIGHT_STEP),
            KeyCode::Char('r') => {
                if !self.viewer.reload() {
                    debug!("nothing to reload");
                }
            }
            _ => {}
        }
    }

    fn aspect(&self) -> f32 {
        let width = self.renderer.width().max(1) as f32 * CELL_WIDTH_PX;
        let height = self.renderer.height().max(1) as f32 * CELL_HEIGHT_PX;
        width / height
    }

    fn render(&mut self) -> io::Result<()> {
        let frame = self.viewer.frame(self.aspect());

        self.renderer.clear();
        self.renderer
            .render_mesh(self.viewer.scene().active_mesh(), &frame);

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.draw(&mut stdout)?;

        // Status line
        let params = self.viewer.params();
        let mode = match params.projection {
            ProjectionMode::Perspective => "persp",
            ProjectionMode::Orthographic => "ortho",
        };
        let (status, color) = match self.viewer.scene().last_error() {
            Some(error) => (format!("Load failed: {}", error), Color::Red),
            None => (
                format!(
                    "FPS {:.1} | Y {:.0} Z {:.0} zoom {:.0} height {:.0}% {} | drag=rotate, right-drag=pan, wheel=zoom, [ ]=height, p=projection, r=reload, q=quit",
                    self.fps,
                    params.y_rotation,
                    params.z_rotation,
                    params.scale,
                    params.height_percent,
                    mode,
                ),
                Color::Yellow,
            ),
        };
        let (width, _) = terminal::size()?;
        let status: String = status.chars().take(width as usize).collect();
        queue!(
            stdout,
            cursor::MoveTo(0, self.renderer.height() as u16),
            terminal::Clear(ClearType::CurrentLine),
            SetForegroundColor(color),
            Print(status),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

/// Switch to the alternate screen with mouse and focus reporting on.
/// Focus loss ends a drag the same way the pointer leaving a window does.
fn enter_screen<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(
        out,
        terminal::EnterAlternateScreen,
        cursor::Hide,
        EnableMouseCapture,
        EnableFocusChange
    )
}

fn leave_screen<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(
        out,
        DisableFocusChange,
        DisableMouseCapture,
        terminal::LeaveAlternateScreen,
        cursor::Show
    )
}

/// Translate a terminal mouse event into viewer input
pub fn pointer_input(mouse: &MouseEvent) -> Option<InputEvent> {
    let x = mouse.column as f32 * CELL_WIDTH_PX;
    let y = mouse.row as f32 * CELL_HEIGHT_PX;
    match mouse.kind {
        MouseEventKind::Down(button) => Some(InputEvent::PointerDown {
            button: match button {
                MouseButton::Left => PointerButton::Left,
                MouseButton::Right => PointerButton::Right,
                MouseButton::Middle => PointerButton::Middle,
            },
            x,
            y,
        }),
        MouseEventKind::Drag(_) | MouseEventKind::Moved => Some(InputEvent::PointerMove { x, y }),
        MouseEventKind::Up(_) => Some(InputEvent::PointerUp),
        MouseEventKind::ScrollUp => Some(InputEvent::Wheel { delta_y: -1.0 }),
        MouseEventKind::ScrollDown => Some(InputEvent::Wheel { delta_y: 1.0 }),
        _ => None,
    }
}
