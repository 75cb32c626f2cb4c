use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorIcon, Window, WindowId},
};

use scene_host::cli::Cli;
use scene_host::config::PageConfig;
use scene_host::core::backend::HeadlessBackendFactory;
use scene_host::core::input_adapter::WinitInputAdapter;
use scene_host::core::resources::ResourceKind;
use scene_host::core::scheduler::FrameQueue;
use scene_host::core::surface_renderer::{SharedSurface, WgpuBackendFactory};
use scene_host::core::window::HostWindow;
use scene_host::host::HostEnvironment;
use scene_host::loaders::ThreadedAssetSource;
use scene_host::page::{DocumentMeta, HistoryNavigator, LandingPage, Navigator};

// === Constants ===

const FPS_UPDATE_INTERVAL: f32 = 1.0;
const HEADLESS_FRAME_TIME: Duration = Duration::from_millis(16);

struct App {
    config: PageConfig,
    window: Option<Arc<Window>>,
    surface: Option<Rc<SharedSurface>>,
    page: Option<LandingPage>,
    queue: Rc<FrameQueue>,
    navigator: Rc<HistoryNavigator>,
    input: WinitInputAdapter,
    pointer_cursor: bool,
    last_frame_time: Instant,
    frame_count: u32,
    fps_update_timer: f32,
}

impl App {
    fn new(config: PageConfig) -> Self {
        Self {
            config,
            window: None,
            surface: None,
            page: None,
            queue: Rc::new(FrameQueue::new()),
            navigator: Rc::new(HistoryNavigator::new()),
            input: WinitInputAdapter::new(),
            pointer_cursor: false,
            last_frame_time: Instant::now(),
            frame_count: 0,
            fps_update_timer: 0.0,
        }
    }

    fn update_fps(&mut self, delta: f32) {
        self.frame_count += 1;
        self.fps_update_timer += delta;

        if self.fps_update_timer >= FPS_UPDATE_INTERVAL {
            let fps = self.frame_count as f32 / self.fps_update_timer;
            info!("FPS: {:.1} ({} frame callbacks pending)", fps, self.queue.pending());
            self.frame_count = 0;
            self.fps_update_timer = 0.0;
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.update_fps(delta);

        let (Some(surface), Some(window)) = (&self.surface, &self.window) else {
            return;
        };
        if let Err(e) = surface.begin_frame() {
            debug!("Skipping frame: {}", e);
            return;
        }
        self.queue.run_frame();
        surface.present();

        if let Some(page) = &self.page {
            for message in page.take_messages() {
                info!("Message shown: {}", message);
            }
            let wants_pointer = page.wants_pointer_cursor();
            if wants_pointer != self.pointer_cursor {
                self.pointer_cursor = wants_pointer;
                window.set_cursor(if wants_pointer { CursorIcon::Pointer } else { CursorIcon::Default });
            }
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut page) = self.page.take() {
            page.unmount();
        }
        if let Some(surface) = &self.surface {
            info!(
                "Presented {} frames, {} GPU resources still live",
                surface.frames_presented(),
                surface.tracker().total_live()
            );
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let meta = DocumentMeta::from_config(&self.config);
        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title(meta.window_title())
                .with_inner_size(winit::dpi::LogicalSize::new(
                    self.config.window_width,
                    self.config.window_height,
                )),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let surface = match SharedSurface::new(window.clone()) {
            Ok(surface) => surface,
            Err(e) => {
                error!("Failed to initialize GPU surface: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let env = HostEnvironment {
            window: Rc::new(HostWindow::new(size.width, size.height)),
            scheduler: self.queue.clone(),
            backends: Rc::new(WgpuBackendFactory::new(surface.clone())),
            assets: Rc::new(ThreadedAssetSource::new()),
        };
        let navigator: Rc<dyn Navigator> = self.navigator.clone();
        self.page = Some(LandingPage::mount(env, self.config.clone(), navigator));
        self.surface = Some(surface);
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => self.shutdown(event_loop),
            WindowEvent::RedrawRequested => self.redraw(),
            event => {
                if let (WindowEvent::Resized(size), Some(surface)) = (&event, &self.surface) {
                    surface.resize(size.width, size.height);
                }
                let Some(page) = &mut self.page else {
                    return;
                };
                for host_event in self.input.process_event(&event) {
                    for route in page.dispatch(&host_event) {
                        info!("Route changed to {}", route);
                    }
                }
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Mount the page without a window, run `frames` frames and report what
/// each host holds
fn run_headless(config: PageConfig, frames: usize) -> anyhow::Result<()> {
    let queue = Rc::new(FrameQueue::new());
    let backends = Rc::new(HeadlessBackendFactory::new());
    let tracker = backends.tracker();
    let env = HostEnvironment {
        window: Rc::new(HostWindow::new(config.window_width, config.window_height)),
        scheduler: queue.clone(),
        backends,
        assets: Rc::new(ThreadedAssetSource::new()),
    };
    let navigator = Rc::new(HistoryNavigator::new());
    let mut page = LandingPage::mount(env, config, navigator.clone());
    info!("Headless: {}", page.meta().window_title());

    for _ in 0..frames {
        queue.run_frame();
        std::thread::sleep(HEADLESS_FRAME_TIME);
    }

    let hosts = [
        ("starfield", Some(page.starfield())),
        ("showcase", page.showcase()),
        ("dice", page.dice()),
    ];
    for (name, host) in hosts {
        match host.and_then(|h| h.summary().map(|s| (h.frames_rendered(), s))) {
            Some((rendered, summary)) => info!("{}: {} frames, {:?}", name, rendered, summary),
            None => info!("{}: not mounted", name),
        }
    }
    info!(
        "Live resources: {} contexts, {} geometries, {} textures",
        tracker.live(ResourceKind::Context),
        tracker.live(ResourceKind::Geometry),
        tracker.live(ResourceKind::Texture)
    );

    page.unmount();
    if tracker.total_live() != 0 {
        warn!("{} resources outlived the page", tracker.total_live());
    }
    info!("Route history: {:?}", navigator.history());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::init();

    let config = cli.page_config()?;
    if let Some(frames) = cli.headless {
        return run_headless(config, frames);
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);

    info!("Drag to orbit, click the model to open its page, Escape to quit");
    event_loop.run_app(&mut app)?;

    Ok(())
}
