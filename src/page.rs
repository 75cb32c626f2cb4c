//! Landing page glue: lays out the scene containers, mounts the hosts and
//! turns their pick actions into navigation and messages.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info};

use crate::config::PageConfig;
use crate::core::events::HostEvent;
use crate::core::window::{Container, SurfaceRect, WindowDimensions};
use crate::host::{HostEnvironment, SceneHost};
use crate::picking::PickAction;
use crate::scenes::{mount_dice, mount_showcase, mount_starfield};

pub const HOME_ROUTE: &str = "/";

/// Where navigation requests end up
pub trait Navigator {
    fn navigate(&self, route: &str);

    fn current_route(&self) -> String;
}

/// Navigator that only records the route history
#[derive(Debug)]
pub struct HistoryNavigator {
    history: RefCell<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self {
            history: RefCell::new(vec![HOME_ROUTE.to_string()]),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, route: &str) {
        info!("navigate -> {}", route);
        self.history.borrow_mut().push(route.to_string());
    }

    fn current_route(&self) -> String {
        self.history
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| HOME_ROUTE.to_string())
    }
}

/// Routes requested while events are being dispatched. Applied afterwards
/// so no host is unmounted from inside its own listener.
#[derive(Debug, Default)]
pub struct RouteQueue {
    routes: RefCell<VecDeque<String>>,
}

impl RouteQueue {
    pub fn push(&self, route: impl Into<String>) {
        self.routes.borrow_mut().push_back(route.into());
    }

    pub fn len(&self) -> usize {
        self.routes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.borrow().is_empty()
    }

    pub fn drain(&self) -> Vec<String> {
        self.routes.borrow_mut().drain(..).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub title: String,
    pub description: String,
}

impl DocumentMeta {
    pub fn from_config(config: &PageConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
        }
    }

    pub fn window_title(&self) -> &str {
        &self.title
    }
}

/// Container rects for a window size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub starfield: SurfaceRect,
    pub showcase: SurfaceRect,
    pub dice: SurfaceRect,
}

impl PageLayout {
    /// The star field fills the window. The model band is vertically
    /// centred; the dice band (half the window high) sits below it.
    pub fn compute(window: WindowDimensions, showcase_height: u32) -> Self {
        let band = showcase_height.min(window.height);
        let band_top = (window.height - band) / 2;
        let dice_top = band_top + band;
        let dice_height = (window.height / 2).min(window.height - dice_top);
        Self {
            starfield: SurfaceRect::new(0.0, 0.0, window.width, window.height),
            showcase: SurfaceRect::new(0.0, band_top as f32, window.width, band),
            dice: SurfaceRect::new(0.0, dice_top as f32, window.width, dice_height),
        }
    }
}

/// A mounted host and the container it draws into
struct Mounted {
    container: Container,
    host: SceneHost,
}

/// The composed landing page
pub struct LandingPage {
    env: HostEnvironment,
    config: PageConfig,
    meta: DocumentMeta,
    navigator: Rc<dyn Navigator>,
    routes: Rc<RouteQueue>,
    messages: Rc<RefCell<Vec<String>>>,
    showcase_hovered: Rc<Cell<bool>>,
    dice_hovered: Rc<Cell<bool>>,
    starfield: Mounted,
    showcase: Option<Mounted>,
    dice: Option<Mounted>,
}

impl LandingPage {
    pub fn mount(env: HostEnvironment, config: PageConfig, navigator: Rc<dyn Navigator>) -> Self {
        let layout = PageLayout::compute(env.window.dimensions(), config.showcase_height);
        let routes = Rc::new(RouteQueue::default());
        let messages = Rc::new(RefCell::new(Vec::new()));
        let showcase_hovered = Rc::new(Cell::new(false));
        let dice_hovered = Rc::new(Cell::new(false));

        let container = env.window.add_container(layout.starfield, 0);
        let host = mount_starfield(&env, &container, &config.starfield);
        let starfield = Mounted { container, host };

        let on_pick = |routes: &Rc<RouteQueue>, messages: &Rc<RefCell<Vec<String>>>| {
            let routes = routes.clone();
            let messages = messages.clone();
            move |action: PickAction| match action {
                PickAction::Navigate(route) => routes.push(route),
                PickAction::ShowMessage(message) => {
                    info!("message: {}", message);
                    messages.borrow_mut().push(message);
                }
            }
        };
        let on_hover = |cell: &Rc<Cell<bool>>| {
            let cell = cell.clone();
            move |hovered: bool| cell.set(hovered)
        };

        let showcase = config.showcase.as_ref().map(|showcase_config| {
            let container = env.window.add_container(layout.showcase, 1);
            let host = mount_showcase(
                &env,
                &container,
                showcase_config,
                on_pick(&routes, &messages),
                on_hover(&showcase_hovered),
            );
            Mounted { container, host }
        });

        let dice = config.dice.as_ref().map(|dice_config| {
            let container = env.window.add_container(layout.dice, 1);
            let host = mount_dice(
                &env,
                &container,
                dice_config,
                on_pick(&routes, &messages),
                on_hover(&dice_hovered),
            );
            Mounted { container, host }
        });

        let meta = DocumentMeta::from_config(&config);
        info!("page mounted: {}", meta.window_title());
        Self {
            env,
            config,
            meta,
            navigator,
            routes,
            messages,
            showcase_hovered,
            dice_hovered,
            starfield,
            showcase,
            dice,
        }
    }

    pub fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    pub fn starfield(&self) -> &SceneHost {
        &self.starfield.host
    }

    pub fn showcase(&self) -> Option<&SceneHost> {
        self.showcase.as_ref().map(|m| &m.host)
    }

    pub fn dice(&self) -> Option<&SceneHost> {
        self.dice.as_ref().map(|m| &m.host)
    }

    pub fn showcase_container(&self) -> Option<&Container> {
        self.showcase.as_ref().map(|m| &m.container)
    }

    pub fn dice_container(&self) -> Option<&Container> {
        self.dice.as_ref().map(|m| &m.container)
    }

    /// Pointer cursor while any pickable object is hovered
    pub fn wants_pointer_cursor(&self) -> bool {
        self.showcase_hovered.get() || self.dice_hovered.get()
    }

    pub fn take_messages(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.borrow_mut())
    }

    /// Lay containers out for the new size, then let hosts see the resize
    pub fn resize(&self, width: u32, height: u32) {
        let layout = PageLayout::compute(WindowDimensions::new(width, height), self.config.showcase_height);
        self.starfield.container.set_rect(layout.starfield);
        if let Some(showcase) = &self.showcase {
            showcase.container.set_rect(layout.showcase);
        }
        if let Some(dice) = &self.dice {
            dice.container.set_rect(layout.dice);
        }
        self.env.window.resize(width, height);
    }

    /// Deliver a window event, then apply any navigation it caused
    pub fn dispatch(&mut self, event: &HostEvent) -> Vec<String> {
        match *event {
            HostEvent::Resize { width, height } => self.resize(width, height),
            _ => self.env.window.dispatch(event),
        }
        self.apply_pending_navigation()
    }

    /// Hand queued routes to the navigator. Leaving the home route unmounts
    /// the interactive bands; the star field stays.
    pub fn apply_pending_navigation(&mut self) -> Vec<String> {
        let routes = self.routes.drain();
        for route in &routes {
            self.navigator.navigate(route);
        }
        if !routes.is_empty() && self.navigator.current_route() != HOME_ROUTE {
            for mut mounted in [self.showcase.take(), self.dice.take()].into_iter().flatten() {
                mounted.host.unmount();
                self.env.window.remove_container(&mounted.container);
            }
            self.showcase_hovered.set(false);
            self.dice_hovered.set(false);
            debug!("left {}, interactive scenes unmounted", HOME_ROUTE);
        }
        routes
    }

    pub fn unmount(&mut self) {
        for mut mounted in [self.showcase.take(), self.dice.take()].into_iter().flatten() {
            mounted.host.unmount();
            self.env.window.remove_container(&mounted.container);
        }
        self.starfield.host.unmount();
        self.env.window.remove_container(&self.starfield.container);
    }
}
