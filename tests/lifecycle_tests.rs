mod common;

use std::cell::RefCell;
use std::rc::Rc;

use scene_host::core::events::HostEvent;
use scene_host::core::resources::ResourceKind;
use scene_host::core::window::SurfaceRect;
use scene_host::error::SceneError;
use scene_host::picking::PickAction;
use scene_host::scene::Background;
use scene_host::scenes::{
    mount_dice, mount_showcase, mount_starfield, reload_showcase, DiceConfig, ModelShowcase, ShowcaseConfig,
    StarfieldConfig,
};

use common::{cube_data, Harness};

const MODEL: &str = "models/test.gltf";

fn showcase_config() -> ShowcaseConfig {
    ShowcaseConfig {
        model_path: MODEL.into(),
        ..ShowcaseConfig::default()
    }
}

fn rotating(host: &scene_host::SceneHost) -> bool {
    host.with_content::<ModelShowcase, _>(|showcase, _| showcase.object().is_rotating())
        .unwrap()
}

type Log<T> = Rc<RefCell<Vec<T>>>;

fn recorder<T: 'static>() -> (Log<T>, impl Fn(T) + 'static) {
    let log: Log<T> = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    (log, move |value| sink.borrow_mut().push(value))
}

fn starfield_config() -> StarfieldConfig {
    StarfieldConfig {
        count: 100,
        seed: Some(7),
        ..StarfieldConfig::default()
    }
}

#[cfg(test)]
mod host_lifecycle_tests {
    use super::*;

    #[test]
    fn test_unmount_before_asset_resolves() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let mut host = mount_showcase(&h.env, &container, &showcase_config(), |_| {}, |_| {});
        assert!(host.has_pending_frame());
        assert_eq!(h.assets.in_flight(), 1);

        host.unmount();

        assert!(!host.is_mounted());
        assert!(!host.has_pending_frame());
        assert_eq!(h.queue.pending(), 0);
        // Nobody is waiting for the model any more
        assert!(!h.assets.resolve_model(MODEL, Ok(cube_data())));
        h.queue.run_frames(3);
        assert_eq!(host.frames_rendered(), 0);
        assert_eq!(h.tracker.total_live(), 0);
        assert_eq!(container.surface_count(), 0);
        assert_eq!(container.events().listener_count(), 0);
    }

    #[test]
    fn test_unmounting_one_host_leaves_the_other_rendering() {
        let h = Harness::new(800, 800);
        let back = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 800), 0);
        let band = h.env.window.add_container(SurfaceRect::new(0.0, 200.0, 800, 400), 1);
        let starfield = mount_starfield(&h.env, &back, &starfield_config());
        let mut showcase = mount_showcase(&h.env, &band, &showcase_config(), |_| {}, |_| {});

        h.queue.run_frames(2);
        assert_eq!(h.tracker.live(ResourceKind::Context), 2);

        showcase.unmount();
        assert_eq!(h.tracker.live(ResourceKind::Context), 1);

        let before = starfield.frames_rendered();
        h.queue.run_frames(3);
        assert_eq!(starfield.frames_rendered(), before + 3);
        assert!(starfield.has_pending_frame());
        assert_eq!(h.queue.pending(), 1);
        assert_eq!(back.surface_count(), 1);
        assert_eq!(band.surface_count(), 0);
    }

    #[test]
    fn test_failed_load_keeps_lights_and_background() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let picks = Rc::new(RefCell::new(Vec::new()));
        let sink = picks.clone();
        let host = mount_showcase(
            &h.env,
            &container,
            &showcase_config(),
            move |action| sink.borrow_mut().push(action),
            |_| {},
        );

        assert!(h.assets.resolve_model(MODEL, Err(SceneError::asset(MODEL, "file not found"))));
        h.queue.run_frame();

        let summary = host.summary().unwrap();
        assert_eq!(summary.lights, 4);
        assert_eq!(summary.background, Background::Transparent);
        assert_eq!(summary.objects, 0);
        assert_eq!(host.pick_target(), None);
        let failed = host
            .with_content::<ModelShowcase, _>(|showcase, _| {
                matches!(showcase.object().last_error(), Some(SceneError::AssetLoadFailure { .. }))
            })
            .unwrap();
        assert!(failed);

        h.env.window.dispatch(&HostEvent::Click { x: 400.0, y: 200.0 });
        assert!(picks.borrow().is_empty());
        assert!(host.has_pending_frame());
    }

    #[test]
    fn test_hover_enter_then_leave_resumes_rotation() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let hovers = Rc::new(RefCell::new(Vec::new()));
        let sink = hovers.clone();
        let host = mount_showcase(
            &h.env,
            &container,
            &showcase_config(),
            |_| {},
            move |hovered| sink.borrow_mut().push(hovered),
        );
        h.assets.resolve_model(MODEL, Ok(cube_data()));
        h.queue.run_frame();
        assert!(host.pick_target().is_some());

        h.env.window.dispatch(&HostEvent::PointerMove { x: 400.0, y: 200.0 });
        assert!(host.is_hovered());
        assert!(!rotating(&host));

        // Leaving the container reports a pointer leave to it
        h.env.window.dispatch(&HostEvent::PointerMove { x: 400.0, y: 700.0 });
        assert!(!host.is_hovered());
        assert!(rotating(&host));
        assert_eq!(*hovers.borrow(), vec![true, false]);
    }

    #[test]
    fn test_moving_off_the_model_inside_the_container_ends_hover() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let (hovers, on_hover) = recorder::<bool>();
        let host = mount_showcase(&h.env, &container, &showcase_config(), |_| {}, on_hover);
        h.assets.resolve_model(MODEL, Ok(cube_data()));
        h.queue.run_frame();

        h.env.window.dispatch(&HostEvent::PointerMove { x: 400.0, y: 200.0 });
        h.env.window.dispatch(&HostEvent::PointerMove { x: 5.0, y: 5.0 });

        assert!(!host.is_hovered());
        assert!(rotating(&host));
        assert_eq!(*hovers.borrow(), vec![true, false]);
    }

    #[test]
    fn test_reload_under_the_pointer_clears_hover() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let (hovers, on_hover) = recorder::<bool>();
        let host = mount_showcase(&h.env, &container, &showcase_config(), |_| {}, on_hover);
        h.assets.resolve_model(MODEL, Ok(cube_data()));
        h.queue.run_frame();
        h.env.window.dispatch(&HostEvent::PointerMove { x: 400.0, y: 200.0 });
        assert!(host.is_hovered());

        assert!(reload_showcase(&host, "models/next.gltf", 0.7));
        h.queue.run_frames(3);

        assert_eq!(host.pick_target(), None);
        assert!(!host.is_hovered());
        assert!(rotating(&host));
        assert_eq!(*hovers.borrow(), vec![true, false]);

        // Pointer over the empty band stays a no-op until the new model lands
        h.env.window.dispatch(&HostEvent::PointerMove { x: 401.0, y: 200.0 });
        assert!(!host.is_hovered());
        assert!(h.assets.resolve_model("models/next.gltf", Ok(cube_data())));
        h.queue.run_frame();
        h.env.window.dispatch(&HostEvent::PointerMove { x: 400.0, y: 200.0 });
        assert!(host.is_hovered());
    }

    #[test]
    fn test_unmount_while_hovered_reports_leave() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let (hovers, on_hover) = recorder::<bool>();
        let mut host = mount_showcase(&h.env, &container, &showcase_config(), |_| {}, on_hover);
        h.assets.resolve_model(MODEL, Ok(cube_data()));
        h.queue.run_frame();
        h.env.window.dispatch(&HostEvent::PointerMove { x: 400.0, y: 200.0 });

        host.unmount();

        assert!(!host.is_hovered());
        assert_eq!(*hovers.borrow(), vec![true, false]);
    }

    #[test]
    fn test_click_on_model_requests_navigation() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let picks = Rc::new(RefCell::new(Vec::new()));
        let sink = picks.clone();
        let _host = mount_showcase(
            &h.env,
            &container,
            &showcase_config(),
            move |action| sink.borrow_mut().push(action),
            |_| {},
        );
        h.assets.resolve_model(MODEL, Ok(cube_data()));
        h.queue.run_frame();

        h.env.window.dispatch(&HostEvent::Click { x: 5.0, y: 5.0 });
        assert!(picks.borrow().is_empty());
        h.env.window.dispatch(&HostEvent::Click { x: 400.0, y: 200.0 });
        assert_eq!(*picks.borrow(), vec![PickAction::Navigate("/servicess".into())]);
    }

    #[test]
    fn test_reload_keeps_one_model_worth_of_resources() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let host = mount_showcase(&h.env, &container, &showcase_config(), |_| {}, |_| {});
        h.assets.resolve_model(MODEL, Ok(cube_data()));
        h.queue.run_frame();
        assert_eq!(h.tracker.live(ResourceKind::Geometry), 1);
        assert_eq!(h.tracker.live(ResourceKind::Texture), 1);

        for round in 0..3 {
            let path = format!("models/other-{}.gltf", round);
            assert!(reload_showcase(&host, &path, 1.0));
            assert_eq!(h.tracker.live(ResourceKind::Geometry), 0);
            assert!(h.assets.resolve_model(&path, Ok(cube_data())));
            h.queue.run_frame();
            assert_eq!(h.tracker.live(ResourceKind::Geometry), 1);
            assert_eq!(h.tracker.live(ResourceKind::Texture), 1);
        }
        assert_eq!(host.summary().unwrap().objects, 1);
    }

    #[test]
    fn test_reload_abandons_the_load_in_flight() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let host = mount_showcase(&h.env, &container, &showcase_config(), |_| {}, |_| {});

        assert!(reload_showcase(&host, "models/second.gltf", 0.5));
        assert!(!h.assets.resolve_model(MODEL, Ok(cube_data())));
        assert!(h.assets.resolve_model("models/second.gltf", Ok(cube_data())));
        h.queue.run_frame();
        assert_eq!(h.tracker.live(ResourceKind::Geometry), 1);
    }

    #[test]
    fn test_starfield_with_negative_spread_still_mounts() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 800), 0);
        let config = StarfieldConfig {
            spread: -10.0,
            count: 5,
            ..starfield_config()
        };
        let starfield = mount_starfield(&h.env, &container, &config);
        h.queue.run_frame();

        assert!(starfield.is_mounted());
        assert_eq!(starfield.summary().unwrap().objects, 1);
        assert_eq!(starfield.frames_rendered(), 1);
    }

    #[test]
    fn test_reload_on_a_starfield_is_refused() {
        let h = Harness::new(800, 800);
        let container = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 800), 0);
        let starfield = mount_starfield(&h.env, &container, &starfield_config());
        assert!(!reload_showcase(&starfield, MODEL, 1.0));
    }

    #[test]
    fn test_showcases_in_separate_bands_do_not_cross_trigger() {
        let h = Harness::new(800, 800);
        let top = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 800, 400), 1);
        let bottom = h.env.window.add_container(SurfaceRect::new(0.0, 400.0, 800, 400), 1);
        let (top_picks, top_pick) = recorder::<PickAction>();
        let (top_hovers, top_hover) = recorder::<bool>();
        let (bottom_picks, bottom_pick) = recorder::<PickAction>();
        let (bottom_hovers, bottom_hover) = recorder::<bool>();
        let a = mount_showcase(&h.env, &top, &showcase_config(), top_pick, top_hover);
        let b = mount_showcase(&h.env, &bottom, &showcase_config(), bottom_pick, bottom_hover);
        assert!(h.assets.resolve_model(MODEL, Ok(cube_data())));
        assert!(h.assets.resolve_model(MODEL, Ok(cube_data())));
        h.queue.run_frame();

        h.env.window.dispatch(&HostEvent::PointerMove { x: 400.0, y: 200.0 });
        h.env.window.dispatch(&HostEvent::Click { x: 400.0, y: 200.0 });

        assert!(a.is_hovered());
        assert!(!b.is_hovered());
        assert_eq!(top_picks.borrow().len(), 1);
        assert_eq!(*top_hovers.borrow(), vec![true]);
        assert!(bottom_picks.borrow().is_empty());
        assert!(bottom_hovers.borrow().is_empty());
        assert!(rotating(&b));
    }

    #[test]
    fn test_window_scoped_dice_only_answer_their_own_rect() {
        let h = Harness::new(1000, 800);
        let top = h.env.window.add_container(SurfaceRect::new(0.0, 0.0, 1000, 400), 1);
        let bottom = h.env.window.add_container(SurfaceRect::new(0.0, 400.0, 1000, 400), 1);
        let config = DiceConfig {
            face_images: Vec::new(),
            ..DiceConfig::default()
        };
        let (top_picks, top_pick) = recorder::<PickAction>();
        let (top_hovers, top_hover) = recorder::<bool>();
        let (bottom_picks, bottom_pick) = recorder::<PickAction>();
        let (bottom_hovers, bottom_hover) = recorder::<bool>();
        let a = mount_dice(&h.env, &top, &config, top_pick, top_hover);
        let b = mount_dice(&h.env, &bottom, &config, bottom_pick, bottom_hover);
        h.queue.run_frame();

        h.env.window.dispatch(&HostEvent::PointerMove { x: 500.0, y: 200.0 });
        h.env.window.dispatch(&HostEvent::Click { x: 500.0, y: 200.0 });

        assert!(a.is_hovered());
        assert!(!b.is_hovered());
        assert!(matches!(top_picks.borrow().as_slice(), [PickAction::ShowMessage(_)]));
        assert!(bottom_picks.borrow().is_empty());
        assert!(bottom_hovers.borrow().is_empty());

        h.env.window.dispatch(&HostEvent::PointerMove { x: 500.0, y: 600.0 });

        assert!(!a.is_hovered());
        assert!(b.is_hovered());
        assert_eq!(*top_hovers.borrow(), vec![true, false]);
        assert_eq!(*bottom_hovers.borrow(), vec![true]);
        assert_eq!(top_picks.borrow().len(), 1);
        assert!(bottom_picks.borrow().is_empty());
    }
}
