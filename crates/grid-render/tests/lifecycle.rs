//! Attach/destroy lifecycle and viewport subscriptions.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::Harness;
use grid_render::SubscribeOptions;
use grid_surface::{RecordingSurface, SurfaceError};

#[test]
fn attach_rejects_broken_context_and_recovers() {
    let h = &mut Harness::new(300.0, 200.0);
    let broken = grid_render::GridSurfaces {
        background: Box::new(RecordingSurface::broken(300.0, 200.0)),
        content: Box::new(RecordingSurface::new(300.0, 200.0, 1.0)),
        selection: Box::new(RecordingSurface::new(300.0, 200.0, 1.0)),
    };
    assert_eq!(
        h.renderer.attach(broken),
        Err(SurfaceError::ContextUnavailable)
    );

    // A later attach with good surfaces succeeds.
    let good = grid_render::GridSurfaces {
        background: Box::new(RecordingSurface::new(300.0, 200.0, 1.0)),
        content: Box::new(RecordingSurface::new(300.0, 200.0, 1.0)),
        selection: Box::new(RecordingSurface::new(300.0, 200.0, 1.0)),
    };
    assert!(h.renderer.attach(good).is_ok());
}

#[test]
fn destroy_is_terminal_and_idempotent() {
    let h = &mut Harness::new(300.0, 200.0);
    h.renderer.set_scroll(50.0, 50.0);
    h.renderer.destroy();
    h.renderer.destroy();

    // Every further call is a no-op.
    h.renderer.set_scroll(99.0, 99.0);
    assert_eq!(h.renderer.get_scroll(), (50.0, 50.0));
    h.renderer.request_render();
    assert!(!h.renderer.has_pending_frame());
    h.renderer.render_immediately();
    assert!(h.renderer.pick_cell_at(10.0, 10.0).is_none());
    assert!(h.renderer.get_range_rects(&grid_model::CellRange::single(0, 0)).is_empty());
}

#[test]
fn request_render_coalesces_to_one_tick() {
    let h = &mut Harness::new(300.0, 200.0);
    h.renderer.render_immediately();
    let before = h.scheduler.borrow().requests;
    h.renderer.set_scroll(10.0, 0.0);
    h.renderer.set_scroll(20.0, 0.0);
    h.renderer.set_scroll(30.0, 0.0);
    // Three mutations, one scheduled frame.
    assert_eq!(h.scheduler.borrow().requests, before + 1);
    assert!(h.scheduler.borrow_mut().take_pending());
    h.renderer.pump_frame();
    assert!(!h.renderer.has_pending_frame());
    // The frame painted the latest state.
    assert_eq!(h.renderer.get_scroll(), (30.0, 0.0));
}

#[test]
fn viewport_subscription_fires_on_layout_never_on_scroll() {
    let h = &mut Harness::new(300.0, 200.0);
    let events: Rc<RefCell<Vec<f64>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    h.renderer.subscribe_viewport(
        Box::new(move |vp| sink.borrow_mut().push(vp.width)),
        SubscribeOptions::default(),
    );

    h.renderer.set_scroll(40.0, 40.0);
    h.renderer.render_immediately();
    assert!(events.borrow().is_empty(), "scroll never notifies");

    h.renderer.set_frozen(1, 1);
    assert_eq!(events.borrow().len(), 1);
    h.renderer.resize(400.0, 200.0, 1.0);
    assert_eq!(events.borrow().len(), 2);
    assert_eq!(*events.borrow().last().unwrap(), 400.0);
    h.renderer.set_zoom(2.0, None);
    assert_eq!(events.borrow().len(), 3);
    h.renderer.set_row_height(3, 50.0).unwrap();
    assert_eq!(events.borrow().len(), 4);
}

#[test]
fn debounced_subscription_waits_for_quiet() {
    let h = &mut Harness::new(300.0, 200.0);
    let count: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    h.renderer.subscribe_viewport(
        Box::new(move |_| *sink.borrow_mut() += 1),
        SubscribeOptions {
            animation_frame: false,
            debounce_ms: Some(100.0),
        },
    );
    h.renderer.set_frozen(1, 0);
    h.renderer.set_frozen(2, 0);
    assert_eq!(*count.borrow(), 0);
    h.clock.advance(150.0);
    h.renderer.pump_frame();
    assert_eq!(*count.borrow(), 1, "coalesced to one delivery after quiet");
}

#[test]
fn unsubscribe_via_provider_token_on_destroy() {
    // Destroying releases the provider subscription: later invalidations
    // reach no listener.
    let h = &mut Harness::new(300.0, 200.0);
    h.renderer.destroy();
    h.provider.notify(grid_model::ProviderUpdate::InvalidateAll);
    // Nothing to assert beyond "no panic": the listener list is empty.
}
