//! Headless demo: builds a scrolling list scene, drives a few frames, and
//! reports how the raster cache behaves when only the scroll offset moves.

use std::sync::Arc;

use pictor::{
    Color, ElementKind, FlexDirection, FramePacer, HeadlessHost, NativePointerEvent, Pipeline,
    PointerType, Px, PxPosition, PxSize, SurfaceHost, text::FixedAdvanceShaper,
};
use tracing::info;

fn main() {
    pictor::init_tracing();

    let mut host = HeadlessHost::default();
    let surface = host.create_surface(PxSize::new(Px(480.0), Px(320.0)), 2.0);
    let mut pipeline = Pipeline::new(
        surface,
        FramePacer::new(),
        Box::new(FixedAdvanceShaper::default()),
    );

    let root = pipeline.create_element(ElementKind::View);
    pipeline.set_root(root);

    let list = pipeline.create_element(ElementKind::ScrollView);
    pipeline.set_size(list, PxSize::new(Px(480.0), Px(280.0)));
    pipeline.append_child(root, list);

    let column = pipeline.create_element(ElementKind::Flex);
    pipeline.set_flex_direction(column, FlexDirection::Column);
    pipeline.set_gap(column, Px(8.0));
    pipeline.set_repaint_boundary(column, true);
    pipeline.append_child(list, column);

    for row in 0u8..24 {
        let card = pipeline.create_element(ElementKind::RRect);
        pipeline.set_size(card, PxSize::new(Px(464.0), Px(48.0)));
        pipeline.set_corner_radius(card, 6.0);
        pipeline.set_fill(card, Some(Color::from_rgb_u8(30 + row * 9, 90, 160)));
        pipeline.append_child(column, card);
    }

    let label = pipeline.create_element(ElementKind::Text);
    pipeline.set_text(label, "pictor headless demo");
    pipeline.set_offset(label, PxPosition::new(Px(8.0), Px(288.0)));
    pipeline.append_child(root, label);

    pipeline.add_listener(
        list,
        PointerType::Wheel,
        Arc::new(|event| {
            info!(dy = event.wheel_delta_y, "wheel over the list");
        }),
        false,
    );

    let frame = pipeline.pump().expect("initial frame is scheduled");
    info!(layers = frame.items.len(), "first frame composited");

    for step in 1u32..=5 {
        pipeline.set_scroll_offset(list, PxPosition::new(Px::ZERO, Px(step as f32 * 40.0)));
        pipeline.push_pointer_event(NativePointerEvent::wheel(
            1,
            PxPosition::new(Px(240.0), Px(140.0)),
            0.0,
            -40.0,
        ));
        if let Some(frame) = pipeline.pump() {
            let cached = frame.items.iter().filter(|item| item.from_cache).count();
            info!(
                step,
                layers = frame.items.len(),
                cached,
                "scrolled by translation only"
            );
        }
    }

    let stats = pipeline.cache().stats();
    info!(hits = stats.hits, misses = stats.misses, "raster cache totals");
}
