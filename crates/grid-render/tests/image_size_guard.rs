//! Header guards stop decompression bombs before any decoder runs.

mod common;

use std::any::Any;
use std::cell::Cell as StdCell;
use std::rc::Rc;

use common::{find_ops, Harness};
use grid_image::{BitmapDecoder, ImageError, ImageReply, ImageResolver, ImageSource, ImageState};
use grid_model::{Cell, CellImage};
use grid_surface::{Bitmap, RecordedOp};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut b = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    b.extend_from_slice(&13u32.to_be_bytes());
    b.extend_from_slice(b"IHDR");
    b.extend_from_slice(&width.to_be_bytes());
    b.extend_from_slice(&height.to_be_bytes());
    b.extend_from_slice(&[8, 6, 0, 0, 0]);
    b
}

struct BytesResolver {
    bytes: Vec<u8>,
}

impl ImageResolver for BytesResolver {
    fn resolve(&self, _id: &str, reply: ImageReply) {
        reply.complete(Ok(ImageSource::Bytes(self.bytes.clone())));
    }
}

struct SmallBitmap;

impl Bitmap for SmallBitmap {
    fn width(&self) -> u32 {
        4
    }
    fn height(&self) -> u32 {
        4
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
struct CountingDecoder {
    calls: Rc<StdCell<usize>>,
}

impl BitmapDecoder for CountingDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<Box<dyn Bitmap>, ImageError> {
        self.calls.set(self.calls.get() + 1);
        Ok(Box::new(SmallBitmap))
    }
}

fn image_cell(id: &str, alt: &str) -> Cell {
    Cell {
        image: Some(CellImage {
            id: id.into(),
            alt: Some(alt.into()),
        }),
        ..Cell::default()
    }
}

#[test]
fn bomb_png_enters_error_state_and_paints_placeholder() {
    let decoder = CountingDecoder::default();
    let calls = Rc::clone(&decoder.calls);
    let h = &mut Harness::with_images(
        600.0,
        400.0,
        Rc::new(BytesResolver {
            bytes: png_bytes(20_000, 20_000),
        }),
        Box::new(decoder),
    );
    h.provider.set_cell(0, 0, image_cell("bomb", "big image"));
    h.clear_logs();
    // First frame schedules the decode and paints the placeholder; the
    // completion lands on the next frame.
    h.renderer.render_immediately();
    h.renderer.render_immediately();

    assert_eq!(h.renderer.image_cache_state("bomb"), Some(ImageState::Error));
    assert_eq!(calls.get(), 0, "platform decoder never saw the bytes");

    // Placeholder: no bitmap draw, alt text shown.
    let bitmaps = find_ops(&h.content_ops, |op| {
        matches!(op, RecordedOp::DrawBitmap { .. })
    });
    assert!(bitmaps.is_empty());
    let alt = find_ops(&h.content_ops, |op| {
        matches!(op, RecordedOp::FillText { text, .. } if text == "big image")
    });
    assert!(!alt.is_empty(), "alt label drawn with the placeholder");
}

#[test]
fn small_png_decodes_and_draws() {
    let decoder = CountingDecoder::default();
    let calls = Rc::clone(&decoder.calls);
    let h = &mut Harness::with_images(
        600.0,
        400.0,
        Rc::new(BytesResolver {
            bytes: png_bytes(4, 4),
        }),
        Box::new(decoder),
    );
    h.provider.set_cell(0, 0, image_cell("ok", "thumb"));
    h.renderer.render_immediately();
    h.clear_logs();
    h.renderer.render_immediately();

    assert_eq!(h.renderer.image_cache_state("ok"), Some(ImageState::Ready));
    assert_eq!(calls.get(), 1);
    let bitmaps = find_ops(&h.content_ops, |op| {
        matches!(op, RecordedOp::DrawBitmap { src_w: 4, src_h: 4, .. })
    });
    assert!(!bitmaps.is_empty(), "decoded bitmap drawn");
}

#[test]
fn image_completion_marks_content_dirty() {
    let decoder = CountingDecoder::default();
    let h = &mut Harness::with_images(
        600.0,
        400.0,
        Rc::new(BytesResolver {
            bytes: png_bytes(4, 4),
        }),
        Box::new(decoder),
    );
    h.provider.set_cell(0, 0, image_cell("a", ""));
    h.renderer.render_immediately();
    // The completion sits in the channel; the next frame integrates it and
    // repaints content.
    h.renderer.render_immediately();
    let stats = h.renderer.get_perf_stats();
    assert!(stats.dirty_rects.content > 0, "completion repaints content");
}
