//! Decode scheduling and the bitmap cache.
//!
//! One decode is scheduled per unique image id. The resolver completes onto
//! a bounded channel; the cache (whose single reader is the renderer's frame
//! pass) integrates completions, runs the header guard, invokes the injected
//! decoder, and tracks per-id state:
//!
//! `pending` → resolver running · `ready` → bitmap available · `missing` →
//! resolver answered null · `error` → guard rejection or decode failure,
//! retryable after the configured window.
//!
//! Ready bitmaps are LRU-evicted once their count exceeds the cap; evicted
//! and cleared bitmaps get `close()`d. Completions arriving after `clear`
//! (teardown) are discarded by channel disconnect and the resolver side
//! drops the bitmap.

use ahash::AHashMap;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use grid_model::LruCache;
use grid_surface::{Bitmap, Clock};
use tracing::{debug, warn};

use crate::headers::{sniff_dimensions, ImageError};

const COMPLETION_CHANNEL_CAP: usize = 256;

/// What a resolver can hand back for an image id.
pub enum ImageSource {
    /// Already-decoded bitmap (dimension guard still applies).
    Decoded(Box<dyn Bitmap>),
    /// Encoded bytes; the header guard runs before the decoder sees them.
    Bytes(Vec<u8>),
    /// The image does not exist.
    Missing,
}

/// Completion handle passed to the resolver. Completing after the cache was
/// torn down is harmless: the send fails and the payload drops.
pub struct ImageReply {
    id: String,
    tx: Sender<(String, Result<ImageSource, String>)>,
}

impl ImageReply {
    pub fn complete(self, result: Result<ImageSource, String>) {
        if let Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) =
            self.tx.try_send((self.id, result))
        {
            // Receiver gone (renderer destroyed) or backlogged beyond the
            // cap; either way the result is dropped and Drop closes any
            // bitmap it carried.
        }
    }
}

/// Starts an asynchronous fetch/decode for an image id.
pub trait ImageResolver {
    fn resolve(&self, id: &str, reply: ImageReply);
}

/// Platform decoder seam. `decode` sees only bytes that passed the header
/// guard. `decode_fallback` is the secondary path for recoverable primary
/// failures (e.g. a PNG subformat the fast decoder rejects); the default
/// declines.
pub trait BitmapDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Bitmap>, ImageError>;

    fn decode_fallback(&self, _bytes: &[u8]) -> Result<Box<dyn Bitmap>, ImageError> {
        Err(ImageError::DecodeFailed {
            reason: "no fallback decoder".into(),
            recoverable: false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Pending,
    Ready,
    Missing,
    Error,
}

struct ImageEntry {
    state: ImageState,
    bitmap: Option<Box<dyn Bitmap>>,
    error: Option<String>,
    /// For `Error` entries: when a retry becomes allowed.
    expires_at_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCacheConfig {
    pub max_ready: usize,
    pub max_dimension: u32,
    pub max_pixels: u64,
    pub retry_ms: f64,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_ready: 128,
            max_dimension: crate::headers::MAX_DIMENSION,
            max_pixels: crate::headers::MAX_PIXELS,
            retry_ms: 250.0,
        }
    }
}

pub struct ImageCache {
    entries: AHashMap<String, ImageEntry>,
    /// Touch order over `Ready` ids only.
    ready_lru: LruCache<String, ()>,
    config: ImageCacheConfig,
    tx: Sender<(String, Result<ImageSource, String>)>,
    rx: Receiver<(String, Result<ImageSource, String>)>,
}

impl ImageCache {
    pub fn new(config: ImageCacheConfig) -> Self {
        let (tx, rx) = bounded(COMPLETION_CHANNEL_CAP);
        Self {
            entries: AHashMap::new(),
            ready_lru: LruCache::new(),
            config,
            tx,
            rx,
        }
    }

    pub fn state(&self, id: &str) -> Option<ImageState> {
        self.entries.get(id).map(|e| e.state)
    }

    pub fn error(&self, id: &str) -> Option<&str> {
        self.entries.get(id).and_then(|e| e.error.as_deref())
    }

    pub fn ready_count(&self) -> usize {
        self.ready_lru.len()
    }

    /// The bitmap for a ready id, touching it in the LRU.
    pub fn bitmap(&mut self, id: &str) -> Option<&dyn Bitmap> {
        let entry = self.entries.get(id)?;
        if entry.state != ImageState::Ready {
            return None;
        }
        self.ready_lru.get(&id.to_string());
        self.entries.get(id)?.bitmap.as_deref()
    }

    /// Ensure a decode is scheduled for `id`. Returns the current state.
    /// Error entries re-schedule once their retry window has elapsed.
    pub fn request(
        &mut self,
        id: &str,
        resolver: Option<&dyn ImageResolver>,
        clock: &dyn Clock,
    ) -> ImageState {
        if let Some(entry) = self.entries.get(id) {
            let retry = entry.state == ImageState::Error
                && entry
                    .expires_at_ms
                    .is_some_and(|expiry| clock.now_ms() >= expiry);
            if !retry {
                return entry.state;
            }
        }
        let Some(resolver) = resolver else {
            self.entries.insert(
                id.to_string(),
                ImageEntry {
                    state: ImageState::Missing,
                    bitmap: None,
                    error: None,
                    expires_at_ms: None,
                },
            );
            return ImageState::Missing;
        };
        self.entries.insert(
            id.to_string(),
            ImageEntry {
                state: ImageState::Pending,
                bitmap: None,
                error: None,
                expires_at_ms: None,
            },
        );
        resolver.resolve(
            id,
            ImageReply {
                id: id.to_string(),
                tx: self.tx.clone(),
            },
        );
        ImageState::Pending
    }

    /// Integrate resolver completions. Returns the ids that changed state,
    /// which the renderer turns into content dirty rects.
    pub fn drain_completions(&mut self, decoder: &dyn BitmapDecoder, clock: &dyn Clock) -> Vec<String> {
        let mut changed = Vec::new();
        while let Ok((id, result)) = self.rx.try_recv() {
            // Stale completion for an id that was invalidated meanwhile.
            if !self.entries.contains_key(&id) {
                continue;
            }
            let entry = self.integrate(&id, result, decoder, clock);
            self.entries.insert(id.clone(), entry);
            if self.entries[&id].state == ImageState::Ready {
                self.ready_lru.insert(id.clone(), ());
                self.evict_over_cap();
            }
            changed.push(id);
        }
        changed
    }

    fn integrate(
        &self,
        id: &str,
        result: Result<ImageSource, String>,
        decoder: &dyn BitmapDecoder,
        clock: &dyn Clock,
    ) -> ImageEntry {
        match result {
            Ok(ImageSource::Missing) => ImageEntry {
                state: ImageState::Missing,
                bitmap: None,
                error: None,
                expires_at_ms: None,
            },
            Ok(ImageSource::Decoded(bitmap)) => {
                let dims = crate::headers::ImageDimensions {
                    width: bitmap.width(),
                    height: bitmap.height(),
                };
                match dims.check(self.config.max_dimension, self.config.max_pixels) {
                    Ok(()) => ImageEntry {
                        state: ImageState::Ready,
                        bitmap: Some(bitmap),
                        error: None,
                        expires_at_ms: None,
                    },
                    Err(e) => {
                        let mut bitmap = bitmap;
                        bitmap.close();
                        warn!(id, error = %e, "decoded image rejected by size guard");
                        self.error_entry(e.to_string(), clock)
                    }
                }
            }
            Ok(ImageSource::Bytes(bytes)) => {
                if let Some(dims) = sniff_dimensions(&bytes)
                    && let Err(e) = dims.check(self.config.max_dimension, self.config.max_pixels)
                {
                    warn!(id, error = %e, "image rejected before decode");
                    return self.error_entry(e.to_string(), clock);
                }
                match decoder.decode(&bytes) {
                    Ok(bitmap) => ImageEntry {
                        state: ImageState::Ready,
                        bitmap: Some(bitmap),
                        error: None,
                        expires_at_ms: None,
                    },
                    Err(ImageError::DecodeFailed { reason, recoverable }) if recoverable => {
                        debug!(id, reason = %reason, "primary decode failed, trying fallback");
                        match decoder.decode_fallback(&bytes) {
                            Ok(bitmap) => ImageEntry {
                                state: ImageState::Ready,
                                bitmap: Some(bitmap),
                                error: None,
                                expires_at_ms: None,
                            },
                            Err(e) => self.error_entry(e.to_string(), clock),
                        }
                    }
                    Err(e) => self.error_entry(e.to_string(), clock),
                }
            }
            Err(reason) => self.error_entry(reason, clock),
        }
    }

    fn error_entry(&self, reason: String, clock: &dyn Clock) -> ImageEntry {
        ImageEntry {
            state: ImageState::Error,
            bitmap: None,
            error: Some(reason),
            expires_at_ms: Some(clock.now_ms() + self.config.retry_ms),
        }
    }

    fn evict_over_cap(&mut self) {
        while self.ready_lru.len() > self.config.max_ready {
            let Some((id, ())) = self.ready_lru.pop_oldest() else {
                break;
            };
            if let Some(mut entry) = self.entries.remove(&id)
                && let Some(bitmap) = entry.bitmap.as_mut()
            {
                bitmap.close();
            }
        }
    }

    /// Drop one id (provider invalidation); a later paint re-requests it.
    pub fn invalidate(&mut self, id: &str) {
        if let Some(mut entry) = self.entries.remove(id)
            && let Some(bitmap) = entry.bitmap.as_mut()
        {
            bitmap.close();
        }
        self.ready_lru.remove(&id.to_string());
    }

    /// Teardown: clear everything and disconnect the completion channel, so
    /// a resolver finishing later fails its send and drops the bitmap.
    pub fn shutdown(&mut self) {
        self.clear();
        let (tx, rx) = bounded(COMPLETION_CHANNEL_CAP);
        self.tx = tx;
        self.rx = rx;
    }

    /// Drop everything, closing bitmaps.
    pub fn clear(&mut self) {
        for (_, entry) in self.entries.iter_mut() {
            if let Some(bitmap) = entry.bitmap.as_mut() {
                bitmap.close();
            }
        }
        self.entries.clear();
        self.ready_lru.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_surface::ManualClock;
    use std::any::Any;
    use std::cell::Cell;
    use std::rc::Rc;

    struct TestBitmap {
        w: u32,
        h: u32,
        closed: Rc<Cell<bool>>,
    }

    impl Bitmap for TestBitmap {
        fn width(&self) -> u32 {
            self.w
        }
        fn height(&self) -> u32 {
            self.h
        }
        fn close(&mut self) {
            self.closed.set(true);
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Resolver that synchronously completes with a preset source.
    struct InstantResolver<F: Fn() -> Result<ImageSource, String>> {
        make: F,
        calls: Cell<usize>,
    }

    impl<F: Fn() -> Result<ImageSource, String>> ImageResolver for InstantResolver<F> {
        fn resolve(&self, _id: &str, reply: ImageReply) {
            self.calls.set(self.calls.get() + 1);
            reply.complete((self.make)());
        }
    }

    struct CountingDecoder {
        calls: Cell<usize>,
    }

    impl BitmapDecoder for CountingDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<Box<dyn Bitmap>, ImageError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Box::new(TestBitmap {
                w: 10,
                h: 10,
                closed: Rc::new(Cell::new(false)),
            }))
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut b = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        b.extend_from_slice(&13u32.to_be_bytes());
        b.extend_from_slice(b"IHDR");
        b.extend_from_slice(&width.to_be_bytes());
        b.extend_from_slice(&height.to_be_bytes());
        b.extend_from_slice(&[8, 6, 0, 0, 0]);
        b
    }

    #[test]
    fn bomb_png_errors_without_decoding() {
        let clock = ManualClock::new();
        let mut cache = ImageCache::new(ImageCacheConfig::default());
        let resolver = InstantResolver {
            make: || Ok(ImageSource::Bytes(png_bytes(20_000, 20_000))),
            calls: Cell::new(0),
        };
        let decoder = CountingDecoder {
            calls: Cell::new(0),
        };
        assert_eq!(
            cache.request("bomb", Some(&resolver), &clock),
            ImageState::Pending
        );
        let changed = cache.drain_completions(&decoder, &clock);
        assert_eq!(changed, vec!["bomb".to_string()]);
        assert_eq!(cache.state("bomb"), Some(ImageState::Error));
        assert_eq!(decoder.calls.get(), 0, "platform decoder never invoked");
    }

    #[test]
    fn retry_window_gates_rescheduling() {
        let clock = ManualClock::new();
        let mut cache = ImageCache::new(ImageCacheConfig {
            retry_ms: 250.0,
            ..Default::default()
        });
        let resolver = InstantResolver {
            make: || Err("boom".to_string()),
            calls: Cell::new(0),
        };
        let decoder = CountingDecoder {
            calls: Cell::new(0),
        };
        cache.request("x", Some(&resolver), &clock);
        cache.drain_completions(&decoder, &clock);
        assert_eq!(cache.state("x"), Some(ImageState::Error));
        // Inside the window the error state holds.
        clock.advance(100.0);
        cache.request("x", Some(&resolver), &clock);
        assert_eq!(resolver.calls.get(), 1);
        // Past the window a new decode is scheduled.
        clock.advance(200.0);
        assert_eq!(
            cache.request("x", Some(&resolver), &clock),
            ImageState::Pending
        );
        assert_eq!(resolver.calls.get(), 2);
    }

    #[test]
    fn single_decode_per_id() {
        let clock = ManualClock::new();
        let mut cache = ImageCache::new(ImageCacheConfig::default());
        let resolver = InstantResolver {
            make: || Ok(ImageSource::Bytes(png_bytes(8, 8))),
            calls: Cell::new(0),
        };
        let decoder = CountingDecoder {
            calls: Cell::new(0),
        };
        cache.request("a", Some(&resolver), &clock);
        cache.request("a", Some(&resolver), &clock);
        cache.drain_completions(&decoder, &clock);
        cache.request("a", Some(&resolver), &clock);
        assert_eq!(resolver.calls.get(), 1);
        assert_eq!(cache.state("a"), Some(ImageState::Ready));
    }

    #[test]
    fn lru_eviction_closes_bitmaps() {
        let clock = ManualClock::new();
        let mut cache = ImageCache::new(ImageCacheConfig {
            max_ready: 2,
            ..Default::default()
        });
        let closed_flags: Vec<Rc<Cell<bool>>> =
            (0..3).map(|_| Rc::new(Cell::new(false))).collect();
        let decoder = CountingDecoder {
            calls: Cell::new(0),
        };
        for (i, flag) in closed_flags.iter().enumerate() {
            let flag = Rc::clone(flag);
            let resolver = InstantResolver {
                make: move || {
                    Ok(ImageSource::Decoded(Box::new(TestBitmap {
                        w: 4,
                        h: 4,
                        closed: Rc::clone(&flag),
                    })))
                },
                calls: Cell::new(0),
            };
            cache.request(&format!("img-{i}"), Some(&resolver), &clock);
            cache.drain_completions(&decoder, &clock);
        }
        assert_eq!(cache.ready_count(), 2);
        assert!(closed_flags[0].get(), "oldest bitmap closed on eviction");
        assert!(!closed_flags[2].get());
        assert_eq!(cache.state("img-0"), None);
    }

    #[test]
    fn missing_resolver_marks_missing() {
        let clock = ManualClock::new();
        let mut cache = ImageCache::new(ImageCacheConfig::default());
        assert_eq!(cache.request("x", None, &clock), ImageState::Missing);
    }

    #[test]
    fn late_completion_after_shutdown_is_discarded() {
        struct DropBitmap {
            dropped: Rc<Cell<bool>>,
        }
        impl Drop for DropBitmap {
            fn drop(&mut self) {
                self.dropped.set(true);
            }
        }
        impl Bitmap for DropBitmap {
            fn width(&self) -> u32 {
                1
            }
            fn height(&self) -> u32 {
                1
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        /// Stashes the reply instead of completing, so the test can finish
        /// the "async" decode after teardown.
        struct StashResolver {
            reply: std::cell::RefCell<Option<ImageReply>>,
        }
        impl ImageResolver for StashResolver {
            fn resolve(&self, _id: &str, reply: ImageReply) {
                *self.reply.borrow_mut() = Some(reply);
            }
        }

        let clock = ManualClock::new();
        let mut cache = ImageCache::new(ImageCacheConfig::default());
        let resolver = StashResolver {
            reply: std::cell::RefCell::new(None),
        };
        cache.request("late", Some(&resolver), &clock);
        cache.shutdown();

        let dropped = Rc::new(Cell::new(false));
        let reply = resolver.reply.borrow_mut().take().expect("reply stashed");
        reply.complete(Ok(ImageSource::Decoded(Box::new(DropBitmap {
            dropped: Rc::clone(&dropped),
        }))));
        assert!(dropped.get(), "post-teardown completion drops its bitmap");
        assert_eq!(cache.state("late"), None);
    }

    #[test]
    fn clear_closes_everything() {
        let clock = ManualClock::new();
        let mut cache = ImageCache::new(ImageCacheConfig::default());
        let closed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&closed);
        let resolver = InstantResolver {
            make: move || {
                Ok(ImageSource::Decoded(Box::new(TestBitmap {
                    w: 2,
                    h: 2,
                    closed: Rc::clone(&flag),
                })))
            },
            calls: Cell::new(0),
        };
        let decoder = CountingDecoder {
            calls: Cell::new(0),
        };
        cache.request("a", Some(&resolver), &clock);
        cache.drain_completions(&decoder, &clock);
        cache.clear();
        assert!(closed.get());
        assert_eq!(cache.state("a"), None);
    }
}
