//! GIF87a/89a decoder with frame compositing
//!
//! [`GifDecoder`] draws one frame per [`next_frame`](GifDecoder::next_frame)
//! call and never sleeps. [`load`] and [`load_with_cancel`] wrap it in a
//! blocking playback loop.

pub mod lzw;

use core::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use pjpeg::ByteSource;

use crate::config::GifConfig;
use crate::error::{Error, Result};
use crate::sink::{rgb, PixelSink};
use crate::utils::{le_u16, read_exact, read_u8, skip_exact};

use self::lzw::Lzw;

mod blocks {
    pub const IMAGE: u8 = 0x2C; // Image descriptor
    pub const EXTENSION: u8 = 0x21;
    pub const TRAILER: u8 = 0x3B;

    pub const PLAIN_TEXT: u8 = 0x01;
    pub const GRAPHIC_CONTROL: u8 = 0xF9;
    pub const COMMENT: u8 = 0xFE;
    pub const APPLICATION: u8 = 0xFF;
}

const INTERLACE_STEP: [u32; 4] = [8, 8, 4, 2];
const INTERLACE_START: [u32; 4] = [0, 4, 2, 1];

/// Frame disposal method from the graphic control extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposal {
    #[default]
    Unspecified,
    Keep,
    RestoreBackground,
    RestorePrevious,
    Reserved(u8),
}

impl Disposal {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Disposal::Unspecified,
            1 => Disposal::Keep,
            2 => Disposal::RestoreBackground,
            3 => Disposal::RestorePrevious,
            n => Disposal::Reserved(n),
        }
    }
}

/// Frame bounds relative to the logical screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// A frame that has been drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub index: usize,
    pub rect: FrameRect,
    pub delay_ms: u32,
    pub disposal: Disposal,
    pub transparent: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub flags: u8,
    pub background: u8,
}

impl ScreenDescriptor {
    pub fn has_global_table(&self) -> bool {
        self.flags & 0x80 != 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GraphicControl {
    disposal: Disposal,
    transparent: Option<u8>,
    delay: u16,
}

type Palette = [u32; 256];

pub struct GifDecoder<'s, S: ?Sized> {
    src: &'s mut S,
    screen: ScreenDescriptor,
    global: Palette,
    local: Palette,
    use_local: bool,
    lzw: Lzw,
    previous: Option<(FrameRect, Disposal)>,
    frames: usize,
    done: bool,
    default_delay_ms: u32,
}

impl<'s, S: ByteSource + ?Sized> GifDecoder<'s, S> {
    /// Check the signature and read the logical screen and global table
    pub fn open(src: &'s mut S, config: &GifConfig) -> Result<Self> {
        let mut sig = [0u8; 6];
        read_exact(src, &mut sig)?;
        if &sig != b"GIF87a" && &sig != b"GIF89a" {
            return Err(Error::BadSignature);
        }

        let mut lsd = [0u8; 7];
        read_exact(src, &mut lsd)?;
        let screen = ScreenDescriptor {
            width: le_u16(&lsd, 0),
            height: le_u16(&lsd, 2),
            flags: lsd[4],
            background: lsd[5],
        };

        let mut global = [0u32; 256];
        if screen.has_global_table() {
            read_palette(src, &mut global, 2usize << (screen.flags & 7))?;
        }
        info!(
            "gif {}x{} global table: {}",
            screen.width,
            screen.height,
            screen.has_global_table()
        );

        Ok(Self {
            src,
            screen,
            global,
            local: [0; 256],
            use_local: false,
            lzw: Lzw::new(),
            previous: None,
            frames: 0,
            done: false,
            default_delay_ms: config.default_delay_ms,
        })
    }

    pub fn screen(&self) -> &ScreenDescriptor {
        &self.screen
    }

    /// Frames drawn so far
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Background colour from the global table
    pub fn background_color(&self) -> u32 {
        self.global[self.screen.background as usize]
    }

    /// Draw the next frame with the logical screen at (x0, y0).
    ///
    /// Returns `None` at the trailer. After an error the decoder is finished
    /// and keeps returning `None`.
    pub fn next_frame<P: PixelSink + ?Sized>(
        &mut self,
        sink: &mut P,
        x0: i32,
        y0: i32,
    ) -> Result<Option<Frame>> {
        if self.done {
            return Ok(None);
        }
        let result = self.read_blocks(sink, x0, y0);
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn read_blocks<P: PixelSink + ?Sized>(
        &mut self,
        sink: &mut P,
        x0: i32,
        y0: i32,
    ) -> Result<Option<Frame>> {
        let mut control = GraphicControl::default();
        loop {
            let mut intro = [0u8; 1];
            if self.src.read(&mut intro)? == 0 {
                warn!("gif ended without trailer");
                return Ok(None);
            }
            match intro[0] {
                blocks::EXTENSION => self.read_extension(&mut control)?,
                blocks::IMAGE => return self.draw_image(sink, x0, y0, &control).map(Some),
                blocks::TRAILER => {
                    debug!("gif trailer after {} frames", self.frames);
                    return Ok(None);
                }
                other => return Err(Error::UnknownBlock(other)),
            }
        }
    }

    fn read_extension(&mut self, control: &mut GraphicControl) -> Result<()> {
        let label = read_u8(self.src)?;
        match label {
            blocks::GRAPHIC_CONTROL => {
                if read_u8(self.src)? != 4 {
                    return Err(Error::BadBlock);
                }
                let mut b = [0u8; 4];
                read_exact(self.src, &mut b)?;
                control.disposal = Disposal::from_bits((b[0] >> 2) & 7);
                control.transparent = (b[0] & 1 != 0).then_some(b[3]);
                control.delay = le_u16(&b, 1);
                if read_u8(self.src)? != 0 {
                    return Err(Error::BadBlock);
                }
                debug!("gif control {control:?}");
            }
            blocks::PLAIN_TEXT | blocks::COMMENT | blocks::APPLICATION => {
                debug!("gif skip extension {label:#04x}");
                skip_sub_blocks(self.src)?;
            }
            _ => {
                warn!("gif unknown extension {label:#04x}");
                skip_sub_blocks(self.src)?;
            }
        }
        Ok(())
    }

    fn draw_image<P: PixelSink + ?Sized>(
        &mut self,
        sink: &mut P,
        x0: i32,
        y0: i32,
        control: &GraphicControl,
    ) -> Result<Frame> {
        let mut d = [0u8; 9];
        read_exact(self.src, &mut d)?;
        let rect = FrameRect {
            x: le_u16(&d, 0),
            y: le_u16(&d, 2),
            width: le_u16(&d, 4),
            height: le_u16(&d, 6),
        };
        let flags = d[8];

        if flags & 0x80 != 0 {
            read_palette(self.src, &mut self.local, 2usize << (flags & 7))?;
            self.use_local = true;
        }

        if let Some((prev, Disposal::RestoreBackground)) = self.previous {
            clear_delta(sink, x0, y0, &prev, &rect, self.background_color());
        }
        if control.disposal == Disposal::RestorePrevious {
            debug!("gif restore-previous drawn as keep");
        }

        self.lzw.reset(read_u8(self.src)?)?;
        let complete = self.draw_pixels(sink, x0 + rect.x as i32, y0 + rect.y as i32, &rect, flags & 0x40 != 0, control)?;
        if !complete {
            debug!("gif frame {} image data ended early", self.frames);
        }
        if !self.lzw.exhausted() {
            skip_sub_blocks(self.src)?;
        }

        self.use_local = false;
        self.previous = Some((rect, control.disposal));
        let frame = Frame {
            index: self.frames,
            rect,
            delay_ms: match control.delay {
                0 => self.default_delay_ms,
                n => n as u32 * 10,
            },
            disposal: control.disposal,
            transparent: control.transparent,
        };
        self.frames += 1;
        debug!("gif frame {frame:?}");
        Ok(frame)
    }

    /// Returns false when the LZW data ends before the frame is filled
    fn draw_pixels<P: PixelSink + ?Sized>(
        &mut self,
        sink: &mut P,
        x: i32,
        y: i32,
        rect: &FrameRect,
        interlaced: bool,
        control: &GraphicControl,
    ) -> Result<bool> {
        let palette = if self.use_local { &self.local } else { &self.global };
        let background = self.global[self.screen.background as usize];
        let painter = RowPainter {
            palette,
            background,
            transparent: control.transparent,
            fill_transparent: control.disposal == Disposal::RestoreBackground,
        };

        // u32 so the last interlace step past a 65535-row frame cannot wrap
        let mut row = 0u32;
        let mut pass = 0;
        for _ in 0..rect.height {
            let line_y = y + row as i32;

            let mut run: Option<(u16, u8)> = None;
            for col in 0..rect.width {
                let Some(index) = self.lzw.next_index(self.src)? else {
                    if let Some((start, idx)) = run {
                        painter.paint(sink, x, line_y, start, col, idx);
                    }
                    return Ok(false);
                };
                match run {
                    Some((_, idx)) if idx == index => {}
                    Some((start, idx)) => {
                        painter.paint(sink, x, line_y, start, col, idx);
                        run = Some((col, index));
                    }
                    None => run = Some((col, index)),
                }
            }
            if let Some((start, idx)) = run {
                painter.paint(sink, x, line_y, start, rect.width, idx);
            }

            if interlaced {
                row += INTERLACE_STEP[pass];
                while row >= rect.height as u32 && pass < 3 {
                    pass += 1;
                    row = INTERLACE_START[pass];
                }
            } else {
                row += 1;
            }
        }
        Ok(true)
    }
}

struct RowPainter<'a> {
    palette: &'a Palette,
    background: u32,
    transparent: Option<u8>,
    fill_transparent: bool,
}

impl RowPainter<'_> {
    /// Draw columns `start..end` of one row in a single colour
    fn paint<P: PixelSink + ?Sized>(&self, sink: &mut P, x: i32, y: i32, start: u16, end: u16, index: u8) {
        let color = if self.transparent == Some(index) {
            if !self.fill_transparent {
                return;
            }
            self.background
        } else {
            self.palette[index as usize]
        };
        let len = end - start;
        if len == 1 {
            sink.set_pixel(x + start as i32, y, color);
        } else {
            sink.fill_rect(x + start as i32, y, len as u32, 1, color);
        }
    }
}

/// Fill the parts of `prev` not covered by `cur` with `color`
fn clear_delta<P: PixelSink + ?Sized>(
    sink: &mut P,
    x0: i32,
    y0: i32,
    prev: &FrameRect,
    cur: &FrameRect,
    color: u32,
) {
    let (px0, py0) = (prev.x as i32, prev.y as i32);
    let (px1, py1) = (px0 + prev.width as i32, py0 + prev.height as i32);
    let (cx0, cy0) = (cur.x as i32, cur.y as i32);
    let (cx1, cy1) = (cx0 + cur.width as i32, cy0 + cur.height as i32);

    let mut fill = |x: i32, y: i32, w: i32, h: i32| {
        if w > 0 && h > 0 {
            sink.fill_rect(x0 + x, y0 + y, w as u32, h as u32, color);
        }
    };

    // above and below span the full previous width
    if cy0 > py0 {
        fill(px0, py0, px1 - px0, cy0.min(py1) - py0);
    }
    if cy1 < py1 {
        let top = cy1.max(py0);
        fill(px0, top, px1 - px0, py1 - top);
    }

    let band0 = py0.max(cy0);
    let band1 = py1.min(cy1);
    if band1 > band0 {
        if cx0 > px0 {
            fill(px0, band0, cx0.min(px1) - px0, band1 - band0);
        }
        if cx1 < px1 {
            let left = cx1.max(px0);
            fill(left, band0, px1 - left, band1 - band0);
        }
    }
}

fn read_palette<S: ByteSource + ?Sized>(src: &mut S, table: &mut Palette, count: usize) -> Result<()> {
    *table = [0; 256];
    let mut entry = [0u8; 3];
    for slot in table.iter_mut().take(count) {
        read_exact(src, &mut entry)?;
        *slot = rgb(entry[0], entry[1], entry[2]);
    }
    Ok(())
}

fn skip_sub_blocks<S: ByteSource + ?Sized>(src: &mut S) -> Result<()> {
    loop {
        let len = read_u8(src)?;
        if len == 0 {
            return Ok(());
        }
        skip_exact(src, len as usize)?;
    }
}

/// Play every frame at (x, y), sleeping for each frame's delay.
///
/// Returns the number of frames drawn.
pub fn load<S, P>(
    src: &mut S,
    sink: &mut P,
    x: i32,
    y: i32,
    config: &GifConfig,
    on_frame: Option<&mut dyn FnMut(&Frame)>,
) -> Result<usize>
where
    S: ByteSource + ?Sized,
    P: PixelSink + ?Sized,
{
    load_with_cancel(src, sink, x, y, config, on_frame, &AtomicBool::new(false))
}

/// Like [`load`], stopping after the current frame once `cancel` is set.
///
/// The flag is polled once per `tick_ms` of each frame delay.
pub fn load_with_cancel<S, P>(
    src: &mut S,
    sink: &mut P,
    x: i32,
    y: i32,
    config: &GifConfig,
    mut on_frame: Option<&mut dyn FnMut(&Frame)>,
    cancel: &AtomicBool,
) -> Result<usize>
where
    S: ByteSource + ?Sized,
    P: PixelSink + ?Sized,
{
    let result = play(src, sink, x, y, config, &mut on_frame, cancel);
    if let Err(err) = &result {
        error!("gif load failed: {err}");
    }
    result
}

fn play<S, P>(
    src: &mut S,
    sink: &mut P,
    x: i32,
    y: i32,
    config: &GifConfig,
    on_frame: &mut Option<&mut dyn FnMut(&Frame)>,
    cancel: &AtomicBool,
) -> Result<usize>
where
    S: ByteSource + ?Sized,
    P: PixelSink + ?Sized,
{
    let mut decoder = GifDecoder::open(src, config)?;
    while let Some(frame) = decoder.next_frame(sink, x, y)? {
        if let Some(callback) = on_frame.as_mut() {
            callback(&frame);
        }
        if !wait(frame.delay_ms, config.tick_ms, cancel) {
            info!("gif cancelled after {} frames", decoder.frame_count());
            break;
        }
    }
    Ok(decoder.frame_count())
}

/// Sleep for `total_ms` in ticks; false if cancelled
fn wait(total_ms: u32, tick_ms: u32, cancel: &AtomicBool) -> bool {
    let tick = tick_ms.max(1);
    let mut left = total_ms;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        if left == 0 {
            return true;
        }
        let step = left.min(tick);
        thread::sleep(Duration::from_millis(step as u64));
        left -= step;
    }
}

#[cfg(test)]
mod tests {
    use super::lzw::pack_literals;
    use super::*;
    use crate::sink::RgbBuffer;
    use crate::utils::init_logger;
    use pjpeg::SliceSource;
    use std::borrow::Cow;

    const RED: u32 = 0xFF0000;
    const GREEN: u32 = 0x00FF00;
    const BLUE: u32 = 0x0000FF;
    const WHITE: u32 = 0xFFFFFF;

    struct FrameSpec {
        rect: (u16, u16, u16, u16),
        indices: Vec<u8>,
        control: Option<(u8, Option<u8>, u16)>,
        local: Option<Vec<u32>>,
        interlaced: bool,
    }

    fn frame(rect: (u16, u16, u16, u16), indices: Vec<u8>) -> FrameSpec {
        FrameSpec { rect, indices, control: None, local: None, interlaced: false }
    }

    fn push_table(out: &mut Vec<u8>, colors: &[u32]) {
        for &c in colors {
            out.extend_from_slice(&[(c >> 16) as u8, (c >> 8) as u8, c as u8]);
        }
    }

    /// Four-colour global table: black, red, green, blue
    fn build(width: u16, height: u16, background: u8, frames: &[FrameSpec]) -> Vec<u8> {
        let mut out = b"GIF89a".to_vec();
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&[0x80 | 1, background, 0]);
        push_table(&mut out, &[0, RED, GREEN, BLUE]);

        for f in frames {
            if let Some((disposal, transparent, delay)) = f.control {
                let flags = disposal << 2 | transparent.is_some() as u8;
                out.extend_from_slice(&[0x21, 0xF9, 4, flags]);
                out.extend_from_slice(&delay.to_le_bytes());
                out.extend_from_slice(&[transparent.unwrap_or(0), 0]);
            }
            out.push(0x2C);
            for v in [f.rect.0, f.rect.1, f.rect.2, f.rect.3] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            let mut flags = if f.interlaced { 0x40 } else { 0 };
            if let Some(local) = &f.local {
                flags |= 0x80 | 1;
                out.push(flags);
                push_table(&mut out, local);
            } else {
                out.push(flags);
            }
            out.extend_from_slice(&pack_literals(2, &f.indices));
        }
        out.push(0x3B);
        out
    }

    fn no_wait() -> GifConfig {
        GifConfig { default_delay_ms: 0, tick_ms: 1 }
    }

    #[derive(Default)]
    struct Recorder {
        fills: Vec<(i32, i32, u32, u32, u32)>,
        pixels: Vec<(i32, i32, u32)>,
    }

    impl PixelSink for Recorder {
        fn width(&self) -> u32 {
            64
        }
        fn height(&self) -> u32 {
            64
        }
        fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
            self.pixels.push((x, y, color));
        }
        fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: u32) {
            self.fills.push((x, y, w, h, color));
        }
    }

    #[test]
    fn test_single_frame_runs() {
        let gif = build(4, 2, 0, &[frame((0, 0, 4, 2), vec![1, 1, 1, 2, 3, 3, 0, 0])]);
        let mut src = SliceSource::new(&gif);
        let mut sink = Recorder::default();
        let mut decoder = GifDecoder::open(&mut src, &no_wait()).unwrap();
        assert_eq!(decoder.screen().width, 4);

        let f = decoder.next_frame(&mut sink, 10, 20).unwrap().unwrap();
        assert_eq!(f.index, 0);
        assert_eq!(f.delay_ms, 0);
        assert_eq!(sink.fills, vec![(10, 20, 3, 1, RED), (10, 21, 2, 1, BLUE), (12, 21, 2, 1, 0)]);
        assert_eq!(sink.pixels, vec![(13, 20, GREEN)]);
        assert_eq!(decoder.next_frame(&mut sink, 10, 20).unwrap(), None);
        assert_eq!(decoder.frame_count(), 1);
    }

    #[test]
    fn test_transparent_index_skipped() {
        let mut second = frame((0, 0, 2, 1), vec![0, 3]);
        second.control = Some((1, Some(0), 5));
        let gif = build(2, 1, 0, &[frame((0, 0, 2, 1), vec![1, 1]), second]);
        let mut buf = RgbBuffer::new(2, 1);
        let mut delays = Vec::new();
        let mut record = |f: &Frame| delays.push(f.delay_ms);
        let config = GifConfig { default_delay_ms: 0, tick_ms: 50 };
        let n = load(&mut SliceSource::new(&gif), &mut buf, 0, 0, &config, Some(&mut record)).unwrap();
        assert_eq!(n, 2);
        assert_eq!(delays, vec![0, 50]);
        assert_eq!(buf.pixel(0, 0), Some(RED));
        assert_eq!(buf.pixel(1, 0), Some(BLUE));
    }

    #[test]
    fn test_transparent_with_restore_background_draws_background() {
        let mut f = frame((0, 0, 2, 1), vec![3, 1]);
        f.control = Some((2, Some(3), 0));
        // background index 2 is green
        let gif = build(2, 1, 2, &[f]);
        let mut buf = RgbBuffer::new(2, 1);
        load(&mut SliceSource::new(&gif), &mut buf, 0, 0, &no_wait(), None).unwrap();
        assert_eq!(buf.pixel(0, 0), Some(GREEN));
        assert_eq!(buf.pixel(1, 0), Some(RED));
    }

    #[test]
    fn test_restore_background_clears_delta_only() {
        init_logger();
        let mut first = frame((0, 0, 10, 10), vec![1; 100]);
        first.control = Some((2, None, 0));
        let second = frame((2, 2, 4, 4), vec![3; 16]);
        let gif = build(10, 10, 2, &[first, second]);

        let mut src = SliceSource::new(&gif);
        let mut decoder = GifDecoder::open(&mut src, &no_wait()).unwrap();
        let mut sink = Recorder::default();
        decoder.next_frame(&mut sink, 0, 0).unwrap().unwrap();
        sink.fills.clear();
        decoder.next_frame(&mut sink, 0, 0).unwrap().unwrap();

        assert_eq!(
            &sink.fills[..4],
            &[
                (0, 0, 10, 2, GREEN),
                (0, 6, 10, 4, GREEN),
                (0, 2, 2, 4, GREEN),
                (6, 2, 4, 4, GREEN),
            ]
        );
        // then the four rows of the new frame
        assert_eq!(sink.fills.len(), 8);
        assert!(sink.fills[4..].iter().all(|&(x, _, w, h, c)| x == 2 && w == 4 && h == 1 && c == BLUE));
    }

    #[test]
    fn test_interlaced_rows() {
        // Row r gets colour r % 4; data arrives in pass order 0 | 4 | 2,6 | 1,3,5,7
        let rows = 8;
        let order: Vec<u16> = [0, 4, 2, 6, 1, 3, 5, 7].to_vec();
        let indices: Vec<u8> = order.iter().map(|&r| (r % 4) as u8).collect();
        let mut f = frame((0, 0, 1, rows), indices);
        f.interlaced = true;
        let gif = build(1, rows, 0, &[f]);
        let mut buf = RgbBuffer::new(1, rows as u32);
        load(&mut SliceSource::new(&gif), &mut buf, 0, 0, &no_wait(), None).unwrap();
        let palette = [0, RED, GREEN, BLUE];
        for r in 0..rows as u32 {
            assert_eq!(buf.pixel(0, r), Some(palette[r as usize % 4]), "row {r}");
        }
    }

    #[test]
    fn test_interlaced_full_height() {
        init_logger();
        // Colour by pass: red, green, blue, then black for odd rows
        let rows = u16::MAX;
        let pass_of = |r: u32| match r {
            r if r % 8 == 0 => 0,
            r if r % 8 == 4 => 1,
            r if r % 4 == 2 => 2,
            _ => 3,
        };
        let mut indices = Vec::with_capacity(rows as usize);
        for pass in 0..4 {
            let n = (0..rows as u32).filter(|&r| pass_of(r) == pass).count();
            indices.extend(std::iter::repeat([1u8, 2, 3, 0][pass]).take(n));
        }
        let mut f = frame((0, 0, 1, rows), indices);
        f.interlaced = true;
        let gif = build(1, rows, 0, &[f]);

        let mut buf = RgbBuffer::new(1, rows as u32);
        let mut src = SliceSource::new(&gif);
        let mut decoder = GifDecoder::open(&mut src, &no_wait()).unwrap();
        decoder.next_frame(&mut buf, 0, 0).unwrap().unwrap();
        let palette = [RED, GREEN, BLUE, 0];
        for r in 0..rows as u32 {
            assert_eq!(buf.pixel(0, r), Some(palette[pass_of(r)]), "row {r}");
        }
    }

    #[test]
    fn test_short_interlaced_frame() {
        // Three rows: passes 1 and 2 are empty
        let mut f = frame((0, 0, 1, 3), vec![1, 2, 3]);
        f.interlaced = true;
        let gif = build(1, 3, 0, &[f]);
        let mut buf = RgbBuffer::new(1, 3);
        load(&mut SliceSource::new(&gif), &mut buf, 0, 0, &no_wait(), None).unwrap();
        assert_eq!(buf.pixel(0, 0), Some(RED));
        assert_eq!(buf.pixel(0, 2), Some(GREEN));
        assert_eq!(buf.pixel(0, 1), Some(BLUE));
    }

    #[test]
    fn test_local_table_restored() {
        let mut first = frame((0, 0, 1, 1), vec![1]);
        first.local = Some(vec![0, WHITE, 0, 0]);
        let second = frame((1, 0, 1, 1), vec![1]);
        let gif = build(2, 1, 0, &[first, second]);
        let mut buf = RgbBuffer::new(2, 1);
        load(&mut SliceSource::new(&gif), &mut buf, 0, 0, &no_wait(), None).unwrap();
        assert_eq!(buf.pixel(0, 0), Some(WHITE));
        assert_eq!(buf.pixel(1, 0), Some(RED));
    }

    #[test]
    fn test_cancel_stops_after_current_frame() {
        let frames: Vec<FrameSpec> = (0..3).map(|_| frame((0, 0, 1, 1), vec![2])).collect();
        let gif = build(1, 1, 0, &frames);
        let mut buf = RgbBuffer::new(1, 1);
        let cancel = AtomicBool::new(true);
        let n = load_with_cancel(&mut SliceSource::new(&gif), &mut buf, 0, 0, &no_wait(), None, &cancel).unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf.pixel(0, 0), Some(GREEN));
    }

    #[test]
    fn test_unknown_extension_skipped() {
        init_logger();
        let gif = build(1, 1, 0, &[frame((0, 0, 1, 1), vec![3])]);
        // comment and an unknown label before the image descriptor
        let at = 13 + 12;
        let junk = [0x21, 0xFE, 2, b'h', b'i', 0, 0x21, 0x42, 1, 9, 0];
        let gif = [&gif[..at], &junk[..], &gif[at..]].concat();
        let mut buf = RgbBuffer::new(1, 1);
        let n = load(&mut SliceSource::new(&gif), &mut buf, 0, 0, &no_wait(), None).unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf.pixel(0, 0), Some(BLUE));
    }

    #[test]
    fn test_errors() {
        init_logger();
        let mut sink = Recorder::default();
        let bad = b"GIF88a\x01\x00\x01\x00\x00\x00\x00";
        let err = load(&mut SliceSource::new(bad), &mut sink, 0, 0, &no_wait(), None);
        assert_eq!(err, Err(Error::BadSignature));

        let mut gif = build(1, 1, 0, &[frame((0, 0, 1, 1), vec![3])]);
        let at = 13 + 12;
        gif.insert(at, 0x99);
        let err = load(&mut SliceSource::new(&gif), &mut sink, 0, 0, &no_wait(), None);
        assert_eq!(err, Err(Error::UnknownBlock(0x99)));

        let mut gif = build(1, 1, 0, &[frame((0, 0, 1, 1), vec![3])]);
        // LZW minimum code size byte follows the 10-byte descriptor
        gif[13 + 12 + 10] = 0;
        let err = load(&mut SliceSource::new(&gif), &mut sink, 0, 0, &no_wait(), None);
        assert_eq!(err, Err(Error::MalformedLzw));

        let mut f = frame((0, 0, 1, 1), vec![3]);
        f.control = Some((0, None, 0));
        let mut gif = build(1, 1, 0, &[f]);
        gif[13 + 12 + 2] = 5;
        let err = load(&mut SliceSource::new(&gif), &mut sink, 0, 0, &no_wait(), None);
        assert_eq!(err, Err(Error::BadBlock));
    }

    #[test]
    fn test_matches_gif_crate_encoder() {
        init_logger();
        let (w, h) = (23u16, 17u16);
        let palette = [0u8, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255, 9, 99, 199, 255, 255, 0, 40, 40, 40, 200, 100, 50];
        let indices: Vec<u8> = (0..w as usize * h as usize)
            .map(|i| ((i / 5 + i % 3) % 8) as u8)
            .collect();

        let mut data = Vec::new();
        {
            let mut encoder = ::gif::Encoder::new(&mut data, w, h, &palette).unwrap();
            let frame = ::gif::Frame {
                width: w,
                height: h,
                buffer: Cow::Borrowed(&indices[..]),
                ..Default::default()
            };
            encoder.write_frame(&frame).unwrap();
        }

        let mut buf = RgbBuffer::new(w as u32, h as u32);
        let n = load(&mut SliceSource::new(&data), &mut buf, 0, 0, &no_wait(), None).unwrap();
        assert_eq!(n, 1);
        for (i, &index) in indices.iter().enumerate() {
            let p = &palette[index as usize * 3..index as usize * 3 + 3];
            let (x, y) = ((i % w as usize) as u32, (i / w as usize) as u32);
            assert_eq!(buf.pixel(x, y), Some(rgb(p[0], p[1], p[2])), "pixel {x},{y}");
        }
    }
}
