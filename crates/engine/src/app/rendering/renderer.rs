use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::{Frame, RenderableKind, SceneWorld, SpriteLibrary};

use super::{world_to_screen_px, Viewport};

const CLEAR_COLOR: [u8; 4] = [18, 20, 26, 255];
const RING_THICKNESS_PX: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScreenRectPx {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    library: SpriteLibrary,
}

impl Renderer {
    pub fn new(window: Arc<Window>, library: SpriteLibrary) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            library,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render_world(&mut self, world: &SceneWorld) -> Result<(), Error> {
        let Viewport { width, height } = self.viewport;
        if width == 0 || height == 0 {
            return Ok(());
        }

        let library = &mut self.library;
        let frame = self.pixels.frame_mut();
        for chunk in frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&CLEAR_COLOR);
        }

        let camera = world.camera();
        if let Some(level) = world.background_level() {
            let (world_w, world_h) = world.world_size();
            let background = library.background(level, (world_w as u32, world_h as u32));
            let (x, y) = world_to_screen_px(crate::app::Vec2::ZERO, camera);
            let dest = ScreenRectPx {
                left: x,
                top: y,
                width: world_w as i32,
                height: world_h as i32,
            };
            blit_frame_scaled(frame, width, height, dest, background, false);
        }

        for sprite in world.sprites() {
            let (x, y) = world_to_screen_px(
                crate::app::Vec2::new(sprite.rect.x, sprite.rect.y),
                camera,
            );
            let dest = ScreenRectPx {
                left: x,
                top: y,
                width: sprite.rect.w.round() as i32,
                height: sprite.rect.h.round() as i32,
            };
            match &sprite.kind {
                RenderableKind::Solid { color } => {
                    fill_rect_clipped(frame, width, height, dest, *color);
                }
                RenderableKind::Outline { color } => {
                    draw_rect_outline(frame, width, height, dest, *color);
                }
                RenderableKind::Sprite {
                    sequence,
                    frame: frame_index,
                    mirror_x,
                } => {
                    let size = (dest.width.max(1) as u32, dest.height.max(1) as u32);
                    if let Some(image) = library.frame(sequence, *frame_index, size) {
                        blit_frame_scaled(frame, width, height, dest, image, *mirror_x);
                    }
                }
                RenderableKind::Ring { color, alpha } => {
                    draw_ring(frame, width, height, dest, *color, *alpha);
                }
            }
        }

        self.pixels.render()
    }
}

fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x as usize >= width {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    frame[byte_offset..end].copy_from_slice(&color);
}

fn blend_pixel_clipped(
    frame: &mut [u8],
    width: usize,
    x: i32,
    y: i32,
    color: [u8; 4],
    alpha: f32,
) {
    if x < 0 || y < 0 || x as usize >= width {
        return;
    }
    let offset = (y as usize * width + x as usize) * 4;
    let Some(dst) = frame.get_mut(offset..offset + 4) else {
        return;
    };
    let alpha = alpha.clamp(0.0, 1.0);
    for channel in 0..3 {
        let blended = color[channel] as f32 * alpha + dst[channel] as f32 * (1.0 - alpha);
        dst[channel] = blended.round() as u8;
    }
    dst[3] = 255;
}

fn fill_rect_clipped(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: ScreenRectPx,
    color: [u8; 4],
) {
    let left = rect.left.max(0);
    let top = rect.top.max(0);
    let right = (rect.left + rect.width).min(width as i32);
    let bottom = (rect.top + rect.height).min(height as i32);
    for y in top..bottom {
        for x in left..right {
            write_pixel_rgba_clipped(frame, width as usize, x, y, color);
        }
    }
}

fn draw_rect_outline(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: ScreenRectPx,
    color: [u8; 4],
) {
    if rect.width <= 0 || rect.height <= 0 {
        return;
    }
    let right = rect.left + rect.width - 1;
    let bottom = rect.top + rect.height - 1;
    for x in rect.left..=right {
        if (0..height as i32).contains(&rect.top) {
            write_pixel_rgba_clipped(frame, width as usize, x, rect.top, color);
        }
        if (0..height as i32).contains(&bottom) {
            write_pixel_rgba_clipped(frame, width as usize, x, bottom, color);
        }
    }
    for y in rect.top..=bottom {
        if !(0..height as i32).contains(&y) {
            continue;
        }
        write_pixel_rgba_clipped(frame, width as usize, rect.left, y, color);
        write_pixel_rgba_clipped(frame, width as usize, right, y, color);
    }
}

fn draw_ring(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: ScreenRectPx,
    color: [u8; 4],
    alpha: f32,
) {
    if alpha <= 0.0 || rect.width <= 0 {
        return;
    }
    let radius = rect.width as f32 * 0.5;
    let cx = rect.left as f32 + radius;
    let cy = rect.top as f32 + rect.height as f32 * 0.5;
    let top = (cy - radius).floor().max(0.0) as i32;
    let bottom = ((cy + radius).ceil() as i32).min(height as i32 - 1);
    let left = (cx - radius).floor().max(0.0) as i32;
    let right = ((cx + radius).ceil() as i32).min(width as i32 - 1);
    for y in top..=bottom {
        for x in left..=right {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            if (distance - radius).abs() <= RING_THICKNESS_PX * 0.5 {
                blend_pixel_clipped(frame, width as usize, x, y, color, alpha);
            }
        }
    }
}

/// Nearest-neighbour stretch of `image` into `dest`, optionally mirrored
/// horizontally; transparent source pixels are skipped.
fn blit_frame_scaled(
    frame: &mut [u8],
    width: u32,
    height: u32,
    dest: ScreenRectPx,
    image: &Frame,
    mirror_x: bool,
) {
    if image.width == 0 || image.height == 0 || dest.width <= 0 || dest.height <= 0 {
        return;
    }
    let expected_rgba_len = image.width as usize * image.height as usize * 4;
    if image.rgba.len() < expected_rgba_len {
        return;
    }

    let draw_left = dest.left.max(0);
    let draw_top = dest.top.max(0);
    let draw_right = (dest.left + dest.width).min(width as i32);
    let draw_bottom = (dest.top + dest.height).min(height as i32);
    if draw_left >= draw_right || draw_top >= draw_bottom {
        return;
    }

    let scale_x = image.width as f32 / dest.width as f32;
    let scale_y = image.height as f32 / dest.height as f32;
    let frame_width = width as usize;
    let image_width = image.width as usize;

    for out_y in draw_top..draw_bottom {
        let dy = out_y - dest.top;
        let src_y = ((dy as f32 * scale_y).floor() as u32).min(image.height - 1) as usize;
        let src_row_offset = src_y * image_width * 4;
        let dst_row_offset = out_y as usize * frame_width * 4;

        for out_x in draw_left..draw_right {
            let mut dx = out_x - dest.left;
            if mirror_x {
                dx = dest.width - 1 - dx;
            }
            let src_x = ((dx as f32 * scale_x).floor() as u32).min(image.width - 1) as usize;
            let src_offset = src_row_offset + src_x * 4;
            let alpha = image.rgba[src_offset + 3];
            if alpha == 0 {
                continue;
            }
            let dst_offset = dst_row_offset + out_x as usize * 4;
            frame[dst_offset..dst_offset + 3]
                .copy_from_slice(&image.rgba[src_offset..src_offset + 3]);
            frame[dst_offset + 3] = alpha;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(width: u32, height: u32) -> Vec<u8> {
        vec![0; width as usize * height as usize * 4]
    }

    fn pixel(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * width as usize + x as usize) * 4;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    #[test]
    fn renderer_type_is_non_generic() {
        let _size = std::mem::size_of::<Renderer>();
    }

    #[test]
    fn fill_rect_is_clipped_to_viewport() {
        let mut frame = buffer(8, 8);
        let rect = ScreenRectPx {
            left: -4,
            top: 6,
            width: 6,
            height: 6,
        };
        fill_rect_clipped(&mut frame, 8, 8, rect, [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 8, 0, 7), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 8, 1, 6), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 8, 2, 6), [0, 0, 0, 0]);
        assert_eq!(pixel(&frame, 8, 0, 5), [0, 0, 0, 0]);
    }

    #[test]
    fn outline_leaves_interior_untouched() {
        let mut frame = buffer(6, 6);
        let rect = ScreenRectPx {
            left: 1,
            top: 1,
            width: 4,
            height: 4,
        };
        draw_rect_outline(&mut frame, 6, 6, rect, [9, 9, 9, 255]);
        assert_eq!(pixel(&frame, 6, 1, 1), [9, 9, 9, 255]);
        assert_eq!(pixel(&frame, 6, 4, 4), [9, 9, 9, 255]);
        assert_eq!(pixel(&frame, 6, 2, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn mirrored_blit_flips_columns() {
        let image = Frame {
            width: 2,
            height: 1,
            rgba: vec![255, 0, 0, 255, 0, 0, 255, 255],
        };
        let dest = ScreenRectPx {
            left: 0,
            top: 0,
            width: 2,
            height: 1,
        };

        let mut plain = buffer(2, 1);
        blit_frame_scaled(&mut plain, 2, 1, dest, &image, false);
        assert_eq!(pixel(&plain, 2, 0, 0), [255, 0, 0, 255]);

        let mut mirrored = buffer(2, 1);
        blit_frame_scaled(&mut mirrored, 2, 1, dest, &image, true);
        assert_eq!(pixel(&mirrored, 2, 0, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&mirrored, 2, 1, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn blit_scales_to_destination_rect() {
        let image = Frame::solid(1, 1, [7, 8, 9, 255]);
        let mut frame = buffer(4, 4);
        let dest = ScreenRectPx {
            left: 0,
            top: 0,
            width: 4,
            height: 4,
        };
        blit_frame_scaled(&mut frame, 4, 4, dest, &image, false);
        assert_eq!(pixel(&frame, 4, 3, 3), [7, 8, 9, 255]);
    }

    #[test]
    fn ring_with_zero_alpha_draws_nothing() {
        let mut frame = buffer(16, 16);
        let rect = ScreenRectPx {
            left: 0,
            top: 0,
            width: 16,
            height: 16,
        };
        draw_ring(&mut frame, 16, 16, rect, [255, 255, 255, 255], 0.0);
        assert!(frame.iter().all(|byte| *byte == 0));
        draw_ring(&mut frame, 16, 16, rect, [255, 255, 255, 255], 1.0);
        assert_eq!(pixel(&frame, 16, 8, 0), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 16, 8, 8), [0, 0, 0, 0]);
    }
}
