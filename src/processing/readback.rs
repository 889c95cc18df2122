//! Transfers the final target into a top-down RGBA byte buffer.
//!
//! Textures are stored bottom-up (row 0 is the bottom of the image), so
//! uploads and readbacks both reverse the row order.

use std::sync::mpsc;

use crate::error::{LensError, LensResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOrder {
    TopDown,
    BottomUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadbackLayout {
    pub width: u32,
    pub height: u32,
    pub unpadded_bytes_per_row: u32,
    pub padded_bytes_per_row: u32,
}

impl ReadbackLayout {
    pub fn new(width: u32, height: u32) -> Self {
        let unpadded_bytes_per_row = width.saturating_mul(4);
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        Self {
            width,
            height,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        }
    }

    pub fn buffer_size(&self) -> u64 {
        self.padded_bytes_per_row as u64 * self.height as u64
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// Reverses the row order of a tightly packed pixel buffer in place.
pub fn flip_rows(pixels: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = pixels.len() / row_bytes;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (head, tail) = pixels.split_at_mut(bottom * row_bytes);
        head[top * row_bytes..(top + 1) * row_bytes].swap_with_slice(&mut tail[..row_bytes]);
    }
}

/// Copy of `pixels` with its rows reversed.
pub fn flipped(pixels: &[u8], row_bytes: usize) -> Vec<u8> {
    let mut out = pixels.to_vec();
    flip_rows(&mut out, row_bytes);
    out
}

/// Strips row padding from a mapped buffer and returns top-down rows.
pub fn unpad_rows(mapped: &[u8], layout: &ReadbackLayout, order: RowOrder) -> LensResult<Vec<u8>> {
    let unpadded = layout.unpadded_bytes_per_row as usize;
    let padded = layout.padded_bytes_per_row as usize;
    let rows = layout.height as usize;
    if mapped.len() < padded * rows.saturating_sub(1) + unpadded {
        return Err(LensError::readback(format!(
            "mapped {} bytes, layout needs {}",
            mapped.len(),
            layout.buffer_size()
        )));
    }
    let mut out = vec![0_u8; unpadded * rows];
    for row in 0..rows {
        let src_row = match order {
            RowOrder::TopDown => row,
            RowOrder::BottomUp => rows - 1 - row,
        };
        let src_offset = src_row * padded;
        let dst_offset = row * unpadded;
        out[dst_offset..dst_offset + unpadded]
            .copy_from_slice(&mapped[src_offset..src_offset + unpadded]);
    }
    Ok(out)
}

pub fn encode_copy(
    encoder: &mut wgpu::CommandEncoder,
    texture: &wgpu::Texture,
    buffer: &wgpu::Buffer,
    layout: &ReadbackLayout,
) {
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(layout.padded_bytes_per_row),
                rows_per_image: Some(layout.height),
            },
        },
        layout.extent(),
    );
}

/// Maps `buffer` after submission, blocking until the copy lands.
pub fn map_blocking(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    layout: &ReadbackLayout,
    order: RowOrder,
) -> LensResult<Vec<u8>> {
    let slice = buffer.slice(..layout.buffer_size());
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::Maintain::wait());
    rx.recv()
        .map_err(|_| LensError::readback("map callback dropped"))?
        .map_err(|err| LensError::readback(err.to_string()))?;

    let mapped = slice.get_mapped_range();
    let out = unpad_rows(&mapped, layout, order);
    drop(mapped);
    buffer.unmap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        let layout = ReadbackLayout::new(3, 2);
        assert_eq!(layout.unpadded_bytes_per_row, 12);
        assert_eq!(layout.padded_bytes_per_row, 256);
        assert_eq!(layout.buffer_size(), 512);

        let exact = ReadbackLayout::new(64, 1);
        assert_eq!(exact.padded_bytes_per_row, 256);
    }

    #[test]
    fn flip_rows_reverses_odd_and_even_heights() {
        let mut even = vec![1, 1, 2, 2, 3, 3, 4, 4];
        flip_rows(&mut even, 2);
        assert_eq!(even, vec![4, 4, 3, 3, 2, 2, 1, 1]);

        let mut odd = vec![1, 2, 3];
        flip_rows(&mut odd, 1);
        assert_eq!(odd, vec![3, 2, 1]);

        assert_eq!(flipped(&flipped(&even, 2), 2), even);
    }

    #[test]
    fn bottom_up_readback_becomes_top_down() {
        let layout = ReadbackLayout::new(1, 3);
        let mut mapped = vec![0_u8; layout.buffer_size() as usize];
        for (row, value) in [(0, 10), (1, 20), (2, 30)] {
            let offset = row * layout.padded_bytes_per_row as usize;
            mapped[offset..offset + 4].copy_from_slice(&[value; 4]);
        }
        let top_down = unpad_rows(&mapped, &layout, RowOrder::BottomUp).expect("unpad");
        assert_eq!(top_down, vec![30, 30, 30, 30, 20, 20, 20, 20, 10, 10, 10, 10]);
        let same = unpad_rows(&mapped, &layout, RowOrder::TopDown).expect("unpad");
        assert_eq!(&same[..4], &[10; 4]);
    }

    #[test]
    fn short_buffer_is_a_readback_error() {
        let layout = ReadbackLayout::new(4, 4);
        let err = unpad_rows(&[0; 16], &layout, RowOrder::TopDown).unwrap_err();
        assert!(matches!(err, LensError::Readback(_)));
        assert!(!err.is_fatal());
    }
}
