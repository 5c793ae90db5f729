/// Converts YUYV (YUV 4:2:2) rows to packed RGB.
///
/// YUYV packs as `[Y0, U, Y1, V, ...]`, each pair of pixels sharing U and V.
/// Source rows are `stride` bytes apart. The output is written into `rgb`
/// (resized to `width * height * 3`) so the buffer can be reused across
/// frames. BT.601 coefficients:
/// - R = Y + 1.402 * (V - 128)
/// - G = Y - 0.344 * (U - 128) - 0.714 * (V - 128)
/// - B = Y + 1.772 * (U - 128)
///
/// Returns `None` if `data` is too short for the given geometry.
pub fn yuyv_to_rgb(
    data: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    rgb: &mut Vec<u8>,
) -> Option<()> {
    let width = width as usize;
    let height = height as usize;
    let pairs = width.div_ceil(2);
    let row_len = pairs * 4;

    if height == 0 || stride < row_len {
        return None;
    }
    if data.len() < stride * (height - 1) + row_len {
        return None;
    }

    rgb.clear();
    rgb.reserve(width * height * 3);

    for y in 0..height {
        let row = &data[y * stride..y * stride + row_len];
        let mut remaining = width;

        for chunk in row.chunks_exact(4) {
            let u = chunk[1] as f32 - 128.0;
            let v = chunk[3] as f32 - 128.0;

            for &luma in [chunk[0], chunk[2]].iter().take(remaining.min(2)) {
                let l = luma as f32;
                let r = (l + 1.402 * v).clamp(0.0, 255.0) as u8;
                let g = (l - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
                let b = (l + 1.772 * u).clamp(0.0, 255.0) as u8;
                rgb.extend_from_slice(&[r, g, b]);
            }
            remaining = remaining.saturating_sub(2);
        }
    }

    Some(())
}
