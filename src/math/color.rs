/// Convert a `0xRRGGBB` colour into linear-ish float RGB in [0, 1].
pub fn hex_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

pub fn scale_rgb(rgb: [f32; 3], factor: f32) -> [f32; 3] {
    rgb.map(|c| c * factor)
}
