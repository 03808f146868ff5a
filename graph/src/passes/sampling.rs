//! Deterministic random numbers and sub-pixel sample patterns.

use glam::Vec2;

/// PCG-style integer hash.
pub fn hash_u32(value: u32) -> u32 {
    let state = value.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Per-pixel random sequence seeded from pixel, frame and scene.
///
/// The same inputs always produce the same sequence.
#[derive(Debug, Clone)]
pub struct SampleGenerator {
    state: u32,
}

impl SampleGenerator {
    pub fn new(x: u32, y: u32, frame: u64, seed: u64) -> Self {
        let mut state = hash_u32(x ^ hash_u32(y.wrapping_add(0x9e37_79b9)));
        state = hash_u32(state ^ frame as u32 ^ ((frame >> 32) as u32).rotate_left(16));
        state = hash_u32(state ^ seed as u32 ^ (seed >> 32) as u32);
        Self { state }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = hash_u32(self.state);
        self.state
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    pub fn next_vec2(&mut self) -> Vec2 {
        Vec2::new(self.next_f32(), self.next_f32())
    }
}

/// Camera jitter pattern used by the G-buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplePattern {
    #[default]
    Center,
    DirectX,
    Halton,
    Stratified,
}

const DIRECTX_8: [(f32, f32); 8] = [
    (1.0, -3.0),
    (-1.0, 3.0),
    (5.0, 1.0),
    (-3.0, -5.0),
    (-5.0, 5.0),
    (-7.0, -1.0),
    (3.0, 7.0),
    (7.0, -7.0),
];

fn radical_inverse(mut index: u64, base: u64) -> f32 {
    let mut result = 0.0f64;
    let mut fraction = 1.0f64 / base as f64;
    while index > 0 {
        result += (index % base) as f64 * fraction;
        index /= base;
        fraction /= base as f64;
    }
    result as f32
}

impl SamplePattern {
    pub const NAMES: &'static [&'static str] = &["Center", "DirectX", "Halton", "Stratified"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Center" => Some(Self::Center),
            "DirectX" => Some(Self::DirectX),
            "Halton" => Some(Self::Halton),
            "Stratified" => Some(Self::Stratified),
            _ => None,
        }
    }

    /// Sub-pixel offset in `[-0.5, 0.5)` for frame `index` of a `count`-long cycle.
    pub fn offset(self, index: u64, count: u32) -> Vec2 {
        let count = count.max(1) as u64;
        let i = index % count;
        match self {
            Self::Center => Vec2::ZERO,
            Self::DirectX => {
                let (x, y) = DIRECTX_8[(i % DIRECTX_8.len() as u64) as usize];
                Vec2::new(x, y) / 16.0
            }
            Self::Halton => {
                Vec2::new(radical_inverse(i + 1, 2), radical_inverse(i + 1, 3)) - Vec2::splat(0.5)
            }
            Self::Stratified => {
                let side = (count as f64).sqrt().ceil() as u64;
                let cell = Vec2::new((i % side) as f32, (i / side) as f32);
                (cell + Vec2::splat(0.5)) / side as f32 - Vec2::splat(0.5)
            }
        }
    }
}
