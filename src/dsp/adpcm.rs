//! 4-bit adaptive differential PCM codec.
//!
//! The encoder always runs the decoder on every symbol it emits, so an
//! encoder and a decoder started from the same state stay in lockstep.
//! Each independent stream needs its own fresh `AdpcmCodec`.

/// Adaptive step sizes, indexed by `step_index`.
pub const STEP_TABLE: [i32; 49] = [
    16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66, 73, 80, 88, 97, 107, 118,
    130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449, 494, 544, 598, 658,
    724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552,
];

/// Step-index adjustment by the magnitude bits of a symbol.
pub const INDEX_ADJUST: [i32; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];

const MAX_STEP_INDEX: i32 = STEP_TABLE.len() as i32 - 1;

/// Predictor state for one encode or decode stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdpcmCodec {
    predicted: i32,
    step_index: i32,
}

impl AdpcmCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.predicted = 0;
        self.step_index = 0;
    }

    pub fn predicted(&self) -> i16 {
        self.predicted as i16
    }

    pub fn step_index(&self) -> usize {
        self.step_index as usize
    }

    /// Current adaptive step size.
    pub fn step(&self) -> i32 {
        STEP_TABLE[self.step_index as usize]
    }

    /// Encode one 16-bit sample into a 4-bit symbol.
    pub fn encode(&mut self, pcm: i16) -> u8 {
        let step = self.step();
        let mut diff = pcm as i32 - self.predicted;
        let mut nibble = 0u8;
        if diff < 0 {
            nibble = 8;
            diff = -diff;
        }
        if diff >= step {
            nibble |= 4;
            diff -= step;
        }
        if diff >= step >> 1 {
            nibble |= 2;
            diff -= step >> 1;
        }
        if diff >= step >> 2 {
            nibble |= 1;
        }
        self.decode(nibble);
        nibble
    }

    /// Decode one 4-bit symbol and return the reconstructed sample.
    pub fn decode(&mut self, nibble: u8) -> i16 {
        let nibble = nibble & 0x0F;
        let step = self.step();
        let mut delta = step >> 3;
        if nibble & 4 != 0 {
            delta += step;
        }
        if nibble & 2 != 0 {
            delta += step >> 1;
        }
        if nibble & 1 != 0 {
            delta += step >> 2;
        }
        if nibble & 8 != 0 {
            self.predicted -= delta;
        } else {
            self.predicted += delta;
        }
        self.predicted = self.predicted.clamp(i16::MIN as i32, i16::MAX as i32);
        self.step_index =
            (self.step_index + INDEX_ADJUST[(nibble & 7) as usize]).clamp(0, MAX_STEP_INDEX);
        self.predicted as i16
    }

    /// Encode a block, packing two symbols per byte, low nibble first.
    pub fn encode_block(&mut self, pcm: &[i16]) -> Vec<u8> {
        pcm.chunks(2)
            .map(|pair| {
                let lo = self.encode(pair[0]);
                let hi = pair.get(1).map_or(0, |&s| self.encode(s));
                lo | (hi << 4)
            })
            .collect()
    }

    /// Decode packed symbols into `out`. Missing symbols decode as silence.
    pub fn decode_block(&mut self, packed: &[u8], out: &mut [i16]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = match packed.get(i / 2) {
                Some(&byte) if i % 2 == 0 => self.decode(byte & 0x0F),
                Some(&byte) => self.decode(byte >> 4),
                None => 0,
            };
        }
    }
}

/// Convert a float sample in [-1, 1] to 16-bit PCM.
pub fn to_pcm16(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16
}

/// Resample `source` from `source_rate` to `target_rate` and push it through
/// the codec, returning what a chip decoder would play back.
///
/// Encoding and decoding use separate codec instances, each starting from
/// reset.
pub fn degrade(source: &[f32], source_rate: f64, target_rate: f64) -> Vec<i16> {
    if source.is_empty() || source_rate <= 0.0 || target_rate <= 0.0 {
        return Vec::new();
    }

    let step = source_rate / target_rate;
    let len = ((source.len() as f64 * target_rate / source_rate).ceil() as usize).max(1);
    let pcm: Vec<i16> = (0..len)
        .map(|i| to_pcm16(read_linear(source, i as f64 * step)))
        .collect();

    let packed = AdpcmCodec::new().encode_block(&pcm);
    let mut decoded = vec![0i16; pcm.len()];
    AdpcmCodec::new().decode_block(&packed, &mut decoded);
    decoded
}

fn read_linear(data: &[f32], position: f64) -> f64 {
    let idx = position as usize;
    let Some(&a) = data.get(idx) else {
        return data.last().copied().unwrap_or(0.0) as f64;
    };
    let b = data.get(idx + 1).copied().unwrap_or(a);
    let frac = position - idx as f64;
    a as f64 * (1.0 - frac) + b as f64 * frac
}
