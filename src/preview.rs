use crate::{
    error::Result,
    hue::{Quantize, shift_hue},
    sequencer::Frame,
};
use image::{
    Delay, DynamicImage, Frame as GifFrame, RgbaImage,
    codecs::gif::{GifEncoder, Repeat},
};
use std::{
    fmt::Display,
    io::{self, Write},
};

pub const DEFAULT_DELAY_MS: u32 = 100;

/// One rendered step of the cycle
#[derive(Debug, Clone)]
pub struct CycleFrame {
    pub frame: Frame,
    pub image: RgbaImage,
}

/// Every frame of a hue cycle, for looking at the whole animation at once
#[derive(Debug, Clone)]
pub struct Cycle {
    pub frames: Vec<CycleFrame>,
    pub delay_ms: u32,
}

impl Cycle {
    pub fn new(frames: Vec<CycleFrame>) -> Self {
        Self {
            frames,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }

    /// Renders all `count` frames of `image`.
    pub fn render(image: &DynamicImage, count: u32, quantize: Quantize) -> Self {
        let frames = (0..count)
            .map(|index| {
                let frame = Frame { index, count };
                CycleFrame {
                    image: shift_hue(image, frame.shift(), quantize),
                    frame,
                }
            })
            .collect();

        Self::new(frames)
    }

    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Encode as a looping animated GIF
    pub fn encode<W: Write>(&self, writer: W) -> Result<()> {
        if self.frames.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "No frames").into());
        }

        let delay = Delay::from_numer_denom_ms(self.delay_ms, 1);
        let mut encoder = GifEncoder::new(writer);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(
            self.frames
                .iter()
                .map(|f| GifFrame::from_parts(f.image.clone(), 0, 0, delay)),
        )?;

        Ok(())
    }
}

impl Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Hue cycle with {} frame(s):", self.frames.len())?;
        if let Some(first) = self.frames.first() {
            writeln!(f, "  Size: {}x{}", first.image.width(), first.image.height())?;
        }
        writeln!(f, "  Delay: {} ms", self.delay_ms)?;

        for cycle_frame in &self.frames {
            writeln!(
                f,
                "  Frame {}: hue {:.2}",
                cycle_frame.frame.index,
                cycle_frame.frame.shift()
            )?;
        }
        Ok(())
    }
}
