use crate::error::{Error, Result};
use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

/// A position within the repeating cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub index: u32,
    pub count: u32,
}

impl Frame {
    /// Fraction of a full hue turn for this frame, in `[0, 1)`.
    pub fn shift(&self) -> f64 {
        f64::from(self.index) / f64::from(self.count)
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame {} of {} (hue {:.2})", self.index, self.count, self.shift())
    }
}

/// Where the frame index comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePolicy {
    /// Derived from a counter the scheduler hands us; nothing is stored.
    External { run_number: u64 },
    /// Incremented from the index saved by the previous run.
    Persisted { state_file: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    frames: u32,
    policy: FramePolicy,
}

impl Sequencer {
    pub fn new(frames: u32, policy: FramePolicy) -> Result<Self> {
        if frames == 0 {
            return Err(Error::Config("number of frames must be at least 1".into()));
        }

        Ok(Self { frames, policy })
    }

    pub fn policy(&self) -> &FramePolicy {
        &self.policy
    }

    /// Computes the frame the next [`Sequencer::advance`] would return,
    /// without writing anything.
    pub fn peek(&self) -> Frame {
        let index = match &self.policy {
            FramePolicy::External { run_number } => (run_number % u64::from(self.frames)) as u32,
            FramePolicy::Persisted { state_file } => {
                let last = read_last_index(state_file) % u64::from(self.frames);
                ((last + 1) % u64::from(self.frames)) as u32
            }
        };

        Frame {
            index,
            count: self.frames,
        }
    }

    /// Computes this run's frame and, for the persisted policy, saves it
    /// straight away so the cycle moves on whatever happens afterwards.
    pub fn advance(&self) -> Result<Frame> {
        let frame = self.peek();

        if let FramePolicy::Persisted { state_file } = &self.policy {
            fs::write(state_file, frame.index.to_string())?;
            log::debug!("saved frame {} to {}", frame.index, state_file.display());
        }

        Ok(frame)
    }
}

/// Last saved index, or 0 when the state file is missing or garbled.
fn read_last_index(path: &Path) -> u64 {
    match fs::read_to_string(path) {
        Ok(content) => match content.trim().parse::<u64>() {
            Ok(index) => index,
            Err(e) => {
                log::debug!("ignoring unreadable frame state in {}: {e}", path.display());
                0
            }
        },
        Err(e) => {
            log::debug!("no frame state at {}: {e}", path.display());
            0
        }
    }
}
