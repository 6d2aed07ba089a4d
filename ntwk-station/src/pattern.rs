//! Synthetic camera feed.

use ntwk_core::{Image, NtwkError};

/// Moving colour gradient standing in for a camera.
///
/// Each frame shifts the pattern diagonally so consecutive frames differ
/// and a viewer can tell stale frames from fresh ones.
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: u32,
    height: u32,
    channels: u8,
    frame: u64,
}

impl TestPattern {
    pub fn new(width: u32, height: u32, channels: u8) -> Result<Self, NtwkError> {
        if width == 0 || height == 0 {
            return Err(NtwkError::InvalidConfig(format!(
                "camera size {width}x{height} is empty"
            )));
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(NtwkError::UnsupportedChannels(channels));
        }
        Ok(Self {
            width,
            height,
            channels,
            frame: 0,
        })
    }

    /// Frames produced so far.
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn next_frame(&mut self) -> Image {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (self.frame * 4) as usize;
        let mut data = Vec::with_capacity(w * h * self.channels as usize);

        for y in 0..h {
            for x in 0..w {
                let r = ((x + y + shift) % 256) as u8;
                let g = ramp(x, w);
                let b = ramp(y, h);
                match self.channels {
                    1 => data.push(((r as u16 + g as u16 + b as u16) / 3) as u8),
                    3 => data.extend_from_slice(&[r, g, b]),
                    _ => data.extend_from_slice(&[r, g, b, 255]),
                }
            }
        }

        self.frame += 1;
        Image::new(self.width, self.height, self.channels, data)
    }
}

/// 0 at the first index, 255 at the last.
fn ramp(i: usize, len: usize) -> u8 {
    if len > 1 { (i * 255 / (len - 1)) as u8 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_match_dimensions() {
        for channels in [1, 3, 4] {
            let mut pattern = TestPattern::new(16, 9, channels).unwrap();
            let img = pattern.next_frame();
            img.validate().unwrap();
            assert_eq!(img.channels, channels);
        }
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut pattern = TestPattern::new(8, 8, 3).unwrap();
        let a = pattern.next_frame();
        let b = pattern.next_frame();
        assert_ne!(a.data, b.data);
        assert_eq!(pattern.frame_index(), 2);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(TestPattern::new(0, 8, 3).is_err());
        assert!(matches!(
            TestPattern::new(8, 8, 2),
            Err(NtwkError::UnsupportedChannels(2))
        ));
    }

    #[test]
    fn single_pixel_frame() {
        let img = TestPattern::new(1, 1, 4).unwrap().next_frame();
        assert_eq!(img.data.len(), 4);
        assert_eq!(img.data[3], 255);
    }
}
