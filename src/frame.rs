//! Frame and size primitives shared by capture, the output manager, drivers
//! and the MIX blender.

/// Size of a rendering surface or output frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of bytes a BGRA buffer of this size must contain.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// One captured frame: raw BGRA pixels exactly `width*height*4` bytes, plus
/// the timestamp it was captured at.
///
/// `buffer` is a borrowed view for the duration of a synchronous call —
/// Capture owns and reuses the backing storage (§4.2); anything that must
/// outlive the call has to copy.
#[derive(Debug, Clone, Copy)]
pub struct FrameData<'a> {
    pub buffer: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
}

impl<'a> FrameData<'a> {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Owned frame buffer, used wherever a frame must outlive the originating
/// callback (the outgoing/incoming buffers during a MIX, a held frame in
/// clock mode).
#[derive(Debug, Clone, Default)]
pub struct OwnedFrame {
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl OwnedFrame {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Copy `frame` into this buffer, growing it only if it is too small.
    pub fn copy_from(&mut self, frame: &FrameData<'_>) {
        self.width = frame.width;
        self.height = frame.height;
        if self.buffer.len() < frame.buffer.len() {
            self.buffer.resize(frame.buffer.len(), 0);
        }
        self.buffer[..frame.buffer.len()].copy_from_slice(frame.buffer);
        self.buffer.truncate(frame.buffer.len());
    }

    pub fn as_frame_data(&self, timestamp: std::time::Instant) -> FrameData<'_> {
        FrameData {
            buffer: &self.buffer,
            width: self.width,
            height: self.height,
            timestamp,
        }
    }
}

/// Rolling capture statistics, reported once per second by Capture.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureStats {
    /// 1-second moving measurement of ticked frames per second.
    pub fps: f32,
    /// Monotonically non-decreasing count of dropped (empty-bitmap) paints.
    pub dropped: u64,
    /// Monotonically non-decreasing count of frames ticked out to the
    /// consumer.
    pub total_frames: u64,
}
