use crate::annotation::frame::AnnotationFrame;
use crate::foundation::error::BatResult;

/// Consumer of encoded annotation frames (the persistence collaborator).
///
/// Frames arrive in the order the host rendered them; a sink must not assume consecutive frame
/// numbers since commands can jump around the timeline.
pub trait AnnotationSink {
    /// Persist one frame's layers and manifest.
    fn write_frame(&mut self, frame: &AnnotationFrame) -> BatResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    /// Frames in arrival order.
    pub frames: Vec<AnnotationFrame>,
}

impl InMemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent frame.
    pub fn last(&self) -> Option<&AnnotationFrame> {
        self.frames.last()
    }
}

impl AnnotationSink for InMemorySink {
    fn write_frame(&mut self, frame: &AnnotationFrame) -> BatResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

impl<S: AnnotationSink + ?Sized> AnnotationSink for Box<S> {
    fn write_frame(&mut self, frame: &AnnotationFrame) -> BatResult<()> {
        (**self).write_frame(frame)
    }
}
