use crate::annotation::encoder::{AnnotationEncoder, FrameState};
use crate::annotation::frame::AnnotationFrame;
use crate::annotation::modality::ModalityFlags;
use crate::annotation::registry::ClassRegistry;
use crate::camera::distortion::InverseDistortionMap;
use crate::camera::intrinsics::CameraIntrinsics;
use crate::command::dispatch::{ApplyReport, Dispatcher};
use crate::command::schema::Command;
use crate::config::{BatConfig, OutputConfig};
use crate::encode::sink::AnnotationSink;
use crate::foundation::core::{Pose, Resolution};
use crate::foundation::error::BatResult;
use crate::host::{AnnotationSource, RenderOutcome, RenderRequest, SceneHost};
use crate::remote::queue::PendingCommandQueue;

/// Outcome of one drained command.
#[derive(Debug)]
pub struct CommandReport {
    /// Queue sequence number.
    pub seq: u64,
    /// Per-step outcomes.
    pub report: ApplyReport,
}

/// Everything one tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Drained commands in arrival order.
    pub commands: Vec<CommandReport>,
}

impl TickReport {
    /// Number of commands applied this tick.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the queue was empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of failed sub-payloads across all commands.
    pub fn failure_count(&self) -> usize {
        self.commands
            .iter()
            .map(|c| c.report.failures().count())
            .sum()
    }
}

/// Inverse distortion map, regenerated only when the camera or resolution changes.
#[derive(Debug, Default)]
struct DistortionCache {
    key: Option<(CameraIntrinsics, Resolution)>,
    map: Option<InverseDistortionMap>,
}

impl DistortionCache {
    fn get(
        &mut self,
        camera: CameraIntrinsics,
        resolution: Resolution,
    ) -> BatResult<&InverseDistortionMap> {
        let key = Some((camera, resolution));
        if self.key != key {
            self.map = None;
        }
        let map = match self.map.take() {
            Some(map) => map,
            None => {
                tracing::debug!(?resolution, "generating inverse distortion map");
                InverseDistortionMap::generate(resolution, &camera)?
            }
        };
        self.key = key;
        Ok(self.map.insert(map))
    }
}

/// The parts of a session an encode pass needs, borrowed together.
struct Annotator<'a> {
    registry: &'a mut ClassRegistry,
    encoder: AnnotationEncoder,
    modalities: ModalityFlags,
    output: &'a OutputConfig,
    sink: &'a mut dyn AnnotationSink,
    distortion: &'a mut DistortionCache,
}

impl Annotator<'_> {
    fn annotate(
        &mut self,
        frame: i64,
        camera: CameraIntrinsics,
        source: &dyn AnnotationSource,
    ) -> BatResult<AnnotationFrame> {
        let mut out = self.encoder.encode(
            FrameState {
                frame,
                source,
                registry: self.registry,
            },
            self.modalities,
        )?;
        if self.output.distortion_map && camera.has_distortion() {
            let map = self.distortion.get(camera, out.resolution)?;
            out.insert(map.clone().into_channel()?)?;
        }
        if self.output.write_preview {
            out.preview = out.preview_rgba8(self.registry);
        }
        self.sink.write_frame(&out)?;
        tracing::info!(frame, channels = out.channels.len(), "annotation frame written");
        Ok(out)
    }
}

/// Host wrapper that runs the annotation pass after renders that request it.
struct AnnotatingHost<'h, 'a, H> {
    host: &'h mut H,
    annotator: &'h mut Annotator<'a>,
}

impl<H: SceneHost + AnnotationSource> SceneHost for AnnotatingHost<'_, '_, H> {
    fn camera(&self) -> CameraIntrinsics {
        self.host.camera()
    }

    fn set_camera(&mut self, camera: CameraIntrinsics) -> BatResult<()> {
        self.host.set_camera(camera)
    }

    fn object_pose(&self, name: &str) -> Option<Pose> {
        self.host.object_pose(name)
    }

    fn set_object_pose(&mut self, name: &str, pose: Pose) -> BatResult<()> {
        self.host.set_object_pose(name, pose)
    }

    fn current_frame(&self) -> i64 {
        self.host.current_frame()
    }

    fn set_frame(&mut self, frame: i64) -> BatResult<()> {
        self.host.set_frame(frame)
    }

    fn render(&mut self, request: RenderRequest) -> BatResult<RenderOutcome> {
        let mut outcome = self.host.render(request)?;
        if request.annotation {
            let camera = self.host.camera();
            self.annotator.annotate(outcome.frame, camera, &*self.host)?;
            outcome.annotated = true;
        }
        Ok(outcome)
    }
}

/// Annotation state of one host session, plus the tick that applies remote commands.
///
/// The session owns the class registry (and through it the instance allocator), the modality
/// flags and the sink. The queue is shared with the remote server; everything else is touched
/// only from the host tick.
pub struct AnnotationSession {
    registry: ClassRegistry,
    modalities: ModalityFlags,
    encoder: AnnotationEncoder,
    dispatcher: Dispatcher,
    output: OutputConfig,
    sink: Box<dyn AnnotationSink>,
    queue: PendingCommandQueue,
    distortion: DistortionCache,
}

impl AnnotationSession {
    /// New session with an empty registry (Background only).
    pub fn new(config: &BatConfig, sink: Box<dyn AnnotationSink>) -> Self {
        Self {
            registry: ClassRegistry::new(),
            modalities: config.modalities,
            encoder: AnnotationEncoder::new(config.output.export_class_info),
            dispatcher: Dispatcher::new(config.output.save_annotation),
            output: config.output.clone(),
            sink,
            queue: PendingCommandQueue::new(),
            distortion: DistortionCache::default(),
        }
    }

    /// Class registry.
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Mutable class registry (UI-side edits happen on the host thread too).
    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    /// Auxiliary channels produced by every annotation pass.
    pub fn modalities(&self) -> ModalityFlags {
        self.modalities
    }

    /// Change the auxiliary channels.
    pub fn set_modalities(&mut self, modalities: ModalityFlags) {
        self.modalities = modalities;
    }

    /// Queue shared with the remote server.
    pub fn queue(&self) -> &PendingCommandQueue {
        &self.queue
    }

    /// Enqueue a command locally, as the server would.
    pub fn submit(&self, command: Command) -> u64 {
        self.queue.push(command)
    }

    fn annotator(&mut self) -> Annotator<'_> {
        Annotator {
            registry: &mut self.registry,
            encoder: self.encoder,
            modalities: self.modalities,
            output: &self.output,
            sink: self.sink.as_mut(),
            distortion: &mut self.distortion,
        }
    }

    /// Drain the queue and apply every command in arrival order.
    ///
    /// Failures are logged and reported; they never stop the remaining commands.
    #[tracing::instrument(skip_all)]
    pub fn tick<H: SceneHost + AnnotationSource>(&mut self, host: &mut H) -> TickReport {
        let drained = self.queue.drain();
        let mut report = TickReport::default();
        if drained.is_empty() {
            return report;
        }
        let dispatcher = self.dispatcher;
        let mut annotator = self.annotator();
        for queued in drained {
            let mut wrapped = AnnotatingHost {
                host: &mut *host,
                annotator: &mut annotator,
            };
            let applied = dispatcher.apply(&queued.command, &mut wrapped);
            for (step, err) in applied.failures() {
                tracing::warn!(seq = queued.seq, %step, error = %err, "queued command step failed");
            }
            report.commands.push(CommandReport {
                seq: queued.seq,
                report: applied,
            });
        }
        tracing::debug!(commands = report.len(), "tick drained queue");
        report
    }

    /// Run one annotation pass for the host's current frame, outside the command path.
    pub fn annotate_now<H: SceneHost + AnnotationSource>(
        &mut self,
        host: &H,
    ) -> BatResult<AnnotationFrame> {
        let frame = host.current_frame();
        let camera = host.camera();
        self.annotator().annotate(frame, camera, host)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/annotation_session.rs"]
mod tests;
