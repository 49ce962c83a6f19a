/// Webcam capture as a scoped-acquisition session
///
/// The camera is the only exclusive-acquisition resource in the pipeline, so
/// it is modeled explicitly: opening returns a `CameraSession` whose stream
/// is stopped on `close()` and again (idempotently) on `Drop`. Every exit
/// path — capture success, user cancel, error, modal teardown — releases the
/// device without relying on UI unmount side effects.
///
/// Acquisition and capture are slow (device I/O, OS permission prompts,
/// resize + encode), so the UI runs both on blocking tasks. `VideoStream` is
/// therefore `Send`: a session must be able to move to a worker thread and
/// back.
///
/// Device access itself sits behind the `VideoStream` trait. The real
/// nokhwa-backed stream is compiled only with the `native-camera` feature;
/// without it, acquisition reports `CameraAccessDenied` with an explanation
/// instead of pretending a device exists.

use image::RgbImage;

use crate::capture::normalize::{self, ImageBuffer, NormalizeConstraints};
use crate::error::CaptureError;

/// A live video input: acquisition happens in the constructor of the
/// concrete stream, so holding one means holding the device.
pub trait VideoStream: Send {
    /// Grab the current frame. Fails once the stream is stopped.
    fn frame(&mut self) -> Result<RgbImage, CaptureError>;

    /// Stop the stream and release the device. Must be idempotent.
    fn stop(&mut self);

    /// Whether the stream has been stopped
    fn is_stopped(&self) -> bool;
}

/// Scoped wrapper guaranteeing release on every exit path
pub struct CameraSession {
    stream: Box<dyn VideoStream>,
}

impl CameraSession {
    /// Wrap an already-acquired stream
    pub fn new(stream: Box<dyn VideoStream>) -> Self {
        Self { stream }
    }

    /// Open the default device. Blocks until the device is acquired, so the
    /// caller runs this on a blocking task. Without the `native-camera`
    /// feature there is no backend to acquire, which reports as an access
    /// error, not a hang.
    pub fn open_default() -> Result<Self, CaptureError> {
        #[cfg(feature = "native-camera")]
        {
            native::NativeStream::open().map(|s| Self::new(Box::new(s)))
        }
        #[cfg(not(feature = "native-camera"))]
        {
            Err(CaptureError::CameraAccessDenied(
                "no camera backend compiled in (build with --features native-camera)".to_string(),
            ))
        }
    }

    /// Current frame for the live preview, unprocessed
    pub fn preview_frame(&mut self) -> Result<RgbImage, CaptureError> {
        self.stream.frame()
    }

    /// Capture: draw the current frame and run it through the same
    /// resize/re-encode path as picked files
    pub fn capture(
        &mut self,
        constraints: &NormalizeConstraints,
    ) -> Result<ImageBuffer, CaptureError> {
        let frame = self.stream.frame()?;
        normalize::normalize_frame(frame, constraints)
    }

    /// Explicit release; Drop covers the paths that never get here
    pub fn close(mut self) {
        self.stream.stop();
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stream.stop();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("stopped", &self.stream.is_stopped())
            .finish()
    }
}

#[cfg(feature = "native-camera")]
mod native {
    use std::sync::mpsc;
    use std::thread;

    use image::RgbImage;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::Camera;

    use super::VideoStream;
    use crate::error::CaptureError;

    enum Command {
        Frame,
        Stop,
    }

    /// nokhwa-backed stream for the default device. The `Camera` itself
    /// lives on a dedicated worker thread and is driven over channels, so
    /// the stream handle can move between threads freely.
    pub struct NativeStream {
        commands: mpsc::Sender<Command>,
        frames: mpsc::Receiver<Result<RgbImage, CaptureError>>,
        stopped: bool,
    }

    impl NativeStream {
        pub fn open() -> Result<Self, CaptureError> {
            let (commands, command_rx) = mpsc::channel::<Command>();
            let (frame_tx, frames) = mpsc::channel();
            let (ready_tx, ready_rx) = mpsc::channel();

            thread::spawn(move || {
                let mut camera = match acquire() {
                    Ok(camera) => {
                        let _ = ready_tx.send(Ok(()));
                        camera
                    }
                    Err(error) => {
                        let _ = ready_tx.send(Err(error));
                        return;
                    }
                };

                while let Ok(Command::Frame) = command_rx.recv() {
                    let _ = frame_tx.send(grab(&mut camera));
                }
                // Stop command or all senders dropped
                let _ = camera.stop_stream();
            });

            ready_rx
                .recv()
                .map_err(|_| CaptureError::CameraAccessDenied("camera worker exited".to_string()))??;

            Ok(Self {
                commands,
                frames,
                stopped: false,
            })
        }
    }

    fn acquire() -> Result<Camera, CaptureError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(0), requested)
            .map_err(|e| CaptureError::CameraAccessDenied(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::CameraAccessDenied(e.to_string()))?;
        Ok(camera)
    }

    fn grab(camera: &mut Camera) -> Result<RgbImage, CaptureError> {
        let buffer = camera
            .frame()
            .map_err(|e| CaptureError::Decode(e.to_string()))?;
        buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Decode(e.to_string()))
    }

    impl VideoStream for NativeStream {
        fn frame(&mut self) -> Result<RgbImage, CaptureError> {
            if self.stopped {
                return Err(CaptureError::CameraClosed);
            }
            self.commands
                .send(Command::Frame)
                .map_err(|_| CaptureError::CameraClosed)?;
            self.frames.recv().map_err(|_| CaptureError::CameraClosed)?
        }

        fn stop(&mut self) {
            if !self.stopped {
                let _ = self.commands.send(Command::Stop);
                self.stopped = true;
            }
        }

        fn is_stopped(&self) -> bool {
            self.stopped
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Fake stream whose stopped flag outlives the session, so tests can
    /// observe release after Drop
    struct FakeStream {
        stopped: Arc<AtomicBool>,
    }

    impl VideoStream for FakeStream {
        fn frame(&mut self) -> Result<RgbImage, CaptureError> {
            if self.stopped.load(Ordering::SeqCst) {
                return Err(CaptureError::CameraClosed);
            }
            Ok(RgbImage::from_pixel(320, 240, image::Rgb([5, 5, 5])))
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn is_stopped(&self) -> bool {
            self.stopped.load(Ordering::SeqCst)
        }
    }

    fn fake_session() -> (CameraSession, Arc<AtomicBool>) {
        let stopped = Arc::new(AtomicBool::new(false));
        let stream = FakeStream {
            stopped: Arc::clone(&stopped),
        };
        (CameraSession::new(Box::new(stream)), stopped)
    }

    #[test]
    fn cancel_before_capture_stops_the_stream() {
        let (session, stopped) = fake_session();
        assert!(!stopped.load(Ordering::SeqCst));
        session.close();
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn teardown_without_close_still_releases_the_device() {
        let (session, stopped) = fake_session();
        drop(session);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn capture_runs_the_normalize_path_then_session_can_close() {
        let (mut session, stopped) = fake_session();
        let constraints = NormalizeConstraints {
            max_size_mb: 10.0,
            max_width: 160,
            max_height: 160,
            quality: 80,
        };
        let buf = session.capture(&constraints).unwrap();
        assert_eq!((buf.width, buf.height), (160, 120));
        assert_eq!(buf.mime, "image/jpeg");
        session.close();
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn session_moves_to_a_worker_thread_for_background_capture() {
        // Capture runs on a blocking task off the event thread, so the
        // session must be able to cross threads and still release cleanly
        let (mut session, stopped) = fake_session();
        let constraints = NormalizeConstraints {
            max_size_mb: 10.0,
            max_width: 160,
            max_height: 160,
            quality: 80,
        };
        let handle = std::thread::spawn(move || {
            let result = session.capture(&constraints);
            session.close();
            result
        });
        let buf = handle.join().unwrap().unwrap();
        assert_eq!((buf.width, buf.height), (160, 120));
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn frame_after_stop_reports_closed() {
        let stopped = Arc::new(AtomicBool::new(false));
        let mut stream = FakeStream {
            stopped: Arc::clone(&stopped),
        };
        stream.stop();
        stream.stop(); // idempotent
        assert!(stream.is_stopped());
        assert_eq!(stream.frame(), Err(CaptureError::CameraClosed));
    }

    #[test]
    fn missing_backend_is_a_reportable_error() {
        #[cfg(not(feature = "native-camera"))]
        {
            let result = CameraSession::open_default();
            assert!(matches!(
                result.err(),
                Some(CaptureError::CameraAccessDenied(_))
            ));
        }
    }
}
