// SPDX-License-Identifier: MIT OR Apache-2.0
//! CPU implementation of the traversal backend.
//!
//! Still images are decoded with the `image` crate. The built-in `math` and
//! `cross_dissolve` shaders are evaluated per pixel on the CPU. Video and
//! audio decoding is not available, so those streams resolve to nothing.

use reel_graph::job::ShaderJob;
use reel_graph::media::{Frame, StreamKind, StreamRef, VideoParams};
use reel_graph::nodes::math::{MATH_SHADER, METHOD_INPUT, PARAM_A_INPUT, PARAM_B_INPUT};
use reel_graph::nodes::transition::{CROSS_DISSOLVE_SHADER, IN_BLOCK_INPUT, OUT_BLOCK_INPUT, PROGRESS};
use reel_graph::nodes::MathOperation;
use reel_graph::traverser::ResolveError;
use reel_graph::{Color, Node, ParamValue, TraverserBackend};
use reel_time::{Rational, TimeRange};
use std::path::Path;
use std::sync::Arc;

const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

/// Renders on the CPU at a fixed resolution
#[derive(Debug, Clone, Copy)]
pub struct CpuBackend {
    params: VideoParams,
}

impl CpuBackend {
    /// Create a backend producing frames of the given size
    pub fn new(params: VideoParams) -> Self {
        Self { params }
    }
}

/// Decode an image file into a frame
pub fn decode_image(path: &Path) -> Result<Frame, ResolveError> {
    let unreadable = |reason: String| ResolveError::Unreadable {
        path: path.to_path_buf(),
        reason,
    };
    let image = image::open(path).map_err(|e| unreadable(e.to_string()))?.to_rgba32f();
    let (width, height) = image.dimensions();
    let pixels = image
        .pixels()
        .map(|p| Color::new(p[0], p[1], p[2], p[3]))
        .collect();
    Frame::from_pixels(width, height, pixels).ok_or_else(|| unreadable("pixel count mismatch".into()))
}

/// One side of a per-pixel operation
enum Operand<'a> {
    Frame(&'a Frame),
    Color(Color),
    Scalar(f32),
}

impl<'a> Operand<'a> {
    fn from_value(value: &'a ParamValue) -> Option<Self> {
        match value {
            ParamValue::Texture(frame) => Some(Self::Frame(frame)),
            ParamValue::Color(color) => Some(Self::Color(*color)),
            other => other.as_float().ok().map(|s| Self::Scalar(s as f32)),
        }
    }

    fn frame(&self) -> Option<&'a Frame> {
        match self {
            Self::Frame(frame) => Some(*frame),
            _ => None,
        }
    }
}

fn math_pixel(op: MathOperation, a: &Operand<'_>, b: &Operand<'_>, x: u32, y: u32) -> Color {
    let sample = |operand: &Operand<'_>| match operand {
        Operand::Frame(frame) => frame.pixel(x, y).unwrap_or(TRANSPARENT),
        Operand::Color(color) => *color,
        Operand::Scalar(_) => TRANSPARENT,
    };
    match (a, b) {
        (Operand::Scalar(s), other) => op.apply_scalar(sample(other), *s, true),
        (other, Operand::Scalar(s)) => op.apply_scalar(sample(other), *s, false),
        _ => op.apply_color(sample(a), sample(b)),
    }
}

fn run_math(job: &ShaderJob) -> Result<Frame, ResolveError> {
    let op = job
        .value(METHOD_INPUT)
        .and_then(|v| v.as_int().ok())
        .map(MathOperation::from_index)
        .unwrap_or_default();
    let operand = |id: &str| {
        job.value(id)
            .and_then(Operand::from_value)
            .ok_or_else(|| ResolveError::Unsupported(format!("math operand {id}")))
    };
    let a = operand(PARAM_A_INPUT)?;
    let b = operand(PARAM_B_INPUT)?;
    let size = a
        .frame()
        .or_else(|| b.frame())
        .ok_or_else(|| ResolveError::Unsupported("math shader without a texture".into()))?;

    let (width, height) = (size.width(), size.height());
    let pixels = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| math_pixel(op, &a, &b, x, y))
        .collect();
    Frame::from_pixels(width, height, pixels)
        .ok_or_else(|| ResolveError::Unsupported("math output size".into()))
}

fn run_cross_dissolve(job: &ShaderJob) -> Result<Frame, ResolveError> {
    let texture = |id: &str| job.value(id).and_then(|v| v.as_texture().ok()).cloned();
    let outgoing = texture(OUT_BLOCK_INPUT);
    let incoming = texture(IN_BLOCK_INPUT);
    let progress = job.value(PROGRESS).and_then(|v| v.as_float().ok()).unwrap_or(0.0) as f32;

    let size = outgoing
        .as_ref()
        .or(incoming.as_ref())
        .ok_or_else(|| ResolveError::Unsupported("cross dissolve without inputs".into()))?;
    let (width, height) = (size.width(), size.height());
    let at = |frame: &Option<Arc<Frame>>, x: u32, y: u32| {
        frame.as_ref().and_then(|f| f.pixel(x, y)).unwrap_or(TRANSPARENT)
    };

    let pixels = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| at(&outgoing, x, y).lerp(at(&incoming, x, y), progress))
        .collect();
    Frame::from_pixels(width, height, pixels)
        .ok_or_else(|| ResolveError::Unsupported("cross dissolve output size".into()))
}

impl TraverserBackend for CpuBackend {
    fn video_params(&self) -> VideoParams {
        self.params
    }

    fn decode_frame(&self, stream: &StreamRef, _time: Rational) -> Result<Frame, ResolveError> {
        let path = &stream.footage.filename;
        match stream.stream().map(|s| s.kind) {
            Some(StreamKind::Image) => decode_image(path),
            _ => Err(ResolveError::NoDecoder(path.display().to_string())),
        }
    }

    fn run_shader(&self, node: &Node, _range: TimeRange, job: &ShaderJob) -> Result<Option<Frame>, ResolveError> {
        let frame = match job.shader_id.as_str() {
            MATH_SHADER => run_math(job)?,
            CROSS_DISSOLVE_SHADER => run_cross_dissolve(job)?,
            other => {
                return Err(ResolveError::Unsupported(format!(
                    "shader {other} from {}",
                    node.display_name()
                )))
            }
        };
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_graph::media::{Footage, Stream};

    fn frame(color: Color) -> ParamValue {
        ParamValue::Texture(Arc::new(Frame::filled(2, 1, color)))
    }

    #[test]
    fn test_math_texture_times_scalar() {
        let job = ShaderJob::new(MATH_SHADER)
            .with_value(METHOD_INPUT, ParamValue::Combo(MathOperation::Multiply.index()))
            .with_value(PARAM_A_INPUT, frame(Color::new(0.5, 0.25, 1.0, 1.0)))
            .with_value(PARAM_B_INPUT, ParamValue::Float(0.5));
        let out = run_math(&job).unwrap();
        assert_eq!(out.width(), 2);
        assert_eq!(out.pixel(1, 0), Some(Color::new(0.25, 0.125, 0.5, 1.0)));
    }

    #[test]
    fn test_math_without_texture_is_unsupported() {
        let job = ShaderJob::new(MATH_SHADER)
            .with_value(PARAM_A_INPUT, ParamValue::Float(1.0))
            .with_value(PARAM_B_INPUT, ParamValue::Float(1.0));
        assert!(matches!(run_math(&job), Err(ResolveError::Unsupported(_))));
    }

    #[test]
    fn test_cross_dissolve_midpoint() {
        let job = ShaderJob::new(CROSS_DISSOLVE_SHADER)
            .with_value(OUT_BLOCK_INPUT, frame(Color::BLACK))
            .with_value(IN_BLOCK_INPUT, frame(Color::WHITE))
            .with_value(PROGRESS, ParamValue::Float(0.5));
        let out = run_cross_dissolve(&job).unwrap();
        assert_eq!(out.pixel(0, 0), Some(Color::new(0.5, 0.5, 0.5, 1.0)));
    }

    #[test]
    fn test_cross_dissolve_from_nothing_fades_in() {
        let job = ShaderJob::new(CROSS_DISSOLVE_SHADER)
            .with_value(OUT_BLOCK_INPUT, ParamValue::None)
            .with_value(IN_BLOCK_INPUT, frame(Color::WHITE))
            .with_value(PROGRESS, ParamValue::Float(0.25));
        let out = run_cross_dissolve(&job).unwrap();
        assert_eq!(out.pixel(0, 0), Some(Color::new(0.25, 0.25, 0.25, 0.25)));
    }

    #[test]
    fn test_decodes_still_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let footage = Footage::new(&path, 0, vec![Stream::new(0, StreamKind::Image, Rational::ONE)]);
        let stream = StreamRef::new(Arc::new(footage), 0);
        let backend = CpuBackend::new(VideoParams::default());
        let decoded = backend.decode_frame(&stream, Rational::ZERO).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert_eq!(decoded.pixel(2, 1), Some(Color::new(1.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_video_and_missing_files_fail_softly() {
        let backend = CpuBackend::new(VideoParams::default());
        let video = Footage::new("clip.mov", 0, vec![Stream::new(0, StreamKind::Video, Rational::ONE)]);
        let stream = StreamRef::new(Arc::new(video), 0);
        assert!(matches!(
            backend.decode_frame(&stream, Rational::ZERO),
            Err(ResolveError::NoDecoder(_))
        ));

        let missing = Footage::new("missing.png", 0, vec![Stream::new(0, StreamKind::Image, Rational::ONE)]);
        let stream = StreamRef::new(Arc::new(missing), 0);
        assert!(matches!(
            backend.decode_frame(&stream, Rational::ZERO),
            Err(ResolveError::Unreadable { .. })
        ));
    }
}
