// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cached, parallel rendering of a node over a span of frames.
//!
//! A render holds the graph's upgradable read lock from start to finish.
//! Workers share the graph through it, and once every frame is done it is
//! upgraded in place to clear the rendered ranges from the node's dirty
//! list. Edits wait for the whole render, so an edit made while frames were
//! in flight is never validated away.

use crate::error::{AppError, Result};
use crate::settings::EngineSettings;
use parking_lot::RwLockUpgradableReadGuard;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use reel_graph::cache::CacheStats;
use reel_graph::media::Frame;
use reel_graph::{
    CancelFlag, Color, DataType, Digest, FrameCache, GraphError, NodeGraph, NodeId, NodeValueTable, SharedGraph,
    TraverserBackend,
};
use reel_time::{Rational, TimeRange};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One evaluated frame
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    /// Time span the frame covers
    pub range: TimeRange,
    /// Content digest, shared by identical frames
    pub digest: Digest,
    /// Evaluated output
    pub table: NodeValueTable,
}

impl RenderedFrame {
    /// The rendered picture, if the output carries one
    pub fn texture(&self) -> Option<&Arc<Frame>> {
        self.table.get(DataType::Texture).and_then(|v| v.as_texture().ok())
    }
}

/// Result of a render call
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    /// Completed frames in request order
    pub frames: Vec<RenderedFrame>,
    /// Ranges that were cancelled before completing
    pub cancelled: usize,
    /// Cache counters after the render
    pub cache: CacheStats,
}

/// Split `[start, end)` into frame-long ranges
pub fn frame_ranges(start: Rational, end: Rational, timebase: Rational) -> Result<Vec<TimeRange>> {
    if timebase.is_zero() || timebase.is_negative() {
        return Err(AppError::InvalidArgument(format!("timebase must be positive, got {timebase}")));
    }
    if end < start {
        return Err(AppError::InvalidArgument(format!("end {end} is before start {start}")));
    }

    let mut ranges = Vec::new();
    let mut time = start;
    while time < end {
        let next = time + timebase;
        ranges.push(TimeRange::new(time, next));
        time = next;
    }
    Ok(ranges)
}

/// Renders nodes of a shared graph on a dedicated worker pool
pub struct Renderer {
    graph: SharedGraph,
    backend: Arc<dyn TraverserBackend>,
    cache: FrameCache,
    pool: ThreadPool,
    cancel: CancelFlag,
}

impl Renderer {
    /// Create a renderer configured from settings
    pub fn new(graph: SharedGraph, backend: Arc<dyn TraverserBackend>, settings: &EngineSettings) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("reel-render-{i}"));
        if let Some(threads) = settings.render_threads {
            if threads == 0 {
                return Err(AppError::InvalidArgument("render_threads must be at least 1".into()));
            }
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        tracing::debug!("Render pool started with {} threads", pool.current_num_threads());

        Ok(Self {
            graph,
            backend,
            cache: FrameCache::new(settings.cache_capacity).with_memoization(settings.memoize),
            pool,
            cancel: CancelFlag::new(),
        })
    }

    /// Flag that stops in-flight and future renders
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Render `node` over every range in parallel
    pub fn render(&self, node: NodeId, ranges: &[TimeRange]) -> Result<RenderReport> {
        let graph = self.graph.upgradable_read();
        if !graph.contains(node) {
            return Err(GraphError::NodeNotFound(node).into());
        }

        let results = {
            // Sources see one operation bracket around the whole batch
            let _guards: Vec<_> = graph
                .dependencies(node)
                .into_iter()
                .filter(|dep| graph.immediate_dependencies(*dep).is_empty())
                .map(|source| graph.begin_operation(source))
                .collect();

            let graph: &NodeGraph = &graph;
            let backend = self.backend.as_ref();
            self.pool.install(|| {
                ranges
                    .par_iter()
                    .map(|range| {
                        self.cache
                            .render(graph, backend, node, *range, &self.cancel)
                            .map(|traversal| traversal.map(|(digest, table)| (*range, digest, table)))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
            })?
        };

        let mut report = RenderReport::default();
        for result in results {
            match result.complete() {
                Some((range, digest, table)) => report.frames.push(RenderedFrame { range, digest, table }),
                None => report.cancelled += 1,
            }
        }

        let mut graph = RwLockUpgradableReadGuard::upgrade(graph);
        for frame in &report.frames {
            graph.validate_cache(node, frame.range)?;
        }
        drop(graph);

        report.cache = self.cache.stats();
        tracing::info!(
            "Rendered {} frames ({} cancelled, {} cache hits)",
            report.frames.len(),
            report.cancelled,
            report.cache.hits
        );
        Ok(report)
    }
}

/// Write a frame as an 8-bit PNG
pub fn export_png(frame: &Frame, path: &Path) -> Result<()> {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let image = image::RgbaImage::from_fn(frame.width(), frame.height(), |x, y| {
        let c = frame.pixel(x, y).unwrap_or(Color::new(0.0, 0.0, 0.0, 0.0));
        image::Rgba([to_byte(c.r), to_byte(c.g), to_byte(c.b), to_byte(c.a)])
    });
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Export every frame that carries a picture, returning the written paths
pub fn export_report(report: &RenderReport, dir: &Path, timebase: Rational) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for frame in &report.frames {
        let Some(texture) = frame.texture() else {
            tracing::warn!("No picture at {}, skipping", frame.range);
            continue;
        };
        let index = frame.range.in_point().to_timestamp(timebase).unwrap_or_default();
        let path = dir.join(format!("frame_{index:05}.png"));
        export_png(texture, &path)?;
        written.push(path);
    }
    Ok(written)
}
