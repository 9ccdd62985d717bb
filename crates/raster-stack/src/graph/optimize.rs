//! Blockwise layer fusion.
//!
//! Inlining a producer into its only consumer saves a round of task
//! materialization, but it repeats the producer's work inside every consumer
//! task. Layers opt out with `LayerAnnotations { fuse: false }`.

use std::sync::Arc;

use raster_common::Element;
use serde::Serialize;
use tracing::debug;

use super::{HighLevelGraph, Layer, ReaderSource};

/// Outcome of a fusion pass, as `(producer, consumer)` layer names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FusionReport {
    pub fused: Vec<(String, String)>,
    /// Candidates skipped because an annotation forbids fusion.
    pub blocked: Vec<(String, String)>,
}

/// Fuse every reader table layer into its fetch layer where allowed.
///
/// A pair fuses only when both layers allow it and the producer has no other
/// dependents. Fused producers are removed from the graph.
pub fn fuse_blockwise<T: Element>(graph: HighLevelGraph<T>) -> (HighLevelGraph<T>, FusionReport) {
    let mut report = FusionReport::default();
    let candidates: Vec<(String, String)> = graph
        .layers()
        .iter()
        .filter_map(|layer| match layer {
            Layer::Fetch(fetch) => match fetch.source() {
                ReaderSource::Layer(producer) => Some((producer.clone(), fetch.name().to_string())),
                ReaderSource::Fused(_) => None,
            },
            Layer::ReaderTable(_) => None,
        })
        .collect();

    let mut to_fuse = Vec::new();
    for (producer, consumer) in candidates {
        let (Some(p), Some(c)) = (graph.layer(&producer), graph.layer(&consumer)) else {
            continue;
        };
        if graph.dependents(&producer).len() != 1 {
            continue;
        }
        if !p.annotations().fuse || !c.annotations().fuse {
            debug!(producer = %producer, consumer = %consumer, "Fusion blocked by annotation");
            report.blocked.push((producer, consumer));
            continue;
        }
        to_fuse.push((producer, consumer));
    }

    if to_fuse.is_empty() {
        return (graph, report);
    }

    let (mut layers, mut dependencies) = graph.into_parts();
    for (producer, consumer) in to_fuse {
        let Some(pos) = layers.iter().position(|l| l.name() == producer) else {
            continue;
        };
        let Layer::ReaderTable(readers) = &layers[pos] else {
            continue;
        };
        let readers = Arc::clone(readers);

        for layer in layers.iter_mut() {
            if let Layer::Fetch(fetch) = layer {
                if fetch.name() == consumer {
                    fetch.fuse_with(Arc::clone(&readers));
                }
            }
        }
        layers.remove(pos);
        dependencies.remove(&producer);
        if let Some(deps) = dependencies.get_mut(&consumer) {
            deps.remove(&producer);
        }

        debug!(producer = %producer, consumer = %consumer, "Fused blockwise layers");
        report.fused.push((producer, consumer));
    }

    (HighLevelGraph::from_parts(layers, dependencies), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NodataPolicy, ReadError};
    use crate::graph::{FetchLayer, LayerAnnotations, ReaderTableLayer};
    use crate::reader::{Reader, ReaderFactory, ReaderOptions};
    use crate::types::{AssetEntry, AssetTable, Resampling};
    use crate::window_index::Slices;
    use raster_common::{Affine, BoundingBox, RasterSpec};

    #[derive(Debug)]
    struct NoReaders;

    impl ReaderFactory<f32> for NoReaders {
        fn create(
            &self,
            url: &str,
            _options: &Arc<ReaderOptions<f32>>,
        ) -> Result<Arc<dyn Reader<f32>>, ReadError> {
            Err(ReadError::not_found(url, "unused"))
        }
        fn name(&self) -> &str {
            "none"
        }
    }

    fn graph(annotations: LayerAnnotations) -> HighLevelGraph<f32> {
        let table = AssetTable::from_rows(vec![vec![AssetEntry::missing()]]).unwrap();
        let options = ReaderOptions {
            spec: Arc::new(RasterSpec::new((2, 2), Affine::identity())),
            resampling: Resampling::Nearest,
            fill_value: f32::NAN,
            rescale: true,
            env: None,
            errors_as_nodata: NodataPolicy::new(),
        };
        let readers = ReaderTableLayer::new(
            "readers",
            Arc::new(table),
            Arc::new(options),
            Arc::new(NoReaders),
            annotations,
        );
        let fetch = FetchLayer::new(
            "fetch",
            &readers,
            Arc::new(Slices::new(&[vec![1, 1], vec![2]])),
            NodataPolicy::new(),
        )
        .unwrap();

        let mut graph = HighLevelGraph::new();
        graph.add_layer(Layer::ReaderTable(Arc::new(readers)), &[]).unwrap();
        graph.add_layer(Layer::Fetch(fetch), &["readers"]).unwrap();
        graph
    }

    #[test]
    fn test_no_fuse_annotation_blocks() {
        let (graph, report) = fuse_blockwise(graph(LayerAnnotations::no_fuse()));
        assert!(report.fused.is_empty());
        assert_eq!(report.blocked, vec![("readers".to_string(), "fetch".to_string())]);
        assert_eq!(graph.layers().len(), 2);
        assert!(!graph.output().unwrap().is_fused());
    }

    #[test]
    fn test_fuses_when_allowed() {
        let (graph, report) = fuse_blockwise(graph(LayerAnnotations::default()));
        assert_eq!(report.fused, vec![("readers".to_string(), "fetch".to_string())]);
        assert_eq!(graph.layers().len(), 1);
        let fetch = graph.output().unwrap();
        assert!(fetch.is_fused());
        assert!(graph.dependencies("fetch").unwrap().is_empty());
        assert!(graph.layer("readers").is_none());

        // Fused cells are still resolvable
        let entry = graph.reader_cell(fetch, [0, 0]).unwrap();
        assert!(entry.is_fill());
    }
}
