//! Results reporting and formatting.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

use crate::bench::{ComputeReport, GraphReport};

/// Formats benchmark results for output.
pub struct ResultsReport;

impl ResultsReport {
    fn table(title: String) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![title, String::new()]);
        table
    }

    fn add_graph_rows(table: &mut Table, report: &GraphReport) {
        table.add_row(vec!["Shape:".to_string(), format!("{:?}", report.shape)]);
        table.add_row(vec!["Blocks:".to_string(), format!("{:?}", report.numblocks)]);
        table.add_row(vec![
            "Build time:".to_string(),
            format!("{:.2} ms", report.build_ms),
        ]);
        table.add_row(vec!["Tasks:".to_string(), report.total_tasks.to_string()]);
        for layer in &report.layers {
            table.add_row(vec![
                format!("  {}", layer.name),
                format!(
                    "{} tasks {:?}{}",
                    layer.tasks,
                    layer.numblocks,
                    if layer.fuse { "" } else { " (no fuse)" }
                ),
            ]);
        }
        table.add_row(vec![
            "Window index:".to_string(),
            format!("{:.1} KB", report.window_index_bytes as f64 / 1024.0),
        ]);
    }

    /// Format a graph report as a console table.
    pub fn format_graph_table(report: &GraphReport) -> String {
        let mut table = Self::table(format!("Stack Graph: {}", report.scenario));
        Self::add_graph_rows(&mut table, report);
        table.add_row(vec![
            "Readers created:".to_string(),
            report.readers_created.to_string(),
        ]);
        table.to_string()
    }

    /// Format a compute report as a console table.
    pub fn format_compute_table(report: &ComputeReport) -> String {
        let mut table = Self::table(format!("Stack Compute: {}", report.graph.scenario));
        Self::add_graph_rows(&mut table, &report.graph);

        table.add_row(vec![String::new(), String::new()]);
        table.add_row(vec![
            "Threads:".to_string(),
            match report.threads {
                0 => "auto".to_string(),
                n => n.to_string(),
            },
        ]);
        table.add_row(vec!["Chunks:".to_string(), report.chunks.to_string()]);
        table.add_row(vec![
            "Compute time:".to_string(),
            format!("{:.1} ms", report.compute_ms),
        ]);
        table.add_row(vec![
            "Chunks/sec:".to_string(),
            format!("{:.1}", report.chunks_per_second),
        ]);
        table.add_row(vec![
            "Data / fill blocks:".to_string(),
            format!("{} / {}", report.stats.data_blocks, report.stats.fill_blocks),
        ]);
        table.add_row(vec![
            "Readers created:".to_string(),
            format!(
                "{} ({} cells realized)",
                report.readers_created, report.stats.reader_table_tasks
            ),
        ]);
        table.add_row(vec!["Reads:".to_string(), report.reads.to_string()]);

        let l = &report.chunk_latency;
        table.add_row(vec![String::new(), String::new()]);
        table.add_row(vec![
            "Chunk latency (ms)".to_string(),
            "p50 / p90 / p99 / max".to_string(),
        ]);
        table.add_row(vec![
            String::new(),
            format!("{:.2} / {:.2} / {:.2} / {:.2}", l.p50, l.p90, l.p99, l.max),
        ]);

        table.to_string()
    }

    /// Format any report as JSON.
    pub fn format_json<R: serde::Serialize>(report: &R) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::LayerSummary;

    fn graph_report() -> GraphReport {
        GraphReport {
            scenario: "tiny".to_string(),
            shape: [2, 1, 8, 8],
            numblocks: [2, 1, 2, 2],
            build_ms: 0.25,
            total_tasks: 10,
            layers: vec![
                LayerSummary {
                    name: "reader-table-abc".to_string(),
                    numblocks: vec![2, 1],
                    tasks: 2,
                    fuse: false,
                },
                LayerSummary {
                    name: "fetch-raster-window-abc".to_string(),
                    numblocks: vec![2, 1, 2, 2],
                    tasks: 8,
                    fuse: true,
                },
            ],
            window_index_bytes: 2048,
            readers_created: 0,
        }
    }

    #[test]
    fn test_graph_table_mentions_barrier() {
        let text = ResultsReport::format_graph_table(&graph_report());
        assert!(text.contains("Stack Graph: tiny"));
        assert!(text.contains("reader-table-abc"));
        assert!(text.contains("(no fuse)"));
        assert!(text.contains("2.0 KB"));
    }

    #[test]
    fn test_graph_json() {
        let json = ResultsReport::format_json(&graph_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_tasks"], 10);
        assert_eq!(value["layers"][0]["fuse"], false);
    }
}
