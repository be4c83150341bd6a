//! File sinks
//!
//! Append-only, buffered writers for the result stream: JSONL, CSV, a
//! plain-text log, and a standalone HTML report assembled at
//! completion.

use super::{Sink, SinkError};
use crate::types::{Finding, PageResult, Summary};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One JSON object per line, the machine-readable stream.
pub struct JsonlSink {
    writer: BufWriter<File>,
    include_body: bool,
}

impl JsonlSink {
    pub fn create(path: &Path, include_body: bool) -> Result<Self, SinkError> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            include_body,
        })
    }
}

impl Sink for JsonlSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn on_result(&mut self, result: &PageResult) -> Result<(), SinkError> {
        if self.include_body || result.body.is_none() {
            serde_json::to_writer(&mut self.writer, result)?;
        } else {
            let mut stripped = result.clone();
            stripped.body = None;
            serde_json::to_writer(&mut self.writer, &stripped)?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn on_complete(&mut self, _summary: &Summary) -> Result<(), SinkError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Spreadsheet-friendly view of the stream.
pub struct CsvSink {
    writer: BufWriter<File>,
}

impl CsvSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(
            writer,
            "url,final_url,status,content_type,title,depth,discovered_by,links,forms,apis,elapsed_ms,body_size,is_similar"
        )?;
        Ok(Self { writer })
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn on_result(&mut self, result: &PageResult) -> Result<(), SinkError> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            csv_escape(result.url.as_str()),
            csv_escape(&result.final_url),
            result.status,
            csv_escape(result.content_type.as_deref().unwrap_or("")),
            csv_escape(result.title.as_deref().unwrap_or("")),
            result.depth,
            result.discovered_by,
            result.links.len(),
            result.forms.len(),
            result.apis.len(),
            result.elapsed_ms,
            result.body_size,
            result.is_similar,
        )?;
        Ok(())
    }

    fn on_complete(&mut self, _summary: &Summary) -> Result<(), SinkError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Human-readable crawl log plus a closing summary block.
pub struct TextSummarySink {
    writer: BufWriter<File>,
}

impl TextSummarySink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl Sink for TextSummarySink {
    fn name(&self) -> &'static str {
        "text"
    }

    fn on_result(&mut self, result: &PageResult) -> Result<(), SinkError> {
        let marker = if result.is_similar { " [similar]" } else { "" };
        writeln!(
            self.writer,
            "[{}] depth={} links={} forms={} apis={} {}{}",
            result.status,
            result.depth,
            result.links.len(),
            result.forms.len(),
            result.apis.len(),
            result.url,
            marker,
        )?;
        Ok(())
    }

    fn on_sensitive(&mut self, finding: &Finding) -> Result<(), SinkError> {
        writeln!(self.writer, "[finding] {} {} {}", finding.kind, finding.url, finding.detail)?;
        Ok(())
    }

    fn on_complete(&mut self, summary: &Summary) -> Result<(), SinkError> {
        writeln!(self.writer)?;
        writeln!(self.writer, "=== crawl summary ===")?;
        writeln!(self.writer, "target:       {}", summary.target)?;
        writeln!(self.writer, "crawled:      {}", summary.total_crawled)?;
        writeln!(self.writer, "failed:       {}", summary.total_failed)?;
        writeln!(self.writer, "skipped:      {}", summary.total_skipped)?;
        writeln!(self.writer, "apis:         {}", summary.apis_found)?;
        writeln!(self.writer, "forms:        {}", summary.forms_found)?;
        writeln!(self.writer, "subdomains:   {}", summary.subdomains_found)?;
        writeln!(self.writer, "external:     {}", summary.external_links)?;
        writeln!(self.writer, "duration:     {}s", summary.duration_secs)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Standalone HTML report, assembled in memory and written at
/// completion.
pub struct HtmlReportSink {
    path: std::path::PathBuf,
    rows: Vec<String>,
}

impl HtmlReportSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        Ok(Self {
            path: path.to_path_buf(),
            rows: Vec::new(),
        })
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Sink for HtmlReportSink {
    fn name(&self) -> &'static str {
        "html"
    }

    fn on_result(&mut self, result: &PageResult) -> Result<(), SinkError> {
        self.rows.push(format!(
            "<tr><td>{}</td><td><a href=\"{url}\">{url}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            result.status,
            result.depth,
            result.links.len(),
            result.apis.len(),
            html_escape(result.title.as_deref().unwrap_or("")),
            url = html_escape(result.url.as_str()),
        ));
        Ok(())
    }

    fn on_complete(&mut self, summary: &Summary) -> Result<(), SinkError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        writeln!(
            writer,
            "<!doctype html><html><head><meta charset=\"utf-8\">\
             <title>Recon report: {target}</title>\
             <style>body{{font-family:sans-serif;margin:2em}}\
             table{{border-collapse:collapse;width:100%}}\
             td,th{{border:1px solid #ccc;padding:4px 8px;text-align:left}}\
             th{{background:#f0f0f0}}</style></head><body>\
             <h1>Recon report: {target}</h1>\
             <p>{crawled} pages crawled, {failed} failed, {apis} API endpoints, \
             {forms} forms, {subs} subdomains in {secs}s.</p>\
             <table><tr><th>Status</th><th>URL</th><th>Depth</th>\
             <th>Links</th><th>APIs</th><th>Title</th></tr>",
            target = html_escape(&summary.target),
            crawled = summary.total_crawled,
            failed = summary.total_failed,
            apis = summary.apis_found,
            forms = summary.forms_found,
            subs = summary.subdomains_found,
            secs = summary.duration_secs,
        )?;
        for row in &self.rows {
            writeln!(writer, "{row}")?;
        }
        writeln!(writer, "</table></body></html>")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::types::{DiscoverySource, ResourceClass};
    use tempfile::tempdir;

    fn sample_result() -> PageResult {
        let mut result = PageResult::skeletal(
            canonicalize("https://example.com/a?x=1").unwrap(),
            "https://example.com/a?x=1".into(),
            200,
            vec![],
            Some("text/html".into()),
            ResourceClass::Html,
            1,
            DiscoverySource::Link,
            12,
            512,
        );
        result.title = Some("A, \"quoted\" title".into());
        result
    }

    fn sample_summary() -> Summary {
        Summary {
            task_id: "t".into(),
            target: "https://example.com".into(),
            total_crawled: 1,
            total_failed: 0,
            total_skipped: 0,
            apis_found: 0,
            forms_found: 0,
            subdomains_found: 0,
            external_links: 0,
            duration_secs: 3,
        }
    }

    #[test]
    fn test_jsonl_sink_writes_one_line_per_result() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut sink = JsonlSink::create(&path, false).unwrap();
        sink.on_result(&sample_result()).unwrap();
        sink.on_result(&sample_result()).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["status"], 200);
    }

    #[test]
    fn test_csv_sink_escapes_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.on_result(&sample_result()).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("url,final_url,status"));
        assert!(content.contains("\"A, \"\"quoted\"\" title\""));
    }

    #[test]
    fn test_text_sink_summary_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut sink = TextSummarySink::create(&path).unwrap();
        sink.on_result(&sample_result()).unwrap();
        sink.on_complete(&sample_summary()).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("=== crawl summary ==="));
        assert!(content.contains("crawled:      1"));
    }

    #[test]
    fn test_html_report_written_on_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.html");
        let mut sink = HtmlReportSink::create(&path).unwrap();
        sink.on_result(&sample_result()).unwrap();
        assert!(!path.exists());
        sink.on_complete(&sample_summary()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<h1>Recon report: https://example.com</h1>"));
        assert!(content.contains("example.com/a?x=1"));
    }
}
