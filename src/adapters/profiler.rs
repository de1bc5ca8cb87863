//! Built-in profiler: writes an HTML report plus a JSON sidecar.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::data::summary::{self, ColumnSummary};
use crate::data::TabularDataset;
use crate::error::{PortError, PortResult};
use crate::ports::{Profiler, ReportHandle};

pub struct SummaryProfiler {
    reports_dir: PathBuf,
}

#[derive(Serialize)]
struct ProfileDocument<'a> {
    dataset: &'a str,
    rows: usize,
    columns: usize,
    summary: &'a [ColumnSummary],
}

impl SummaryProfiler {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    fn stem(dataset: &TabularDataset) -> String {
        Path::new(dataset.name())
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("dataset")
            .to_string()
    }
}

impl Profiler for SummaryProfiler {
    fn profile(&self, dataset: &TabularDataset) -> PortResult<ReportHandle> {
        if dataset.n_cols() == 0 {
            return Err(PortError::Profiling(format!("'{}' has no columns", dataset.name())));
        }
        if dataset.n_rows() == 0 {
            return Err(PortError::Profiling(format!("'{}' has no rows", dataset.name())));
        }

        let summaries = summary::describe(dataset);
        fs::create_dir_all(&self.reports_dir)?;
        let stem = Self::stem(dataset);

        let html_path = self.reports_dir.join(format!("{stem}_profile.html"));
        fs::write(&html_path, render_html(dataset, &summaries))?;

        let doc = ProfileDocument {
            dataset: dataset.name(),
            rows: dataset.n_rows(),
            columns: dataset.n_cols(),
            summary: &summaries,
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| PortError::Profiling(format!("serializing summary: {e}")))?;
        fs::write(self.reports_dir.join(format!("{stem}_profile.json")), json)?;

        Ok(ReportHandle { path: html_path })
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_default()
}

fn render_html(dataset: &TabularDataset, summaries: &[ColumnSummary]) -> String {
    let title = escape(dataset.name());
    let mut html = String::new();
    // Writing to a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Profile: {title}</title>\
         <style>body{{font-family:sans-serif}}table{{border-collapse:collapse}}\
         td,th{{border:1px solid #ccc;padding:4px 8px;text-align:right}}</style></head><body>\n\
         <h1>{title}</h1>\n<p>{} rows &times; {} columns</p>\n",
        dataset.n_rows(),
        dataset.n_cols()
    );
    html.push_str(
        "<table><tr><th>column</th><th>dtype</th><th>count</th><th>missing</th><th>unique</th>\
         <th>mean</th><th>std</th><th>min</th><th>max</th><th>top</th><th>freq</th></tr>\n",
    );
    for s in summaries {
        let n = s.numeric.as_ref();
        let (top, freq) = s
            .top
            .as_ref()
            .map(|(v, f)| (escape(v), f.to_string()))
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "<tr><th>{}</th><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{}</td><td>{top}</td><td>{freq}</td></tr>",
            escape(&s.name),
            s.dtype,
            s.count,
            s.missing,
            s.unique,
            fmt_opt(n.map(|n| n.mean)),
            fmt_opt(n.map(|n| n.std)),
            fmt_opt(n.map(|n| n.min)),
            fmt_opt(n.map(|n| n.max)),
        );
    }
    html.push_str("</table>\n</body></html>\n");
    html
}
