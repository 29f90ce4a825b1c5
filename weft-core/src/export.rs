//! CSV export of merged `va` queries
//!
//! ```text
//! time,Temperature,ds-rh
//! 2020-01-01 00:00:00,21.5,80
//! 2020-01-01 00:10:00,21.7,
//! ```
//!
//! Column titles come from the query's `column_names`, falling back to the
//! datastream id. Missing values are empty cells.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::debug;
use serde_json::Value;

use crate::errors::ExportError;
use crate::query::{Find, MergeQuery, MergedItem, Payload, QueryOptions};
use crate::time::to_column_time;

/// Writes merged `va` items as CSV rows
pub struct CsvExporter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvExporter<File> {
    /// Create (or truncate) `path` and write the header row
    pub fn create(path: impl AsRef<Path>, options: &QueryOptions) -> Result<Self, ExportError> {
        let file = File::create(path)?;
        Self::new(file, options)
    }
}

impl<W: Write> CsvExporter<W> {
    /// Wrap `inner` and write the header row
    pub fn new(inner: W, options: &QueryOptions) -> Result<Self, ExportError> {
        let mut writer = csv::Writer::from_writer(inner);

        let mut header = Vec::with_capacity(options.datastream_ids.len() + 1);
        header.push("time");
        header.extend((0..options.datastream_ids.len()).filter_map(|i| options.column_name(i)));
        writer.write_record(&header)?;

        Ok(Self { writer, rows: 0 })
    }

    /// Append one row for `item`
    pub fn write_item(&mut self, item: &MergedItem) -> Result<(), ExportError> {
        let values = match &item.payload {
            Payload::Va(values) => values,
            other => return Err(ExportError::UnsupportedPayload(other.name())),
        };

        let mut row = Vec::with_capacity(values.len() + 1);
        row.push(to_column_time(item.lt));
        row.extend(values.iter().map(cell));
        self.writer.write_record(&row)?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, header excluded
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer
    pub fn finish(self) -> Result<W, ExportError> {
        self.writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Drain `query` into `exporter`, returning the number of rows written
pub async fn export_query<F, W>(
    mut query: MergeQuery<F>,
    exporter: &mut CsvExporter<W>,
) -> Result<usize, ExportError>
where
    F: Find,
    W: Write,
{
    let mut rows = 0;
    while let Some(item) = query.next().await {
        exporter.write_item(&item)?;
        rows += 1;
    }
    exporter.writer.flush()?;

    debug!(
        "Exported {} rows from {} sources in {} rounds",
        rows,
        query.sources().len(),
        query.stats().rounds
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Datapoint, Format, MemoryFind};
    use serde_json::json;

    fn find() -> MemoryFind {
        MemoryFind::new()
            .with_datapoints(
                "ds-temp",
                vec![Datapoint::scalar(0, 21.5), Datapoint::scalar(600_000, 21.7)],
            )
            .with_datapoints(
                "ds-rh",
                vec![Datapoint::scalar(0, 80), Datapoint::scalar(1_200_000, "n/a")],
            )
    }

    #[tokio::test]
    async fn writes_header_and_rows() {
        let options = QueryOptions::new(0, 3_600_000, ["ds-temp", "ds-rh"])
            .with_column_names(["Temperature"]);
        let query = MergeQuery::new(find(), &options).unwrap();

        let mut exporter = CsvExporter::new(Vec::new(), &options).unwrap();
        let rows = export_query(query, &mut exporter).await.unwrap();
        let csv = String::from_utf8(exporter.finish().unwrap()).unwrap();

        assert_eq!(rows, 3);
        assert_eq!(
            csv,
            "time,Temperature,ds-rh\n\
             1970-01-01 00:00:00,21.5,80\n\
             1970-01-01 00:10:00,21.7,\n\
             1970-01-01 00:20:00,,n/a\n"
        );
    }

    #[test]
    fn rejects_non_scalar_items() {
        let options = QueryOptions::new(0, 10, ["a"]);
        let mut exporter = CsvExporter::new(Vec::new(), &options).unwrap();
        let item = MergedItem {
            lt: 0,
            o: None,
            t: None,
            payload: Payload::Da(vec![json!({"v": 1}).as_object().cloned().unwrap()]),
        };

        assert!(matches!(
            exporter.write_item(&item),
            Err(ExportError::UnsupportedPayload("da"))
        ));
        assert_eq!(exporter.rows(), 0);
    }

    #[tokio::test]
    async fn da_query_fails_on_first_item() {
        let options = QueryOptions::new(0, 3_600_000, ["ds-temp"]).with_format(Format::Da);
        let query = MergeQuery::new(find(), &options).unwrap();
        let mut exporter = CsvExporter::new(Vec::new(), &options).unwrap();

        assert!(export_query(query, &mut exporter).await.is_err());
    }

    #[tokio::test]
    async fn exports_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let options = QueryOptions::new(0, 3_600_000, ["ds-temp"]);

        let mut exporter = CsvExporter::create(&path, &options).unwrap();
        let query = MergeQuery::new(find(), &options).unwrap();
        assert_eq!(export_query(query, &mut exporter).await.unwrap(), 2);
        exporter.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("time,ds-temp\n"));
        assert_eq!(contents.lines().count(), 3);
    }
}
