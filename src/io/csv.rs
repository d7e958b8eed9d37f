//! Comma-separated tables of scalar time series.
use eyre::{eyre, WrapErr};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes `rows` below a header line. Every row must have one value per header.
pub fn write_rows(path: impl AsRef<Path>, headers: &[String], rows: &[Vec<f64>]) -> eyre::Result<()> {
    let path = path.as_ref();
    if let Some(row) = rows.iter().find(|row| row.len() != headers.len()) {
        return Err(eyre!(
            "row has {} values but there are {} headers",
            row.len(),
            headers.len()
        ));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let file = File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", headers.join(","))?;
    for row in rows {
        let row: Vec<String> = row.iter().map(|value| format!("{:.15e}", value)).collect();
        writeln!(writer, "{}", row.join(","))?;
    }
    writer.flush()?;
    Ok(())
}
