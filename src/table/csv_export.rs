use tracing::debug;

use super::{Table, TableError};

/// Default file name offered for the processed table download
pub const PROCESSED_CSV_FILENAME: &str = "processed_data.csv";

impl Table {
    /// Serialize to UTF-8 CSV: header row first, no index column, missing values as empty fields
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, TableError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns())?;

        for row in self.rows() {
            writer.write_record(row.iter().map(|cell| cell.to_csv_field()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| TableError::Csv(csv::Error::from(e.into_error())))?;
        debug!(
            "Exported {} rows x {} columns as {} CSV bytes",
            self.len(),
            self.columns().len(),
            bytes.len()
        );
        Ok(bytes)
    }
}
