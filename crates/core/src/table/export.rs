//! CSV export of feature tables

use super::Table;
use crate::error::Result;
use std::io::Write;
use std::path::Path;

impl Table {
    /// Write the table as CSV: a header of [`Table::columns`], then one
    /// record per row. Null cells are written as empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;

        for row in &self.rows {
            wtr.write_record(
                self.columns
                    .iter()
                    .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default()),
            )?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file
    pub fn to_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use crate::raster::{Band, GeoTransform, RasterDataset};
    use crate::table::{make_table, TableOptions};
    use ndarray::array;

    #[test]
    fn test_write_csv() {
        let mut ds = RasterDataset::new("elev.tif", 1, 2);
        ds.set_transform(GeoTransform::new(100.0, 50.0, 10.0, -10.0));
        ds.add_band(Band::from_array(array![[7i32, -1]]).with_nodata(Some(-1.0)))
            .unwrap();

        let opts = TableOptions { mask_nodata: true };
        let table = make_table(&[ds], &opts).unwrap();

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "elev,x,y\n7,105,45\n,115,45\n");
    }

    #[test]
    fn test_to_csv_path() {
        let ds = RasterDataset::new("a.tif", 1, 1)
            .with_band(Band::from_array(array![[0.25f64]]))
            .unwrap();
        let table = make_table(&[ds], &TableOptions::default()).unwrap();

        let tmp = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        table.to_csv_path(tmp.path()).unwrap();
        let text = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), ["a,x,y", "0.25,0.5,-0.5"]);
    }
}
