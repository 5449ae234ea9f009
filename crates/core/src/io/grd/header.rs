//! `.grd` sidecar parsing and formatting

use super::datatype::{BandOrder, ByteOrder, GrdDataType};
use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Sectioned `key=value` text, keys lowercased.
#[derive(Debug, Default)]
struct Sidecar {
    sections: HashMap<String, HashMap<String, String>>,
}

impl Sidecar {
    fn parse(text: &str) -> Self {
        let mut sidecar = Sidecar::default();
        let mut section = String::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_ascii_lowercase();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                sidecar
                    .sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        sidecar
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    fn require(&self, section: &str, key: &str) -> Result<&str> {
        self.get(section, key).ok_or_else(|| Error::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        })
    }

    fn require_num<T: FromStr>(&self, section: &str, key: &str) -> Result<T> {
        let raw = self.require(section, key)?;
        parse_num(key, raw)
    }
}

fn parse_num<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::invalid_value(key, raw, "not a number"))
}

/// Per-band list such as `minvalue=1:0.5:NA`; `NA` entries are `None`.
fn parse_band_list(key: &str, raw: Option<&str>) -> Result<Vec<Option<f64>>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(':')
        .map(|item| match item.trim() {
            "" | "NA" => Ok(None),
            item => parse_num(key, item).map(Some),
        })
        .collect()
}

/// Metadata of an R raster `.grd` file.
#[derive(Debug, Clone, PartialEq)]
pub struct GrdHeader {
    pub data_type: GrdDataType,
    pub byte_order: ByteOrder,
    pub band_order: BandOrder,
    pub rows: usize,
    pub cols: usize,
    pub nbands: usize,
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    /// Lower validity bound per band
    pub min_values: Vec<Option<f64>>,
    /// Upper validity bound per band
    pub max_values: Vec<Option<f64>>,
    pub nodata: f64,
    /// PROJ4 string, `None` when absent or `NA`
    pub projection: Option<String>,
    pub layer_names: Vec<String>,
}

impl GrdHeader {
    /// Parse sidecar text
    pub fn parse(text: &str) -> Result<Self> {
        let sidecar = Sidecar::parse(text);

        let data_type = GrdDataType::from_tag(sidecar.require("data", "datatype")?)?;
        let byte_order = ByteOrder::from_tag(sidecar.require("data", "byteorder")?)?;
        let band_order = match sidecar.get("data", "bandorder") {
            Some(tag) => BandOrder::from_tag(tag)?,
            None => BandOrder::default(),
        };
        let nbands = match sidecar.get("data", "nbands") {
            Some(raw) => parse_num("nbands", raw)?,
            None => 1,
        };

        let rows: usize = sidecar.require_num("georeference", "nrows")?;
        let cols: usize = sidecar.require_num("georeference", "ncols")?;
        if rows == 0 || cols == 0 || nbands == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let projection = sidecar
            .get("georeference", "projection")
            .filter(|p| !p.is_empty() && *p != "NA")
            .map(str::to_string);

        let layer_names = sidecar
            .get("description", "layername")
            .map(|names| names.split(':').map(|n| n.trim().to_string()).collect())
            .unwrap_or_default();

        let header = Self {
            data_type,
            byte_order,
            band_order,
            rows,
            cols,
            nbands,
            xmin: sidecar.require_num("georeference", "xmin")?,
            xmax: sidecar.require_num("georeference", "xmax")?,
            ymin: sidecar.require_num("georeference", "ymin")?,
            ymax: sidecar.require_num("georeference", "ymax")?,
            min_values: parse_band_list("minvalue", sidecar.get("data", "minvalue"))?,
            max_values: parse_band_list("maxvalue", sidecar.get("data", "maxvalue"))?,
            nodata: sidecar.require_num("data", "nodatavalue")?,
            projection,
            layer_names,
        };
        if header.payload_len().is_none() {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(header)
    }

    /// North-up transform with the origin at (xmin, ymax)
    pub fn transform(&self) -> GeoTransform {
        GeoTransform::from_bounds(self.xmin, self.xmax, self.ymin, self.ymax, self.rows, self.cols)
    }

    /// Validity range of a band (0-based).
    ///
    /// A single entry applies to every band.
    pub fn value_range(&self, band: usize) -> (Option<f64>, Option<f64>) {
        let pick = |values: &[Option<f64>]| {
            values
                .get(band)
                .or_else(|| (values.len() == 1).then(|| &values[0]))
                .copied()
                .flatten()
        };
        (pick(&self.min_values), pick(&self.max_values))
    }

    /// Name of a band (0-based), if the sidecar lists one
    pub fn layer_name(&self, band: usize) -> Option<&str> {
        self.layer_names
            .get(band)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }

    /// Expected payload size in bytes, `None` when it overflows `usize`
    pub fn payload_len(&self) -> Option<usize> {
        self.rows
            .checked_mul(self.cols)?
            .checked_mul(self.nbands)?
            .checked_mul(self.data_type.size())
    }

    /// Render the sidecar text
    pub fn to_sidecar_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GrdHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |values: &[Option<f64>]| {
            values
                .iter()
                .map(|v| v.map_or_else(|| "NA".to_string(), |v| v.to_string()))
                .collect::<Vec<_>>()
                .join(":")
        };

        writeln!(f, "[georeference]")?;
        writeln!(f, "nrows={}", self.rows)?;
        writeln!(f, "ncols={}", self.cols)?;
        writeln!(f, "xmin={}", self.xmin)?;
        writeln!(f, "ymin={}", self.ymin)?;
        writeln!(f, "xmax={}", self.xmax)?;
        writeln!(f, "ymax={}", self.ymax)?;
        writeln!(f, "projection={}", self.projection.as_deref().unwrap_or("NA"))?;
        writeln!(f, "[data]")?;
        writeln!(f, "datatype={}", self.data_type)?;
        writeln!(f, "byteorder={}", self.byte_order.tag())?;
        writeln!(f, "nbands={}", self.nbands)?;
        writeln!(f, "bandorder={}", self.band_order.tag())?;
        writeln!(f, "minvalue={}", list(&self.min_values))?;
        writeln!(f, "maxvalue={}", list(&self.max_values))?;
        writeln!(f, "nodatavalue={}", self.nodata)?;
        if !self.layer_names.is_empty() {
            writeln!(f, "[description]")?;
            writeln!(f, "layername={}", self.layer_names.join(":"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIOCLIM: &str = "\
[general]
creator=R package 'raster'
created=2014-11-18 20:40:02
[georeference]
nrows=18
ncols=36
xmin=-180
ymin=-90
xmax=180
ymax=90
projection=+proj=longlat +datum=WGS84 +no_defs
[data]
datatype=INT2S
byteorder=little
nbands=1
bandorder=BIL
minvalue=-269
maxvalue=314
nodatavalue=-32768
[legend]
type=
[description]
layername=bio1
";

    #[test]
    fn test_parse_header() {
        let header = GrdHeader::parse(BIOCLIM).unwrap();
        assert_eq!(header.data_type, GrdDataType::Int2s);
        assert_eq!(header.byte_order, ByteOrder::Little);
        assert_eq!((header.rows, header.cols, header.nbands), (18, 36, 1));
        assert_eq!(header.value_range(0), (Some(-269.0), Some(314.0)));
        assert_eq!(header.nodata, -32768.0);
        assert_eq!(
            header.projection.as_deref(),
            Some("+proj=longlat +datum=WGS84 +no_defs")
        );
        assert_eq!(header.layer_name(0), Some("bio1"));
        assert_eq!(header.payload_len(), Some(18 * 36 * 2));
        assert_eq!(
            header.transform().to_gdal(),
            [-180.0, 10.0, 0.0, 90.0, 0.0, -10.0]
        );
    }

    #[test]
    fn test_missing_key() {
        let text = BIOCLIM.replace("nodatavalue=-32768\n", "");
        let err = GrdHeader::parse(&text).unwrap_err();
        assert!(matches!(err, Error::MissingKey { ref key, .. } if key == "nodatavalue"));
    }

    #[test]
    fn test_invalid_number() {
        let text = BIOCLIM.replace("ncols=36", "ncols=thirty");
        assert!(matches!(
            GrdHeader::parse(&text),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unsupported_tags() {
        let text = BIOCLIM.replace("INT2S", "INT3S");
        assert!(matches!(
            GrdHeader::parse(&text),
            Err(Error::UnsupportedDataType(_))
        ));
        let text = BIOCLIM.replace("byteorder=little", "byteorder=native");
        assert!(matches!(
            GrdHeader::parse(&text),
            Err(Error::UnsupportedByteOrder(_))
        ));
    }

    #[test]
    fn test_band_lists_and_infinite_bounds() {
        let text = BIOCLIM
            .replace("nbands=1", "nbands=3")
            .replace("minvalue=-269", "minvalue=0:NA:-Inf")
            .replace("maxvalue=314", "maxvalue=10");
        let header = GrdHeader::parse(&text).unwrap();
        assert_eq!(header.value_range(0), (Some(0.0), Some(10.0)));
        assert_eq!(header.value_range(1), (None, Some(10.0)));
        assert_eq!(header.value_range(2), (Some(f64::NEG_INFINITY), Some(10.0)));
    }

    #[test]
    fn test_oversized_dimensions() {
        let text = BIOCLIM
            .replace("nrows=18", "nrows=4294967296")
            .replace("ncols=36", "ncols=4294967296");
        assert!(matches!(
            GrdHeader::parse(&text),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_missing_projection() {
        let text = BIOCLIM.replace("+proj=longlat +datum=WGS84 +no_defs", "NA");
        assert_eq!(GrdHeader::parse(&text).unwrap().projection, None);
    }

    #[test]
    fn test_sidecar_roundtrip() {
        let header = GrdHeader::parse(BIOCLIM).unwrap();
        let again = GrdHeader::parse(&header.to_sidecar_string()).unwrap();
        assert_eq!(again, header);
    }
}
