//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
///
/// A raster may carry its projection as WKT (what GDAL reports), as a
/// PROJ4 string (what `.grd` sidecars store) or as an EPSG code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation (primary)
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into().trim().to_string()),
        }
    }

    /// Parse a PROJ4 string into a CRS carrying its canonical WKT form.
    ///
    /// The original PROJ4 string is kept alongside the WKT.
    #[cfg(feature = "gdal")]
    pub fn from_proj4_canonical(proj: &str) -> crate::Result<Self> {
        let srs = gdal::spatial_ref::SpatialRef::from_proj4(proj.trim())?;
        let mut crs = Self::from_wkt(srs.to_wkt()?);
        crs.proj = Some(proj.trim().to_string());
        Ok(crs)
    }

    /// Build a GDAL spatial reference from whichever representation is present
    #[cfg(feature = "gdal")]
    pub fn to_spatial_ref(&self) -> crate::Result<gdal::spatial_ref::SpatialRef> {
        use gdal::spatial_ref::SpatialRef;

        if let Some(wkt) = &self.wkt {
            return Ok(SpatialRef::from_wkt(wkt)?);
        }
        if let Some(code) = self.epsg {
            return Ok(SpatialRef::from_epsg(code)?);
        }
        if let Some(proj) = &self.proj {
            return Ok(SpatialRef::from_proj4(proj)?);
        }
        Err(crate::Error::Other("CRS has no usable representation".into()))
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// PROJ definition of this CRS.
    ///
    /// The stored PROJ string when there is one, otherwise the expansion of
    /// the EPSG code for WGS84 geographic (4326) and the WGS84 UTM zones
    /// (326xx north, 327xx south).
    pub fn proj_definition(&self) -> Option<String> {
        if let Some(proj) = &self.proj {
            return Some(proj.clone());
        }
        self.epsg.and_then(epsg_to_proj)
    }

    /// Check if two CRS are equivalent
    ///
    /// PROJ strings are compared as unordered sets of `+key=value` tokens,
    /// so `+proj=longlat +datum=WGS84` matches `+datum=WGS84 +proj=longlat`.
    /// An EPSG code matches a PROJ string when it expands to the same
    /// tokens (see [`CRS::proj_definition`]).
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        match (self.proj_definition(), other.proj_definition()) {
            (Some(a), Some(b)) => proj_tokens(&a) == proj_tokens(&b),
            _ => false,
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let end = wkt
                .char_indices()
                .nth(50)
                .map(|(i, _)| i)
                .unwrap_or(wkt.len());
            return format!("WKT:{}", &wkt[..end]);
        }
        "Unknown".to_string()
    }
}

/// Whether two optional projections describe the same system.
///
/// Two rasters without any projection are considered aligned.
pub fn same_crs(a: Option<&CRS>, b: Option<&CRS>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b || a.is_equivalent(b),
        _ => false,
    }
}

/// Tokens that do not change which system a PROJ string describes
const NEUTRAL_TOKENS: &[&str] = &[
    "+no_defs",
    "+type=crs",
    "+wktext",
    "+units=m",
    "+towgs84=0,0,0",
    "+towgs84=0,0,0,0,0,0,0",
];

fn proj_tokens(proj: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = proj
        .split_whitespace()
        .map(|t| if t == "+proj=latlong" { "+proj=longlat" } else { t })
        .filter(|t| !NEUTRAL_TOKENS.iter().any(|n| n == t))
        .collect();
    // the WGS84 datum implies its ellipsoid
    if tokens.contains(&"+datum=WGS84") {
        tokens.retain(|t| *t != "+ellps=WGS84");
    }
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}

fn epsg_to_proj(code: u32) -> Option<String> {
    match code {
        4326 => Some("+proj=longlat +datum=WGS84 +no_defs".to_string()),
        32601..=32660 => Some(format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            code - 32600
        )),
        32701..=32760 => Some(format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            code - 32700
        )),
        _ => None,
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
