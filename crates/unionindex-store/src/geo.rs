/// A row in the `location` collection consulted by geocoding (spec §4.2
/// step 13).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GeoEntry {
    pub place: String,
    /// `0` means "definite": once seen, only further `importance == 0`
    /// entries for the same lookup are consumed.
    pub importance: u32,
    pub lon: f64,
    pub lat: f64,
}

impl GeoEntry {
    pub fn as_lon_lat(&self) -> String {
        format!("{} {}", self.lon, self.lat)
    }
}
