pub const DESTINATIONS_TABLE_NAME: &str = "Destinations";
pub const ID: &str = "id";
pub const NAME: &str = "name";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const IS_TRACKED: &str = "is_tracked";
