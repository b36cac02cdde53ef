use serde::Deserialize;

// Only the path down to the first place's position is modelled; everything else is ignored.

/// Raw response from the geocoder.
#[derive(Deserialize)]
pub struct Response {
    pub response: Body,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Body {
    pub geo_object_collection: GeoObjectCollection,
}

/// Places matching the query, most relevant first. Members stay raw so a
/// malformed later member does not spoil the first one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoObjectCollection {
    pub feature_member: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeatureMember {
    pub geo_object: GeoObject,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeoObject {
    pub point: Point,
}

/// Position as `"<longitude> <latitude>"`.
#[derive(Deserialize)]
pub struct Point {
    pub pos: String,
}
