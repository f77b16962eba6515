//! GeoJSON feature model.

use crate::error::{WriteError, WriteResult};
use geovault_storage::Row;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property key of the reserved metadata object.
pub const META_NAMESPACE: &str = "@ns:geovault";

/// JSON pointer to the creation timestamp inside a row payload.
pub const CREATED_AT_POINTER: &str = "/properties/@ns:geovault/createdAt";

const DELETED_POINTER: &str = "/properties/@ns:geovault/deleted";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Returns true if the row holds a deleted feature.
pub(crate) fn is_tombstone(row: &Row) -> bool {
    row.payload
        .pointer(DELETED_POINTER)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Reserved metadata of a feature.
///
/// On input, `version` is the base version the change was made against.
/// On output it is the version the feature was written with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMeta {
    /// Version of the feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Author of the last change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Time of the last change, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// The feature is deleted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    /// The feature was written despite an unresolved merge conflict.
    #[serde(default, skip_serializing_if = "is_false")]
    pub conflicting: bool,
}

/// A GeoJSON feature.
///
/// Properties are an opaque JSON tree. The metadata object lives at
/// `properties["@ns:geovault"]` in the JSON form and in [`Feature::meta`]
/// here.
///
/// # Example
///
/// ```rust
/// use geovault_core::Feature;
/// use serde_json::json;
///
/// let feature = Feature::new("F1")
///     .with_property("name", "Main St")
///     .with_geometry(json!({"type": "Point", "coordinates": [8.5, 50.1]}));
/// let value = feature.to_value();
/// assert_eq!(value["properties"]["name"], json!("Main St"));
/// assert_eq!(Feature::from_value(value).unwrap(), feature);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Feature {
    /// Feature id; generated on create when absent.
    pub id: Option<String>,
    /// GeoJSON geometry.
    pub geometry: Option<Value>,
    /// Properties without the metadata object.
    pub properties: Map<String, Value>,
    /// Reserved metadata.
    pub meta: FeatureMeta,
}

impl Feature {
    /// Creates an empty feature with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Creates a deletion request for the given id.
    pub fn tombstone(id: impl Into<String>) -> Self {
        let mut feature = Self::new(id);
        feature.meta.deleted = true;
        feature
    }

    /// Sets a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Sets the version the change is based on.
    #[must_use]
    pub fn with_base_version(mut self, version: i64) -> Self {
        self.meta.version = Some(version);
        self
    }

    /// Returns the id.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the version recorded in the metadata.
    #[must_use]
    pub fn version(&self) -> Option<i64> {
        self.meta.version
    }

    /// Returns true if the feature is a deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.meta.deleted
    }

    /// Returns true if the feature carries an unresolved merge conflict.
    #[must_use]
    pub fn is_conflicting(&self) -> bool {
        self.meta.conflicting
    }

    /// Converts the feature into its GeoJSON tree.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        root.insert("type".into(), Value::from("Feature"));
        if let Some(id) = &self.id {
            root.insert("id".into(), Value::from(id.as_str()));
        }
        if let Some(geometry) = &self.geometry {
            root.insert("geometry".into(), geometry.clone());
        }
        let mut properties = self.properties.clone();
        properties.insert(
            META_NAMESPACE.into(),
            serde_json::to_value(&self.meta).unwrap_or_else(|_| Value::Object(Map::new())),
        );
        root.insert("properties".into(), Value::Object(properties));
        Value::Object(root)
    }

    /// Parses a GeoJSON tree.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::IllegalArgument`] if the tree is not an object,
    /// the id is neither a string nor a number, or the metadata is malformed.
    pub fn from_value(value: Value) -> WriteResult<Self> {
        let Value::Object(mut root) = value else {
            return Err(WriteError::illegal_argument("a feature must be a JSON object"));
        };

        let id = match root.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            Some(other) => {
                return Err(WriteError::illegal_argument(format!(
                    "feature id must be a string, got {other}"
                )))
            }
        };

        let geometry = match root.remove("geometry") {
            None | Some(Value::Null) => None,
            Some(geometry) => Some(geometry),
        };

        let mut properties = match root.remove("properties") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(properties)) => properties,
            Some(_) => {
                return Err(WriteError::illegal_argument(
                    "feature properties must be a JSON object",
                ))
            }
        };

        let meta = match properties.remove(META_NAMESPACE) {
            None | Some(Value::Null) => FeatureMeta::default(),
            Some(meta) => serde_json::from_value(meta).map_err(|e| {
                WriteError::illegal_argument(format!("malformed {META_NAMESPACE} metadata: {e}"))
            })?,
        };

        Ok(Self {
            id,
            geometry,
            properties,
            meta,
        })
    }

    /// Splits the feature into the row payload and the geometry column.
    pub(crate) fn to_row_parts(&self) -> (Value, Option<Value>) {
        let mut payload = self.to_value();
        if let Value::Object(root) = &mut payload {
            root.remove("geometry");
        }
        (payload, self.geometry.clone())
    }

    /// Rebuilds a feature from a stored row.
    pub(crate) fn from_row(row: &Row) -> WriteResult<Self> {
        let mut feature = Self::from_value(row.payload.clone())?;
        feature.id = Some(row.id.clone());
        feature.geometry = row.geometry.clone();
        Ok(feature)
    }
}

impl From<Feature> for Value {
    fn from(feature: Feature) -> Self {
        feature.to_value()
    }
}

impl TryFrom<Value> for Feature {
    type Error = WriteError;

    fn try_from(value: Value) -> WriteResult<Self> {
        Self::from_value(value)
    }
}
