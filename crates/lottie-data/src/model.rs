use serde::{de::DeserializeOwned, de::SeqAccess, Deserialize, Deserializer, Serialize};
use std::fmt;

/// One entry of a composition's `layers` array (or of an asset's nested
/// `layers`). Only the fields the animation core consumes are modelled;
/// everything else in the layer object is ignored.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Layer {
    #[serde(default)]
    pub ty: u8,
    #[serde(default)]
    pub ind: Option<i64>,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub ip: Option<f32>, // In point, frames
    #[serde(default)]
    pub op: Option<f32>, // Out point, frames
    #[serde(default)]
    pub ks: Transform,
    #[serde(default)]
    pub hd: Option<bool>, // Hidden - if true, layer should not be rendered
    #[serde(default, rename = "masksProperties")]
    pub masks_properties: Option<Vec<MaskProperties>>,
    #[serde(default)]
    pub tt: Option<u8>, // Matte mode (0=None, 1=Add, 2=Invert)
    #[serde(default)]
    pub td: Option<u8>, // Matte target - If 1, the next layer uses this layer as its matte
}

impl Layer {
    pub fn is_hidden(&self) -> bool {
        self.hd == Some(true)
    }

    pub fn is_matte_source(&self) -> bool {
        self.td == Some(1)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MaskProperties {
    #[serde(default)]
    pub inv: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub pt: Property<BezierPath>,
    #[serde(default)]
    pub o: Property<f32>, // Opacity, 0..100
    #[serde(default)]
    pub nm: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Transform {
    #[serde(default)]
    pub a: Property<Vec3DefaultZero>, // Anchor: Vec3, default z=0
    #[serde(default)]
    pub p: PositionProperty, // Position: Vec3 or split x/y
    #[serde(default)]
    pub s: Property<Vec3Scale>, // Scale in percent
    #[serde(default, alias = "r")]
    pub rz: Property<f32>, // Rotation Z, degrees
    #[serde(default)]
    pub o: Property<f32>, // Opacity, 0..100
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum PositionProperty {
    Split {
        s: bool,
        x: Property<f32>,
        y: Property<f32>,
    },
    Unified(Property<Vec3DefaultZero>),
}

impl Default for PositionProperty {
    fn default() -> Self {
        PositionProperty::Unified(Property::default())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Property<T> {
    #[serde(default)]
    pub a: u8,
    #[serde(default)]
    #[serde(bound(deserialize = "T: DeserializeOwned"))]
    pub k: Value<T>,
    #[serde(default)]
    pub ix: Option<u32>,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Property {
            a: 0,
            k: Value::Default,
            ix: None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub enum Value<T> {
    Default,
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;

        if v.is_null() {
            return Ok(Value::Default);
        }

        // Keyframe lists are arrays of objects; static vectors are arrays of numbers.
        let looks_animated = v
            .as_array()
            .is_some_and(|arr| arr.first().is_some_and(serde_json::Value::is_object));
        if looks_animated {
            return serde_json::from_value::<Vec<Keyframe<T>>>(v)
                .map(Value::Animated)
                .map_err(serde::de::Error::custom);
        }

        if let Ok(val) = serde_json::from_value::<T>(v.clone()) {
            return Ok(Value::Static(val));
        }

        if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
            if let Some(first) = vec.into_iter().next() {
                return Ok(Value::Static(first));
            }
        }

        Ok(Value::Default)
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Default
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Keyframe<T> {
    pub t: f32,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub s: Option<T>,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub e: Option<T>,
    #[serde(default)]
    pub i: Option<BezierTangent>,
    #[serde(default)]
    pub o: Option<BezierTangent>,
    #[serde(default)]
    pub h: Option<u8>,
}

impl<T> Keyframe<T> {
    pub fn is_hold(&self) -> bool {
        self.h == Some(1)
    }
}

fn deserialize_keyframe_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    if v.is_null() {
        return Ok(None);
    }

    if let Ok(val) = serde_json::from_value(v.clone()) {
        return Ok(Some(val));
    }

    if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
        if let Some(first) = vec.into_iter().next() {
            return Ok(Some(first));
        }
    }

    Ok(None)
}

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];

/// Bezier easing handle for a keyframe segment.
/// Accepts both `{"x": [0.48], "y": [1]}` and `{"x": 0.48, "y": 1}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BezierTangent {
    #[serde(deserialize_with = "one_or_many")]
    pub x: Vec<f32>,
    #[serde(deserialize_with = "one_or_many")]
    pub y: Vec<f32>,
}

impl BezierTangent {
    /// First-dimension handle. Multi-dimensional properties may carry one
    /// handle per axis; the core eases all axes with the first.
    pub fn handle(&self) -> Option<Vec2> {
        Some([*self.x.first()?, *self.y.first()?])
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(f32),
        Many(Vec<f32>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(v) => vec![v],
        OneOrMany::Many(v) => v,
    })
}

// Wrapper for Vec3 with Z defaulting to 0.0
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Vec3DefaultZero(pub Vec3);

impl Default for Vec3DefaultZero {
    fn default() -> Self {
        Vec3DefaultZero([0.0, 0.0, 0.0])
    }
}

impl<'de> Deserialize<'de> for Vec3DefaultZero {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Vec3Visitor { z: 0.0 })
            .map(Vec3DefaultZero)
    }
}

// Wrapper for Vec3 with Z defaulting to 100.0 (for Scale)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Vec3Scale(pub Vec3);

impl Default for Vec3Scale {
    fn default() -> Self {
        Vec3Scale([100.0, 100.0, 100.0])
    }
}

impl<'de> Deserialize<'de> for Vec3Scale {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Vec3Visitor { z: 100.0 })
            .map(Vec3Scale)
    }
}

struct Vec3Visitor {
    z: f32,
}

impl<'de> serde::de::Visitor<'de> for Vec3Visitor {
    type Value = Vec3;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of 2 or 3 floats")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let x = seq
            .next_element()?
            .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
        let y = seq.next_element()?.unwrap_or(0.0);
        let z = seq.next_element()?.unwrap_or(self.z);
        while seq.next_element::<f32>()?.is_some() {}
        Ok([x, y, z])
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BezierPath {
    #[serde(default)]
    pub c: bool,
    #[serde(default)]
    pub i: Vec<Vec2>,
    #[serde(default)]
    pub o: Vec<Vec2>,
    #[serde(default)]
    pub v: Vec<Vec2>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_and_animated_values() {
        let p: Property<f32> = serde_json::from_value(json!({ "a": 0, "k": 50 })).unwrap();
        assert!(matches!(p.k, Value::Static(v) if v == 50.0));

        let p: Property<Vec3DefaultZero> =
            serde_json::from_value(json!({ "k": [10, 20] })).unwrap();
        match p.k {
            Value::Static(v) => assert_eq!(v, Vec3DefaultZero([10.0, 20.0, 0.0])),
            other => panic!("expected static value, got {other:?}"),
        }

        let p: Property<f32> = serde_json::from_value(json!({
            "a": 1,
            "k": [
                { "t": 0, "s": [0], "e": [90], "o": { "x": [0.4], "y": [0] }, "i": { "x": 0.6, "y": 1 } },
                { "t": 30 }
            ]
        }))
        .unwrap();
        match p.k {
            Value::Animated(kfs) => {
                assert_eq!(kfs.len(), 2);
                assert_eq!(kfs[0].s, Some(0.0));
                assert_eq!(kfs[0].e, Some(90.0));
                assert_eq!(kfs[0].o.as_ref().and_then(|o| o.handle()), Some([0.4, 0.0]));
                assert_eq!(kfs[0].i.as_ref().and_then(|i| i.handle()), Some([0.6, 1.0]));
                assert_eq!(kfs[1].s, None);
            }
            other => panic!("expected animated value, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_property_is_absent() {
        let t: Transform = serde_json::from_value(json!({ "o": { "k": 100 } })).unwrap();
        assert!(matches!(t.o.k, Value::Static(v) if v == 100.0));
        assert!(matches!(t.rz.k, Value::Default));
        assert!(matches!(t.s.k, Value::Default));
    }

    #[test]
    fn test_rotation_alias_and_split_position() {
        let t: Transform = serde_json::from_value(json!({
            "r": { "k": 45 },
            "p": { "s": true, "x": { "k": 10 }, "y": { "k": 20 } }
        }))
        .unwrap();
        assert!(matches!(t.rz.k, Value::Static(v) if v == 45.0));
        assert!(matches!(t.p, PositionProperty::Split { .. }));
    }

    #[test]
    fn test_layer_fields() {
        let layer: Layer = serde_json::from_value(json!({
            "ty": 4, "ind": 7, "parent": 3, "tt": 1, "td": 1, "hd": true,
            "masksProperties": [{ "mode": "a", "pt": { "k": { "c": true, "v": [[0, 0]], "i": [[0, 0]], "o": [[0, 0]] } } }]
        }))
        .unwrap();
        assert_eq!(layer.ind, Some(7));
        assert_eq!(layer.parent, Some(3));
        assert!(layer.is_hidden());
        assert!(layer.is_matte_source());
        assert_eq!(layer.masks_properties.map(|m| m.len()), Some(1));
    }
}
