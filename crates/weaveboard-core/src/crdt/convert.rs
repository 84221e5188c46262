//! Conversion between elements/edges and Loro values.

use crate::element::{Edge, Element, ElementKind};
use kurbo::{Point, Size};
use loro::{LoroMap, LoroMapValue, LoroResult, LoroValue};
use uuid::Uuid;

// Common keys
const KEY_ID: &str = "id";

// Element keys
const KEY_KIND: &str = "kind";
const KEY_X: &str = "x";
const KEY_Y: &str = "y";
const KEY_WIDTH: &str = "width";
const KEY_HEIGHT: &str = "height";
const KEY_GROUP_ID: &str = "group_id";
const KEY_PAYLOAD: &str = "payload";

// Edge keys
const KEY_SOURCE: &str = "source";
const KEY_TARGET: &str = "target";
const KEY_LABEL: &str = "label";

fn get_double(map: &LoroMapValue, key: &str) -> Option<f64> {
    match map.get(key)? {
        LoroValue::Double(d) => Some(*d),
        LoroValue::I64(i) => Some(*i as f64),
        _ => None,
    }
}

fn get_string(map: &LoroMapValue, key: &str) -> Option<String> {
    match map.get(key)? {
        LoroValue::String(s) => Some(s.to_string()),
        _ => None,
    }
}

fn get_uuid(map: &LoroMapValue, key: &str) -> Option<Uuid> {
    Uuid::parse_str(&get_string(map, key)?).ok()
}

/// Write an element into a (fresh) Loro map.
pub fn element_to_loro(element: &Element, map: &LoroMap) -> LoroResult<()> {
    map.insert(KEY_ID, element.id.to_string())?;
    map.insert(KEY_KIND, element.kind.as_str())?;
    map.insert(KEY_X, element.position.x)?;
    map.insert(KEY_Y, element.position.y)?;
    map.insert(KEY_WIDTH, element.size.width)?;
    map.insert(KEY_HEIGHT, element.size.height)?;
    if let Some(group) = element.group_id {
        map.insert(KEY_GROUP_ID, group.to_string())?;
    }
    // Payload is stored as JSON text.
    if !element.payload.is_null() {
        map.insert(KEY_PAYLOAD, element.payload.to_string())?;
    }
    Ok(())
}

/// Read an element from a Loro map value.
pub fn element_from_loro(map: &LoroMapValue) -> Option<Element> {
    let id = get_uuid(map, KEY_ID)?;
    let kind = get_string(map, KEY_KIND)?;
    let x = get_double(map, KEY_X)?;
    let y = get_double(map, KEY_Y)?;
    let width = get_double(map, KEY_WIDTH)?;
    let height = get_double(map, KEY_HEIGHT)?;
    let group_id = get_uuid(map, KEY_GROUP_ID);
    let payload = match get_string(map, KEY_PAYLOAD) {
        Some(text) => match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Element {} has an unreadable payload: {}", id, e);
                serde_json::Value::Null
            }
        },
        None => serde_json::Value::Null,
    };

    Some(Element {
        id,
        position: Point::new(x, y),
        size: Size::new(width, height),
        kind: ElementKind::new(kind),
        group_id,
        payload,
    })
}

/// Write an edge into a (fresh) Loro map.
pub fn edge_to_loro(edge: &Edge, map: &LoroMap) -> LoroResult<()> {
    map.insert(KEY_ID, edge.id.to_string())?;
    map.insert(KEY_SOURCE, edge.source.to_string())?;
    map.insert(KEY_TARGET, edge.target.to_string())?;
    if let Some(label) = &edge.label {
        map.insert(KEY_LABEL, label.clone())?;
    }
    Ok(())
}

/// Read an edge from a Loro map value.
pub fn edge_from_loro(map: &LoroMapValue) -> Option<Edge> {
    Some(Edge {
        id: get_uuid(map, KEY_ID)?,
        source: get_uuid(map, KEY_SOURCE)?,
        target: get_uuid(map, KEY_TARGET)?,
        label: get_string(map, KEY_LABEL),
    })
}
