//! Module: params
//! Responsibility: turn raw, untyped association parameters into a
//! discriminated `ParamInput` before the reconciler sees them.
//! Boundary: the reconciler never branches on raw `Value` shape.

use crate::{model::Cardinality, value::Value};
use derive_more::{Deref, DerefMut, IntoIterator};
use serde::Serialize;
use std::collections::BTreeMap;

///
/// ParamMap
///
/// Keyed parameters for one entity (field name → raw value).
///

#[derive(Clone, Debug, Default, Deref, DerefMut, IntoIterator, PartialEq, Serialize)]
pub struct ParamMap(BTreeMap<String, Value>);

impl ParamMap {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl From<BTreeMap<String, Value>> for ParamMap {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ParamMap {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Map(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

///
/// ParamInput
///
/// Shape of the parameters supplied for one association.
/// `Absent` is an explicit null; a key that was never supplied is handled
/// by the caller before resolution.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ParamInput {
    Map(ParamMap),
    List(Vec<ParamMap>),
    Absent,
    Invalid,
}

///
/// CollectionOrder
///
/// Optional sort/drop directives for index-keyed many parameters.
/// `sort` lists indices in the desired order; unknown indices become empty
/// entries. `drop` lists indices to remove.
///

#[derive(Clone, Debug, Default)]
pub struct CollectionOrder<'a> {
    pub sort: Option<&'a Value>,
    pub drop: Option<&'a Value>,
}

impl CollectionOrder<'_> {
    const fn is_empty(&self) -> bool {
        self.sort.is_none() && self.drop.is_none()
    }
}

impl ParamInput {
    /// Resolve a raw association value for the given cardinality.
    #[must_use]
    pub fn resolve(cardinality: Cardinality, value: &Value, order: &CollectionOrder<'_>) -> Self {
        match (cardinality, value) {
            (_, Value::Null) => Self::Absent,
            (Cardinality::One, Value::Map(map)) => Self::Map(ParamMap(map.clone())),
            (Cardinality::Many, Value::List(items)) if order.is_empty() => {
                resolve_list(items).map_or(Self::Invalid, Self::List)
            }
            (Cardinality::Many, Value::List(items)) => {
                let indexed = items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i, v.clone()))
                    .collect();
                resolve_indexed(indexed, order).map_or(Self::Invalid, Self::List)
            }
            (Cardinality::Many, Value::Map(map)) => parse_index_keys(map)
                .and_then(|indexed| resolve_indexed(indexed, order))
                .map_or(Self::Invalid, Self::List),
            _ => Self::Invalid,
        }
    }
}

// Every element must be a map.
fn resolve_list(items: &[Value]) -> Option<Vec<ParamMap>> {
    items
        .iter()
        .map(|item| item.as_map().map(|m| ParamMap(m.clone())))
        .collect()
}

// `{"0": {...}, "1": {...}}` keys must all parse as indices.
fn parse_index_keys(map: &BTreeMap<String, Value>) -> Option<BTreeMap<usize, Value>> {
    map.iter()
        .map(|(key, value)| key.parse::<usize>().ok().map(|i| (i, value.clone())))
        .collect()
}

fn index_list(value: Option<&Value>) -> Option<Vec<usize>> {
    match value {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::List(items)) => items.iter().map(Value::as_index).collect(),
        Some(_) => None,
    }
}

// Apply drop, then sort, then append the remaining entries in index order.
fn resolve_indexed(
    mut indexed: BTreeMap<usize, Value>,
    order: &CollectionOrder<'_>,
) -> Option<Vec<ParamMap>> {
    let drop = index_list(order.drop)?;
    let sort = index_list(order.sort)?;

    for index in &drop {
        indexed.remove(index);
    }

    let mut ordered = Vec::with_capacity(indexed.len() + sort.len());
    for index in sort {
        if drop.contains(&index) {
            continue;
        }
        ordered.push(indexed.remove(&index).unwrap_or_else(|| Value::Map(BTreeMap::new())));
    }
    ordered.extend(indexed.into_values());

    resolve_list(&ordered)
}

///
/// TESTS
///
