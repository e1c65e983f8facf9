use std::collections::BTreeMap;

use serde_json::Value;

use super::model::{Schema, SchemaPayload};
use crate::error::{Error, Result};

/// Merges a parent schema's definitions into a child, producing the child's
/// effective payload for one inheritance level.
///
/// The merge is a shallow key-wise union: keys only the parent defines are
/// added, keys both define keep the child's value verbatim. Nested structures
/// are never deep-merged. The identity fields (id, name, icon, parent) always
/// come from the child.
pub fn merge(child: Schema, parent: &Schema) -> Result<Schema> {
    let payload = match (child.payload, &parent.payload) {
        (SchemaPayload::Content { fields }, SchemaPayload::Content { fields: inherited }) => {
            SchemaPayload::Content {
                fields: merge_maps(fields, inherited),
            }
        }
        (SchemaPayload::Field { editor }, SchemaPayload::Field { editor: inherited }) => {
            SchemaPayload::Field {
                editor: merge_maps(editor, inherited),
            }
        }
        // Generic payloads carry no mergeable map; the child passes through.
        (payload @ SchemaPayload::Generic { .. }, SchemaPayload::Generic { .. }) => payload,
        _ => {
            return Err(Error::ParentMismatch {
                child: child.id,
                parent: parent.id.clone(),
            });
        }
    };

    Ok(Schema {
        id: child.id,
        name: child.name,
        icon: child.icon,
        parent_schema_id: child.parent_schema_id,
        locked: child.locked,
        payload,
    })
}

fn merge_maps(
    child: BTreeMap<String, Value>,
    parent: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    let mut merged = parent.clone();
    merged.extend(child);
    merged
}
