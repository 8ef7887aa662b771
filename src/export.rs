//! Core graph export as a Cypher script.
//!
//! ```text
//! MetaRelator → get_core_node_list / get_core_edge_list
//!   → export_core_graph_cypher() → CREATE statements
//!   → paste into Neo4j Browser, or pipe into cypher-shell
//! ```
//!
//! Nodes keep their store id in an `_id` property so the relationship
//! statements can find them.

use std::io::Write;

use crate::meta::{CoreSummary, MetaRelation};
use crate::model::*;
use crate::Result;

/// Write the compressed core graph as `CREATE` statements.
pub fn export_core_graph_cypher(
    nodes: &[CoreSummary],
    edges: &[MetaRelation],
    core_label: &str,
    meta_label: &str,
    writer: &mut dyn Write,
) -> Result<()> {
    writeln!(writer, "// coregraph core graph")?;
    writeln!(writer, "// Cores: {}", nodes.len())?;
    writeln!(writer, "// Meta-relations: {}", edges.len())?;
    writeln!(writer)?;

    for node in nodes {
        let mut props = PropertyMap::new();
        if let Some(n) = node.n_subnodes {
            props.insert("n_subnodes".into(), Value::Int(n as i64));
        }
        let props_str = format_properties(&props);
        writeln!(
            writer,
            "CREATE (:{} {{_id: {}{}}});",
            core_label,
            node.id.0,
            if props_str.is_empty() { String::new() } else { format!(", {}", props_str) }
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "// Meta-relations")?;

    for edge in edges {
        let mut props = PropertyMap::new();
        props.insert("weight".into(), Value::Float(edge.weight));
        props.insert("n_distinct".into(), Value::Int(edge.n_distinct as i64));
        props.insert("score".into(), Value::Float(edge.score));
        if let Some(min) = edge.min_weight {
            props.insert("min_weight".into(), Value::Float(min));
        }
        if let Some(max) = edge.max_weight {
            props.insert("max_weight".into(), Value::Float(max));
        }
        writeln!(
            writer,
            "MATCH (a:{core_label} {{_id: {}}}), (b:{core_label} {{_id: {}}}) CREATE (a)-[:{} {{{}}}]->(b);",
            edge.source.0,
            edge.target.0,
            meta_label,
            format_properties(&props),
        )?;
    }

    Ok(())
}

/// Properties as `key: value, ...`, sorted by key, internal (`_`) keys skipped.
fn format_properties(props: &PropertyMap) -> String {
    let mut keys: Vec<&String> = props.keys().filter(|k| !k.starts_with('_')).collect();
    keys.sort();
    keys.into_iter()
        .map(|key| format!("{}: {}", key, format_value(&props[key])))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A Value as a Cypher literal.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format!("{f:?}"),
        Value::Float(_) => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Map(m) => {
            let inner: Vec<String> = m.iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        Value::DateTime(dt) => format!("datetime('{}')", dt.to_rfc3339()),
    }
}
