//! Comparison of SQL type names as written in table definitions against the
//! names reported by `information_schema.columns`. Array and user-defined
//! columns are reported by `udt_name` (`_int4`, `geometry`) rather than the
//! generic `ARRAY` / `USER-DEFINED` data type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeComparison {
    /// Byte-for-byte equality of the two type names.
    Exact,
    /// Case, whitespace, length modifiers and common Postgres aliases are
    /// ignored, so `varchar(50)` matches `character varying` and `integer[]`
    /// matches `_int4`.
    #[default]
    Canonical,
}

impl TypeComparison {
    pub fn same_type(&self, expected: &str, observed: &str) -> bool {
        match self {
            TypeComparison::Exact => expected == observed,
            TypeComparison::Canonical => canonical_type(expected) == canonical_type(observed),
        }
    }
}

pub fn canonical_type(sql_type: &str) -> String {
    let lowered = sql_type.trim().to_lowercase();
    if let Some(element) = lowered.strip_suffix("[]") {
        return format!("{}[]", canonical_type(element));
    }
    if let Some(element) = lowered.strip_prefix('_') {
        return format!("{}[]", canonical_type(element));
    }
    let without_modifier = match lowered.find('(') {
        Some(open) => {
            let close = lowered[open..]
                .find(')')
                .map(|offset| open + offset + 1)
                .unwrap_or(lowered.len());
            format!("{}{}", &lowered[..open], &lowered[close..])
        }
        None => lowered,
    };
    let collapsed = without_modifier.split_whitespace().collect::<Vec<_>>().join(" ");

    let canonical = match collapsed.as_str() {
        "varchar" | "char varying" => "character varying",
        "char" | "bpchar" => "character",
        "int" | "int4" | "serial" | "serial4" => "integer",
        "int2" | "smallserial" | "serial2" => "smallint",
        "int8" | "bigserial" | "serial8" => "bigint",
        "float8" | "float" => "double precision",
        "float4" => "real",
        "bool" => "boolean",
        "decimal" => "numeric",
        "timestamp" => "timestamp without time zone",
        "timestamptz" => "timestamp with time zone",
        "time" => "time without time zone",
        "timetz" => "time with time zone",
        other => other,
    };
    canonical.to_string()
}
