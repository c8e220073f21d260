//! Named query parameters.
//!
//! Callers write `@param0`, `@param1`, … in their SQL. The statement is run
//! through `sp_executesql` with those names declared, so the SQL text reaches
//! the server exactly as written and values are bound as RPC arguments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tiberius::{ColumnData, ToSql};

/// A scalar value bound to `@paramN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlParam {
    /// SQL type the parameter is declared with.
    pub fn sql_type(&self) -> &'static str {
        match self {
            SqlParam::Null | SqlParam::Text(_) => "NVARCHAR(MAX)",
            SqlParam::Bool(_) => "BIT",
            SqlParam::Int(_) => "BIGINT",
            SqlParam::Float(_) => "FLOAT",
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlParam::Null => ColumnData::String(None),
            SqlParam::Bool(b) => ColumnData::Bit(Some(*b)),
            SqlParam::Int(i) => ColumnData::I64(Some(*i)),
            SqlParam::Float(f) => ColumnData::F64(Some(*f)),
            SqlParam::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
        }
    }
}

/// A caller statement wrapped for `sp_executesql`.
#[derive(Debug)]
pub struct ParameterizedStatement<'a> {
    sql: &'a str,
    declarations: String,
    params: &'a [SqlParam],
}

impl<'a> ParameterizedStatement<'a> {
    pub fn new(sql: &'a str, params: &'a [SqlParam]) -> Self {
        let declarations = params
            .iter()
            .enumerate()
            .map(|(i, p)| format!("@param{} {}", i, p.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            sql,
            declarations,
            params,
        }
    }

    /// Declaration list passed as the `@params` argument.
    pub fn declarations(&self) -> &str {
        &self.declarations
    }

    /// The driver-level call: `@P1` is the statement, `@P2` the
    /// declarations, and `@P3..` the values in order.
    pub fn call(&self) -> String {
        let mut call = String::from("EXEC sp_executesql @P1, @P2");
        for position in 3..self.params.len() + 3 {
            call.push_str(&format!(", @P{}", position));
        }
        call
    }

    /// Positional arguments for [`call`](Self::call).
    pub fn arguments(&self) -> Vec<&dyn ToSql> {
        let mut args: Vec<&dyn ToSql> = Vec::with_capacity(self.params.len() + 2);
        args.push(&self.sql);
        args.push(&self.declarations);
        args.extend(self.params.iter().map(|p| p as &dyn ToSql));
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(data: ColumnData<'_>) -> String {
        match data {
            ColumnData::String(Some(s)) => s.into_owned(),
            other => panic!("unexpected column data: {:?}", other),
        }
    }

    #[test]
    fn test_declarations_follow_value_types() {
        let params = [
            SqlParam::Text("Alice".into()),
            SqlParam::Int(5),
            SqlParam::Float(1.5),
            SqlParam::Bool(true),
            SqlParam::Null,
        ];
        let stmt = ParameterizedStatement::new("SELECT 1", &params);
        assert_eq!(
            stmt.declarations(),
            "@param0 NVARCHAR(MAX), @param1 BIGINT, @param2 FLOAT, @param3 BIT, @param4 NVARCHAR(MAX)"
        );
        assert_eq!(
            stmt.call(),
            "EXEC sp_executesql @P1, @P2, @P3, @P4, @P5, @P6, @P7"
        );
    }

    #[test]
    fn test_statement_text_is_sent_verbatim() {
        let sql = "SELECT '@param0' AS lit, name FROM t WHERE id = @param0 -- uses @param1";
        let params = [SqlParam::Int(7)];
        let stmt = ParameterizedStatement::new(sql, &params);

        let args = stmt.arguments();
        assert_eq!(args.len(), 3);
        assert_eq!(text(args[0].to_sql()), sql);
        assert_eq!(text(args[1].to_sql()), "@param0 BIGINT");
        assert!(matches!(args[2].to_sql(), ColumnData::I64(Some(7))));
        assert_eq!(stmt.call(), "EXEC sp_executesql @P1, @P2, @P3");
    }

    #[test]
    fn test_json_scalars_deserialize() {
        let params: Vec<SqlParam> =
            serde_json::from_str(r#"[null, true, 42, 1.5, "Engineering"]"#).unwrap();
        assert_eq!(
            params,
            vec![
                SqlParam::Null,
                SqlParam::Bool(true),
                SqlParam::Int(42),
                SqlParam::Float(1.5),
                SqlParam::Text("Engineering".into()),
            ]
        );
    }

    #[test]
    fn test_structured_values_rejected() {
        assert!(serde_json::from_str::<SqlParam>("[1, 2]").is_err());
        assert!(serde_json::from_str::<SqlParam>(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn test_to_sql_column_data() {
        assert!(matches!(SqlParam::Int(7).to_sql(), ColumnData::I64(Some(7))));
        assert!(matches!(SqlParam::Bool(false).to_sql(), ColumnData::Bit(Some(false))));
        assert!(matches!(SqlParam::Null.to_sql(), ColumnData::String(None)));
        assert_eq!(text(SqlParam::Text("abc".into()).to_sql()), "abc");
    }
}
