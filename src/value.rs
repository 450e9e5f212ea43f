use anyhow::{Result, anyhow};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Row};

/// One scalar cell read from the source or bound into the target.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    Null,
}

/// Storage class of a column or value, used to pick placeholder defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Boolean,
    Bytes,
    Null,
}

impl ValueKind {
    /// Classifies a driver-reported column type name, `None` when it tells us nothing.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let name = type_name.trim().to_ascii_uppercase();
        if name.is_empty() || name == "NULL" {
            return None;
        }
        if name.contains("BOOL") {
            Some(ValueKind::Boolean)
        } else if (name.contains("INT") && !name.contains("POINT") && !name.contains("INTERVAL"))
            || name.ends_with("SERIAL")
        {
            Some(ValueKind::Integer)
        } else if ["REAL", "DOUBLE", "FLOAT", "NUMERIC", "DECIMAL"]
            .iter()
            .any(|t| name.contains(t))
        {
            Some(ValueKind::Float)
        } else if ["CHAR", "TEXT", "CLOB", "STRING", "JSON"]
            .iter()
            .any(|t| name.contains(t))
        {
            Some(ValueKind::Text)
        } else if name.contains("BLOB") || name.contains("BYTEA") || name.contains("BINARY") {
            Some(ValueKind::Bytes)
        } else {
            None
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            ValueKind::Text => Value::Text(String::new()),
            ValueKind::Integer => Value::Integer(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Boolean => Value::Boolean(false),
            ValueKind::Bytes | ValueKind::Null => Value::Null,
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Text(_) => ValueKind::Text,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Null => ValueKind::Null,
        }
    }

    /// Default for a column with no source counterpart: the declared kind when
    /// known, otherwise the runtime kind of an already observed value.
    pub fn placeholder_for(declared: Option<ValueKind>, observed: Option<&Value>) -> Value {
        match (declared, observed) {
            (Some(kind), _) => kind.default_value(),
            (None, Some(value)) => value.kind().default_value(),
            (None, None) => Value::Text(String::new()),
        }
    }

    /// Decodes column `index` of a fetched row into its closest variant.
    pub fn decode(row: &AnyRow, index: usize) -> Result<Self> {
        match row.try_get::<Option<i64>, _>(index) {
            Ok(Some(v)) => return Ok(Value::Integer(v)),
            Ok(None) => return Ok(Value::Null),
            Err(_) => {}
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(index) {
            return Ok(Value::Float(v));
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(index) {
            return Ok(Value::Float(f64::from(v)));
        }
        if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(index) {
            return Ok(Value::Boolean(v));
        }
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(index) {
            return Ok(Value::Text(v));
        }
        if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(index) {
            return Ok(Value::Bytes(v));
        }
        Err(anyhow!("Column {} holds a value of an unsupported type", index))
    }

    /// Reads every column of a row in the row's native order.
    pub fn decode_row(row: &AnyRow) -> Result<Vec<Self>> {
        (0..row.len()).map(|i| Self::decode(row, i)).collect()
    }

    /// Binds the value as the next parameter. NULLs are bound with the type of
    /// the target column so strictly typed backends such as Postgres accept them.
    pub fn bind<'q>(
        self,
        query: Query<'q, Any, AnyArguments<'q>>,
        column: Option<ValueKind>,
    ) -> Query<'q, Any, AnyArguments<'q>> {
        match self {
            Value::Text(s) => query.bind(s),
            Value::Integer(i) => query.bind(i),
            Value::Float(f) => query.bind(f),
            Value::Boolean(b) => query.bind(b),
            Value::Bytes(b) => query.bind(b),
            Value::Null => match null_kind(column) {
                ValueKind::Integer => query.bind(Option::<i64>::None),
                ValueKind::Float => query.bind(Option::<f64>::None),
                ValueKind::Boolean => query.bind(Option::<bool>::None),
                ValueKind::Bytes => query.bind(Option::<Vec<u8>>::None),
                ValueKind::Text | ValueKind::Null => query.bind(Option::<String>::None),
            },
        }
    }
}

/// Parameter type used for a NULL going into a column of kind `column`.
/// Unclassified columns get a text NULL.
pub fn null_kind(column: Option<ValueKind>) -> ValueKind {
    match column {
        Some(ValueKind::Null) | None => ValueKind::Text,
        Some(kind) => kind,
    }
}
