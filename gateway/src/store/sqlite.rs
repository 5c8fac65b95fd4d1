use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Transaction};
use serde_json::{Map, Value};

use modelhub_common::{DecodedResult, InferenceRequest, ModelFamily};

use super::{Committed, PredictionRecord, PredictionStore, StoreError};

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS advertising (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tv REAL NOT NULL,
        radio REAL NOT NULL,
        newspaper REAL NOT NULL,
        prediction REAL NOT NULL,
        client_ip TEXT NOT NULL,
        prediction_time TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS iris (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sepal_length REAL NOT NULL,
        sepal_width REAL NOT NULL,
        petal_length REAL NOT NULL,
        petal_width REAL NOT NULL,
        prediction TEXT NOT NULL,
        client_ip TEXT NOT NULL,
        prediction_time TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS commentpredict (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        comment TEXT NOT NULL,
        sentiment TEXT NOT NULL,
        client_ip TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS products_review_rates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_info TEXT NOT NULL,
        review TEXT NOT NULL,
        product TEXT NOT NULL,
        rate INTEGER,
        sentiment TEXT NOT NULL,
        key_points TEXT NOT NULL,
        client_ip TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];

fn table_for(family: ModelFamily) -> &'static str {
    match family {
        ModelFamily::TabularRegressor => "advertising",
        ModelFamily::TabularClassifier => "iris",
        ModelFamily::SequenceClassifier => "commentpredict",
        ModelFamily::StructuredExtractor => "products_review_rates",
    }
}

struct Inner {
    conn: Connection,
    last_created_at: Option<DateTime<Utc>>,
}

/// SQLite-backed prediction log.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

impl SqliteStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
            }
            Connection::open(path)?
        };

        for statement in SCHEMA {
            conn.execute(statement, [])?;
        }

        tracing::info!("Prediction store initialized with database: {}", path);

        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                last_created_at: None,
            }),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }
}

/// Commit timestamp, strictly after the previous one handed out.
fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

fn insert_row(
    tx: &Transaction<'_>,
    record: &PredictionRecord,
    created_at: &str,
) -> Result<(), StoreError> {
    let ip = &record.client_ip;
    match (&record.request, &record.result) {
        (InferenceRequest::Advertising(r), DecodedResult::Regression { prediction }) => {
            tx.execute(
                "INSERT INTO advertising (tv, radio, newspaper, prediction, client_ip, prediction_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![r.tv, r.radio, r.newspaper, prediction, ip, created_at],
            )?;
        }
        (InferenceRequest::Iris(r), DecodedResult::Classification { prediction }) => {
            tx.execute(
                "INSERT INTO iris (sepal_length, sepal_width, petal_length, petal_width, prediction, client_ip, prediction_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    r.sepal_length,
                    r.sepal_width,
                    r.petal_length,
                    r.petal_width,
                    prediction,
                    ip,
                    created_at,
                ],
            )?;
        }
        (InferenceRequest::Comment(r), DecodedResult::Sentiment { sentiment }) => {
            tx.execute(
                "INSERT INTO commentpredict (comment, sentiment, client_ip, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![r.comment, sentiment.as_str(), ip, created_at],
            )?;
        }
        (InferenceRequest::Review(r), DecodedResult::Review(analysis)) => {
            let key_points = serde_json::to_string(&analysis.key_points)
                .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            tx.execute(
                "INSERT INTO products_review_rates (user_info, review, product, rate, sentiment, key_points, client_ip, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    r.user,
                    r.review,
                    r.product,
                    analysis.rating.map(i64::from),
                    analysis.sentiment.as_str(),
                    key_points,
                    ip,
                    created_at,
                ],
            )?;
        }
        _ => return Err(StoreError::Mismatch(record.family())),
    }
    Ok(())
}

fn column_value(name: &str, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if name == "key_points" {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else {
                Value::String(text)
            }
        }
        ValueRef::Blob(_) => Value::Null,
    }
}

impl PredictionStore for SqliteStore {
    fn insert(&self, record: &PredictionRecord) -> Result<Committed, StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        let created_at = next_timestamp(inner.last_created_at);
        let stamp = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);

        let tx = inner.conn.transaction()?;
        insert_row(&tx, record, &stamp)?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        inner.last_created_at = Some(created_at);
        tracing::debug!(family = %record.family(), id, "Logged prediction");

        Ok(Committed { id, created_at })
    }

    fn recent(&self, family: ModelFamily, limit: usize) -> Result<Vec<Value>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        let sql = format!("SELECT * FROM {} ORDER BY id DESC LIMIT ?1", table_for(family));
        let mut stmt = inner.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map(params![limit as i64], |row| {
            let mut object = Map::new();
            for (i, name) in names.iter().enumerate() {
                object.insert(name.clone(), column_value(name, row.get_ref(i)?));
            }
            Ok(Value::Object(object))
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
