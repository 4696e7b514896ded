//! MySQL protocol front end.
//!
//! `opensrv-mysql` owns the handshake, packet framing and command loop;
//! this module supplies the [`AsyncMysqlShim`] callbacks that bridge each
//! connection to a [`Session`], and the accept loop that spawns one task
//! per connection.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use opensrv_mysql::{
    AsyncMysqlIntermediary, AsyncMysqlShim, Column, ColumnFlags, ColumnType, ErrorKind, InitWriter,
    OkResponse, ParamParser, ParamValue, QueryResultWriter, StatementMetaWriter, ValueInner,
};
use rand::Rng;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::database::{CellValue, ResultSet, ServerError, Session, StatementReply, Store};

/// TCP server speaking the MySQL client/server protocol.
pub struct MysqlServer {
    store: Arc<Store>,
    config: ServerConfig,
}

impl MysqlServer {
    /// Creates a server over an opened store.
    pub fn new(store: Arc<Store>, config: ServerConfig) -> Self {
        Self { store, config }
    }

    /// Accepts connections forever, one task per connection.
    ///
    /// Accept errors are logged and the loop continues; a failed bind is
    /// returned to the caller.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        info!("listening on {}", self.config.listen_addr);

        let (user, secret) = self.config.credentials();

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("accept failed: {e}");
                    continue;
                }
            };

            let session = match Session::new(self.store.clone()) {
                Ok(session) => session,
                Err(e) => {
                    error!("failed to open session for {peer}: {e}");
                    continue;
                }
            };

            let shim = MysqlSession::new(session, user.clone(), secret.clone());
            tokio::spawn(async move {
                let (read_half, write_half) = stream.into_split();
                if let Err(e) = AsyncMysqlIntermediary::run_on(shim, read_half, write_half).await {
                    debug!("connection {peer} closed: {e}");
                }
            });
        }
    }
}

/// Per-connection protocol state around a [`Session`].
struct MysqlSession {
    session: Session,
    user: String,
    secret: String,
    salt: [u8; 20],
    /// Prepared-statement id to original text; the session re-executes
    /// the text, so the text is all that needs to be remembered.
    statements: HashMap<u32, String>,
    next_statement_id: u32,
}

impl MysqlSession {
    fn new(session: Session, user: String, secret: String) -> Self {
        let mut salt = [0u8; 20];
        let mut rng = rand::thread_rng();
        for byte in salt.iter_mut() {
            // Handshake salt bytes must be non-zero printable-ish ASCII.
            *byte = rng.gen_range(1..=127);
        }
        Self {
            session,
            user,
            secret,
            salt,
            statements: HashMap::new(),
            next_statement_id: 1,
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> AsyncMysqlShim<W> for MysqlSession {
    type Error = io::Error;

    fn version(&self) -> String {
        format!("8.0.26-litemux-{}", env!("CARGO_PKG_VERSION"))
    }

    fn salt(&self) -> [u8; 20] {
        self.salt
    }

    async fn authenticate(
        &self,
        _auth_plugin: &str,
        username: &[u8],
        salt: &[u8],
        auth_data: &[u8],
    ) -> bool {
        username == self.user.as_bytes()
            && auth_data == native_password_token(&self.secret, salt).as_slice()
    }

    async fn on_prepare<'a>(
        &'a mut self,
        query: &'a str,
        info: StatementMetaWriter<'a, W>,
    ) -> io::Result<()> {
        match self.session.prepare(query) {
            Ok((param_count, column_count)) => {
                let id = self.next_statement_id;
                self.next_statement_id += 1;
                self.statements.insert(id, query.to_string());

                let params = placeholder_columns(param_count);
                let columns = placeholder_columns(column_count);
                info.reply(id, &params, &columns).await
            }
            Err(e) => info.error(error_kind(&e), e.to_string().as_bytes()).await,
        }
    }

    async fn on_execute<'a>(
        &'a mut self,
        id: u32,
        params: ParamParser<'a>,
        results: QueryResultWriter<'a, W>,
    ) -> io::Result<()> {
        let Some(sql) = self.statements.get(&id).cloned() else {
            return results
                .error(
                    ErrorKind::ER_UNKNOWN_STMT_HANDLER,
                    b"unknown prepared statement id",
                )
                .await;
        };

        let args: Vec<rusqlite::types::Value> = params.into_iter().map(bind_value).collect();
        write_reply(self.session.execute_prepared(&sql, args), results).await
    }

    async fn on_close(&mut self, id: u32) {
        self.statements.remove(&id);
    }

    async fn on_query<'a>(
        &'a mut self,
        sql: &'a str,
        results: QueryResultWriter<'a, W>,
    ) -> io::Result<()> {
        write_reply(self.session.handle_statement(sql), results).await
    }

    async fn on_init<'a>(
        &'a mut self,
        schema: &'a str,
        writer: InitWriter<'a, W>,
    ) -> io::Result<()> {
        match self.session.select_database(schema) {
            Ok(()) => writer.ok().await,
            Err(e) => {
                writer
                    .error(ErrorKind::ER_BAD_DB_ERROR, e.to_string().as_bytes())
                    .await
            }
        }
    }
}

/// Encodes a session reply on the wire.
async fn write_reply<W: AsyncWrite + Send + Unpin>(
    reply: Result<StatementReply, ServerError>,
    results: QueryResultWriter<'_, W>,
) -> io::Result<()> {
    match reply {
        Ok(StatementReply::Ok {
            rows_affected,
            last_insert_id,
        }) => {
            results
                .completed(OkResponse {
                    affected_rows: rows_affected,
                    last_insert_id,
                    ..Default::default()
                })
                .await
        }
        Ok(StatementReply::Rows(result_set)) => write_result_set(&result_set, results).await,
        Err(e) => results.error(error_kind(&e), e.to_string().as_bytes()).await,
    }
}

/// Streams a result set: column definitions first, then each row.
async fn write_result_set<W: AsyncWrite + Send + Unpin>(
    result_set: &ResultSet,
    results: QueryResultWriter<'_, W>,
) -> io::Result<()> {
    let columns = wire_columns(result_set);
    let mut row_writer = results.start(&columns).await?;

    for row in &result_set.rows {
        for cell in row {
            match cell {
                CellValue::Null => row_writer.write_col(None::<i64>)?,
                CellValue::Int(n) => row_writer.write_col(*n)?,
                CellValue::Float(f) => row_writer.write_col(*f)?,
                CellValue::Text(s) => row_writer.write_col(s.as_str())?,
            }
        }
        row_writer.end_row().await?;
    }

    row_writer.finish().await
}

/// Builds wire column definitions for a result set.
///
/// SQLite columns carry no declared type on the result path, so the type
/// is taken from the first row's cell kinds; an empty result falls back
/// to strings.
fn wire_columns(result_set: &ResultSet) -> Vec<Column> {
    result_set
        .fields
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let coltype = match result_set.rows.first().map(|row| &row[index]) {
                Some(CellValue::Int(_)) => ColumnType::MYSQL_TYPE_LONGLONG,
                Some(CellValue::Float(_)) => ColumnType::MYSQL_TYPE_DOUBLE,
                _ => ColumnType::MYSQL_TYPE_VAR_STRING,
            };
            Column {
                table: String::new(),
                column: name.clone(),
                coltype,
                colflags: ColumnFlags::empty(),
            }
        })
        .collect()
}

/// Synthesized metadata for prepared-statement placeholders.
fn placeholder_columns(count: usize) -> Vec<Column> {
    (0..count)
        .map(|_| Column {
            table: String::new(),
            column: "?".to_string(),
            coltype: ColumnType::MYSQL_TYPE_VAR_STRING,
            colflags: ColumnFlags::empty(),
        })
        .collect()
}

/// Converts one bound wire parameter into a SQLite value.
fn bind_value(param: ParamValue<'_>) -> rusqlite::types::Value {
    match param.value.into_inner() {
        ValueInner::NULL => rusqlite::types::Value::Null,
        ValueInner::Int(n) => rusqlite::types::Value::Integer(n),
        ValueInner::UInt(n) => rusqlite::types::Value::Integer(n as i64),
        ValueInner::Double(f) => rusqlite::types::Value::Real(f),
        ValueInner::Bytes(bytes) => {
            rusqlite::types::Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
        // Temporal binary values have no native SQLite shape.
        _ => rusqlite::types::Value::Null,
    }
}

/// Maps a server error onto the closest MySQL error code.
fn error_kind(error: &ServerError) -> ErrorKind {
    match error {
        ServerError::Parse(_) => ErrorKind::ER_PARSE_ERROR,
        ServerError::Unsupported(_) => ErrorKind::ER_NOT_SUPPORTED_YET,
        ServerError::Sqlite(_) | ServerError::Io(_) => ErrorKind::ER_UNKNOWN_ERROR,
    }
}

/// `mysql_native_password` token: `SHA1(secret) XOR SHA1(salt + SHA1(SHA1(secret)))`.
///
/// An empty secret authenticates with an empty token.
fn native_password_token(secret: &str, salt: &[u8]) -> Vec<u8> {
    if secret.is_empty() {
        return Vec::new();
    }

    let stage1 = Sha1::digest(secret.as_bytes());
    let stage2 = Sha1::digest(stage1.as_slice());

    let mut hasher = Sha1::new();
    hasher.update(salt);
    hasher.update(stage2.as_slice());
    let mut token = hasher.finalize();

    for (token_byte, stage1_byte) in token.iter_mut().zip(stage1.iter()) {
        *token_byte ^= stage1_byte;
    }
    token.to_vec()
}
