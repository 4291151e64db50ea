use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::auth::TutorHubAuthSource;
use crate::engine::Engine;
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

pub struct TutorHubHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<TutorHubQueryParser>,
}

impl TutorHubHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(TutorHubQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    /// Execute a parsed command, recording per-command metrics.
    async fn run_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertTutor { id, name, hourly_rate, subjects } => {
                engine
                    .create_tutor(id, name, hourly_rate, subjects)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateTutor { id, hourly_rate, subjects } => {
                engine
                    .update_tutor(id, hourly_rate, subjects)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::InsertParent { id, name } => {
                engine.create_parent(id, name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::InsertChild { id, parent_id, name, grade } => {
                engine
                    .create_child(id, parent_id, name, grade)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::SetAvailability { tutor_id, day, slots } => {
                engine
                    .set_availability(tutor_id, day, slots)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::SelectTutors => {
                let tutors = engine.list_tutors().await;
                let schema = Arc::new(tutors_schema());
                let rows: Vec<PgWireResult<_>> = tutors
                    .into_iter()
                    .map(|tutor| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&tutor.id.to_string())?;
                        encoder.encode_field(&tutor.name)?;
                        encoder.encode_field(&tutor.hourly_rate)?;
                        encoder.encode_field(&tutor.subjects.join(","))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectAvailability { tutor_id, day } => {
                let week = match day {
                    Some(day) => vec![(day, engine.get_slots(tutor_id, day).await)],
                    None => engine.availability_week(tutor_id).await,
                };
                let schema = Arc::new(availability_schema());
                let tid = tutor_id.to_string();
                let rows: Vec<PgWireResult<_>> = week
                    .into_iter()
                    .map(|(day, slots)| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&tid)?;
                        encoder.encode_field(&weekday_name(day).to_string())?;
                        encoder.encode_field(&join_slots(&slots))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectOpenSlots { tutor_id, date } => {
                let slots = engine.open_slots(tutor_id, date).await;
                let schema = Arc::new(open_slots_schema());
                let date_str = date.to_string();
                let rows: Vec<PgWireResult<_>> = slots
                    .into_iter()
                    .map(|slot| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&date_str)?;
                        encoder.encode_field(&slot.to_string())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::InsertBooking { request, returning } => {
                let booking = engine.create_booking(request).await.map_err(engine_err)?;
                if returning {
                    let schema = Arc::new(bookings_schema());
                    let rows = vec![encode_booking_row(&schema, &booking)];
                    Ok(vec![Response::Query(QueryResponse::new(
                        schema,
                        stream::iter(rows),
                    ))])
                } else {
                    Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
                }
            }
            Command::TransitionBooking { id, actor, action, returning } => {
                let booking = engine
                    .transition(id, actor, action)
                    .await
                    .map_err(engine_err)?;
                if returning {
                    let schema = Arc::new(bookings_schema());
                    let rows = vec![encode_booking_row(&schema, &booking)];
                    Ok(vec![Response::Query(QueryResponse::new(
                        schema,
                        stream::iter(rows),
                    ))])
                } else {
                    Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
                }
            }
            Command::SelectBookings { filter } => {
                let bookings = engine.list_bookings(&filter).await;
                let schema = Arc::new(bookings_schema());
                let rows: Vec<PgWireResult<_>> = bookings
                    .iter()
                    .map(|booking| encode_booking_row(&schema, booking))
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectEarnings { tutor_id } => {
                let earnings = engine.tutor_earnings(tutor_id).await;
                let schema = Arc::new(earnings_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&earnings.tutor_id.to_string())?;
                encoder.encode_field(&(earnings.sessions_completed as i64))?;
                encoder.encode_field(&earnings.hours_taught)?;
                encoder.encode_field(&earnings.total_earned)?;
                let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::Listen { channel } => {
                parse_channel(&channel)?;
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
        }
    }
}

/// Channels are `tutor_<ulid>` or `parent_<ulid>`.
fn parse_channel(channel: &str) -> PgWireResult<Ulid> {
    let id_str = channel
        .strip_prefix("tutor_")
        .or_else(|| channel.strip_prefix("parent_"))
        .ok_or_else(|| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "42000".into(),
                format!("invalid channel: {channel} (expected tutor_{{id}} or parent_{{id}})"),
            )))
        })?;
    Ulid::from_string(id_str).map_err(|e| {
        PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".into(),
            "42000".into(),
            format!("bad ULID in channel: {e}"),
        )))
    })
}

fn join_slots(slots: &[SlotTime]) -> String {
    slots
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn encode_booking_row(
    schema: &Arc<Vec<FieldInfo>>,
    booking: &Booking,
) -> PgWireResult<pgwire::messages::data::DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&booking.id.to_string())?;
    encoder.encode_field(&booking.tutor_id.to_string())?;
    encoder.encode_field(&booking.parent_id.to_string())?;
    encoder.encode_field(&booking.child_id.to_string())?;
    encoder.encode_field(&booking.subject)?;
    encoder.encode_field(&booking.date.to_string())?;
    encoder.encode_field(&booking.time.to_string())?;
    encoder.encode_field(&(booking.duration.minutes() as i32))?;
    encoder.encode_field(&booking.status.as_str().to_string())?;
    encoder.encode_field(&booking.price)?;
    encoder.encode_field(&booking.notes)?;
    Ok(encoder.take_row())
}

fn varchar(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("tutor_id"),
        varchar("parent_id"),
        varchar("child_id"),
        varchar("subject"),
        varchar("date"),
        varchar("time"),
        FieldInfo::new("duration".into(), None, None, Type::INT4, FieldFormat::Text),
        varchar("status"),
        FieldInfo::new("price".into(), None, None, Type::FLOAT8, FieldFormat::Text),
        varchar("notes"),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![varchar("tutor_id"), varchar("day"), varchar("slots")]
}

fn open_slots_schema() -> Vec<FieldInfo> {
    vec![varchar("date"), varchar("time")]
}

fn tutors_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("name"),
        FieldInfo::new(
            "hourly_rate".into(),
            None,
            None,
            Type::FLOAT8,
            FieldFormat::Text,
        ),
        varchar("subjects"),
    ]
}

fn earnings_schema() -> Vec<FieldInfo> {
    vec![
        varchar("tutor_id"),
        FieldInfo::new(
            "sessions_completed".into(),
            None,
            None,
            Type::INT8,
            FieldFormat::Text,
        ),
        FieldInfo::new(
            "hours_taught".into(),
            None,
            None,
            Type::FLOAT8,
            FieldFormat::Text,
        ),
        FieldInfo::new(
            "total_earned".into(),
            None,
            None,
            Type::FLOAT8,
            FieldFormat::Text,
        ),
    ]
}

/// Guess the result schema for describe messages from the statement text.
fn schema_for_statement(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if upper.contains("OPEN_SLOTS") {
        open_slots_schema()
    } else if upper.contains("AVAILABILITY") && upper.contains("SELECT") {
        availability_schema()
    } else if upper.contains("EARNINGS") {
        earnings_schema()
    } else if upper.contains("BOOKINGS") && (upper.contains("SELECT") || upper.contains("RETURNING"))
    {
        bookings_schema()
    } else if upper.contains("TUTORS") && upper.contains("SELECT") {
        tutors_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for TutorHubHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.run_command(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct TutorHubQueryParser;

#[async_trait]
impl QueryParser for TutorHubQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for_statement(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for TutorHubHandler {
    type Statement = String;
    type QueryParser = TutorHubQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.run_command(&engine, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for_statement(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for_statement(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params: &Vec<Option<Bytes>> = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct TutorHubFactory {
    handler: Arc<TutorHubHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<TutorHubAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl TutorHubFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = TutorHubAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(TutorHubHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for TutorHubFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection to completion.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls_acceptor: Option<TlsAcceptor>,
) -> Result<(), std::io::Error> {
    let factory = TutorHubFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls_acceptor, factory).await
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
